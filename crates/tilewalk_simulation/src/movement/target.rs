//! TargetMovement — движение к фиксированной точке или к живой entity
//!
//! Позиция цели проверяется раз в target_recompute_interval_ms. Точка прицеливания
//! меняется только если цель ушла дальше target_reaim_threshold (без дрожания курса).
//! Финиш — когда до точки прицеливания не больше одного шага.

use bevy::prelude::*;

use crate::error::{check_speed, MovementError};
use crate::movement::core::{MovementContext, MovementCore};
use crate::movement::direction::vector_angle;
use crate::movement::straight::StraightMovement;

/// Цель: фиксированная точка или entity + смещение
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetPoint {
    Fixed(Vec2),
    Entity { entity: Entity, offset: Vec2 },
}

impl Default for TargetPoint {
    fn default() -> Self {
        TargetPoint::Fixed(Vec2::ZERO)
    }
}

impl TargetPoint {
    /// None — entity пропала (вызывающий держит последнюю известную позицию)
    pub fn resolve(&self, ctx: &MovementContext) -> Option<Vec2> {
        match *self {
            TargetPoint::Fixed(xy) => Some(xy),
            TargetPoint::Entity { entity, offset } => {
                ctx.entities.entity_position(entity).map(|xy| xy + offset)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct TargetMovement {
    straight: StraightMovement,
    target: TargetPoint,
    last_known: Option<Vec2>,
    aimed: Option<Vec2>,
    next_recompute_date: u64,
}

impl Default for TargetMovement {
    fn default() -> Self {
        Self::with_checked(TargetPoint::default(), 32.0)
    }
}

impl TargetMovement {
    pub fn new(target: TargetPoint, speed: f32) -> Result<Self, MovementError> {
        Ok(Self::with_checked(target, check_speed(speed)?))
    }

    fn with_checked(target: TargetPoint, speed: f32) -> Self {
        let mut straight = StraightMovement::with_checked(speed, 0.0);
        straight.set_smooth(true);
        Self {
            straight,
            target,
            last_known: None,
            aimed: None,
            next_recompute_date: 0,
        }
    }

    pub fn target(&self) -> TargetPoint {
        self.target
    }

    pub fn set_target(&mut self, target: TargetPoint) {
        self.target = target;
        self.last_known = None;
        self.aimed = None;
        // Новая цель — пересчёт на ближайшем update
        self.next_recompute_date = 0;
    }

    pub fn speed(&self) -> f32 {
        self.straight.speed()
    }

    pub fn set_speed(&mut self, speed: f32) -> Result<(), MovementError> {
        self.straight.set_speed(speed)
    }

    pub fn angle(&self) -> f32 {
        self.straight.angle()
    }

    pub fn is_smooth(&self) -> bool {
        self.straight.is_smooth()
    }

    pub fn set_smooth(&mut self, smooth: bool) {
        self.straight.set_smooth(smooth);
    }

    /// Текущая точка прицеливания (None до первого update)
    pub fn aimed_point(&self) -> Option<Vec2> {
        self.aimed
    }

    pub(crate) fn on_start(&mut self, core: &mut MovementCore, now: u64) {
        self.straight.on_start(core, now);
        self.aimed = None;
        self.next_recompute_date = now;
    }

    pub(crate) fn shift_deadlines(&mut self, paused: u64) {
        self.straight.shift_deadlines(paused);
        self.next_recompute_date = self.next_recompute_date.saturating_add(paused);
    }

    pub(crate) fn update(&mut self, core: &mut MovementCore, ctx: &mut MovementContext) {
        if ctx.now >= self.next_recompute_date {
            self.next_recompute_date = ctx.now + ctx.config.target_recompute_interval_ms;
            self.recompute(core, ctx);
        }

        let Some(aimed) = self.aimed else {
            core.touch(ctx.now);
            return;
        };

        // Ровно тот шаг, который StraightMovement сделает на этом тике
        let step = self.straight.pending_step_length(core, ctx.now);
        let remaining = aimed - core.xy;
        if remaining.length() <= step || remaining == Vec2::ZERO {
            if !core.is_obstacle(ctx, aimed) {
                core.set_xy(aimed);
            }
            core.finish();
            return;
        }

        let angle = vector_angle(remaining);
        self.straight.set_angle_unchecked(angle);
        self.straight.step(core, ctx);
    }

    fn recompute(&mut self, core: &mut MovementCore, ctx: &MovementContext) {
        if let Some(xy) = self.target.resolve(ctx) {
            self.last_known = Some(xy);
        }
        let Some(target) = self.last_known else {
            return;
        };

        let reaim = match self.aimed {
            None => true,
            Some(aimed) => aimed.distance(target) > ctx.config.target_reaim_threshold,
        };
        if reaim {
            self.aimed = Some(target);
            if target != core.xy {
                core.set_heading(vector_angle(target - core.xy));
            }
            core.notify_changed();
        }
    }
}
