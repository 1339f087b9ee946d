//! RandomMovement — блуждание на базе StraightMovement
//!
//! Направление меняется через случайные интервалы, сразу при контакте с
//! препятствием, и когда mover вышел из прямоугольника start ± max_radius и
//! продолжает удаляться. Прямоугольник мягкий: стены могут вытолкнуть наружу.

use bevy::math::Rect;
use bevy::prelude::*;
use rand::Rng;

use crate::error::{check_non_negative, check_speed, MovementError};
use crate::movement::core::{MovementContext, MovementCore};
use crate::movement::direction::{angle_to_vector, vector_angle};
use crate::movement::straight::{random_angle, StepOutcome, StraightMovement};

#[derive(Debug, Clone)]
pub struct RandomMovement {
    straight: StraightMovement,
    /// 0 = без ограничения
    max_radius: f32,
    bounds: Rect,
    next_direction_change_date: u64,
}

impl Default for RandomMovement {
    fn default() -> Self {
        Self::with_checked(32.0, 0.0)
    }
}

impl RandomMovement {
    /// max_radius = 0 — без ограничения
    pub fn new(speed: f32, max_radius: f32) -> Result<Self, MovementError> {
        Ok(Self::with_checked(
            check_speed(speed)?,
            check_non_negative("max_radius", max_radius)?,
        ))
    }

    fn with_checked(speed: f32, max_radius: f32) -> Self {
        Self {
            straight: StraightMovement::with_checked(speed, 0.0),
            max_radius,
            bounds: Rect::default(),
            next_direction_change_date: 0,
        }
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

    /// false — при контакте со стеной не скользим, а сразу меняем направление
    pub fn set_smooth(&mut self, smooth: bool) {
        self.straight.set_smooth(smooth);
    }

    pub fn max_radius(&self) -> f32 {
        self.max_radius
    }

    /// Прямоугольник пересчитывается при следующем start()
    pub fn set_max_radius(&mut self, max_radius: f32) -> Result<(), MovementError> {
        self.max_radius = check_non_negative("max_radius", max_radius)?;
        Ok(())
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub(crate) fn on_start(&mut self, core: &mut MovementCore, now: u64) {
        self.straight.on_start(core, now);
        self.bounds = Rect::from_center_half_size(core.xy, Vec2::splat(self.max_radius));
        // Первое направление выбираем на первом update
        self.next_direction_change_date = now;
    }

    pub(crate) fn shift_deadlines(&mut self, paused: u64) {
        self.straight.shift_deadlines(paused);
        self.next_direction_change_date = self.next_direction_change_date.saturating_add(paused);
    }

    pub(crate) fn update(&mut self, core: &mut MovementCore, ctx: &mut MovementContext) {
        if ctx.now >= self.next_direction_change_date || self.is_leaving_bounds(core.xy) {
            self.change_direction(core, ctx);
        }

        if self.straight.step(core, ctx) == StepOutcome::Obstructed {
            self.change_direction(core, ctx);
        }
    }

    fn is_bounded(&self) -> bool {
        self.max_radius > 0.0
    }

    /// Снаружи прямоугольника и текущий курс уводит ещё дальше (по любой оси)
    fn is_leaving_bounds(&self, xy: Vec2) -> bool {
        if !self.is_bounded() {
            return false;
        }
        let heading = angle_to_vector(self.straight.angle());
        (xy.x < self.bounds.min.x && heading.x < 0.0)
            || (xy.x > self.bounds.max.x && heading.x > 0.0)
            || (xy.y < self.bounds.min.y && heading.y < 0.0)
            || (xy.y > self.bounds.max.y && heading.y > 0.0)
    }

    fn change_direction(&mut self, core: &mut MovementCore, ctx: &mut MovementContext) {
        let angle = if self.is_bounded() && !self.bounds.contains(core.xy) {
            // Снаружи: курс обратно к центру
            vector_angle(self.bounds.center() - core.xy)
        } else {
            random_angle(ctx)
        };
        self.straight.set_angle_unchecked(angle);
        core.set_heading(angle);

        let config = ctx.config;
        let extra = ctx.rng.gen_range(0..=config.random_direction_extra_delay_ms);
        self.next_direction_change_date = ctx.now + config.random_direction_min_delay_ms + extra;

        core.notify_changed();
    }
}
