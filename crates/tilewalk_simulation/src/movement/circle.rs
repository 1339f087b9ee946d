//! CircleMovement — орбита вокруг точки или entity
//!
//! angle и radius интегрируются независимо (градусы/с и px/с).
//! Позиция = center + radius × (cos, -sin)(angle). Каждые 360° +1 оборот;
//! loop_delay замораживает позицию между оборотами, но время идёт.

use bevy::prelude::*;

use crate::error::{check_finite, check_non_negative, MovementError};
use crate::movement::core::{MovementContext, MovementCore};
use crate::movement::direction::angle_to_vector;
use crate::movement::target::TargetPoint;

const FULL_TURN: f32 = 360.0;

#[derive(Debug, Clone)]
pub struct CircleMovement {
    center: TargetPoint,
    last_center: Option<Vec2>,
    radius: f32,
    /// px/s, со знаком
    radius_speed: f32,
    /// Градусы
    angle: f32,
    initial_angle: f32,
    /// Градусы/с, со знаком
    angle_speed: f32,
    clockwise: bool,
    /// 0 = бесконечно
    max_rotations: u32,
    rotations: u32,
    /// Накопленный угол текущего оборота
    rotated: f32,
    /// ms, 0 = бесконечно
    duration: u64,
    loop_delay: u64,
    start_date: u64,
    pause_until: Option<u64>,
}

impl Default for CircleMovement {
    fn default() -> Self {
        Self::with_checked(TargetPoint::default(), 0.0)
    }
}

impl CircleMovement {
    pub fn new(center: TargetPoint, radius: f32) -> Result<Self, MovementError> {
        Ok(Self::with_checked(center, check_non_negative("radius", radius)?))
    }

    fn with_checked(center: TargetPoint, radius: f32) -> Self {
        Self {
            center,
            last_center: None,
            radius,
            radius_speed: 0.0,
            angle: 0.0,
            initial_angle: 0.0,
            angle_speed: 200.0,
            clockwise: false,
            max_rotations: 0,
            rotations: 0,
            rotated: 0.0,
            duration: 0,
            loop_delay: 0,
            start_date: 0,
            pause_until: None,
        }
    }

    pub fn center(&self) -> TargetPoint {
        self.center
    }

    pub fn set_center(&mut self, center: TargetPoint) {
        self.center = center;
        self.last_center = None;
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn set_radius(&mut self, radius: f32) -> Result<(), MovementError> {
        self.radius = check_non_negative("radius", radius)?;
        Ok(())
    }

    pub fn radius_speed(&self) -> f32 {
        self.radius_speed
    }

    pub fn set_radius_speed(&mut self, radius_speed: f32) -> Result<(), MovementError> {
        self.radius_speed = check_finite("radius_speed", radius_speed)?;
        Ok(())
    }

    /// Текущий угол (градусы, [0, 360))
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn initial_angle(&self) -> f32 {
        self.initial_angle
    }

    pub fn set_initial_angle(&mut self, degrees: f32) -> Result<(), MovementError> {
        self.initial_angle = check_finite("initial_angle", degrees)?.rem_euclid(FULL_TURN);
        Ok(())
    }

    pub fn angle_speed(&self) -> f32 {
        self.angle_speed
    }

    pub fn set_angle_speed(&mut self, degrees_per_second: f32) -> Result<(), MovementError> {
        self.angle_speed = check_finite("angle_speed", degrees_per_second)?;
        Ok(())
    }

    pub fn is_clockwise(&self) -> bool {
        self.clockwise
    }

    pub fn set_clockwise(&mut self, clockwise: bool) {
        self.clockwise = clockwise;
    }

    pub fn max_rotations(&self) -> u32 {
        self.max_rotations
    }

    pub fn set_max_rotations(&mut self, max_rotations: u32) {
        self.max_rotations = max_rotations;
    }

    pub fn rotations(&self) -> u32 {
        self.rotations
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn set_duration(&mut self, duration_ms: u64) {
        self.duration = duration_ms;
    }

    pub fn loop_delay(&self) -> u64 {
        self.loop_delay
    }

    pub fn set_loop_delay(&mut self, loop_delay_ms: u64) {
        self.loop_delay = loop_delay_ms;
    }

    fn effective_angle_speed(&self) -> f32 {
        if self.clockwise {
            -self.angle_speed
        } else {
            self.angle_speed
        }
    }

    fn position(&self, center: Vec2) -> Vec2 {
        center + angle_to_vector(self.angle.to_radians()) * self.radius
    }

    pub(crate) fn on_start(&mut self, core: &mut MovementCore, now: u64) {
        self.angle = self.initial_angle;
        self.rotations = 0;
        self.rotated = 0.0;
        self.start_date = now;
        self.pause_until = None;

        // Фиксированный центр известен сразу; центр-entity — на первом update
        if let TargetPoint::Fixed(center) = self.center {
            self.last_center = Some(center);
            core.set_xy(self.position(center));
        }
    }

    pub(crate) fn shift_deadlines(&mut self, paused: u64) {
        self.start_date = self.start_date.saturating_add(paused);
        if let Some(until) = self.pause_until.as_mut() {
            *until = until.saturating_add(paused);
        }
    }

    pub(crate) fn update(&mut self, core: &mut MovementCore, ctx: &mut MovementContext) {
        let elapsed = core.take_elapsed(ctx.now);

        if self.duration > 0 && ctx.now.saturating_sub(self.start_date) >= self.duration {
            core.finish();
            return;
        }

        if let Some(center) = self.center.resolve(ctx) {
            self.last_center = Some(center);
        }
        let Some(center) = self.last_center else {
            return;
        };

        if let Some(until) = self.pause_until {
            if ctx.now < until {
                return;
            }
            self.pause_until = None;
        }

        let dt = elapsed as f32 / 1000.0;
        self.radius = (self.radius + self.radius_speed * dt).max(0.0);

        let delta = self.effective_angle_speed() * dt;
        self.angle = (self.angle + delta).rem_euclid(FULL_TURN);
        self.rotated += delta.abs();

        let mut completed_loop = false;
        if self.rotated >= FULL_TURN {
            let loops = (self.rotated / FULL_TURN).floor();
            self.rotated -= loops * FULL_TURN;
            self.rotations = self.rotations.saturating_add(loops as u32);
            completed_loop = true;
        }

        let xy = self.position(center);
        if core.is_obstacle(ctx, xy) {
            core.notify_obstacle_reached();
        } else {
            core.set_xy(xy);
        }

        if completed_loop {
            if self.max_rotations > 0 && self.rotations >= self.max_rotations {
                core.finish();
                return;
            }
            if self.loop_delay > 0 {
                self.pause_until = Some(ctx.now + self.loop_delay);
                core.notify_changed();
            }
        }
    }
}
