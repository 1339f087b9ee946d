//! StraightMovement — базовое векторное движение
//!
//! Смещение за шаг = speed × unit(angle) × elapsed. Кандидат проверяется
//! obstacle oracle целиком (без sweep). smooth = скользим вдоль стены по осям.

use std::f32::consts::TAU;

use crate::error::{check_finite, check_non_negative, check_speed, MovementError};
use crate::movement::core::{MoveResult, MovementContext, MovementCore};
use crate::movement::direction::{angle_to_vector, normalize_angle};

/// Допуск при сравнении пройденной дистанции с max_distance
const DISTANCE_EPSILON: f32 = 1e-3;

/// Что произошло за один update (для обёрток Random/Target)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Шаг ещё не наступил (или скорость 0)
    Idle,
    Moved,
    /// Был контакт с препятствием (возможно со скольжением)
    Obstructed,
    /// max_distance достигнута, движение завершено
    ReachedMaxDistance,
}

#[derive(Debug, Clone)]
pub struct StraightMovement {
    speed: f32,
    angle: f32,
    smooth: bool,
    max_distance: f32,
    traveled: f32,
    next_move_date: u64,
}

impl Default for StraightMovement {
    fn default() -> Self {
        Self::with_checked(0.0, 0.0)
    }
}

impl StraightMovement {
    /// speed в px/s (≥ 0), angle в радианах (конечный)
    pub fn new(speed: f32, angle: f32) -> Result<Self, MovementError> {
        Ok(Self::with_checked(check_speed(speed)?, check_finite("angle", angle)?))
    }

    /// Параметры уже проверены вызывающим
    pub(crate) fn with_checked(speed: f32, angle: f32) -> Self {
        Self {
            speed,
            angle: normalize_angle(angle),
            smooth: true,
            max_distance: 0.0,
            traveled: 0.0,
            next_move_date: 0,
        }
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// px/s, ≥ 0
    pub fn set_speed(&mut self, speed: f32) -> Result<(), MovementError> {
        self.speed = check_speed(speed)?;
        Ok(())
    }

    /// Радианы, [0, 2π)
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn set_angle(&mut self, angle: f32) -> Result<(), MovementError> {
        self.angle = normalize_angle(check_finite("angle", angle)?);
        Ok(())
    }

    pub fn is_smooth(&self) -> bool {
        self.smooth
    }

    pub fn set_smooth(&mut self, smooth: bool) {
        self.smooth = smooth;
    }

    pub fn max_distance(&self) -> f32 {
        self.max_distance
    }

    /// 0 = без ограничения
    pub fn set_max_distance(&mut self, max_distance: f32) -> Result<(), MovementError> {
        self.max_distance = check_non_negative("max_distance", max_distance)?;
        Ok(())
    }

    pub fn traveled(&self) -> f32 {
        self.traveled
    }

    /// Задержка между шагами: примерно 1px за шаг
    fn step_delay(&self) -> u64 {
        if self.speed <= 0.0 {
            return 1;
        }
        ((1000.0 / self.speed) as u64).max(1)
    }

    pub(crate) fn set_angle_unchecked(&mut self, angle: f32) {
        self.angle = normalize_angle(angle);
    }

    pub(crate) fn on_start(&mut self, core: &mut MovementCore, now: u64) {
        self.traveled = 0.0;
        self.next_move_date = now;
        if self.speed > 0.0 {
            core.set_heading(self.angle);
        }
    }

    pub(crate) fn shift_deadlines(&mut self, paused: u64) {
        self.next_move_date = self.next_move_date.saturating_add(paused);
    }

    pub(crate) fn update(&mut self, core: &mut MovementCore, ctx: &mut MovementContext) {
        self.step(core, ctx);
    }

    /// Длина шага, который step() сделает в момент now (0 — шаг ещё не наступил)
    pub(crate) fn pending_step_length(&self, core: &MovementCore, now: u64) -> f32 {
        if self.speed <= 0.0 || now < self.next_move_date {
            return 0.0;
        }
        self.speed * now.saturating_sub(core.last_move_date) as f32 / 1000.0
    }

    pub(crate) fn step(&mut self, core: &mut MovementCore, ctx: &mut MovementContext) -> StepOutcome {
        if self.speed <= 0.0 {
            core.touch(ctx.now);
            return StepOutcome::Idle;
        }
        if ctx.now < self.next_move_date {
            return StepOutcome::Idle;
        }

        let elapsed = core.take_elapsed(ctx.now);
        self.next_move_date = ctx.now + self.step_delay();

        let mut distance = self.speed * elapsed as f32 / 1000.0;
        if self.max_distance > 0.0 {
            distance = distance.min(self.max_distance - self.traveled);
        }
        if distance <= 0.0 {
            return StepOutcome::Idle;
        }

        let before = core.xy;
        let result = core.try_move(ctx, angle_to_vector(self.angle) * distance, self.smooth);
        self.traveled += (core.xy - before).length();

        if self.max_distance > 0.0 && self.traveled >= self.max_distance - DISTANCE_EPSILON {
            self.traveled = self.max_distance;
            core.finish();
            return StepOutcome::ReachedMaxDistance;
        }

        match result {
            MoveResult::Full => StepOutcome::Moved,
            MoveResult::Slid | MoveResult::Blocked => StepOutcome::Obstructed,
        }
    }
}

/// Случайный угол в [0, 2π)
pub(crate) fn random_angle(ctx: &mut MovementContext) -> f32 {
    use rand::Rng;
    ctx.rng.gen_range(0.0..TAU)
}
