//! RandomPathMovement — случайные "ноги" по клеткам
//!
//! Направление ноги выбирается равномерно из незаблокированных 8 направлений,
//! длина 1..=random_path_max_leg_cells. Все 8 заблокированы → короткая пауза.
//! Никогда не завершается сама.

use rand::Rng;

use crate::error::{check_speed, MovementError};
use crate::movement::core::{MovementContext, MovementCore};
use crate::movement::direction::Direction8;
use crate::movement::path::{GridStepper, PathState, StepProgress};

#[derive(Debug, Clone)]
pub struct RandomPathMovement {
    stepper: GridStepper,
    state: PathState,
    leg_direction: Option<Direction8>,
    leg_remaining: u32,
}

impl Default for RandomPathMovement {
    fn default() -> Self {
        Self::with_checked(32.0)
    }
}

impl RandomPathMovement {
    pub fn new(speed: f32) -> Result<Self, MovementError> {
        Ok(Self::with_checked(check_speed(speed)?))
    }

    fn with_checked(speed: f32) -> Self {
        Self {
            stepper: GridStepper::new(speed, true),
            state: PathState::AwaitingNextDirection,
            leg_direction: None,
            leg_remaining: 0,
        }
    }

    pub fn speed(&self) -> f32 {
        self.stepper.speed
    }

    pub fn set_speed(&mut self, speed: f32) -> Result<(), MovementError> {
        self.stepper.speed = check_speed(speed)?;
        Ok(())
    }

    pub fn state(&self) -> PathState {
        self.state
    }

    pub fn current_direction(&self) -> Option<Direction8> {
        self.stepper.current_direction()
    }

    pub(crate) fn on_start(&mut self, _core: &mut MovementCore, now: u64) {
        self.stepper.reset(now);
        self.state = PathState::AwaitingNextDirection;
        self.leg_direction = None;
        self.leg_remaining = 0;
    }

    pub(crate) fn shift_deadlines(&mut self, paused: u64) {
        self.stepper.shift_deadlines(paused);
        if let PathState::Blocked { retry_date } = &mut self.state {
            *retry_date = retry_date.saturating_add(paused);
        }
    }

    pub(crate) fn update(&mut self, core: &mut MovementCore, ctx: &mut MovementContext) {
        self.stepper.snap_if_needed(core, ctx);

        if let PathState::Blocked { retry_date } = self.state {
            if ctx.now < retry_date {
                core.touch(ctx.now);
                return;
            }
            self.state = if self.stepper.is_mid_step() {
                PathState::AdvancingStep
            } else {
                PathState::AwaitingNextDirection
            };
        }

        if self.state == PathState::AwaitingNextDirection {
            self.next_step(core, ctx);
        }

        if self.state == PathState::AdvancingStep {
            match self.stepper.advance(core, ctx) {
                StepProgress::Completed => {
                    self.state = PathState::AwaitingNextDirection;
                    self.next_step(core, ctx);
                }
                StepProgress::Blocked => {
                    // Кто-то встал на пути посреди клетки: назад и новая нога
                    self.leg_remaining = 0;
                    if !self.stepper.retreat() {
                        self.state = PathState::Blocked {
                            retry_date: ctx.now + ctx.config.random_path_blocked_pause_ms,
                        };
                    }
                }
                StepProgress::InProgress | StepProgress::Idle => {}
            }
        }
    }

    /// Продолжить текущую ногу или начать новую
    fn next_step(&mut self, core: &mut MovementCore, ctx: &mut MovementContext) {
        if self.leg_remaining > 0 {
            if let Some(direction) = self.leg_direction {
                if self.stepper.is_direction_free(core, ctx, direction) {
                    self.leg_remaining -= 1;
                    self.stepper.begin_step(core, ctx, direction);
                    self.state = PathState::AdvancingStep;
                    return;
                }
            }
        }

        let free: Vec<Direction8> = Direction8::ALL
            .into_iter()
            .filter(|&direction| self.stepper.is_direction_free(core, ctx, direction))
            .collect();

        if free.is_empty() {
            self.leg_direction = None;
            self.leg_remaining = 0;
            self.state = PathState::Blocked {
                retry_date: ctx.now + ctx.config.random_path_blocked_pause_ms,
            };
            core.touch(ctx.now);
            return;
        }

        let direction = free[ctx.rng.gen_range(0..free.len())];
        let max_leg = ctx.config.random_path_max_leg_cells.max(1);
        let leg = ctx.rng.gen_range(1..=max_leg);

        self.leg_direction = Some(direction);
        self.leg_remaining = leg - 1;
        self.stepper.begin_step(core, ctx, direction);
        self.state = PathState::AdvancingStep;
        core.notify_changed();
    }
}
