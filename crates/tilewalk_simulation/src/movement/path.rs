//! PathMovement + общий grid stepper для path-семейства
//!
//! Path / RandomPath / PathFinding ходят по клеткам: шаг = одна клетка тайловой
//! сетки в одном из 8 направлений. Общая state machine — PathState.

use bevy::prelude::*;

use crate::error::{check_speed, MovementError};
use crate::movement::core::{MovementContext, MovementCore};
use crate::movement::direction::{parse_path, path_from_codes, path_to_string, Direction8};

/// Состояние path-движений
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathState {
    /// Идём к границе текущей клетки
    AdvancingStep,
    /// Клетка пройдена, нужно следующее направление
    #[default]
    AwaitingNextDirection,
    /// Упёрлись; повтор после retry_date
    Blocked { retry_date: u64 },
    Finished,
}

/// Итог одного advance()
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepProgress {
    /// Время шага ещё не пришло (или нет текущего шага)
    Idle,
    InProgress,
    Completed,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct GridStep {
    direction: Direction8,
    from: Vec2,
    to: Vec2,
    retreating: bool,
}

/// Пошаговое движение по клеткам (общая часть трёх path-стратегий)
#[derive(Debug, Clone)]
pub(crate) struct GridStepper {
    pub(crate) speed: f32,
    pub(crate) snap_to_grid: bool,
    snapped: bool,
    current: Option<GridStep>,
    next_move_date: u64,
}

impl GridStepper {
    /// speed уже проверена check_speed
    pub(crate) fn new(speed: f32, snap_to_grid: bool) -> Self {
        Self {
            speed,
            snap_to_grid,
            snapped: false,
            current: None,
            next_move_date: 0,
        }
    }

    pub(crate) fn reset(&mut self, now: u64) {
        self.snapped = false;
        self.current = None;
        self.next_move_date = now;
    }

    pub(crate) fn shift_deadlines(&mut self, paused: u64) {
        self.next_move_date = self.next_move_date.saturating_add(paused);
    }

    pub(crate) fn is_mid_step(&self) -> bool {
        self.current.is_some()
    }

    pub(crate) fn current_direction(&self) -> Option<Direction8> {
        self.current.map(|step| step.direction)
    }

    fn step_delay(&self) -> u64 {
        if self.speed <= 0.0 {
            return 1;
        }
        ((1000.0 / self.speed) as u64).max(1)
    }

    /// Выравнивание на сетку перед первым шагом (один раз за start)
    pub(crate) fn snap_if_needed(&mut self, core: &mut MovementCore, ctx: &MovementContext) {
        if !self.snap_to_grid || self.snapped {
            return;
        }
        self.snapped = true;

        let tile = ctx.tile_size();
        let snapped = (core.xy / tile).round() * tile;
        if snapped != core.xy && !core.is_obstacle(ctx, snapped) {
            core.set_xy(snapped);
        }
    }

    /// Клетка в направлении свободна (диагональ — ещё и обе ортогональные)
    pub(crate) fn is_direction_free(
        &self,
        core: &MovementCore,
        ctx: &MovementContext,
        direction: Direction8,
    ) -> bool {
        let tile = ctx.tile_size();
        let step = direction.basic_step().as_vec2();
        if core.is_obstacle(ctx, core.xy + step * tile) {
            return false;
        }
        if direction.is_diagonal() {
            let along_x = core.xy + Vec2::new(step.x * tile.x, 0.0);
            let along_y = core.xy + Vec2::new(0.0, step.y * tile.y);
            if core.is_obstacle(ctx, along_x) || core.is_obstacle(ctx, along_y) {
                return false;
            }
        }
        true
    }

    pub(crate) fn begin_step(&mut self, core: &mut MovementCore, ctx: &MovementContext, direction: Direction8) {
        let to = core.xy + direction.basic_step().as_vec2() * ctx.tile_size();
        self.current = Some(GridStep {
            direction,
            from: core.xy,
            to,
            retreating: false,
        });
        core.displayed_direction = direction.direction4();
    }

    /// Назад к клетке, из которой вышли. false — уже отступаем.
    pub(crate) fn retreat(&mut self) -> bool {
        match self.current.as_mut() {
            Some(step) if !step.retreating => {
                std::mem::swap(&mut step.from, &mut step.to);
                step.direction = step.direction.opposite();
                step.retreating = true;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn advance(&mut self, core: &mut MovementCore, ctx: &MovementContext) -> StepProgress {
        let Some(step) = self.current else {
            core.touch(ctx.now);
            return StepProgress::Idle;
        };
        if self.speed <= 0.0 {
            core.touch(ctx.now);
            return StepProgress::Idle;
        }
        if ctx.now < self.next_move_date {
            return StepProgress::InProgress;
        }

        let elapsed = core.take_elapsed(ctx.now);
        self.next_move_date = ctx.now + self.step_delay();

        let remaining = step.to - core.xy;
        let distance = self.speed * elapsed as f32 / 1000.0;
        let candidate = if distance >= remaining.length() {
            step.to
        } else {
            core.xy + remaining.normalize_or_zero() * distance
        };

        if core.is_obstacle(ctx, candidate) {
            core.notify_obstacle_reached();
            return StepProgress::Blocked;
        }

        core.set_xy(candidate);
        if candidate == step.to {
            self.current = None;
            StepProgress::Completed
        } else {
            StepProgress::InProgress
        }
    }
}

#[derive(Debug, Clone)]
pub struct PathMovement {
    path: Vec<Direction8>,
    index: usize,
    looping: bool,
    stepper: GridStepper,
    state: PathState,
}

impl Default for PathMovement {
    fn default() -> Self {
        Self::with_checked(Vec::new(), 32.0)
    }
}

impl PathMovement {
    pub fn new(path: Vec<Direction8>, speed: f32) -> Result<Self, MovementError> {
        Ok(Self::with_checked(path, check_speed(speed)?))
    }

    fn with_checked(path: Vec<Direction8>, speed: f32) -> Self {
        Self {
            path,
            index: 0,
            looping: false,
            stepper: GridStepper::new(speed, false),
            state: PathState::AwaitingNextDirection,
        }
    }

    /// "0246" → E, N, W, S
    pub fn from_text(text: &str, speed: f32) -> Result<Self, MovementError> {
        Self::new(parse_path(text)?, speed)
    }

    pub fn path(&self) -> &[Direction8] {
        &self.path
    }

    pub fn path_string(&self) -> String {
        path_to_string(&self.path)
    }

    /// Новый путь проигрывается с начала
    pub fn set_path(&mut self, path: Vec<Direction8>) {
        self.path = path;
        self.index = 0;
        if self.state == PathState::Finished {
            self.state = PathState::AwaitingNextDirection;
        }
    }

    pub fn set_path_codes(&mut self, codes: &[u32]) -> Result<(), MovementError> {
        let path = path_from_codes(codes)?;
        self.set_path(path);
        Ok(())
    }

    pub fn speed(&self) -> f32 {
        self.stepper.speed
    }

    pub fn set_speed(&mut self, speed: f32) -> Result<(), MovementError> {
        self.stepper.speed = check_speed(speed)?;
        Ok(())
    }

    pub fn is_loop(&self) -> bool {
        self.looping
    }

    pub fn set_loop(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn snap_to_grid(&self) -> bool {
        self.stepper.snap_to_grid
    }

    pub fn set_snap_to_grid(&mut self, snap: bool) {
        self.stepper.snap_to_grid = snap;
    }

    pub fn state(&self) -> PathState {
        self.state
    }

    /// Индекс следующего направления в path
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current_direction(&self) -> Option<Direction8> {
        self.stepper.current_direction()
    }

    pub(crate) fn on_start(&mut self, _core: &mut MovementCore, now: u64) {
        self.index = 0;
        self.state = PathState::AwaitingNextDirection;
        self.stepper.reset(now);
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
            self.state = PathState::AdvancingStep;
        }

        if self.state == PathState::AwaitingNextDirection {
            self.next_direction(core, ctx);
        }

        if self.state == PathState::AdvancingStep {
            match self.stepper.advance(core, ctx) {
                StepProgress::Completed => {
                    self.state = PathState::AwaitingNextDirection;
                    // Следующая клетка берётся сразу: финиш ровно после последней
                    self.next_direction(core, ctx);
                }
                StepProgress::Blocked => {
                    self.state = PathState::Blocked {
                        retry_date: ctx.now + ctx.config.path_blocked_retry_ms,
                    };
                }
                StepProgress::InProgress | StepProgress::Idle => {}
            }
        }
    }

    fn next_direction(&mut self, core: &mut MovementCore, ctx: &MovementContext) {
        if self.index >= self.path.len() {
            if self.looping && !self.path.is_empty() {
                self.index = 0;
            } else {
                self.state = PathState::Finished;
                core.finish();
                return;
            }
        }

        let direction = self.path[self.index];
        self.index += 1;
        self.stepper.begin_step(core, ctx, direction);
        self.state = PathState::AdvancingStep;
        core.notify_changed();
    }
}
