//! PathFindingMovement — преследование entity по найденному пути
//!
//! Путь (8-way направления) ищется A* от клетки mover'а до клетки цели.
//! Пересчёт: очередь пуста, цель ушла от предполагаемой клетки дальше slack,
//! или прошёл retry интервал после неудачного поиска. Недостижимая цель — не
//! ошибка: mover стоит и ждёт следующей попытки.

use std::collections::VecDeque;

use bevy::prelude::*;

use crate::error::{check_speed, MovementError};
use crate::logger;
use crate::movement::core::{MovementContext, MovementCore};
use crate::movement::direction::Direction8;
use crate::movement::path::{GridStepper, PathState, StepProgress};
use crate::navigation::{chebyshev_distance, find_path};

#[derive(Debug, Clone)]
pub struct PathFindingMovement {
    stepper: GridStepper,
    state: PathState,
    target: Option<Entity>,
    /// Последний найденный путь целиком (для запросов / отладки)
    current_path: Vec<Direction8>,
    queued: VecDeque<Direction8>,
    /// Клетка цели, под которую считался текущий путь
    assumed_goal: Option<IVec2>,
    /// Цель стоит на непроходимой клетке, mover уже рядом с ней
    adjacent_goal: Option<IVec2>,
    last_search_failed: bool,
    next_search_date: u64,
}

impl Default for PathFindingMovement {
    fn default() -> Self {
        Self::with_checked(32.0)
    }
}

impl PathFindingMovement {
    pub fn new(speed: f32) -> Result<Self, MovementError> {
        Ok(Self::with_checked(check_speed(speed)?))
    }

    fn with_checked(speed: f32) -> Self {
        Self {
            stepper: GridStepper::new(speed, true),
            state: PathState::AwaitingNextDirection,
            target: None,
            current_path: Vec::new(),
            queued: VecDeque::new(),
            assumed_goal: None,
            adjacent_goal: None,
            last_search_failed: false,
            next_search_date: 0,
        }
    }

    pub fn with_target(mut self, target: Entity) -> Self {
        self.target = Some(target);
        self
    }

    pub fn target(&self) -> Option<Entity> {
        self.target
    }

    pub fn set_target(&mut self, target: Option<Entity>) {
        self.target = target;
        self.queued.clear();
        self.assumed_goal = None;
        self.adjacent_goal = None;
        self.last_search_failed = false;
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

    /// Последний результат поиска
    pub fn current_path(&self) -> &[Direction8] {
        &self.current_path
    }

    /// Ещё не пройденные шаги
    pub fn queued_steps(&self) -> usize {
        self.queued.len()
    }

    pub fn is_waiting_for_retry(&self) -> bool {
        self.last_search_failed
    }

    pub(crate) fn on_start(&mut self, _core: &mut MovementCore, now: u64) {
        self.stepper.reset(now);
        self.state = PathState::AwaitingNextDirection;
        self.current_path.clear();
        self.queued.clear();
        self.assumed_goal = None;
        self.adjacent_goal = None;
        self.last_search_failed = false;
        self.next_search_date = now;
    }

    pub(crate) fn shift_deadlines(&mut self, paused: u64) {
        self.stepper.shift_deadlines(paused);
        self.next_search_date = self.next_search_date.saturating_add(paused);
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

        if self.state == PathState::AdvancingStep {
            match self.stepper.advance(core, ctx) {
                StepProgress::Completed => self.state = PathState::AwaitingNextDirection,
                StepProgress::Blocked => {
                    // Путь устарел: назад в свою клетку, потом пересчёт
                    self.queued.clear();
                    self.assumed_goal = None;
                    if !self.stepper.retreat() {
                        self.state = PathState::Blocked {
                            retry_date: ctx.now + ctx.config.path_finding_retry_ms,
                        };
                    }
                    return;
                }
                StepProgress::InProgress | StepProgress::Idle => return,
            }
        }

        self.next_step(core, ctx);
    }

    fn next_step(&mut self, core: &mut MovementCore, ctx: &mut MovementContext) {
        let Some(goal_xy) = self.target.and_then(|target| ctx.entities.entity_position(target)) else {
            core.touch(ctx.now);
            return;
        };

        let tile = ctx.tile_size();
        let mover_cell = (core.xy / tile).round().as_ivec2();
        let goal_cell = (goal_xy / tile).floor().as_ivec2();

        if mover_cell == goal_cell || self.adjacent_goal == Some(goal_cell) {
            // Дошли: ждём, пока цель не сдвинется
            self.queued.clear();
            core.touch(ctx.now);
            return;
        }

        let goal_moved = self.assumed_goal.map_or(true, |assumed| {
            chebyshev_distance(assumed, goal_cell) > ctx.config.path_finding_slack_cells
        });
        if self.queued.is_empty() || goal_moved {
            if self.last_search_failed && ctx.now < self.next_search_date {
                core.touch(ctx.now);
                return;
            }
            if !self.search(core, ctx, mover_cell, goal_cell) {
                core.touch(ctx.now);
                return;
            }
        }

        let Some(direction) = self.queued.pop_front() else {
            core.touch(ctx.now);
            return;
        };

        if !self.stepper.is_direction_free(core, ctx, direction) {
            self.queued.clear();
            let goal_blocked = core.is_obstacle(ctx, goal_cell.as_vec2() * tile);
            if goal_blocked && mover_cell + direction.basic_step() == goal_cell {
                // В клетку цели не войти (она сама препятствие): соседняя клетка = дошли
                self.adjacent_goal = Some(goal_cell);
            } else {
                // Клетка занята с момента поиска — новый поиск после retry интервала
                self.assumed_goal = None;
                self.last_search_failed = true;
                self.next_search_date = ctx.now + ctx.config.path_finding_retry_ms;
            }
            core.touch(ctx.now);
            return;
        }

        self.stepper.begin_step(core, ctx, direction);
        self.state = PathState::AdvancingStep;
        if self.stepper.advance(core, ctx) == StepProgress::Completed {
            self.state = PathState::AwaitingNextDirection;
        }
    }

    fn search(&mut self, core: &mut MovementCore, ctx: &MovementContext, from: IVec2, goal: IVec2) -> bool {
        let tile = ctx.tile_size();
        let result = find_path(
            from,
            goal,
            ctx.config.path_finding_max_distance_cells,
            ctx.config.path_finding_search_margin_cells,
            // Клетку цели занимает сама цель — считаем её проходимой
            |cell| cell == goal || !core.is_obstacle(ctx, cell.as_vec2() * tile),
        );

        match result {
            Some(path) => {
                self.current_path = path;
                self.queued = self.current_path.iter().copied().collect();
                self.assumed_goal = Some(goal);
                self.adjacent_goal = None;
                self.last_search_failed = false;
                core.notify_changed();
                true
            }
            None => {
                logger::log(&format!(
                    "PathFindingMovement: no path {:?} → {:?}, retry in {} ms",
                    from, goal, ctx.config.path_finding_retry_ms
                ));
                self.current_path.clear();
                self.queued.clear();
                self.assumed_goal = None;
                self.last_search_failed = true;
                self.next_search_date = ctx.now + ctx.config.path_finding_retry_ms;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::test_support::{TestWorld, TICK_MS};
    use crate::movement::{Movement, MovementEvent, MovementKind};

    fn chase(world: &mut TestWorld, target_xy: Vec2) -> (Movement, Entity) {
        let target = Entity::from_raw(90);
        world.entities.insert(target, target_xy);
        let movement = Movement::path_finding(PathFindingMovement::new(64.0).unwrap().with_target(target));
        (movement, target)
    }

    fn path_finding(movement: &Movement) -> &PathFindingMovement {
        match movement.kind() {
            MovementKind::PathFinding(path_finding) => path_finding,
            _ => panic!("wrong kind"),
        }
    }

    #[test]
    fn test_three_cells_east() {
        let mut world = TestWorld::new();
        let (mut movement, _) = chase(&mut world, Vec2::new(24.0, 0.0));
        world.start_entity(&mut movement, Vec2::ZERO);

        world.tick(&mut movement);
        assert_eq!(path_finding(&movement).current_path(), &[Direction8::East; 3]);

        world.run(&mut movement, 2000);
        assert_eq!(movement.xy(), Vec2::new(24.0, 0.0));
        assert!(!movement.is_finished());
    }

    #[test]
    fn test_enclosed_target_idles_forever() {
        let mut world = TestWorld::new();
        world.tiles.enclose(IVec2::new(6, 0));
        let (mut movement, _) = chase(&mut world, Vec2::new(48.0, 0.0));
        let finished = world.start_entity(&mut movement, Vec2::ZERO);

        world.run(&mut movement, 10_000);

        assert_eq!(movement.xy(), Vec2::ZERO);
        assert!(path_finding(&movement).is_waiting_for_retry());
        assert!(path_finding(&movement).current_path().is_empty());
        assert_eq!(finished.count(), 0);
    }

    #[test]
    fn test_replans_when_target_moves() {
        let mut world = TestWorld::new();
        let (mut movement, target) = chase(&mut world, Vec2::new(80.0, 0.0));
        world.start_entity(&mut movement, Vec2::ZERO);
        world.tick(&mut movement);
        assert!(path_finding(&movement)
            .current_path()
            .iter()
            .all(|d| *d == Direction8::East));

        // Цель ушла на юг дальше slack
        world.entities.insert(target, Vec2::new(0.0, 80.0));
        world.run(&mut movement, 3000);

        assert_eq!(movement.xy(), Vec2::new(0.0, 80.0));
    }

    #[test]
    fn test_routes_around_wall() {
        let mut world = TestWorld::new();
        world.tiles.block_rect(IVec2::new(2, -2), IVec2::new(2, 2));
        let (mut movement, _) = chase(&mut world, Vec2::new(32.0, 0.0));
        world.start_entity(&mut movement, Vec2::ZERO);

        for _ in 0..1000 {
            world.tick(&mut movement);
            let cell = (movement.xy() / 8.0).floor().as_ivec2();
            assert!(!world.tiles.is_blocked(cell), "xy = {:?}", movement.xy());
        }
        assert_eq!(movement.xy(), Vec2::new(32.0, 0.0));
    }

    #[test]
    fn test_no_target_stays_idle() {
        let mut world = TestWorld::new();
        let mut movement = Movement::path_finding(PathFindingMovement::default());
        world.start_entity(&mut movement, Vec2::new(8.0, 8.0));
        world.run(&mut movement, 1000);
        assert_eq!(movement.xy(), Vec2::new(8.0, 8.0));
    }

    fn count_changed(world: &mut TestWorld, movement: &mut Movement, ticks: usize) -> usize {
        let mut changed = 0;
        for _ in 0..ticks {
            world.tick(movement);
            changed += movement
                .drain_events()
                .iter()
                .filter(|event| **event == MovementEvent::Changed)
                .count();
        }
        changed
    }

    #[test]
    fn test_target_on_blocked_cell_counts_as_reached() {
        let mut world = TestWorld::new();
        // Цель стоит на клетке (3, 0), которая для mover'а препятствие
        world.tiles.block(IVec2::new(3, 0));
        let (mut movement, _) = chase(&mut world, Vec2::new(24.0, 0.0));
        world.start_entity(&mut movement, Vec2::ZERO);

        world.run(&mut movement, 2000);
        assert_eq!(movement.xy(), Vec2::new(16.0, 0.0));
        movement.drain_events();

        // Стоим рядом: ни поиска, ни Changed на каждом тике
        assert_eq!(count_changed(&mut world, &mut movement, 300), 0);
        assert_eq!(movement.xy(), Vec2::new(16.0, 0.0));
        assert!(!movement.is_finished());
    }

    #[test]
    fn test_adjacent_target_moving_away_is_chased_again() {
        let mut world = TestWorld::new();
        world.tiles.block(IVec2::new(3, 0));
        let (mut movement, target) = chase(&mut world, Vec2::new(24.0, 0.0));
        world.start_entity(&mut movement, Vec2::ZERO);
        world.run(&mut movement, 2000);
        assert_eq!(movement.xy(), Vec2::new(16.0, 0.0));

        world.entities.insert(target, Vec2::new(16.0, 48.0));
        world.run(&mut movement, 3000);
        assert_eq!(movement.xy(), Vec2::new(16.0, 48.0));
    }

    #[test]
    fn test_blocked_step_waits_for_retry_interval() {
        let mut world = TestWorld::new();
        let (mut movement, _) = chase(&mut world, Vec2::new(40.0, 0.0));
        world.start_entity(&mut movement, Vec2::ZERO);
        world.tick(&mut movement);
        assert_eq!(path_finding(&movement).current_path(), &[Direction8::East; 5]);

        // Путь уже найден: клетка (2, 0) на нём становится стеной
        world.tiles.block(IVec2::new(2, 0));
        let mut ticks = 0;
        while movement.xy() != Vec2::new(8.0, 0.0) {
            world.tick(&mut movement);
            ticks += 1;
            assert!(ticks < 100, "xy = {:?}", movement.xy());
        }
        assert!(path_finding(&movement).is_waiting_for_retry());
        movement.drain_events();

        // До конца retry интервала — ни шагов, ни новых поисков
        let blocked_at = world.now;
        let mut changed = 0;
        while world.now + TICK_MS < blocked_at + world.config.path_finding_retry_ms {
            changed += count_changed(&mut world, &mut movement, 1);
            assert_eq!(movement.xy(), Vec2::new(8.0, 0.0));
        }
        assert_eq!(changed, 0);

        // Повторный поиск обходит стену
        world.run(&mut movement, 3000);
        assert_eq!(movement.xy(), Vec2::new(40.0, 0.0));
    }
}
