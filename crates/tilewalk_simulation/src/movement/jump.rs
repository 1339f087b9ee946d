//! JumpMovement — прыжок по 8-way направлению
//!
//! Горизонталь линейна по времени, вертикаль — косметическая парабола
//! (не участвует в obstacle tests). Препятствие проверяется один раз,
//! в точке приземления.

use bevy::prelude::*;

use crate::error::{check_non_negative, check_speed, MovementError};
use crate::movement::core::{MovementContext, MovementCore};
use crate::movement::direction::Direction8;

/// Высота дуги (вверх = положительно) для доли прыжка t ∈ [0, 1]
pub fn arc_height(peak: f32, t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    4.0 * peak * t * (1.0 - t)
}

#[derive(Debug, Clone)]
pub struct JumpMovement {
    direction: Direction8,
    distance: f32,
    /// 0 = MovementConfig::default_jump_speed
    speed: f32,
    start_xy: Vec2,
    start_date: u64,
    fraction: f32,
    peak_height: f32,
}

impl Default for JumpMovement {
    fn default() -> Self {
        Self::with_checked(Direction8::East, 0.0)
    }
}

impl JumpMovement {
    pub fn new(direction: Direction8, distance: f32) -> Result<Self, MovementError> {
        Ok(Self::with_checked(direction, check_non_negative("distance", distance)?))
    }

    fn with_checked(direction: Direction8, distance: f32) -> Self {
        Self {
            direction,
            distance,
            speed: 0.0,
            start_xy: Vec2::ZERO,
            start_date: 0,
            fraction: 0.0,
            peak_height: 0.0,
        }
    }

    pub fn direction(&self) -> Direction8 {
        self.direction
    }

    pub fn set_direction(&mut self, direction: Direction8) {
        self.direction = direction;
    }

    /// Код 0..=7
    pub fn set_direction_code(&mut self, code: u32) -> Result<(), MovementError> {
        self.direction = Direction8::from_code(code)?;
        Ok(())
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn set_distance(&mut self, distance: f32) -> Result<(), MovementError> {
        self.distance = check_non_negative("distance", distance)?;
        Ok(())
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) -> Result<(), MovementError> {
        self.speed = check_speed(speed)?;
        Ok(())
    }

    /// Доля пройденного прыжка, 0..1
    pub fn fraction(&self) -> f32 {
        self.fraction
    }

    /// Текущий визуальный подъём над "землёй" (px, вверх)
    pub fn vertical_offset(&self) -> f32 {
        arc_height(self.peak_height, self.fraction)
    }

    pub fn landing_position(&self) -> Vec2 {
        self.start_xy + self.direction.unit_vector() * self.distance
    }

    pub(crate) fn on_start(&mut self, core: &mut MovementCore, now: u64) {
        self.start_xy = core.xy;
        self.start_date = now;
        self.fraction = 0.0;
        core.displayed_direction = self.direction.direction4();
    }

    pub(crate) fn shift_deadlines(&mut self, paused: u64) {
        self.start_date = self.start_date.saturating_add(paused);
    }

    pub(crate) fn update(&mut self, core: &mut MovementCore, ctx: &mut MovementContext) {
        core.touch(ctx.now);

        let speed = if self.speed > 0.0 {
            self.speed
        } else {
            ctx.config.default_jump_speed
        };
        self.peak_height = ctx.config.jump_peak_height(self.distance);

        let duration_ms = if self.distance > 0.0 && speed > 0.0 {
            self.distance / speed * 1000.0
        } else {
            0.0
        };
        let elapsed = ctx.now.saturating_sub(self.start_date) as f32;
        self.fraction = if duration_ms <= 0.0 {
            1.0
        } else {
            (elapsed / duration_ms).min(1.0)
        };

        // В полёте препятствия не проверяются
        let xy = self.start_xy + self.direction.unit_vector() * (self.distance * self.fraction);
        core.set_xy(xy);
        // Направление "лицом" — по прыжку, а не по последнему сдвигу
        core.displayed_direction = self.direction.direction4();

        if self.fraction >= 1.0 {
            if core.is_obstacle(ctx, xy) {
                core.set_xy(self.start_xy);
                core.displayed_direction = self.direction.direction4();
                core.notify_obstacle_reached();
            }
            core.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::test_support::TestWorld;
    use crate::movement::{Movement, MovementEvent, MovementKind};

    #[test]
    fn test_arc_height_shape() {
        assert_eq!(arc_height(16.0, 0.0), 0.0);
        assert_eq!(arc_height(16.0, 1.0), 0.0);
        assert_eq!(arc_height(16.0, 0.5), 16.0);
        assert!(arc_height(16.0, 0.25) > 0.0);
        assert!((arc_height(16.0, 0.25) - arc_height(16.0, 0.75)).abs() < 1e-6);
    }

    #[test]
    fn test_jump_east_lands_exactly() {
        let mut world = TestWorld::new();
        let mut movement = Movement::jump(JumpMovement::new(Direction8::East, 64.0).unwrap());
        let start = Vec2::new(10.0, 20.0);
        let finished = world.start_entity(&mut movement, start);

        let mut saw_arc = false;
        while !movement.is_finished() {
            world.tick(&mut movement);
            if let MovementKind::Jump(jump) = movement.kind() {
                if jump.fraction() > 0.0 && jump.fraction() < 1.0 {
                    assert!(jump.vertical_offset() > 0.0);
                    saw_arc = true;
                }
            }
        }

        assert!(saw_arc);
        assert_eq!(finished.count(), 1);
        assert_eq!(movement.xy(), start + Vec2::new(64.0, 0.0));
        let MovementKind::Jump(jump) = movement.kind() else {
            panic!("wrong kind");
        };
        assert_eq!(jump.vertical_offset(), 0.0);
    }

    #[test]
    fn test_jump_over_obstacle_in_flight() {
        let mut world = TestWorld::new();
        // Стена посередине, приземление свободно
        world.tiles.block(IVec2::new(3, 0));
        let mut movement = Movement::jump(JumpMovement::new(Direction8::East, 48.0).unwrap());
        world.start_entity(&mut movement, Vec2::ZERO);

        world.run(&mut movement, 2000);

        assert!(movement.is_finished());
        assert_eq!(movement.xy(), Vec2::new(48.0, 0.0));
        assert!(!movement.drain_events().contains(&MovementEvent::ObstacleReached));
    }

    #[test]
    fn test_blocked_landing_returns_to_takeoff() {
        let mut world = TestWorld::new();
        world.tiles.block(IVec2::new(4, 0));
        let mut movement = Movement::jump(JumpMovement::new(Direction8::East, 32.0).unwrap());
        let finished = world.start_entity(&mut movement, Vec2::ZERO);

        world.run(&mut movement, 2000);

        assert_eq!(finished.count(), 1);
        assert_eq!(movement.xy(), Vec2::ZERO);
        let events = movement.drain_events();
        let obstacle = events.iter().position(|e| *e == MovementEvent::ObstacleReached);
        let done = events.iter().position(|e| *e == MovementEvent::Finished);
        assert!(obstacle.is_some() && obstacle < done);
    }

    #[test]
    fn test_invalid_direction_code_rejected() {
        let mut jump = JumpMovement::default();
        assert!(matches!(
            jump.set_direction_code(8),
            Err(MovementError::InvalidDirection(8))
        ));
        assert_eq!(jump.direction(), Direction8::East);
        assert!(jump.set_speed(-1.0).is_err());
    }

    #[test]
    fn test_negative_distance_rejected() {
        assert!(matches!(
            JumpMovement::new(Direction8::North, -8.0),
            Err(MovementError::InvalidParameter { name: "distance", .. })
        ));
        assert_eq!(JumpMovement::new(Direction8::North, 0.0).unwrap().distance(), 0.0);
    }
}
