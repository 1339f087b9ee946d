//! Movement components и resources (Bevy слой)

use bevy::prelude::*;

use crate::movement::Movement;
use crate::world::{NoObstacles, ObstacleOracle};

/// Активное движение entity
///
/// Позиция движения пишется обратно в Transform.translation.xy каждый тик.
#[derive(Component, Debug)]
pub struct ActiveMovement(pub Movement);

/// Маркер: визуальный объект (без obstacle tests)
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Drawable;

/// Bounding box map entity для obstacle tests (позиция = левый верхний угол)
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
pub struct MoverBounds {
    pub size: Vec2,
}

impl Default for MoverBounds {
    fn default() -> Self {
        Self {
            size: Vec2::splat(16.0),
        }
    }
}

/// Obstacle oracle карты (хост подменяет своим)
#[derive(Resource)]
pub struct ObstacleSource(pub Box<dyn ObstacleOracle + Send + Sync>);

impl ObstacleSource {
    pub fn new(oracle: impl ObstacleOracle + Send + Sync + 'static) -> Self {
        Self(Box::new(oracle))
    }

    pub fn oracle(&self) -> &dyn ObstacleOracle {
        self.0.as_ref()
    }
}

impl Default for ObstacleSource {
    fn default() -> Self {
        Self::new(NoObstacles::default())
    }
}

/// Глобальная пауза всех движений (меню, диалог)
#[derive(Resource, Debug, Default)]
pub struct MovementSuspension {
    pub suspended: bool,
    /// Что уже применено к движениям (apply_movement_suspension)
    pub(crate) applied: bool,
}

impl MovementSuspension {
    pub fn set(&mut self, suspended: bool) {
        self.suspended = suspended;
    }
}
