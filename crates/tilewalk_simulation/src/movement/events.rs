//! Movement events (notifications для entity subjects)
//!
//! Генерируются:
//! - update_entity_movements (по pending notifications каждого ActiveMovement)
//!
//! Обрабатываются:
//! - игровой логикой / скриптовым слоем (анимации, триггеры, звуки)

use bevy::prelude::*;

/// Event: позиция subject'а изменилась (одно событие на тик, финальная позиция)
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct MovementPositionChanged {
    pub entity: Entity,
    pub position: Vec2,
}

/// Event: движение упёрлось в препятствие (движение НЕ остановлено)
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementObstacleReached {
    pub entity: Entity,
}

/// Event: движение само сменило направление / фазу
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementChanged {
    pub entity: Entity,
}

/// Event: стратегия достигла terminal condition
///
/// Не генерируется при внешнем stop_entity_movement().
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementFinished {
    pub entity: Entity,
}
