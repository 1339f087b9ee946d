//! Obstacle oracle — внешний коллаборатор движений
//!
//! Движения не знают формат карты. Они задают только вопрос
//! "является ли позиция P препятствием для этого mover'а" и размер тайла.
//!
//! Конвенция координат: экранные пиксели, +Y вниз, позиция mover'а = левый верхний
//! угол его bounding box.

use std::collections::{HashMap, HashSet};

use bevy::prelude::*;

/// Тот, кто двигается (map entity) — identity + размер bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mover {
    pub entity: Entity,
    pub size: Vec2,
}

impl Mover {
    pub fn new(entity: Entity, size: Vec2) -> Self {
        Self { entity, size }
    }
}

/// Point-in-time запросы к карте (read-only, без side effects)
pub trait ObstacleOracle {
    /// true если mover с bounding box в `position` пересекается с препятствием
    fn is_obstacle_for(&self, mover: &Mover, position: Vec2) -> bool;

    /// Размер тайла (w, h) — для snap-to-grid и клеток path finding
    fn tile_size(&self) -> IVec2;
}

/// Поиск позиции живой entity (цель target/path_finding, центр circle)
pub trait EntityLocator {
    fn entity_position(&self, entity: Entity) -> Option<Vec2>;
}

impl EntityLocator for HashMap<Entity, Vec2> {
    fn entity_position(&self, entity: Entity) -> Option<Vec2> {
        self.get(&entity).copied()
    }
}

/// Карта без препятствий
#[derive(Debug, Clone, Copy)]
pub struct NoObstacles {
    pub tile_size: IVec2,
}

impl Default for NoObstacles {
    fn default() -> Self {
        Self {
            tile_size: IVec2::splat(8),
        }
    }
}

impl ObstacleOracle for NoObstacles {
    fn is_obstacle_for(&self, _mover: &Mover, _position: Vec2) -> bool {
        false
    }

    fn tile_size(&self) -> IVec2 {
        self.tile_size
    }
}

/// Пустой locator (нет живых entities)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEntities;

impl EntityLocator for NoEntities {
    fn entity_position(&self, _entity: Entity) -> Option<Vec2> {
        None
    }
}

/// Простейший oracle: набор заблокированных клеток тайловой сетки
///
/// Для headless тестов и демо. Реальная карта реализует ObstacleOracle сама.
#[derive(Debug, Clone, Default)]
pub struct BlockedTiles {
    tile_size: IVec2,
    blocked: HashSet<IVec2>,
}

impl BlockedTiles {
    pub fn new(tile_size: IVec2) -> Self {
        Self {
            tile_size: tile_size.max(IVec2::ONE),
            blocked: HashSet::new(),
        }
    }

    pub fn block(&mut self, cell: IVec2) -> &mut Self {
        self.blocked.insert(cell);
        self
    }

    pub fn unblock(&mut self, cell: IVec2) -> &mut Self {
        self.blocked.remove(&cell);
        self
    }

    /// Заблокировать прямоугольник клеток [min, max] включительно
    pub fn block_rect(&mut self, min: IVec2, max: IVec2) -> &mut Self {
        for x in min.x..=max.x {
            for y in min.y..=max.y {
                self.blocked.insert(IVec2::new(x, y));
            }
        }
        self
    }

    /// Кольцо стен вокруг клетки (для тестов "цель замурована")
    pub fn enclose(&mut self, center: IVec2) -> &mut Self {
        for dx in -1..=1 {
            for dy in -1..=1 {
                if dx != 0 || dy != 0 {
                    self.blocked.insert(center + IVec2::new(dx, dy));
                }
            }
        }
        self
    }

    pub fn is_blocked(&self, cell: IVec2) -> bool {
        self.blocked.contains(&cell)
    }
}

impl ObstacleOracle for BlockedTiles {
    fn is_obstacle_for(&self, mover: &Mover, position: Vec2) -> bool {
        let tile = self.tile_size.as_vec2();
        let size = mover.size.max(Vec2::ZERO);

        // Клетки, которые пересекает [position, position + size)
        let min = (position / tile).floor().as_ivec2();
        let far = position + size;
        let max = if size.x > 0.0 || size.y > 0.0 {
            ((far / tile).ceil().as_ivec2() - IVec2::ONE).max(min)
        } else {
            min
        };

        (min.x..=max.x).any(|x| (min.y..=max.y).any(|y| self.is_blocked(IVec2::new(x, y))))
    }

    fn tile_size(&self) -> IVec2 {
        self.tile_size
    }
}
