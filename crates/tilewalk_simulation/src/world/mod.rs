//! World collaborators: obstacle oracle, entity locator
//!
//! Формат карты (тайлы, коллизии) не принадлежит движениям — здесь только контракты
//! и пара простых реализаций для тестов/демо.

pub mod obstacles;

pub use obstacles::{BlockedTiles, EntityLocator, Mover, NoEntities, NoObstacles, ObstacleOracle};
