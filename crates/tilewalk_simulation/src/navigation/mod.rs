//! Navigation: поиск пути по тайловой сетке
//!
//! Сетка не наша — клетки спрашиваем у ObstacleOracle через замыкание is_free.

pub mod grid_search;

pub use grid_search::{chebyshev_distance, find_path};
