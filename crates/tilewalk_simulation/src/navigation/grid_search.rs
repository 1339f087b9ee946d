//! Grid search (A*) по клеткам тайловой сетки
//!
//! 8-связная сетка, стоимость 10 по оси / 14 по диагонали, эвристика octile.
//! Диагональ разрешена только если обе соседние ортогональные клетки свободны
//! (без срезания углов). Соседи перебираются в порядке Direction8::ALL, поэтому
//! при равной стоимости путь всегда один и тот же.

use std::collections::HashMap;

use bevy::prelude::*;
use pathfinding::prelude::astar;

use crate::movement::direction::Direction8;

const ORTHOGONAL_COST: u32 = 10;
const DIAGONAL_COST: u32 = 14;

/// Расстояние Chebyshev в клетках
pub fn chebyshev_distance(a: IVec2, b: IVec2) -> i32 {
    let d = (a - b).abs();
    d.x.max(d.y)
}

/// Octile эвристика (допустима для 10/14)
fn octile(a: IVec2, b: IVec2) -> u32 {
    let d = (a - b).abs();
    let (long, short) = (d.x.max(d.y) as u32, d.x.min(d.y) as u32);
    ORTHOGONAL_COST * long + (DIAGONAL_COST - ORTHOGONAL_COST) * short
}

/// Кратчайший путь start → goal как последовательность 8-way направлений
///
/// - `Some(vec![])` если start == goal
/// - `None` если goal дальше `max_distance` (Chebyshev), goal занята или пути нет
/// - поиск ограничен bbox(start, goal) ± `margin` клеток
pub fn find_path(
    start: IVec2,
    goal: IVec2,
    max_distance: i32,
    margin: i32,
    mut is_free: impl FnMut(IVec2) -> bool,
) -> Option<Vec<Direction8>> {
    if start == goal {
        return Some(Vec::new());
    }
    if chebyshev_distance(start, goal) > max_distance {
        return None;
    }

    // Oracle может быть дорогим — каждую клетку спрашиваем один раз
    let mut cache: HashMap<IVec2, bool> = HashMap::new();
    let mut free = move |cell: IVec2| *cache.entry(cell).or_insert_with(|| is_free(cell));

    if !free(goal) {
        return None;
    }

    let margin = margin.max(0);
    let min = start.min(goal) - IVec2::splat(margin);
    let max = start.max(goal) + IVec2::splat(margin);
    let in_bounds =
        |cell: IVec2| cell.x >= min.x && cell.y >= min.y && cell.x <= max.x && cell.y <= max.y;

    let (cells, _cost) = astar(
        &start,
        |&cell| {
            let mut successors = Vec::with_capacity(8);
            for direction in Direction8::ALL {
                let step = direction.basic_step();
                let next = cell + step;
                if !in_bounds(next) || !free(next) {
                    continue;
                }
                if direction.is_diagonal()
                    && (!free(cell + IVec2::new(step.x, 0)) || !free(cell + IVec2::new(0, step.y)))
                {
                    continue;
                }
                let cost = if direction.is_diagonal() {
                    DIAGONAL_COST
                } else {
                    ORTHOGONAL_COST
                };
                successors.push((next, cost));
            }
            successors
        },
        |&cell| octile(cell, goal),
        |&cell| cell == goal,
    )?;

    cells
        .windows(2)
        .map(|pair| Direction8::from_step(pair[1] - pair[0]))
        .collect()
}
