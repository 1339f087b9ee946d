//! Free-point registry: движения, которые двигают "голую" точку (x, y)
//!
//! Точкой владеет внешний код (скрипт) через SharedPoint (Arc).
//! Registry держит движение (strong) и точку (weak) и удаляет запись:
//! - на stop() через registry,
//! - на ближайшем sweep, если владелец отпустил точку,
//! - на ближайшем sweep, если движение остановлено, перепривязано или завершено.
//!
//! Sweep идёт по снимку id в возрастающем порядке (детерминизм).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use bevy::prelude::*;

use crate::logger;
use crate::movement::{
    FinishedCallback, Movement, MovementContext, MovementHandle, MovementId, SharedPoint, Subject,
};

struct PointEntry {
    movement: MovementHandle,
    point: Weak<Mutex<Vec2>>,
}

#[derive(Resource, Default)]
pub struct FreePointRegistry {
    entries: BTreeMap<MovementId, PointEntry>,
}

fn lock_movement(handle: &MovementHandle) -> Option<MutexGuard<'_, Movement>> {
    match handle.lock() {
        Ok(guard) => Some(guard),
        Err(_) => {
            logger::log_error("FreePointRegistry: movement lock poisoned, entry skipped");
            None
        }
    }
}

impl FreePointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Запустить движение на точке. Повторный start того же движения перепривязывает его.
    pub fn start(
        &mut self,
        movement: &MovementHandle,
        point: &SharedPoint,
        now: u64,
        on_finished: Option<FinishedCallback>,
    ) -> Option<MovementId> {
        let mut guard = lock_movement(movement)?;
        guard.start(Subject::point(point), now, on_finished);
        let id = guard.id();
        drop(guard);

        self.entries.insert(
            id,
            PointEntry {
                movement: Arc::clone(movement),
                point: Arc::downgrade(point),
            },
        );
        Some(id)
    }

    /// Явная остановка: движение отвязано, запись удалена, callback не вызывается
    pub fn stop(&mut self, movement: &MovementHandle) {
        if let Some(mut guard) = lock_movement(movement) {
            guard.stop();
            self.entries.remove(&guard.id());
        }
    }

    pub fn contains(&self, id: MovementId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Удалить записи с отпущенной точкой или неактуальным движением
    pub fn prune(&mut self) {
        self.entries.retain(|id, entry| {
            if entry.point.strong_count() == 0 {
                logger::log(&format!("FreePointRegistry: point of movement {id} released"));
                return false;
            }
            match entry.movement.lock() {
                Ok(movement) => movement.is_bound_to_point(&entry.point) && !movement.is_finished(),
                Err(_) => {
                    logger::log_error(&format!(
                        "FreePointRegistry: movement {id} lock poisoned, entry dropped"
                    ));
                    false
                }
            }
        });
    }

    /// Один тик всех point-движений
    pub fn update_all(&mut self, ctx: &mut MovementContext) {
        self.prune();

        // Снимок: update может (через callback) трогать registry-владельца
        let snapshot: Vec<MovementHandle> = self
            .entries
            .values()
            .map(|entry| Arc::clone(&entry.movement))
            .collect();

        for handle in snapshot {
            let finished_callback = match lock_movement(&handle) {
                Some(mut movement) => {
                    let callback = movement.update_deferred(ctx);
                    // У точки нет получателя notifications: запись уже в самой точке
                    movement.drain_events();
                    callback
                }
                None => None,
            };
            // Lock уже отпущен: callback может трогать (и перезапускать) своё движение
            if let Some(callback) = finished_callback {
                callback();
            }
        }
    }

    pub fn set_suspended_all(&mut self, suspended: bool, now: u64) {
        for entry in self.entries.values() {
            if let Some(mut movement) = lock_movement(&entry.movement) {
                movement.set_suspended(suspended, now);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MovementConfig;
    use crate::movement::{shared_point, StraightMovement};
    use crate::world::{NoEntities, NoObstacles};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sweep(registry: &mut FreePointRegistry, now: u64) {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let config = MovementConfig::default();
        let mut ctx = MovementContext {
            now,
            obstacles: &NoObstacles::default(),
            entities: &NoEntities,
            rng: &mut rng,
            config: &config,
        };
        registry.update_all(&mut ctx);
    }

    fn moving_east() -> MovementHandle {
        Movement::straight(StraightMovement::new(100.0, 0.0).unwrap()).into_handle()
    }

    #[test]
    fn test_moves_point_and_writes_back() {
        let mut registry = FreePointRegistry::new();
        let point = shared_point(10.0, 20.0);
        let movement = moving_east();
        registry.start(&movement, &point, 0, None).unwrap();

        for tick in 1..=10 {
            sweep(&mut registry, tick * 16);
        }

        let xy = *point.lock().unwrap();
        assert!(xy.x > 20.0, "xy = {xy:?}");
        assert_eq!(xy.y, 20.0);
        assert_eq!(movement.lock().unwrap().xy(), xy);
    }

    #[test]
    fn test_released_point_is_pruned_without_stop() {
        let mut registry = FreePointRegistry::new();
        let point = shared_point(0.0, 0.0);
        let movement = moving_east();
        let id = registry.start(&movement, &point, 0, None).unwrap();
        assert!(registry.contains(id));

        // Внешний владелец отпустил точку
        drop(point);
        sweep(&mut registry, 16);

        assert!(!registry.contains(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_explicit_stop_removes_entry() {
        let mut registry = FreePointRegistry::new();
        let point = shared_point(0.0, 0.0);
        let movement = moving_east();
        let id = registry.start(&movement, &point, 0, None).unwrap();

        registry.stop(&movement);
        assert!(!registry.contains(id));

        sweep(&mut registry, 16);
        assert_eq!(*point.lock().unwrap(), Vec2::ZERO);
    }

    #[test]
    fn test_stop_outside_registry_prunes_on_sweep() {
        let mut registry = FreePointRegistry::new();
        let point = shared_point(0.0, 0.0);
        let movement = moving_east();
        let id = registry.start(&movement, &point, 0, None).unwrap();

        movement.lock().unwrap().stop();
        sweep(&mut registry, 16);

        assert!(!registry.contains(id));
        assert_eq!(*point.lock().unwrap(), Vec2::ZERO);
    }

    #[test]
    fn test_rebind_to_other_point() {
        let mut registry = FreePointRegistry::new();
        let first = shared_point(0.0, 0.0);
        let second = shared_point(100.0, 0.0);
        let movement = moving_east();
        registry.start(&movement, &first, 0, None).unwrap();
        registry.start(&movement, &second, 0, None).unwrap();
        assert_eq!(registry.len(), 1);

        for tick in 1..=5 {
            sweep(&mut registry, tick * 16);
        }
        assert_eq!(*first.lock().unwrap(), Vec2::ZERO);
        assert!(second.lock().unwrap().x > 100.0);
    }

    #[test]
    fn test_finished_callback_fires_once_and_entry_dropped() {
        let mut registry = FreePointRegistry::new();
        let point = shared_point(0.0, 0.0);
        let mut straight = StraightMovement::new(100.0, 0.0).unwrap();
        straight.set_max_distance(10.0).unwrap();
        let movement = Movement::straight(straight).into_handle();

        let counter = Arc::new(AtomicUsize::new(0));
        let counter_cb = counter.clone();
        let id = registry
            .start(
                &movement,
                &point,
                0,
                Some(Box::new(move || {
                    counter_cb.fetch_add(1, Ordering::SeqCst);
                })),
            )
            .unwrap();

        for tick in 1..=20 {
            sweep(&mut registry, tick * 16);
        }

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!registry.contains(id));
        assert!((point.lock().unwrap().x - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_finished_callback_runs_after_lock_released() {
        let mut registry = FreePointRegistry::new();
        let point = shared_point(0.0, 0.0);
        let mut straight = StraightMovement::new(100.0, 0.0).unwrap();
        straight.set_max_distance(10.0).unwrap();
        let movement = Movement::straight(straight).into_handle();

        let unlocked = Arc::new(Mutex::new(None));
        let unlocked_cb = unlocked.clone();
        let handle = Arc::clone(&movement);
        registry
            .start(
                &movement,
                &point,
                0,
                Some(Box::new(move || {
                    *unlocked_cb.lock().unwrap() = Some(handle.try_lock().is_ok());
                })),
            )
            .unwrap();

        for tick in 1..=20 {
            sweep(&mut registry, tick * 16);
        }

        assert_eq!(*unlocked.lock().unwrap(), Some(true));
    }

    #[test]
    fn test_callback_can_restart_its_movement() {
        let mut registry = FreePointRegistry::new();
        let point = shared_point(0.0, 0.0);
        let mut straight = StraightMovement::new(100.0, 0.0).unwrap();
        straight.set_max_distance(10.0).unwrap();
        let movement = Movement::straight(straight).into_handle();

        // Callback перезапускает то же движение на той же точке (без callback);
        // время рестарта — ближайший тик после финиша
        let handle = Arc::clone(&movement);
        let weak_point = Arc::downgrade(&point);
        let id = registry
            .start(
                &movement,
                &point,
                0,
                Some(Box::new(move || {
                    if let (Ok(mut movement), Some(point)) = (handle.lock(), weak_point.upgrade()) {
                        movement.start(Subject::point(&point), 200, None);
                    }
                })),
            )
            .unwrap();

        for tick in 1..=40 {
            sweep(&mut registry, tick * 16);
        }

        // Второй проход тоже дошёл до max_distance: 10 + 10
        assert!((point.lock().unwrap().x - 20.0).abs() < 1e-3);
        assert!(movement.lock().unwrap().is_finished());
        assert!(!registry.contains(id));
    }
}
