//! Общий стенд для unit-тестов движений (без Bevy App)

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bevy::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::MovementConfig;
use crate::movement::{Movement, MovementContext, Subject};
use crate::world::{BlockedTiles, Mover};

/// Длина тика (ms) — ~60 Hz
pub(crate) const TICK_MS: u64 = 16;

/// Сколько раз сработал finished-callback
#[derive(Clone, Default)]
pub(crate) struct FinishCounter(Arc<AtomicUsize>);

impl FinishCounter {
    pub(crate) fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub(crate) struct TestWorld {
    pub(crate) tiles: BlockedTiles,
    pub(crate) entities: HashMap<Entity, Vec2>,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) config: MovementConfig,
    pub(crate) now: u64,
}

impl TestWorld {
    pub(crate) fn new() -> Self {
        Self {
            tiles: BlockedTiles::new(IVec2::splat(8)),
            entities: HashMap::new(),
            rng: ChaCha8Rng::seed_from_u64(7),
            config: MovementConfig::default(),
            now: 0,
        }
    }

    /// Запустить на map entity 8x8 в позиции xy
    pub(crate) fn start_entity(&mut self, movement: &mut Movement, xy: Vec2) -> FinishCounter {
        let _ = movement.set_xy(xy);
        let subject = Subject::Entity(Mover::new(Entity::from_raw(1), Vec2::splat(8.0)));
        self.start_subject(movement, subject)
    }

    pub(crate) fn start_subject(&mut self, movement: &mut Movement, subject: Subject) -> FinishCounter {
        let counter = FinishCounter::default();
        let inner = counter.0.clone();
        movement.start(
            subject,
            self.now,
            Some(Box::new(move || {
                inner.fetch_add(1, Ordering::SeqCst);
            })),
        );
        counter
    }

    /// update() в текущий момент, без сдвига времени
    pub(crate) fn update(&mut self, movement: &mut Movement) {
        let mut ctx = MovementContext {
            now: self.now,
            obstacles: &self.tiles,
            entities: &self.entities,
            rng: &mut self.rng,
            config: &self.config,
        };
        movement.update(&mut ctx);
    }

    pub(crate) fn tick(&mut self, movement: &mut Movement) {
        self.now += TICK_MS;
        self.update(movement);
    }

    /// Тикать, пока не пройдёт `ms` миллисекунд
    pub(crate) fn run(&mut self, movement: &mut Movement, ms: u64) {
        let end = self.now + ms;
        while self.now < end {
            self.tick(movement);
        }
    }
}
