//! TILEWALK Simulation Core
//!
//! Movement engine 2D action-RPG рантайма на Bevy 0.16:
//! девять стратегий движения (straight, random, target, path, random_path,
//! path_finding, circle, jump, pixel) поверх общего ядра.
//!
//! Слои:
//! - movement = стратегии + ECS слой (ActiveMovement, events, MovementPlugin)
//! - free_point = движения "голых" точек, принадлежащих скриптам
//! - navigation = A* по тайловой сетке
//! - world = контракты карты (ObstacleOracle, EntityLocator)

use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Duration;

// Публичные модули
pub mod config;
pub mod error;
pub mod free_point;
pub mod logger;
pub mod movement;
pub mod navigation;
pub mod world;

// Re-export базовых типов для удобства
pub use config::MovementConfig;
pub use error::MovementError;
pub use free_point::FreePointRegistry;
pub use logger::{init_logger, log, log_error, log_info, log_warning, LogLevel, LogPrinter};
pub use movement::{
    apply_movement_suspension, shared_point, start_entity_movement, stop_entity_movement,
    update_entity_movements, update_point_movements, ActiveMovement, CircleMovement, Direction4,
    Direction8, Drawable, FinishedCallback, JumpMovement, Movement, MovementChanged,
    MovementContext, MovementEvent, MovementFinished, MovementHandle, MovementId, MovementKind,
    MovementKindName, MovementListener, MovementObstacleReached, MovementPlugin,
    MovementPositionChanged, MovementSuspension, MoverBounds, ObstacleSource, PathFindingMovement,
    PathMovement, PathState, PixelMovement, RandomMovement, RandomPathMovement, SharedPoint,
    StraightMovement, Subject, TargetMovement, TargetPoint,
};
pub use world::{BlockedTiles, EntityLocator, Mover, NoEntities, NoObstacles, ObstacleOracle};

/// Частота simulation tick
pub const SIMULATION_HZ: f64 = 60.0;

/// Главный plugin симуляции
///
/// Частота тика и seed берутся из MovementConfig (если хост вставил его до плагина).
/// Конфиг, не прошедший MovementConfig::validate, заменяется на default.
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        let config = app
            .world()
            .get_resource::<MovementConfig>()
            .cloned()
            .unwrap_or_default();
        // Невалидный конфиг хоста не роняет приложение
        let config = match config.validate() {
            Ok(()) => config,
            Err(err) => {
                log_warning(&format!("SimulationPlugin: {err}, using default MovementConfig"));
                MovementConfig::default()
            }
        };

        app
            // Fixed timestep (60Hz по умолчанию ≈ 16ms тик, шаги движений считаются в ms)
            .insert_resource(Time::<Fixed>::from_hz(config.tick_hz))
            // Детерминистичный RNG
            .insert_resource(DeterministicRng::new(config.seed))
            .insert_resource(config)
            .add_plugins(MovementPlugin);
    }
}

/// Детерминистичный RNG resource (seeded)
///
/// Единственный источник случайности для random / random_path движений.
#[derive(Resource)]
pub struct DeterministicRng {
    pub rng: ChaCha8Rng,
    pub seed: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }
}

/// Создаёт minimal Bevy App для headless симуляции
///
/// Время двигается вручную: каждый app.update() = ровно один fixed tick.
pub fn create_headless_app(seed: u64) -> App {
    let mut app = App::new();
    init_logger();
    app.add_plugins(MinimalPlugins)
        .insert_resource(DeterministicRng::new(seed))
        .insert_resource(Time::<Fixed>::from_hz(SIMULATION_HZ))
        .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_secs_f64(
            1.0 / SIMULATION_HZ,
        )))
        .add_plugins(MovementPlugin);

    app
}

/// Snapshot мира для сравнения детерминизма
pub fn world_snapshot<T: Component>(world: &mut World) -> Vec<u8>
where
    T: std::fmt::Debug,
{
    let mut snapshot = Vec::new();

    let mut query = world.query::<(Entity, &T)>();
    let mut entities: Vec<_> = query.iter(world).collect();

    // Сортируем по Entity ID для детерминизма
    entities.sort_by_key(|(entity, _)| entity.index());

    // Сериализуем в байты через Debug (простейший способ)
    for (entity, component) in entities {
        snapshot.extend_from_slice(&entity.index().to_le_bytes());
        snapshot.extend_from_slice(format!("{:?}", component).as_bytes());
    }

    snapshot
}
