//! Headless симуляция TILEWALK
//!
//! Запускает Bevy App без рендера: несколько NPC с разными движениями
//! на маленькой карте со стенами, печатает позиции.

use bevy::prelude::*;
use tilewalk_simulation::{
    create_headless_app, log_error, start_entity_movement, BlockedTiles, CircleMovement,
    Direction8, JumpMovement, Movement, MovementFinished, ObstacleSource, PathMovement, RandomPathMovement,
    TargetMovement, TargetPoint,
};

fn spawn_at(app: &mut App, x: f32, y: f32) -> Entity {
    app.world_mut()
        .spawn(Transform::from_xyz(x, y, 0.0))
        .id()
}

fn main() {
    let seed = 42;
    println!("Starting TILEWALK headless simulation (seed: {})", seed);

    let mut app = create_headless_app(seed);

    // Карта 8x8 тайлов: рамка стен 40x30 клеток
    let mut tiles = BlockedTiles::new(IVec2::splat(8));
    tiles
        .block_rect(IVec2::new(0, 0), IVec2::new(39, 0))
        .block_rect(IVec2::new(0, 29), IVec2::new(39, 29))
        .block_rect(IVec2::new(0, 0), IVec2::new(0, 29))
        .block_rect(IVec2::new(39, 0), IVec2::new(39, 29));
    app.insert_resource(ObstacleSource::new(tiles));

    let walker = spawn_at(&mut app, 32.0, 32.0);
    let wanderer = spawn_at(&mut app, 160.0, 120.0);
    let chaser = spawn_at(&mut app, 280.0, 200.0);
    let orbiter = spawn_at(&mut app, 100.0, 100.0);
    let jumper = spawn_at(&mut app, 64.0, 180.0);

    let movements = [
        (walker, PathMovement::from_text("00006666", 64.0).map(Movement::path)),
        (wanderer, RandomPathMovement::new(48.0).map(Movement::random_path)),
        (
            chaser,
            TargetMovement::new(
                TargetPoint::Entity {
                    entity: wanderer,
                    offset: Vec2::ZERO,
                },
                40.0,
            )
            .map(Movement::target),
        ),
        (
            orbiter,
            CircleMovement::new(TargetPoint::Fixed(Vec2::new(100.0, 100.0)), 24.0)
                .map(Movement::circle),
        ),
        (
            jumper,
            JumpMovement::new(Direction8::East, 48.0).map(Movement::jump),
        ),
    ];

    for (entity, movement) in movements {
        let started = movement.and_then(|movement| {
            start_entity_movement(app.world_mut(), entity, movement, None)
        });
        if let Err(err) = started {
            log_error(&format!("{:?}: {}", entity, err));
        }
    }

    // 600 тиков = 10 секунд симуляции
    for tick in 0..600 {
        app.update();

        let finished: Vec<Entity> = app
            .world_mut()
            .resource_mut::<Events<MovementFinished>>()
            .drain()
            .map(|event| event.entity)
            .collect();
        for entity in finished {
            println!("Tick {}: {:?} finished its movement", tick, entity);
        }

        if tick % 100 == 0 {
            let world = app.world_mut();
            let mut query = world.query::<(Entity, &Transform)>();
            let mut positions: Vec<_> = query
                .iter(world)
                .map(|(entity, transform)| (entity, transform.translation.truncate()))
                .collect();
            positions.sort_by_key(|(entity, _)| entity.index());

            println!("Tick {}:", tick);
            for (entity, xy) in positions {
                println!("  {:?} at ({:.1}, {:.1})", entity, xy.x, xy.y);
            }
        }
    }

    println!("Simulation complete!");
}
