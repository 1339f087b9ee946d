//! Integration тесты ECS слоя движений
//!
//! Полный App (create_headless_app): FixedUpdate 60Hz, ручное время,
//! ActiveMovement → Transform, Bevy events, глобальная пауза, free points.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bevy::prelude::*;
use tilewalk_simulation::{
    create_headless_app, shared_point, start_entity_movement, stop_entity_movement, ActiveMovement,
    BlockedTiles, DeterministicRng, Drawable, FinishedCallback, FreePointRegistry, Movement,
    MovementConfig, MovementError, MovementFinished, MovementObstacleReached,
    MovementPositionChanged, MovementSuspension, ObstacleSource, SimulationPlugin,
    StraightMovement, Subject, TargetMovement, TargetPoint,
};

fn spawn_at(app: &mut App, xy: Vec2) -> Entity {
    app.world_mut()
        .spawn(Transform::from_xyz(xy.x, xy.y, 0.0))
        .id()
}

fn position(app: &App, entity: Entity) -> Vec2 {
    app.world()
        .get::<Transform>(entity)
        .map(|transform| transform.translation.truncate())
        .expect("entity has Transform")
}

/// Счётчик событий типа E (drain после каждого update — каждое событие считается один раз)
fn drain_count<E: Event>(app: &mut App) -> usize {
    app.world_mut().resource_mut::<Events<E>>().drain().count()
}

fn counting_callback() -> (Arc<AtomicUsize>, FinishedCallback) {
    let counter = Arc::new(AtomicUsize::new(0));
    let inner = counter.clone();
    (
        counter,
        Box::new(move || {
            inner.fetch_add(1, Ordering::SeqCst);
        }),
    )
}

fn east(speed: f32) -> Movement {
    Movement::straight(StraightMovement::new(speed, 0.0).unwrap())
}

#[test]
fn test_straight_movement_moves_transform() {
    let mut app = create_headless_app(1);
    let entity = spawn_at(&mut app, Vec2::ZERO);
    start_entity_movement(app.world_mut(), entity, east(60.0), None).unwrap();

    let mut position_events = 0;
    for _ in 0..61 {
        app.update();
        position_events += drain_count::<MovementPositionChanged>(&mut app);
    }

    // ~1 секунда при 60 px/s
    let xy = position(&app, entity);
    assert!((50.0..=70.0).contains(&xy.x), "xy = {xy:?}");
    assert_eq!(xy.y, 0.0);
    assert!(position_events > 30);
}

#[test]
fn test_finished_callback_and_event_fire_once() {
    let mut app = create_headless_app(1);
    let entity = spawn_at(&mut app, Vec2::new(10.0, 10.0));

    let mut straight = StraightMovement::new(100.0, 0.0).unwrap();
    straight.set_max_distance(20.0).unwrap();
    let (counter, callback) = counting_callback();
    start_entity_movement(app.world_mut(), entity, Movement::straight(straight), Some(callback))
        .unwrap();

    let mut finished_events = 0;
    for _ in 0..120 {
        app.update();
        finished_events += drain_count::<MovementFinished>(&mut app);
    }

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(finished_events, 1);
    assert!((position(&app, entity).x - 30.0).abs() < 1e-3);
    // Финишировавшее движение снято с entity
    assert!(app.world().get::<ActiveMovement>(entity).is_none());
}

#[test]
fn test_stop_entity_movement_skips_callback() {
    let mut app = create_headless_app(1);
    let entity = spawn_at(&mut app, Vec2::ZERO);

    let mut straight = StraightMovement::new(100.0, 0.0).unwrap();
    straight.set_max_distance(50.0).unwrap();
    let (counter, callback) = counting_callback();
    start_entity_movement(app.world_mut(), entity, Movement::straight(straight), Some(callback))
        .unwrap();

    for _ in 0..10 {
        app.update();
    }
    assert!(stop_entity_movement(app.world_mut(), entity));
    assert!(!stop_entity_movement(app.world_mut(), entity));

    let stopped_at = position(&app, entity);
    let mut finished_events = 0;
    for _ in 0..120 {
        app.update();
        finished_events += drain_count::<MovementFinished>(&mut app);
    }

    assert_eq!(position(&app, entity), stopped_at);
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert_eq!(finished_events, 0);
}

#[test]
fn test_start_without_transform_is_rejected() {
    let mut app = create_headless_app(1);
    let entity = app.world_mut().spawn_empty().id();

    let result = start_entity_movement(app.world_mut(), entity, east(10.0), None);
    assert!(matches!(result, Err(MovementError::SubjectNotFound(e)) if e == entity));
}

#[test]
fn test_global_suspension_freezes_and_resumes_without_jump() {
    let mut app = create_headless_app(1);
    let entity = spawn_at(&mut app, Vec2::ZERO);
    start_entity_movement(app.world_mut(), entity, east(60.0), None).unwrap();

    for _ in 0..30 {
        app.update();
    }
    app.world_mut().resource_mut::<MovementSuspension>().set(true);
    app.update();
    let frozen = position(&app, entity);

    for _ in 0..120 {
        app.update();
    }
    assert_eq!(position(&app, entity), frozen);

    app.world_mut().resource_mut::<MovementSuspension>().set(false);
    app.update();
    app.update();
    let resumed = position(&app, entity);
    assert!(resumed.x > frozen.x);
    assert!(resumed.x - frozen.x < 4.0, "jumped from {frozen:?} to {resumed:?}");
}

#[test]
fn test_movement_started_during_suspension_waits() {
    let mut app = create_headless_app(1);
    app.world_mut().resource_mut::<MovementSuspension>().set(true);
    app.update();

    let entity = spawn_at(&mut app, Vec2::ZERO);
    start_entity_movement(app.world_mut(), entity, east(60.0), None).unwrap();
    for _ in 0..60 {
        app.update();
    }
    assert_eq!(position(&app, entity), Vec2::ZERO);

    app.world_mut().resource_mut::<MovementSuspension>().set(false);
    for _ in 0..60 {
        app.update();
    }
    assert!(position(&app, entity).x > 40.0);
}

#[test]
fn test_drawable_ignores_obstacles() {
    let mut app = create_headless_app(1);

    // Стена: колонка клеток x = 4 (пиксели 32..40)
    let mut tiles = BlockedTiles::new(IVec2::splat(8));
    tiles.block_rect(IVec2::new(4, -4), IVec2::new(4, 4));
    app.insert_resource(ObstacleSource::new(tiles));

    let map_entity = spawn_at(&mut app, Vec2::ZERO);
    let drawable = app
        .world_mut()
        .spawn((Transform::default(), Drawable))
        .id();

    start_entity_movement(app.world_mut(), map_entity, east(60.0), None).unwrap();
    start_entity_movement(app.world_mut(), drawable, east(60.0), None).unwrap();

    let mut obstacle_events = 0;
    for _ in 0..121 {
        app.update();
        obstacle_events += app
            .world_mut()
            .resource_mut::<Events<MovementObstacleReached>>()
            .drain()
            .filter(|event| event.entity == map_entity)
            .count();
    }

    // MoverBounds по умолчанию 16x16: правый край упирается в x = 32
    assert!(position(&app, map_entity).x <= 16.0 + 1e-3);
    assert!(obstacle_events > 0);
    assert!(position(&app, drawable).x > 100.0);
}

#[test]
fn test_target_reaches_entity() {
    let mut app = create_headless_app(1);
    let target = spawn_at(&mut app, Vec2::new(100.0, 0.0));
    let chaser = spawn_at(&mut app, Vec2::ZERO);

    let movement = Movement::target(TargetMovement::new(
        TargetPoint::Entity {
            entity: target,
            offset: Vec2::ZERO,
        },
        64.0,
    )
    .unwrap());
    start_entity_movement(app.world_mut(), chaser, movement, None).unwrap();

    let mut finished_events = 0;
    for _ in 0..240 {
        app.update();
        finished_events += drain_count::<MovementFinished>(&mut app);
    }

    assert_eq!(finished_events, 1);
    assert!(position(&app, chaser).distance(Vec2::new(100.0, 0.0)) < 1.5);
}

#[test]
fn test_free_point_sweep() {
    let mut app = create_headless_app(1);
    let point = shared_point(5.0, 5.0);
    let handle = east(60.0).into_handle();

    let id = app
        .world_mut()
        .resource_mut::<FreePointRegistry>()
        .start(&handle, &point, 0, None)
        .unwrap();

    for _ in 0..61 {
        app.update();
    }
    let xy = *point.lock().unwrap();
    assert!(xy.x > 50.0, "xy = {xy:?}");
    assert_eq!(xy.y, 5.0);

    // Скрипт отпустил точку: запись удаляется на ближайшем sweep без stop()
    drop(point);
    app.update();
    assert!(!app.world().resource::<FreePointRegistry>().contains(id));
}

#[test]
fn test_simulation_plugin_uses_config() {
    let config = MovementConfig {
        tick_hz: 30.0,
        seed: 7,
        ..MovementConfig::default()
    };

    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .insert_resource(config)
        .add_plugins(SimulationPlugin);

    assert_eq!(app.world().resource::<DeterministicRng>().seed, 7);
    let timestep = app.world().resource::<Time<Fixed>>().timestep();
    assert!((timestep.as_secs_f64() - 1.0 / 30.0).abs() < 1e-6);
    assert!(app.world().contains_resource::<FreePointRegistry>());
}

#[test]
fn test_simulation_plugin_falls_back_on_invalid_config() {
    let config = MovementConfig {
        tick_hz: 0.0,
        seed: 7,
        ..MovementConfig::default()
    };

    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .insert_resource(config)
        .add_plugins(SimulationPlugin);

    // Вместо паники — default конфиг целиком
    assert_eq!(*app.world().resource::<MovementConfig>(), MovementConfig::default());
    assert_eq!(app.world().resource::<DeterministicRng>().seed, MovementConfig::default().seed);
    let timestep = app.world().resource::<Time<Fixed>>().timestep();
    assert!((timestep.as_secs_f64() - 1.0 / 60.0).abs() < 1e-6);
}

#[test]
fn test_callback_restarting_finished_point_movement() {
    let mut app = create_headless_app(1);
    let point = shared_point(0.0, 0.0);
    let mut straight = StraightMovement::new(120.0, 0.0).unwrap();
    straight.set_max_distance(12.0).unwrap();
    let handle = Movement::straight(straight).into_handle();

    // Callback стартует то же движение ещё раз: lock движения в этот момент свободен
    let restarts = Arc::new(AtomicUsize::new(0));
    let restarts_cb = restarts.clone();
    let handle_cb = Arc::clone(&handle);
    let point_cb = Arc::downgrade(&point);
    app.world_mut()
        .resource_mut::<FreePointRegistry>()
        .start(
            &handle,
            &point,
            0,
            Some(Box::new(move || {
                let (Ok(mut movement), Some(point)) = (handle_cb.try_lock(), point_cb.upgrade())
                else {
                    return;
                };
                movement.start(Subject::point(&point), 0, None);
                restarts_cb.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .unwrap();

    for _ in 0..120 {
        app.update();
    }

    assert_eq!(restarts.load(Ordering::SeqCst), 1);
    assert!((point.lock().unwrap().x - 24.0).abs() < 1e-3);
}
