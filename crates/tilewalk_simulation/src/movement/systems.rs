//! Movement systems (FixedUpdate) и MovementPlugin
//!
//! Порядок в тике:
//! 1. apply_movement_suspension — глобальная пауза → set_suspended на всех движениях
//! 2. update_entity_movements — ActiveMovement → Transform + events
//! 3. update_point_movements — sweep FreePointRegistry

use std::collections::HashMap;

use bevy::prelude::*;

use crate::config::MovementConfig;
use crate::error::MovementError;
use crate::free_point::FreePointRegistry;
use crate::logger;
use crate::movement::{
    ActiveMovement, Drawable, FinishedCallback, Movement, MovementChanged, MovementContext,
    MovementEvent, MovementFinished, MovementObstacleReached, MovementPositionChanged,
    MovementSuspension, MoverBounds, ObstacleSource, Subject,
};
use crate::world::Mover;
use crate::DeterministicRng;

/// Movement Plugin
///
/// Регистрирует events, resources и системы движения в FixedUpdate.
/// DeterministicRng берётся из App (SimulationPlugin / create_headless_app),
/// если его нет — вставляется со seed 42.
pub struct MovementPlugin;

impl Plugin for MovementPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<MovementPositionChanged>()
            .add_event::<MovementObstacleReached>()
            .add_event::<MovementChanged>()
            .add_event::<MovementFinished>();

        app.init_resource::<MovementConfig>()
            .init_resource::<FreePointRegistry>()
            .init_resource::<MovementSuspension>()
            .init_resource::<ObstacleSource>();

        if !app.world().contains_resource::<DeterministicRng>() {
            app.insert_resource(DeterministicRng::new(42));
        }

        app.add_systems(
            FixedUpdate,
            (
                apply_movement_suspension,
                update_entity_movements,
                update_point_movements,
            )
                .chain(),
        );
    }
}

/// Текущее время симуляции (ms) по fixed clock
fn now_ms(time: &Time<Fixed>) -> u64 {
    time.elapsed().as_millis() as u64
}

/// Позиции всех entity с Transform (для target / path_finding)
fn collect_positions<'a>(
    transforms: impl Iterator<Item = (Entity, &'a Transform)>,
) -> HashMap<Entity, Vec2> {
    transforms
        .map(|(entity, transform)| (entity, transform.translation.truncate()))
        .collect()
}

/// Система: глобальная пауза
///
/// Переход suspended → resumed сдвигает deadlines всех движений на длину паузы.
/// Пока пауза активна, применяется каждый тик (подхватывает движения, запущенные во время паузы).
pub fn apply_movement_suspension(
    time: Res<Time<Fixed>>,
    mut suspension: ResMut<MovementSuspension>,
    mut registry: ResMut<FreePointRegistry>,
    mut movements: Query<&mut ActiveMovement>,
) {
    let suspended = suspension.suspended;
    if suspended == suspension.applied && !suspended {
        return;
    }

    let now = now_ms(&time);
    for mut active in movements.iter_mut() {
        active.0.set_suspended(suspended, now);
    }
    registry.set_suspended_all(suspended, now);

    if suspension.applied != suspended {
        logger::log_info(&format!(
            "Movements {}",
            if suspended { "suspended" } else { "resumed" }
        ));
        suspension.applied = suspended;
    }
}

/// Система: обновление движений map entities / drawables
///
/// Entities обрабатываются в порядке Entity::index() (детерминизм RNG).
/// Позиция пишется в Transform.translation.xy; notifications → Bevy events.
/// Финишировавшее движение снимается с entity.
#[allow(clippy::too_many_arguments)]
pub fn update_entity_movements(
    mut commands: Commands,
    time: Res<Time<Fixed>>,
    obstacles: Res<ObstacleSource>,
    config: Res<MovementConfig>,
    mut rng: ResMut<DeterministicRng>,
    mut query: Query<(Entity, &mut Transform, Option<&mut ActiveMovement>)>,
    mut position_events: EventWriter<MovementPositionChanged>,
    mut obstacle_events: EventWriter<MovementObstacleReached>,
    mut changed_events: EventWriter<MovementChanged>,
    mut finished_events: EventWriter<MovementFinished>,
) {
    let now = now_ms(&time);
    let mut positions =
        collect_positions(query.iter().map(|(entity, transform, _)| (entity, transform)));

    let mut movers: Vec<Entity> = query
        .iter()
        .filter(|(_, _, active)| active.is_some())
        .map(|(entity, _, _)| entity)
        .collect();
    movers.sort_by_key(|entity| entity.index());

    for entity in movers {
        let Ok((_, mut transform, Some(mut active))) = query.get_mut(entity) else {
            continue;
        };

        let finished_callback = {
            let mut ctx = MovementContext {
                now,
                obstacles: obstacles.oracle(),
                entities: &positions,
                rng: &mut rng.rng,
                config: &config,
            };
            active.0.update_deferred(&mut ctx)
        };

        let xy = active.0.xy();
        if transform.translation.truncate() != xy {
            transform.translation.x = xy.x;
            transform.translation.y = xy.y;
        }
        positions.insert(entity, xy);

        for event in active.0.drain_events() {
            match event {
                MovementEvent::PositionChanged(position) => {
                    position_events.write(MovementPositionChanged { entity, position });
                }
                MovementEvent::ObstacleReached => {
                    obstacle_events.write(MovementObstacleReached { entity });
                }
                MovementEvent::Changed => {
                    changed_events.write(MovementChanged { entity });
                }
                MovementEvent::Finished => {
                    finished_events.write(MovementFinished { entity });
                }
            }
        }

        if active.0.is_finished() {
            logger::log(&format!(
                "{:?}: {} movement finished at {}",
                entity,
                active.0.kind_name(),
                xy
            ));
            commands.entity(entity).remove::<ActiveMovement>();
        }

        // Callback — после записи Transform и events этого движения
        if let Some(callback) = finished_callback {
            callback();
        }
    }
}

/// Система: sweep free-point движений
pub fn update_point_movements(
    time: Res<Time<Fixed>>,
    obstacles: Res<ObstacleSource>,
    config: Res<MovementConfig>,
    mut rng: ResMut<DeterministicRng>,
    mut registry: ResMut<FreePointRegistry>,
    transforms: Query<(Entity, &Transform)>,
) {
    if registry.is_empty() {
        return;
    }

    let positions = collect_positions(transforms.iter());
    let mut ctx = MovementContext {
        now: now_ms(&time),
        obstacles: obstacles.oracle(),
        entities: &positions,
        rng: &mut rng.rng,
        config: &config,
    };
    registry.update_all(&mut ctx);
}

/// Запустить движение на entity
///
/// Стартовая позиция = Transform.translation.xy. Entity с `Drawable` двигается
/// без obstacle tests; остальные — как map entity с `MoverBounds` (по умолчанию 16x16).
/// Предыдущее ActiveMovement заменяется без вызова его callback.
pub fn start_entity_movement(
    world: &mut World,
    entity: Entity,
    mut movement: Movement,
    on_finished: Option<FinishedCallback>,
) -> Result<(), MovementError> {
    let xy = world
        .get::<Transform>(entity)
        .map(|transform| transform.translation.truncate())
        .ok_or(MovementError::SubjectNotFound(entity))?;

    let now = world
        .get_resource::<Time<Fixed>>()
        .map(now_ms)
        .unwrap_or_default();
    let suspended = world
        .get_resource::<MovementSuspension>()
        .is_some_and(|suspension| suspension.suspended);

    let subject = if world.get::<Drawable>(entity).is_some() {
        Subject::Drawable(entity)
    } else {
        let bounds = world.get::<MoverBounds>(entity).copied().unwrap_or_default();
        Subject::Entity(Mover::new(entity, bounds.size))
    };

    movement.set_xy(xy)?;
    movement.start(subject, now, on_finished);
    if suspended {
        movement.set_suspended(true, now);
    }

    logger::log(&format!(
        "{:?}: {} movement started at {}",
        entity,
        movement.kind_name(),
        xy
    ));
    world.entity_mut(entity).insert(ActiveMovement(movement));
    Ok(())
}

/// Остановить движение entity (callback не вызывается, MovementFinished не шлётся)
///
/// Возвращает false если у entity не было движения.
pub fn stop_entity_movement(world: &mut World, entity: Entity) -> bool {
    let Ok(mut entity_mut) = world.get_entity_mut(entity) else {
        return false;
    };
    match entity_mut.take::<ActiveMovement>() {
        Some(mut active) => {
            active.0.stop();
            true
        }
        None => false,
    }
}
