//! Общее ядро всех движений
//!
//! MovementCore держит то, что одинаково для девяти стратегий:
//! позицию, привязку к subject, suspend bookkeeping, obstacle tests,
//! очередь notifications и finished-callback (fire-once).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use bevy::prelude::*;
use rand::RngCore;

use crate::config::MovementConfig;
use crate::logger;
use crate::movement::direction::Direction4;
use crate::world::{EntityLocator, Mover, ObstacleOracle};

/// Уникальный id движения (ключ free-point registry)
pub type MovementId = u64;

static NEXT_MOVEMENT_ID: AtomicU64 = AtomicU64::new(1);

fn next_movement_id() -> MovementId {
    NEXT_MOVEMENT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Точка (x, y), которой владеет внешний код (скрипт)
pub type SharedPoint = Arc<Mutex<Vec2>>;

pub fn shared_point(x: f32, y: f32) -> SharedPoint {
    Arc::new(Mutex::new(Vec2::new(x, y)))
}

/// Completion callback: вызывается максимум один раз за активацию
pub type FinishedCallback = Box<dyn FnOnce() + Send + Sync>;

/// Что именно двигает Movement
#[derive(Debug, Clone)]
pub enum Subject {
    /// Map entity: участвует в obstacle tests (bounding box из Mover)
    Entity(Mover),
    /// Визуальный объект: obstacle tests всегда "свободно"
    Drawable(Entity),
    /// Внешняя точка: не владеем ей (weak)
    Point(Weak<Mutex<Vec2>>),
}

impl Subject {
    pub fn point(point: &SharedPoint) -> Self {
        Subject::Point(Arc::downgrade(point))
    }

    pub fn entity(&self) -> Option<Entity> {
        match self {
            Subject::Entity(mover) => Some(mover.entity),
            Subject::Drawable(entity) => Some(*entity),
            Subject::Point(_) => None,
        }
    }
}

/// Notifications для subject'а
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MovementEvent {
    PositionChanged(Vec2),
    ObstacleReached,
    /// Движение само сменило направление / фазу
    Changed,
    Finished,
}

/// Получатель notifications. Не переопределённый метод = subject отказался от notification.
pub trait MovementListener {
    fn on_position_changed(&mut self, _xy: Vec2) {}
    fn on_obstacle_reached(&mut self) {}
    fn on_changed(&mut self) {}
    fn on_finished(&mut self) {}
}

/// Всё, что нужно одному update(): время + коллабораторы
pub struct MovementContext<'a> {
    /// Текущее время симуляции (ms)
    pub now: u64,
    pub obstacles: &'a dyn ObstacleOracle,
    pub entities: &'a dyn EntityLocator,
    pub rng: &'a mut dyn RngCore,
    pub config: &'a MovementConfig,
}

impl<'a> MovementContext<'a> {
    pub fn tile_size(&self) -> Vec2 {
        self.obstacles.tile_size().max(IVec2::ONE).as_vec2()
    }
}

/// Результат попытки сдвига
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResult {
    /// Сдвинулись на весь вектор
    Full,
    /// Полный сдвиг заблокирован, проехали вдоль стены (wall sliding)
    Slid,
    /// Не сдвинулись
    Blocked,
}

pub struct MovementCore {
    id: MovementId,
    pub(crate) xy: Vec2,
    pub(crate) subject: Option<Subject>,
    pub(crate) suspended: bool,
    pub(crate) when_suspended: u64,
    pub(crate) ignore_obstacles: bool,
    on_finished: Option<FinishedCallback>,
    pub(crate) finished: bool,
    /// Время последнего шага (frame-independent stepping)
    pub(crate) last_move_date: u64,
    pub(crate) displayed_direction: Direction4,
    events: Vec<MovementEvent>,
}

impl MovementCore {
    pub(crate) fn new() -> Self {
        Self {
            id: next_movement_id(),
            xy: Vec2::ZERO,
            subject: None,
            suspended: false,
            when_suspended: 0,
            ignore_obstacles: false,
            on_finished: None,
            finished: false,
            last_move_date: 0,
            displayed_direction: Direction4::South,
            events: Vec::new(),
        }
    }

    pub fn id(&self) -> MovementId {
        self.id
    }

    /// Привязать subject (старые notifications сбрасываются)
    pub(crate) fn bind(&mut self, subject: Subject, now: u64, on_finished: Option<FinishedCallback>) {
        if let Subject::Point(point) = &subject {
            if let Some(point) = point.upgrade() {
                match point.lock() {
                    Ok(xy) => self.xy = *xy,
                    Err(_) => logger::log_error("Movement: free point lock poisoned on start"),
                }
            }
        }

        self.subject = Some(subject);
        self.on_finished = on_finished;
        self.events.clear();
        self.finished = false;
        self.last_move_date = now;
    }

    /// Отвязать subject; callback выбрасывается без вызова
    pub(crate) fn unbind(&mut self) {
        self.subject = None;
        self.on_finished = None;
        self.events.clear();
    }

    pub(crate) fn is_active(&self) -> bool {
        self.subject.is_some() && !self.suspended && !self.finished
    }

    /// Записать позицию и уведомить subject (только при реальном изменении)
    pub(crate) fn set_xy(&mut self, xy: Vec2) {
        if xy == self.xy {
            return;
        }

        if let Some(direction) = Direction4::from_delta(xy - self.xy) {
            self.displayed_direction = direction;
        }
        self.xy = xy;

        if let Some(Subject::Point(point)) = &self.subject {
            if let Some(point) = point.upgrade() {
                match point.lock() {
                    Ok(mut shared) => *shared = xy,
                    Err(_) => logger::log_error("Movement: free point lock poisoned on write"),
                }
            }
        }

        // Несколько сдвигов за тик = одно notification с финальной позицией
        if let Some(MovementEvent::PositionChanged(last)) = self.events.last_mut() {
            *last = xy;
        } else {
            self.events.push(MovementEvent::PositionChanged(xy));
        }
    }

    /// Явное направление "лицом" (для анимации), без сдвига
    pub(crate) fn set_heading(&mut self, angle: f32) {
        self.displayed_direction = Direction4::from_angle(angle);
    }

    /// Obstacle test с учётом типа subject'а
    pub(crate) fn is_obstacle(&self, ctx: &MovementContext, xy: Vec2) -> bool {
        if self.ignore_obstacles {
            return false;
        }
        match &self.subject {
            Some(Subject::Entity(mover)) => ctx.obstacles.is_obstacle_for(mover, xy),
            // Drawables и точки не сталкиваются
            _ => false,
        }
    }

    /// Сдвиг на delta: целиком, иначе (smooth) по осям по отдельности
    pub(crate) fn try_move(&mut self, ctx: &MovementContext, delta: Vec2, smooth: bool) -> MoveResult {
        if delta == Vec2::ZERO {
            return MoveResult::Full;
        }

        let candidate = self.xy + delta;
        if !self.is_obstacle(ctx, candidate) {
            self.set_xy(candidate);
            return MoveResult::Full;
        }

        self.notify_obstacle_reached();
        if !smooth {
            return MoveResult::Blocked;
        }

        let mut moved = false;
        if delta.x != 0.0 {
            let along_x = self.xy + Vec2::new(delta.x, 0.0);
            if !self.is_obstacle(ctx, along_x) {
                self.set_xy(along_x);
                moved = true;
            }
        }
        if delta.y != 0.0 {
            let along_y = self.xy + Vec2::new(0.0, delta.y);
            if !self.is_obstacle(ctx, along_y) {
                self.set_xy(along_y);
                moved = true;
            }
        }

        if moved {
            MoveResult::Slid
        } else {
            MoveResult::Blocked
        }
    }

    pub(crate) fn notify_obstacle_reached(&mut self) {
        self.events.push(MovementEvent::ObstacleReached);
    }

    pub(crate) fn notify_changed(&mut self) {
        if self.events.last() != Some(&MovementEvent::Changed) {
            self.events.push(MovementEvent::Changed);
        }
    }

    /// Terminal condition стратегии: Finished, ровно один раз
    ///
    /// Callback здесь не вызывается: его забирает take_finished_callback() уже
    /// после того, как вызывающий отпустил движение (callback может его перезапустить).
    pub(crate) fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.events.push(MovementEvent::Finished);
    }

    /// Callback финишировавшего движения (не более одного раза)
    pub(crate) fn take_finished_callback(&mut self) -> Option<FinishedCallback> {
        if !self.finished {
            return None;
        }
        self.on_finished.take()
    }

    /// Пропущенный тик (пауза/ожидание): время не копится
    pub(crate) fn touch(&mut self, now: u64) {
        self.last_move_date = now;
    }

    /// Сколько ms прошло с прошлого шага; сдвигает last_move_date на now
    pub(crate) fn take_elapsed(&mut self, now: u64) -> u64 {
        let elapsed = now.saturating_sub(self.last_move_date);
        self.last_move_date = now;
        elapsed
    }

    pub(crate) fn pending_events(&self) -> &[MovementEvent] {
        &self.events
    }

    pub(crate) fn drain_events(&mut self) -> Vec<MovementEvent> {
        std::mem::take(&mut self.events)
    }
}

impl fmt::Debug for MovementCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MovementCore")
            .field("id", &self.id)
            .field("xy", &self.xy)
            .field("subject", &self.subject)
            .field("suspended", &self.suspended)
            .field("ignore_obstacles", &self.ignore_obstacles)
            .field("finished", &self.finished)
            .field("has_callback", &self.on_finished.is_some())
            .field("last_move_date", &self.last_move_date)
            .finish()
    }
}
