//! Movement domain — девять взаимозаменяемых кинематических стратегий
//!
//! Содержит:
//! - Movement (общее ядро + закрытый enum стратегий)
//! - straight / random / target (векторное движение)
//! - circle / jump / pixel (специальная кинематика)
//! - path / random_path / path_finding (движение по клеткам)
//! - Bevy слой: компоненты, events, системы, MovementPlugin

pub mod circle;
pub mod components;
pub mod core;
pub mod direction;
pub mod events;
pub mod jump;
pub mod path;
pub mod path_finding;
pub mod pixel;
pub mod random;
pub mod random_path;
pub mod straight;
pub mod systems;
pub mod target;

#[cfg(test)]
pub(crate) mod test_support;

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use bevy::prelude::*;

use crate::error::MovementError;

pub use self::circle::CircleMovement;
pub use self::components::*;
pub use self::core::{
    shared_point, FinishedCallback, MovementContext, MovementEvent, MovementId, MovementListener,
    SharedPoint, Subject,
};
pub use self::direction::{parse_path, path_to_string, Direction4, Direction8};
pub use self::events::*;
pub use self::jump::JumpMovement;
pub use self::path::{PathMovement, PathState};
pub use self::path_finding::PathFindingMovement;
pub use self::pixel::{parse_trajectory, PixelMovement};
pub use self::random::RandomMovement;
pub use self::random_path::RandomPathMovement;
pub use self::straight::StraightMovement;
pub use self::systems::*;
pub use self::target::{TargetMovement, TargetPoint};

use self::core::MovementCore;

/// Имя стратегии в factory (как его пишет скрипт)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MovementKindName {
    Straight,
    Random,
    Target,
    Path,
    RandomPath,
    PathFinding,
    Circle,
    Jump,
    Pixel,
}

impl MovementKindName {
    pub const ALL: [MovementKindName; 9] = [
        MovementKindName::Straight,
        MovementKindName::Random,
        MovementKindName::Target,
        MovementKindName::Path,
        MovementKindName::RandomPath,
        MovementKindName::PathFinding,
        MovementKindName::Circle,
        MovementKindName::Jump,
        MovementKindName::Pixel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MovementKindName::Straight => "straight",
            MovementKindName::Random => "random",
            MovementKindName::Target => "target",
            MovementKindName::Path => "path",
            MovementKindName::RandomPath => "random_path",
            MovementKindName::PathFinding => "path_finding",
            MovementKindName::Circle => "circle",
            MovementKindName::Jump => "jump",
            MovementKindName::Pixel => "pixel",
        }
    }
}

impl FromStr for MovementKindName {
    type Err = MovementError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| MovementError::UnknownKind(name.to_string()))
    }
}

impl fmt::Display for MovementKindName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Закрытый набор стратегий (exhaustive match вместо наследования)
#[derive(Debug, Clone)]
pub enum MovementKind {
    Straight(StraightMovement),
    Random(RandomMovement),
    Target(TargetMovement),
    Path(PathMovement),
    RandomPath(RandomPathMovement),
    PathFinding(PathFindingMovement),
    Circle(CircleMovement),
    Jump(JumpMovement),
    Pixel(PixelMovement),
}

impl MovementKind {
    pub fn name(&self) -> MovementKindName {
        match self {
            MovementKind::Straight(_) => MovementKindName::Straight,
            MovementKind::Random(_) => MovementKindName::Random,
            MovementKind::Target(_) => MovementKindName::Target,
            MovementKind::Path(_) => MovementKindName::Path,
            MovementKind::RandomPath(_) => MovementKindName::RandomPath,
            MovementKind::PathFinding(_) => MovementKindName::PathFinding,
            MovementKind::Circle(_) => MovementKindName::Circle,
            MovementKind::Jump(_) => MovementKindName::Jump,
            MovementKind::Pixel(_) => MovementKindName::Pixel,
        }
    }

    /// Параметры по умолчанию — как их создаёт скриптовый API
    pub fn with_defaults(name: MovementKindName) -> Self {
        match name {
            MovementKindName::Straight => MovementKind::Straight(StraightMovement::default()),
            MovementKindName::Random => MovementKind::Random(RandomMovement::default()),
            MovementKindName::Target => MovementKind::Target(TargetMovement::default()),
            MovementKindName::Path => MovementKind::Path(PathMovement::default()),
            MovementKindName::RandomPath => MovementKind::RandomPath(RandomPathMovement::default()),
            MovementKindName::PathFinding => {
                MovementKind::PathFinding(PathFindingMovement::default())
            }
            MovementKindName::Circle => MovementKind::Circle(CircleMovement::default()),
            MovementKindName::Jump => MovementKind::Jump(JumpMovement::default()),
            MovementKindName::Pixel => MovementKind::Pixel(PixelMovement::default()),
        }
    }

    fn on_start(&mut self, core: &mut MovementCore, now: u64) {
        match self {
            MovementKind::Straight(m) => m.on_start(core, now),
            MovementKind::Random(m) => m.on_start(core, now),
            MovementKind::Target(m) => m.on_start(core, now),
            MovementKind::Path(m) => m.on_start(core, now),
            MovementKind::RandomPath(m) => m.on_start(core, now),
            MovementKind::PathFinding(m) => m.on_start(core, now),
            MovementKind::Circle(m) => m.on_start(core, now),
            MovementKind::Jump(m) => m.on_start(core, now),
            MovementKind::Pixel(m) => m.on_start(core, now),
        }
    }

    fn update(&mut self, core: &mut MovementCore, ctx: &mut MovementContext) {
        match self {
            MovementKind::Straight(m) => m.update(core, ctx),
            MovementKind::Random(m) => m.update(core, ctx),
            MovementKind::Target(m) => m.update(core, ctx),
            MovementKind::Path(m) => m.update(core, ctx),
            MovementKind::RandomPath(m) => m.update(core, ctx),
            MovementKind::PathFinding(m) => m.update(core, ctx),
            MovementKind::Circle(m) => m.update(core, ctx),
            MovementKind::Jump(m) => m.update(core, ctx),
            MovementKind::Pixel(m) => m.update(core, ctx),
        }
    }

    fn shift_deadlines(&mut self, paused: u64) {
        match self {
            MovementKind::Straight(m) => m.shift_deadlines(paused),
            MovementKind::Random(m) => m.shift_deadlines(paused),
            MovementKind::Target(m) => m.shift_deadlines(paused),
            MovementKind::Path(m) => m.shift_deadlines(paused),
            MovementKind::RandomPath(m) => m.shift_deadlines(paused),
            MovementKind::PathFinding(m) => m.shift_deadlines(paused),
            MovementKind::Circle(m) => m.shift_deadlines(paused),
            MovementKind::Jump(m) => m.shift_deadlines(paused),
            MovementKind::Pixel(m) => m.shift_deadlines(paused),
        }
    }
}

/// Движение: общее ядро + конкретная стратегия
///
/// Жизненный цикл: создано (detached) → start(subject) → update() каждый тик →
/// стратегия сама финиширует или внешний stop(). Drop не вызывает callback.
#[derive(Debug)]
pub struct Movement {
    core: MovementCore,
    kind: MovementKind,
}

/// Общий handle для free-point registry
pub type MovementHandle = Arc<Mutex<Movement>>;

impl Movement {
    pub fn new(kind: MovementKind) -> Self {
        Self {
            core: MovementCore::new(),
            kind,
        }
    }

    /// Factory по имени: straight, random, target, path, random_path,
    /// path_finding, circle, jump, pixel
    pub fn create(name: &str) -> Result<Self, MovementError> {
        let kind_name = name.parse::<MovementKindName>().inspect_err(|err| {
            crate::logger::log_warning(&format!("Movement::create: {err}"));
        })?;
        Ok(Self::new(MovementKind::with_defaults(kind_name)))
    }

    pub fn straight(movement: StraightMovement) -> Self {
        Self::new(MovementKind::Straight(movement))
    }

    pub fn random(movement: RandomMovement) -> Self {
        Self::new(MovementKind::Random(movement))
    }

    pub fn target(movement: TargetMovement) -> Self {
        Self::new(MovementKind::Target(movement))
    }

    pub fn path(movement: PathMovement) -> Self {
        Self::new(MovementKind::Path(movement))
    }

    pub fn random_path(movement: RandomPathMovement) -> Self {
        Self::new(MovementKind::RandomPath(movement))
    }

    pub fn path_finding(movement: PathFindingMovement) -> Self {
        Self::new(MovementKind::PathFinding(movement))
    }

    pub fn circle(movement: CircleMovement) -> Self {
        Self::new(MovementKind::Circle(movement))
    }

    pub fn jump(movement: JumpMovement) -> Self {
        Self::new(MovementKind::Jump(movement))
    }

    pub fn pixel(movement: PixelMovement) -> Self {
        Self::new(MovementKind::Pixel(movement))
    }

    pub fn into_handle(self) -> MovementHandle {
        Arc::new(Mutex::new(self))
    }

    pub fn id(&self) -> MovementId {
        self.core.id()
    }

    pub fn kind(&self) -> &MovementKind {
        &self.kind
    }

    /// Параметры стратегии (setters валидируют значения сами)
    pub fn kind_mut(&mut self) -> &mut MovementKind {
        &mut self.kind
    }

    pub fn kind_name(&self) -> MovementKindName {
        self.kind.name()
    }

    pub fn xy(&self) -> Vec2 {
        self.core.xy
    }

    /// Телепорт (без obstacle test); subject получает PositionChanged
    pub fn set_xy(&mut self, xy: Vec2) -> Result<(), MovementError> {
        if !xy.is_finite() {
            return Err(MovementError::invalid("xy", format!("{xy} is not finite")));
        }
        self.core.set_xy(xy);
        Ok(())
    }

    pub fn subject(&self) -> Option<&Subject> {
        self.core.subject.as_ref()
    }

    pub fn is_started(&self) -> bool {
        self.core.subject.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.core.finished
    }

    pub fn is_suspended(&self) -> bool {
        self.core.suspended
    }

    pub fn ignore_obstacles(&self) -> bool {
        self.core.ignore_obstacles
    }

    pub fn set_ignore_obstacles(&mut self, ignore: bool) {
        self.core.ignore_obstacles = ignore;
    }

    /// Куда "смотрит" mover (для выбора анимации)
    pub fn displayed_direction4(&self) -> Direction4 {
        self.core.displayed_direction
    }

    /// Привязать subject и (опционально) finished-callback
    ///
    /// Предыдущая привязка снимается как при stop(): её callback не вызывается.
    pub fn start(&mut self, subject: Subject, now: u64, on_finished: Option<FinishedCallback>) {
        self.stop();
        self.core.bind(subject, now, on_finished);
        self.kind.on_start(&mut self.core, now);
    }

    /// Отвязать subject; pending callback выбрасывается без вызова
    pub fn stop(&mut self) {
        self.core.unbind();
    }

    /// Suspend/resume. При resume все deadlines сдвигаются на длину паузы.
    pub fn set_suspended(&mut self, suspended: bool, now: u64) {
        if suspended == self.core.suspended {
            return;
        }
        self.core.suspended = suspended;

        if suspended {
            self.core.when_suspended = now;
        } else {
            let paused = now.saturating_sub(self.core.when_suspended);
            self.core.last_move_date = self.core.last_move_date.saturating_add(paused);
            self.kind.shift_deadlines(paused);
        }
    }

    /// Один тик. No-op если не запущено, на паузе или уже финишировало.
    ///
    /// Finished-callback вызывается в конце тика, после того как стратегия закончила.
    pub fn update(&mut self, ctx: &mut MovementContext) {
        if let Some(callback) = self.update_deferred(ctx) {
            callback();
        }
    }

    /// Тик без вызова callback: если движение финишировало, callback возвращается.
    ///
    /// Для владельцев, которые держат движение под lock/borrow: callback нужно
    /// вызвать после того, как движение отпущено (callback может перезапустить его).
    pub fn update_deferred(&mut self, ctx: &mut MovementContext) -> Option<FinishedCallback> {
        if !self.core.is_active() {
            return None;
        }
        self.kind.update(&mut self.core, ctx);
        self.core.take_finished_callback()
    }

    /// Pending notifications (в порядке появления)
    pub fn pending_events(&self) -> &[MovementEvent] {
        self.core.pending_events()
    }

    pub fn drain_events(&mut self) -> Vec<MovementEvent> {
        self.core.drain_events()
    }

    /// Отдать pending notifications получателю
    pub fn dispatch_events(&mut self, listener: &mut dyn MovementListener) {
        for event in self.core.drain_events() {
            match event {
                MovementEvent::PositionChanged(xy) => listener.on_position_changed(xy),
                MovementEvent::ObstacleReached => listener.on_obstacle_reached(),
                MovementEvent::Changed => listener.on_changed(),
                MovementEvent::Finished => listener.on_finished(),
            }
        }
    }

    /// Привязано ли движение именно к этой точке
    pub(crate) fn is_bound_to_point(&self, point: &std::sync::Weak<Mutex<Vec2>>) -> bool {
        matches!(&self.core.subject, Some(Subject::Point(bound)) if bound.ptr_eq(point))
    }

    // Удобные setters поверх kind_mut() для параметров, общих у нескольких стратегий

    pub fn speed(&self) -> Option<f32> {
        match &self.kind {
            MovementKind::Straight(m) => Some(m.speed()),
            MovementKind::Random(m) => Some(m.speed()),
            MovementKind::Target(m) => Some(m.speed()),
            MovementKind::Path(m) => Some(m.speed()),
            MovementKind::RandomPath(m) => Some(m.speed()),
            MovementKind::PathFinding(m) => Some(m.speed()),
            MovementKind::Jump(m) => Some(m.speed()),
            MovementKind::Circle(_) | MovementKind::Pixel(_) => None,
        }
    }

    pub fn set_speed(&mut self, speed: f32) -> Result<(), MovementError> {
        let name = self.kind.name();
        match &mut self.kind {
            MovementKind::Straight(m) => m.set_speed(speed),
            MovementKind::Random(m) => m.set_speed(speed),
            MovementKind::Target(m) => m.set_speed(speed),
            MovementKind::Path(m) => m.set_speed(speed),
            MovementKind::RandomPath(m) => m.set_speed(speed),
            MovementKind::PathFinding(m) => m.set_speed(speed),
            MovementKind::Jump(m) => m.set_speed(speed),
            MovementKind::Circle(_) | MovementKind::Pixel(_) => Err(MovementError::invalid(
                "speed",
                format!("{name} movement has no speed"),
            )),
        }
    }

    /// Новая траектория pixel movement; проигрывается с первого шага от текущей позиции
    pub fn set_trajectory(&mut self, trajectory: Vec<IVec2>) -> Result<(), MovementError> {
        match &mut self.kind {
            MovementKind::Pixel(pixel) => pixel.set_trajectory(trajectory, self.core.xy),
            other => Err(MovementError::invalid(
                "trajectory",
                format!("{} movement has no trajectory", other.name()),
            )),
        }
    }

    /// То же из текста "dx dy dx dy ..."
    pub fn set_trajectory_text(&mut self, text: &str) -> Result<(), MovementError> {
        self.set_trajectory(parse_trajectory(text)?)
    }
}
