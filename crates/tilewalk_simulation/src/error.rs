//! Ошибки movement API
//!
//! Только "argument errors" (неверный параметр на границе API) и ошибки загрузки конфига.
//! Obstacle contact и недостижимая цель — НЕ ошибки (это notifications / idle-retry).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MovementError {
    /// Неизвестное имя в factory (`Movement::create`)
    #[error(
        "unknown movement kind \"{0}\": should be one of straight, random, target, path, \
         random_path, path_finding, circle, jump or pixel"
    )]
    UnknownKind(String),

    /// Параметр вне допустимого диапазона (отрицательная скорость, NaN угол и т.п.)
    #[error("invalid {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Код направления не в 0..=7
    #[error("invalid direction code {0}: expected 0..=7")]
    InvalidDirection(u32),

    /// Элемент траектории pixel movement не парсится
    #[error("malformed trajectory entry #{index}: \"{entry}\"")]
    MalformedTrajectory { index: usize, entry: String },

    /// start_entity_movement на entity без Transform (или despawned)
    #[error("movement subject {0} not found")]
    SubjectNotFound(bevy::prelude::Entity),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

impl MovementError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Проверка скорости: конечная и ≥ 0
pub(crate) fn check_speed(speed: f32) -> Result<f32, MovementError> {
    if !speed.is_finite() {
        return Err(MovementError::invalid("speed", format!("{speed} is not finite")));
    }
    if speed < 0.0 {
        return Err(MovementError::invalid("speed", format!("{speed} is negative")));
    }
    Ok(speed)
}

/// Проверка неотрицательной дистанции/радиуса
pub(crate) fn check_non_negative(name: &'static str, value: f32) -> Result<f32, MovementError> {
    if !value.is_finite() || value < 0.0 {
        return Err(MovementError::invalid(name, format!("{value} must be a finite value >= 0")));
    }
    Ok(value)
}

/// Проверка что значение конечное (углы, signed скорости)
pub(crate) fn check_finite(name: &'static str, value: f32) -> Result<f32, MovementError> {
    if !value.is_finite() {
        return Err(MovementError::invalid(name, format!("{value} is not finite")));
    }
    Ok(value)
}
