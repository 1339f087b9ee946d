//! MovementConfig — тюнинг-константы движений
//!
//! Resource + serde: можно держать в JSON рядом с игрой и подгружать при старте.
//! Все задержки в миллисекундах, дистанции в пикселях (или клетках, где указано).

use std::fs;
use std::path::Path;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{check_non_negative, MovementError};
use crate::logger;

/// Допустимая частота тика (Hz)
const TICK_HZ_RANGE: std::ops::RangeInclusive<f64> = 1.0..=1000.0;

/// Верхняя граница любой задержки (сутки): now + delay не переполняется
const MAX_DELAY_MS: u64 = 24 * 60 * 60 * 1000;

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Частота FixedUpdate (Hz)
    pub tick_hz: f64,
    /// Seed для DeterministicRng
    pub seed: u64,

    /// RandomMovement: минимальная пауза между сменами направления
    pub random_direction_min_delay_ms: u64,
    /// RandomMovement: случайная добавка к паузе, U[0, extra]
    pub random_direction_extra_delay_ms: u64,

    /// TargetMovement: как часто проверяем позицию цели
    pub target_recompute_interval_ms: u64,
    /// TargetMovement: re-aim только если цель сместилась дальше этого порога (px)
    pub target_reaim_threshold: f32,

    /// PathMovement: пауза перед повтором заблокированного шага
    pub path_blocked_retry_ms: u64,

    /// RandomPathMovement: максимальная длина "ноги" в клетках
    pub random_path_max_leg_cells: u32,
    /// RandomPathMovement: пауза когда все 8 направлений заблокированы
    pub random_path_blocked_pause_ms: u64,

    /// PathFindingMovement: интервал повтора после неудачного поиска
    pub path_finding_retry_ms: u64,
    /// PathFindingMovement: допустимое смещение цели (клетки) до пересчёта пути
    pub path_finding_slack_cells: i32,
    /// PathFindingMovement: цель дальше (Chebyshev, клетки) — считается недостижимой
    pub path_finding_max_distance_cells: i32,
    /// PathFindingMovement: запас вокруг bbox(start, goal) для поиска
    pub path_finding_search_margin_cells: i32,

    /// JumpMovement: скорость при speed == 0 (px/s)
    pub default_jump_speed: f32,
    /// JumpMovement: высота пика = max(min_jump_height, distance × ratio)
    pub jump_height_ratio: f32,
    pub min_jump_height: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            tick_hz: 60.0,
            seed: 42,
            random_direction_min_delay_ms: 500,
            random_direction_extra_delay_ms: 1500,
            target_recompute_interval_ms: 100,
            target_reaim_threshold: 4.0,
            path_blocked_retry_ms: 200,
            random_path_max_leg_cells: 4,
            random_path_blocked_pause_ms: 500,
            path_finding_retry_ms: 500,
            path_finding_slack_cells: 1,
            path_finding_max_distance_cells: 40,
            path_finding_search_margin_cells: 8,
            default_jump_speed: 100.0,
            jump_height_ratio: 0.25,
            min_jump_height: 8.0,
        }
    }
}

impl MovementConfig {
    /// Загрузить конфиг из JSON файла (значения проверяются validate())
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MovementError> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Проверить диапазоны: первое нарушение → InvalidParameter
    pub fn validate(&self) -> Result<(), MovementError> {
        if !self.tick_hz.is_finite() || !TICK_HZ_RANGE.contains(&self.tick_hz) {
            return Err(MovementError::invalid(
                "tick_hz",
                format!(
                    "{} is outside {}..={}",
                    self.tick_hz,
                    TICK_HZ_RANGE.start(),
                    TICK_HZ_RANGE.end()
                ),
            ));
        }

        let delays = [
            ("random_direction_min_delay_ms", self.random_direction_min_delay_ms),
            ("random_direction_extra_delay_ms", self.random_direction_extra_delay_ms),
            ("target_recompute_interval_ms", self.target_recompute_interval_ms),
            ("path_blocked_retry_ms", self.path_blocked_retry_ms),
            ("random_path_blocked_pause_ms", self.random_path_blocked_pause_ms),
            ("path_finding_retry_ms", self.path_finding_retry_ms),
        ];
        for (name, delay) in delays {
            if delay > MAX_DELAY_MS {
                return Err(MovementError::invalid(
                    name,
                    format!("{delay} ms exceeds {MAX_DELAY_MS} ms"),
                ));
            }
        }

        let cells = [
            ("path_finding_slack_cells", self.path_finding_slack_cells),
            ("path_finding_max_distance_cells", self.path_finding_max_distance_cells),
            ("path_finding_search_margin_cells", self.path_finding_search_margin_cells),
        ];
        for (name, count) in cells {
            if count < 0 {
                return Err(MovementError::invalid(name, format!("{count} is negative")));
            }
        }

        check_non_negative("target_reaim_threshold", self.target_reaim_threshold)?;
        check_non_negative("jump_height_ratio", self.jump_height_ratio)?;
        check_non_negative("min_jump_height", self.min_jump_height)?;
        if check_non_negative("default_jump_speed", self.default_jump_speed)? == 0.0 {
            return Err(MovementError::invalid("default_jump_speed", "must be > 0"));
        }
        Ok(())
    }

    /// Сохранить конфиг в JSON (pretty)
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), MovementError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Загрузить или вернуть default (без записи на диск)
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                logger::log_warning(&format!(
                    "MovementConfig: {} not loaded ({}), using defaults",
                    path.display(),
                    err
                ));
                Self::default()
            }
        }
    }

    /// Пиковая высота прыжка для заданной дистанции
    pub fn jump_peak_height(&self, distance: f32) -> f32 {
        if distance <= 0.0 {
            return 0.0;
        }
        (distance * self.jump_height_ratio).max(self.min_jump_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MovementConfig::default();
        assert_eq!(config.tick_hz, 60.0);
        assert_eq!(config.random_direction_min_delay_ms, 500);
        assert_eq!(config.path_finding_slack_cells, 1);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: MovementConfig =
            serde_json::from_str(r#"{ "seed": 7, "path_finding_retry_ms": 250 }"#).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.path_finding_retry_ms, 250);
        assert_eq!(config.target_reaim_threshold, 4.0);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!(
            "tilewalk_config_test_{}.json",
            std::process::id()
        ));
        let mut config = MovementConfig::default();
        config.default_jump_speed = 64.0;
        config.save(&path).unwrap();

        let loaded = MovementConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_missing_file() {
        let result = MovementConfig::load("/definitely/not/here/movement.json");
        assert!(matches!(result, Err(MovementError::ConfigIo(_))));

        let config = MovementConfig::load_or_default("/definitely/not/here/movement.json");
        assert_eq!(config, MovementConfig::default());
    }

    #[test]
    fn test_validate() {
        assert!(MovementConfig::default().validate().is_ok());

        let zero_hz = MovementConfig {
            tick_hz: 0.0,
            ..MovementConfig::default()
        };
        assert!(matches!(
            zero_hz.validate(),
            Err(MovementError::InvalidParameter { name: "tick_hz", .. })
        ));

        let nan_hz = MovementConfig {
            tick_hz: f64::NAN,
            ..MovementConfig::default()
        };
        assert!(nan_hz.validate().is_err());

        let negative_threshold = MovementConfig {
            target_reaim_threshold: -1.0,
            ..MovementConfig::default()
        };
        assert!(matches!(
            negative_threshold.validate(),
            Err(MovementError::InvalidParameter { name: "target_reaim_threshold", .. })
        ));

        let negative_cells = MovementConfig {
            path_finding_max_distance_cells: -3,
            ..MovementConfig::default()
        };
        assert!(matches!(
            negative_cells.validate(),
            Err(MovementError::InvalidParameter { name: "path_finding_max_distance_cells", .. })
        ));

        let huge_delay = MovementConfig {
            path_finding_retry_ms: u64::MAX,
            ..MovementConfig::default()
        };
        assert!(huge_delay.validate().is_err());

        let still_jump = MovementConfig {
            default_jump_speed: 0.0,
            ..MovementConfig::default()
        };
        assert!(still_jump.validate().is_err());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let path = std::env::temp_dir().join(format!(
            "tilewalk_config_invalid_{}.json",
            std::process::id()
        ));
        fs::write(&path, r#"{ "tick_hz": 0, "seed": 3 }"#).unwrap();

        assert!(matches!(
            MovementConfig::load(&path),
            Err(MovementError::InvalidParameter { name: "tick_hz", .. })
        ));
        assert_eq!(MovementConfig::load_or_default(&path), MovementConfig::default());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_jump_peak_height() {
        let config = MovementConfig::default();
        assert_eq!(config.jump_peak_height(0.0), 0.0);
        assert_eq!(config.jump_peak_height(16.0), 8.0); // min height
        assert_eq!(config.jump_peak_height(64.0), 16.0);
    }
}
