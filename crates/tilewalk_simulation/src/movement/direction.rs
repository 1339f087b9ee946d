//! 8-way / 4-way направления и конверсии угол ↔ вектор
//!
//! Экранные координаты: +Y вниз. Угол 0 = восток, растёт против часовой
//! стрелки (как на экране), поэтому вектор угла = (cos a, -sin a).
//!
//! Коды 8-way: 0=E, 1=NE, 2=N, 3=NW, 4=W, 5=SW, 6=S, 7=SE.

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, TAU};
use std::fmt;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::MovementError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect, Serialize, Deserialize)]
pub enum Direction8 {
    East,
    NorthEast,
    North,
    NorthWest,
    West,
    SouthWest,
    South,
    SouthEast,
}

impl Direction8 {
    /// Стабильный порядок обхода (tie-breaking в grid search зависит от него)
    pub const ALL: [Direction8; 8] = [
        Direction8::East,
        Direction8::NorthEast,
        Direction8::North,
        Direction8::NorthWest,
        Direction8::West,
        Direction8::SouthWest,
        Direction8::South,
        Direction8::SouthEast,
    ];

    pub fn from_code(code: u32) -> Result<Self, MovementError> {
        Self::ALL
            .get(code as usize)
            .copied()
            .ok_or(MovementError::InvalidDirection(code))
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Смещение на одну клетку (в клетках, +Y вниз)
    pub fn basic_step(self) -> IVec2 {
        match self {
            Direction8::East => IVec2::new(1, 0),
            Direction8::NorthEast => IVec2::new(1, -1),
            Direction8::North => IVec2::new(0, -1),
            Direction8::NorthWest => IVec2::new(-1, -1),
            Direction8::West => IVec2::new(-1, 0),
            Direction8::SouthWest => IVec2::new(-1, 1),
            Direction8::South => IVec2::new(0, 1),
            Direction8::SouthEast => IVec2::new(1, 1),
        }
    }

    /// Обратная конверсия: шаг (-1..=1, -1..=1) → направление
    pub fn from_step(step: IVec2) -> Option<Self> {
        Self::ALL.into_iter().find(|dir| dir.basic_step() == step)
    }

    /// Нормализованный вектор (диагонали длины 1, не √2)
    pub fn unit_vector(self) -> Vec2 {
        self.basic_step().as_vec2().normalize_or_zero()
    }

    /// Угол в радианах (0 = восток, π/2 = север)
    pub fn angle(self) -> f32 {
        self.code() as f32 * FRAC_PI_4
    }

    pub fn direction4(self) -> Direction4 {
        Direction4::ALL[(self.code() / 2) as usize]
    }

    pub fn is_diagonal(self) -> bool {
        self.code() % 2 == 1
    }

    pub fn opposite(self) -> Self {
        Self::ALL[((self.code() + 4) % 8) as usize]
    }
}

impl fmt::Display for Direction8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// 4-way направление для выбора анимации
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect, Serialize, Deserialize)]
pub enum Direction4 {
    East,
    North,
    West,
    South,
}

impl Direction4 {
    pub const ALL: [Direction4; 4] = [
        Direction4::East,
        Direction4::North,
        Direction4::West,
        Direction4::South,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Сектор ±45° вокруг каждой оси
    pub fn from_angle(angle: f32) -> Self {
        let sector = ((normalize_angle(angle) + FRAC_PI_4) / FRAC_PI_2).floor() as i32;
        Self::ALL[sector.rem_euclid(4) as usize]
    }

    /// Направление по смещению (экранные координаты). None для нулевого смещения.
    pub fn from_delta(delta: Vec2) -> Option<Self> {
        if delta == Vec2::ZERO || !delta.is_finite() {
            return None;
        }
        Some(Self::from_angle(vector_angle(delta)))
    }
}

/// Угол → единичный вектор (экранные координаты)
pub fn angle_to_vector(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), -angle.sin())
}

/// Вектор → угол (обратная к angle_to_vector)
pub fn vector_angle(v: Vec2) -> f32 {
    normalize_angle((-v.y).atan2(v.x))
}

/// Угол в [0, 2π)
pub fn normalize_angle(angle: f32) -> f32 {
    let a = angle.rem_euclid(TAU);
    // rem_euclid может вернуть ровно TAU из-за округления
    if a >= TAU {
        0.0
    } else {
        a
    }
}

/// "0246" → [E, N, W, S]. Пробелы игнорируются.
pub fn parse_path(text: &str) -> Result<Vec<Direction8>, MovementError> {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c.to_digit(10) {
            Some(code) => Direction8::from_code(code),
            None => Err(MovementError::invalid(
                "path",
                format!("'{c}' is not a direction digit"),
            )),
        })
        .collect()
}

pub fn path_from_codes(codes: &[u32]) -> Result<Vec<Direction8>, MovementError> {
    codes.iter().map(|&code| Direction8::from_code(code)).collect()
}

pub fn path_to_string(path: &[Direction8]) -> String {
    path.iter().map(|dir| char::from(b'0' + dir.code())).collect()
}
