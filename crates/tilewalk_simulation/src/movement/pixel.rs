//! PixelMovement — проигрывание явной траектории (dx, dy)
//!
//! Каждый шаг = точное смещение, раз в delay ms. Препятствие проверяется для
//! origin + сумма смещений. Заблокированный шаг пропускается, индекс идёт дальше.
//! Loop перезапускает траекторию от origin (позиции на старте траектории),
//! поэтому drift не накапливается.

use bevy::prelude::*;

use crate::error::MovementError;
use crate::movement::core::{MovementContext, MovementCore};

/// "1 0 1 0 0 -1" → [(1,0), (1,0), (0,-1)]
pub fn parse_trajectory(text: &str) -> Result<Vec<IVec2>, MovementError> {
    let numbers: Vec<&str> = text.split_whitespace().collect();
    if numbers.len() % 2 != 0 {
        return Err(MovementError::MalformedTrajectory {
            index: numbers.len() / 2,
            entry: numbers.last().copied().unwrap_or_default().to_string(),
        });
    }

    let trajectory = numbers
        .chunks(2)
        .enumerate()
        .map(|(index, pair)| {
            let malformed = || MovementError::MalformedTrajectory {
                index,
                entry: pair.join(" "),
            };
            let dx = pair[0].parse::<i32>().map_err(|_| malformed())?;
            let dy = pair[1].parse::<i32>().map_err(|_| malformed())?;
            Ok(IVec2::new(dx, dy))
        })
        .collect::<Result<Vec<_>, MovementError>>()?;

    check_trajectory(&trajectory)?;
    Ok(trajectory)
}

/// Все префиксные суммы траектории должны помещаться в i32
pub fn check_trajectory(trajectory: &[IVec2]) -> Result<(), MovementError> {
    let mut sum = IVec2::ZERO;
    for (index, step) in trajectory.iter().enumerate() {
        match (sum.x.checked_add(step.x), sum.y.checked_add(step.y)) {
            (Some(x), Some(y)) => sum = IVec2::new(x, y),
            _ => {
                return Err(MovementError::MalformedTrajectory {
                    index,
                    entry: format!("{} {} (offset overflows)", step.x, step.y),
                })
            }
        }
    }
    Ok(())
}

pub fn trajectory_to_string(trajectory: &[IVec2]) -> String {
    trajectory
        .iter()
        .map(|step| format!("{} {}", step.x, step.y))
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone)]
pub struct PixelMovement {
    trajectory: Vec<IVec2>,
    /// ms между шагами
    delay: u64,
    looping: bool,
    index: usize,
    origin: Vec2,
    cumulative: IVec2,
    next_move_date: u64,
}

impl Default for PixelMovement {
    fn default() -> Self {
        Self::with_checked(Vec::new(), 30)
    }
}

fn check_delay(delay_ms: u64) -> Result<u64, MovementError> {
    if delay_ms == 0 {
        return Err(MovementError::invalid("delay", "must be at least 1 ms"));
    }
    Ok(delay_ms)
}

impl PixelMovement {
    /// delay — ms между шагами, ≥ 1
    pub fn new(trajectory: Vec<IVec2>, delay: u64) -> Result<Self, MovementError> {
        let delay = check_delay(delay)?;
        check_trajectory(&trajectory)?;
        Ok(Self::with_checked(trajectory, delay))
    }

    fn with_checked(trajectory: Vec<IVec2>, delay: u64) -> Self {
        Self {
            trajectory,
            delay,
            looping: false,
            index: 0,
            origin: Vec2::ZERO,
            cumulative: IVec2::ZERO,
            next_move_date: 0,
        }
    }

    pub fn from_text(text: &str, delay: u64) -> Result<Self, MovementError> {
        Self::new(parse_trajectory(text)?, delay)
    }

    pub fn trajectory(&self) -> &[IVec2] {
        &self.trajectory
    }

    /// Новая траектория начинается с первого шага от текущей позиции
    pub(crate) fn set_trajectory(
        &mut self,
        trajectory: Vec<IVec2>,
        origin: Vec2,
    ) -> Result<(), MovementError> {
        check_trajectory(&trajectory)?;
        self.trajectory = trajectory;
        self.restart(origin);
        Ok(())
    }

    pub fn delay(&self) -> u64 {
        self.delay
    }

    pub fn set_delay(&mut self, delay_ms: u64) -> Result<(), MovementError> {
        self.delay = check_delay(delay_ms)?;
        Ok(())
    }

    pub fn is_loop(&self) -> bool {
        self.looping
    }

    pub fn set_loop(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Позиция, от которой считаются смещения текущего прохода
    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    fn restart(&mut self, origin: Vec2) {
        self.origin = origin;
        self.index = 0;
        self.cumulative = IVec2::ZERO;
    }

    pub(crate) fn on_start(&mut self, core: &mut MovementCore, now: u64) {
        self.restart(core.xy);
        // Первый шаг — сразу
        self.next_move_date = now;
    }

    pub(crate) fn shift_deadlines(&mut self, paused: u64) {
        self.next_move_date = self.next_move_date.saturating_add(paused);
    }

    pub(crate) fn update(&mut self, core: &mut MovementCore, ctx: &mut MovementContext) {
        core.touch(ctx.now);

        if self.trajectory.is_empty() {
            if !self.looping {
                core.finish();
            }
            return;
        }

        while ctx.now >= self.next_move_date && !core.finished {
            // Префиксные суммы проверены check_trajectory при установке траектории
            self.cumulative += self.trajectory[self.index];
            let candidate = self.origin + self.cumulative.as_vec2();
            if core.is_obstacle(ctx, candidate) {
                core.notify_obstacle_reached();
            } else {
                core.set_xy(candidate);
            }

            self.index += 1;
            self.next_move_date += self.delay;

            if self.index >= self.trajectory.len() {
                if self.looping {
                    // Новый проход: offset 0 снова относительно исходного origin
                    self.index = 0;
                    self.cumulative = IVec2::ZERO;
                    core.notify_changed();
                } else {
                    core.finish();
                }
            }
        }
    }
}
