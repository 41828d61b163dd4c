// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! Scaled progress values and a terminal progress bar.

/// Errors raised by progress reporting.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ProgressError {
    #[error("Progress must be between 0 and 1, got {0}")]
    OutOfRange(f64),

    #[error("Invalid progress scale {min}..{max}")]
    InvalidScale { min: f64, max: f64 },
}

/// Maps a stage's own [0, 1] progress onto a slice of an overall [0, 1] bar,
/// so several stages can share one bar.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressScale {
    min: f64,
    max: f64,
}

impl ProgressScale {
    pub fn new(min: f64, max: f64) -> Result<ProgressScale, ProgressError> {
        let in_unit = |value: f64| (0.0..=1.0).contains(&value);
        if !in_unit(min) || !in_unit(max) || min > max {
            return Err(ProgressError::InvalidScale { min, max });
        }
        Ok(ProgressScale { min, max })
    }

    /// The whole bar.
    pub fn full() -> ProgressScale {
        ProgressScale { min: 0.0, max: 1.0 }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Scales `progress` into `[min, max]`.
    pub fn scale(&self, progress: f64) -> Result<f64, ProgressError> {
        if !(0.0..=1.0).contains(&progress) {
            return Err(ProgressError::OutOfRange(progress));
        }
        Ok(self.min + (self.max - self.min) * progress)
    }

    /// Whether `progress` fills the overall bar.
    pub fn is_complete(&self, progress: f64) -> Result<bool, ProgressError> {
        Ok(self.scale(progress)? >= 1.0)
    }
}

impl Default for ProgressScale {
    fn default() -> Self {
        Self::full()
    }
}

/// Draws `[████░░░░] 42%` with `width` cells. Progress is clamped to [0, 1].
pub fn render_bar(progress: f64, width: usize) -> String {
    let progress = if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    };
    let filled = (progress * width as f64).round() as usize;
    format!(
        "[{}{}] {}%",
        "█".repeat(filled),
        "░".repeat(width - filled),
        (progress * 100.0).round() as u32
    )
}
