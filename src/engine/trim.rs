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
use crate::decode::DecodedBuffer;

/// The playable region of a sample, in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TrimWindow {
    start_ms: f64,
    end_ms: f64,
}

impl TrimWindow {
    /// Creates a window as given. Bounds are not validated; callers setting
    /// the window directly are expected to keep `start_ms < end_ms`.
    pub fn new(start_ms: f64, end_ms: f64) -> TrimWindow {
        TrimWindow { start_ms, end_ms }
    }

    /// Resolves persisted trim values against a decoded duration: each bound is
    /// clamped into `[0, duration_ms]`, and an empty or inverted result falls
    /// back to the whole sample.
    pub fn resolve(start_ms: Option<f64>, end_ms: Option<f64>, duration_ms: f64) -> TrimWindow {
        let clamp = |ms: f64| {
            if ms.is_finite() {
                ms.clamp(0.0, duration_ms)
            } else {
                0.0
            }
        };
        let start = start_ms.map(clamp).unwrap_or(0.0);
        let end = end_ms.map(clamp).unwrap_or(duration_ms);

        if start < end {
            TrimWindow::new(start, end)
        } else {
            TrimWindow::new(0.0, duration_ms)
        }
    }

    pub fn start_ms(&self) -> f64 {
        self.start_ms
    }

    pub fn end_ms(&self) -> f64 {
        self.end_ms
    }

    pub fn set_start_ms(&mut self, start_ms: f64) {
        self.start_ms = start_ms;
    }

    pub fn set_end_ms(&mut self, end_ms: f64) {
        self.end_ms = end_ms;
    }

    /// Length of the window in seconds, never negative.
    pub fn trimmed_duration(&self) -> f64 {
        (self.end_ms / 1000.0 - self.start_ms / 1000.0).max(0.0)
    }

    /// The window as a `(offset, length)` frame range within `buffer`.
    pub fn frame_range(&self, buffer: &DecodedBuffer) -> (usize, usize) {
        let offset = buffer.frame_at(self.start_ms / 1000.0);
        let end = buffer.frame_at(self.end_ms / 1000.0);
        (offset, end.saturating_sub(offset))
    }
}
