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
use std::sync::atomic::{AtomicU32, Ordering};

/// Lock-free atomic f32 for real-time parameter updates.
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    #[inline]
    pub const fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

impl Default for AtomicF32 {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Automatable parameters of a pitch-shift node.
///
/// - `pitch` shifts pitch without changing duration.
/// - `tempo` changes duration without changing pitch.
/// - `rate` changes both, like varispeed playback.
///
/// All three are factors where 1.0 means unchanged. `pitch` takes any
/// positive ratio; `tempo` and `rate` are clamped to
/// [`PitchParams::MIN`]..=[`PitchParams::MAX`]. Non-finite or non-positive
/// values reset a parameter to 1.0.
#[derive(Debug)]
pub struct PitchParams {
    pitch: AtomicF32,
    tempo: AtomicF32,
    rate: AtomicF32,
}

impl PitchParams {
    /// Slowest tempo or rate.
    pub const MIN: f32 = 0.25;
    /// Fastest tempo or rate.
    pub const MAX: f32 = 4.0;

    pub fn new() -> Self {
        Self {
            pitch: AtomicF32::new(1.0),
            tempo: AtomicF32::new(1.0),
            rate: AtomicF32::new(1.0),
        }
    }

    pub fn pitch(&self) -> f32 {
        self.pitch.load()
    }

    pub fn set_pitch(&self, pitch: f32) {
        self.pitch.store(Self::positive(pitch));
    }

    pub fn tempo(&self) -> f32 {
        self.tempo.load()
    }

    pub fn set_tempo(&self, tempo: f32) {
        self.tempo.store(Self::clamp(tempo));
    }

    pub fn rate(&self) -> f32 {
        self.rate.load()
    }

    pub fn set_rate(&self, rate: f32) {
        self.rate.store(Self::clamp(rate));
    }

    /// How many source frames are consumed per output frame.
    pub fn source_speed(&self) -> f64 {
        self.rate() as f64 * self.tempo() as f64
    }

    /// The ratio the shifter applies after varispeed reading: reading at
    /// `rate * tempo` already raises pitch by that much, so only
    /// `pitch / tempo` is left to shift.
    pub fn shift_ratio(&self) -> f32 {
        self.pitch() / self.tempo()
    }

    fn positive(value: f32) -> f32 {
        if value.is_finite() && value > 0.0 {
            value
        } else {
            1.0
        }
    }

    fn clamp(value: f32) -> f32 {
        Self::positive(value).clamp(Self::MIN, Self::MAX)
    }
}

impl Default for PitchParams {
    fn default() -> Self {
        Self::new()
    }
}
