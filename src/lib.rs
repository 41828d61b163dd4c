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
//! A pitch-shifting sample player: stream a sound, then play it across the
//! keyboard.
pub mod audio;
pub mod config;
pub mod decode;
pub mod dsp;
pub mod engine;
pub mod events;
pub mod fetch;
pub mod keyboard;
pub mod note;
pub mod progress;
pub mod sample;
pub mod session;
#[cfg(test)]
pub mod testutil;

pub use engine::{PlaybackEngine, Status};
pub use events::{EngineEvent, EventKind};
pub use sample::Sample;
