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
//! Real-time pitch shifting.
//!
//! A [`PitchShiftNode`] sits between a [`Source`](crate::audio::Source) and the
//! mixer. It owns one [`PitchShifter`] per channel and reads its
//! [`PitchParams`] once per render block, so parameter writes from the control
//! thread take effect at the next block boundary.
mod node;
mod params;
mod pitch;

pub use self::node::PitchShiftNode;
pub use self::params::{AtomicF32, PitchParams};
pub use self::pitch::PitchShifter;
