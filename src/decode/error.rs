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

/// Errors produced while decoding or resampling a sample.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Audio format error: {0}")]
    Format(#[from] symphonia::core::errors::Error),

    #[error("No audio track found")]
    NoTrack,

    #[error("Decoded audio is empty")]
    Empty,

    #[error("Channel {channel} has {frames} frames, expected {expected}")]
    RaggedChannels {
        channel: usize,
        frames: usize,
        expected: usize,
    },

    #[error("Resampling failed: {0}Hz -> {1}Hz")]
    ResamplerSetup(u32, u32),

    #[error("Resampling failed: {0}")]
    Resample(#[from] rubato::ResampleError),
}
