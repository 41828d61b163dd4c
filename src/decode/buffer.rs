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
use super::DecodeError;

/// Fully decoded PCM audio in planar layout.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl DecodedBuffer {
    /// Builds a buffer from per-channel samples. Every channel must have the
    /// same length and there must be at least one frame.
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<DecodedBuffer, DecodeError> {
        let expected = channels.first().map(Vec::len).unwrap_or(0);
        if expected == 0 || sample_rate == 0 {
            return Err(DecodeError::Empty);
        }
        if let Some((channel, samples)) = channels
            .iter()
            .enumerate()
            .find(|(_, samples)| samples.len() != expected)
        {
            return Err(DecodeError::RaggedChannels {
                channel,
                frames: samples.len(),
                expected,
            });
        }
        Ok(DecodedBuffer {
            channels,
            sample_rate,
        })
    }

    /// Number of frames.
    pub fn length(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.length() as f64 / self.sample_rate as f64
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn number_of_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Converts seconds to a frame index, clamped to the buffer.
    pub fn frame_at(&self, seconds: f64) -> usize {
        let frame = (seconds.max(0.0) * self.sample_rate as f64).round() as usize;
        frame.min(self.length())
    }
}
