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
use std::sync::Arc;

use crate::decode::DecodedBuffer;

/// A pull-based producer of planar audio for the mixer.
pub trait Source: Send {
    fn channel_count(&self) -> usize;

    /// Clears each output channel and fills it with up to `max_frames` frames.
    /// Returns the number of frames written; 0 means the source is exhausted.
    fn next_frames(&mut self, output: &mut [Vec<f32>], max_frames: usize) -> usize;

    /// Sets how many source frames are consumed per output frame.
    fn set_playback_rate(&mut self, _rate: f64) {}
}

/// A one-shot reader over a region of a shared decoded buffer.
pub struct BufferSource {
    buffer: Arc<DecodedBuffer>,
    position: f64,
    end: usize,
    playback_rate: f64,
}

impl BufferSource {
    /// Plays `length` frames starting at `offset`, clamped to the buffer.
    pub fn new(buffer: Arc<DecodedBuffer>, offset: usize, length: usize) -> Self {
        let offset = offset.min(buffer.length());
        let end = offset.saturating_add(length).min(buffer.length());
        Self {
            buffer,
            position: offset as f64,
            end,
            playback_rate: 1.0,
        }
    }

    /// Frames left at the current playback rate.
    pub fn remaining_frames(&self) -> usize {
        ((self.end as f64 - self.position).max(0.0) / self.playback_rate).ceil() as usize
    }
}

impl Source for BufferSource {
    fn channel_count(&self) -> usize {
        self.buffer.number_of_channels()
    }

    fn next_frames(&mut self, output: &mut [Vec<f32>], max_frames: usize) -> usize {
        for channel in output.iter_mut() {
            channel.clear();
        }

        let last = self.end.saturating_sub(1);
        let mut frames = 0;
        while frames < max_frames && self.position < self.end as f64 {
            let index = self.position as usize;
            let frac = (self.position - index as f64) as f32;
            let next = (index + 1).min(last);
            for (channel, out) in self.buffer.channels().iter().zip(output.iter_mut()) {
                let current = channel[index];
                out.push(current + (channel[next] - current) * frac);
            }
            self.position += self.playback_rate;
            frames += 1;
        }
        frames
    }

    fn set_playback_rate(&mut self, rate: f64) {
        if rate.is_finite() && rate > 0.0 {
            self.playback_rate = rate;
        }
    }
}
