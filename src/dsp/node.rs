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

use crate::audio::Source;

use super::{PitchParams, PitchShifter};

/// Runs a source through one pitch shifter per channel.
pub struct PitchShiftNode<S: Source> {
    source: S,
    params: Arc<PitchParams>,
    shifters: Vec<PitchShifter>,
    input: Vec<Vec<f32>>,
}

impl<S: Source> PitchShiftNode<S> {
    pub fn new(source: S, params: Arc<PitchParams>, window_frames: usize) -> Self {
        let channels = source.channel_count();
        Self {
            source,
            params,
            shifters: (0..channels)
                .map(|_| PitchShifter::new(window_frames))
                .collect(),
            input: vec![Vec::new(); channels],
        }
    }

    pub fn params(&self) -> &Arc<PitchParams> {
        &self.params
    }
}

impl<S: Source> Source for PitchShiftNode<S> {
    fn channel_count(&self) -> usize {
        self.shifters.len()
    }

    fn next_frames(&mut self, output: &mut [Vec<f32>], max_frames: usize) -> usize {
        self.source.set_playback_rate(self.params.source_speed());
        let ratio = self.params.shift_ratio();

        let frames = self.source.next_frames(&mut self.input, max_frames);
        for ((shifter, input), out) in self
            .shifters
            .iter_mut()
            .zip(self.input.iter())
            .zip(output.iter_mut())
        {
            out.clear();
            out.resize(frames, 0.0);
            shifter.process(&input[..frames.min(input.len())], out, ratio);
        }
        frames
    }
}
