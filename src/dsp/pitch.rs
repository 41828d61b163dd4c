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
use std::f64::consts::PI;

/// Ratios this close to 1.0 pass audio through untouched.
const BYPASS_EPSILON: f32 = 1e-6;

/// A delay-line pitch shifter for one channel.
///
/// Two read taps sweep through a delay of up to `window` frames at a speed
/// that makes them read the input `ratio` times faster than it is written.
/// The taps are half a window apart and crossfaded with `sin²`/`cos²` gains
/// that sum to one, so each tap is silent at the moment its delay wraps.
///
/// Output length always equals input length. All buffers are allocated in
/// [`PitchShifter::new`]; [`PitchShifter::process`] does not allocate.
pub struct PitchShifter {
    delay_line: Vec<f32>,
    mask: usize,
    write_pos: usize,
    /// Position of the first tap in the sweep, in [0, 1).
    phase: f64,
    window: f64,
}

impl PitchShifter {
    /// Creates a shifter with a crossfade window of `window_frames` frames.
    pub fn new(window_frames: usize) -> Self {
        let window_frames = window_frames.max(2);
        let capacity = (window_frames + 4).next_power_of_two();
        Self {
            delay_line: vec![0.0; capacity],
            mask: capacity - 1,
            write_pos: 0,
            phase: 0.0,
            window: window_frames as f64,
        }
    }

    /// Window length in frames.
    pub fn window_frames(&self) -> usize {
        self.window as usize
    }

    /// Clears the delay line.
    pub fn reset(&mut self) {
        self.delay_line.fill(0.0);
        self.write_pos = 0;
        self.phase = 0.0;
    }

    /// Shifts `input` by `ratio` into `output`. Only the overlapping prefix of
    /// the two slices is processed.
    pub fn process(&mut self, input: &[f32], output: &mut [f32], ratio: f32) {
        let bypass = (ratio - 1.0).abs() < BYPASS_EPSILON || !ratio.is_finite() || ratio <= 0.0;
        let step = (1.0 - ratio as f64) / self.window;

        for (sample, out) in input.iter().zip(output.iter_mut()) {
            self.delay_line[self.write_pos] = *sample;

            if bypass {
                *out = *sample;
            } else {
                let second = (self.phase + 0.5).fract();
                let gain = (PI * self.phase).sin().powi(2);
                let first_tap = self.read(self.phase * self.window);
                let second_tap = self.read(second * self.window);
                *out = (gain * first_tap + (1.0 - gain) * second_tap) as f32;

                self.phase = (self.phase + step).rem_euclid(1.0);
            }

            self.write_pos = (self.write_pos + 1) & self.mask;
        }
    }

    /// Reads `delay` frames behind the write head with linear interpolation.
    fn read(&self, delay: f64) -> f64 {
        let position = self.write_pos as f64 - delay;
        let base = position.floor();
        let frac = position - base;
        let index = (base as i64).rem_euclid(self.delay_line.len() as i64) as usize;
        let current = self.delay_line[index] as f64;
        let next = self.delay_line[(index + 1) & self.mask] as f64;
        current + (next - current) * frac
    }
}
