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
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

use super::{DecodeError, DecodedBuffer};

/// Input block size for the sinc resampler.
const INPUT_BLOCK_SIZE: usize = 1024;

/// Resamples a whole buffer to `target_rate`, keeping its channel layout.
///
/// The resampler's group delay is trimmed so the output is aligned with the
/// input and is exactly `ceil(length * ratio)` frames long.
pub fn resample(buffer: &DecodedBuffer, target_rate: u32) -> Result<DecodedBuffer, DecodeError> {
    let source_rate = buffer.sample_rate();
    if source_rate == target_rate {
        return Ok(buffer.clone());
    }

    let sinc_params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = target_rate as f64 / source_rate as f64;
    let num_channels = buffer.number_of_channels();

    let mut resampler =
        SincFixedIn::<f32>::new(ratio, 1.0, sinc_params, INPUT_BLOCK_SIZE, num_channels)
            .map_err(|_e| DecodeError::ResamplerSetup(source_rate, target_rate))?;

    let length = buffer.length();
    let expected = (length as f64 * ratio).ceil() as usize;
    let delay = resampler.output_delay();
    let mut scratch = resampler.output_buffer_allocate(true);
    let mut output = vec![Vec::with_capacity(expected + delay); num_channels];

    let mut position = 0;
    while position + INPUT_BLOCK_SIZE <= length {
        let input: Vec<&[f32]> = buffer
            .channels()
            .iter()
            .map(|channel| &channel[position..position + INPUT_BLOCK_SIZE])
            .collect();
        let (_, written) = resampler.process_into_buffer(&input, &mut scratch, None)?;
        push_planar(&mut output, &scratch, written);
        position += INPUT_BLOCK_SIZE;
    }

    if position < length {
        let input: Vec<&[f32]> = buffer
            .channels()
            .iter()
            .map(|channel| &channel[position..])
            .collect();
        let (_, written) =
            resampler.process_partial_into_buffer(Some(input.as_slice()), &mut scratch, None)?;
        push_planar(&mut output, &scratch, written);
    }

    // Flush the tail still held in the filter.
    while output.first().map(Vec::len).unwrap_or(0) < expected + delay {
        let (_, written) =
            resampler.process_partial_into_buffer(None::<&[&[f32]]>, &mut scratch, None)?;
        if written == 0 {
            break;
        }
        push_planar(&mut output, &scratch, written);
    }

    for channel in output.iter_mut() {
        channel.drain(..delay.min(channel.len()));
        channel.truncate(expected);
    }

    debug!(source_rate, target_rate, frames = expected, "Resampled sample");
    DecodedBuffer::new(output, target_rate)
}

fn push_planar(output: &mut [Vec<f32>], scratch: &[Vec<f32>], frames: usize) {
    for (out, chunk) in output.iter_mut().zip(scratch.iter()) {
        out.extend_from_slice(&chunk[..frames.min(chunk.len())]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{rms, sine};

    #[test]
    fn test_same_rate_is_identity() {
        let buffer = DecodedBuffer::new(vec![vec![0.5; 100]], 44100).unwrap();
        assert_eq!(resample(&buffer, 44100).unwrap(), buffer);
    }

    #[test]
    fn test_upsample_length_and_energy() {
        let input = sine(440.0, 0.5, 22050, 0.5);
        let buffer = DecodedBuffer::new(vec![input.clone(), input.clone()], 22050).unwrap();

        let output = resample(&buffer, 44100).unwrap();
        assert_eq!(output.sample_rate(), 44100);
        assert_eq!(output.number_of_channels(), 2);
        assert_eq!(output.length(), input.len() * 2);

        // Compare energy away from the edges.
        let input_rms = rms(&input[1000..10000]);
        let output_rms = rms(&output.channel(0)[2000..20000]);
        assert!(
            (input_rms - output_rms).abs() < 0.02,
            "input rms {} output rms {}",
            input_rms,
            output_rms
        );
    }

    #[test]
    fn test_downsample_short_buffer() {
        let buffer = DecodedBuffer::new(vec![vec![0.1; 300]], 48000).unwrap();
        let output = resample(&buffer, 44100).unwrap();
        assert_eq!(output.length(), (300.0f64 * 44100.0 / 48000.0).ceil() as usize);
    }
}
