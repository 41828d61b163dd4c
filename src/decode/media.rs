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
use std::io::Cursor;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, warn};

use super::{AudioDecoder, DecodeError, DecodedBuffer};

/// Decodes WAV, MP3, FLAC, OGG and the other formats symphonia supports.
#[derive(Clone, Copy, Debug, Default)]
pub struct SymphoniaDecoder;

impl AudioDecoder for SymphoniaDecoder {
    fn decode(&self, bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedBuffer, DecodeError> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = extension {
            hint.with_extension(extension);
        }

        let probed = get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoTrack)?;
        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate;
        let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

        let mut channels: Vec<Vec<f32>> = Vec::new();
        let mut scratch: Option<AudioBuffer<f32>> = None;

        while let Some(packet) = next_packet(format_reader.as_mut(), decoder.as_mut())? {
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(err)) => {
                    warn!(err, "Skipping undecodable packet");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if sample_rate.is_none() {
                sample_rate = Some(decoded.spec().rate);
            }
            append_planar(&decoded, &mut scratch, &mut channels);
        }

        let sample_rate = sample_rate.ok_or(DecodeError::Empty)?;
        let buffer = DecodedBuffer::new(channels, sample_rate)?;
        debug!(
            frames = buffer.length(),
            channels = buffer.number_of_channels(),
            sample_rate,
            "Decoded sample"
        );
        Ok(buffer)
    }
}

/// Reads the next packet, resetting the decoder when the stream asks for it.
/// Returns `Ok(None)` at end of stream.
fn next_packet(
    format_reader: &mut dyn FormatReader,
    decoder: &mut dyn Decoder,
) -> Result<Option<Packet>, DecodeError> {
    loop {
        match format_reader.next_packet() {
            Ok(packet) => return Ok(Some(packet)),
            Err(SymphoniaError::ResetRequired) => decoder.reset(),
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None)
            }
            // Some demuxers report a truncated tail as a decode error.
            Err(SymphoniaError::DecodeError(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        }
    }
}

/// Converts a decoded packet to f32 and appends each plane to its channel.
fn append_planar(
    decoded: &AudioBufferRef,
    scratch: &mut Option<AudioBuffer<f32>>,
    channels: &mut Vec<Vec<f32>>,
) {
    let needs_alloc = scratch
        .as_ref()
        .is_none_or(|buf| buf.capacity() < decoded.capacity() || buf.spec() != decoded.spec());
    if needs_alloc {
        *scratch = Some(decoded.make_equivalent::<f32>());
    }
    let Some(buf) = scratch.as_mut() else {
        return;
    };
    decoded.convert(buf);

    let count = buf.spec().channels.count();
    if channels.len() < count {
        channels.resize_with(count, Vec::new);
    }
    for (index, channel) in channels.iter_mut().enumerate().take(count) {
        channel.extend_from_slice(buf.chan(index));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{sine, wav_bytes};

    #[test]
    fn test_decode_mono_wav() {
        let samples = sine(440.0, 0.5, 22050, 0.25);
        let bytes = wav_bytes(&[samples.clone()], 22050);

        let buffer = SymphoniaDecoder.decode(bytes, Some("wav")).unwrap();
        assert_eq!(buffer.sample_rate(), 22050);
        assert_eq!(buffer.number_of_channels(), 1);
        assert_eq!(buffer.length(), samples.len());

        let max_error = buffer
            .channel(0)
            .iter()
            .zip(samples.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        assert!(max_error < 1e-6, "max error {}", max_error);
    }

    #[test]
    fn test_decode_stereo_without_hint() {
        let left = vec![0.25f32; 1000];
        let right = vec![-0.25f32; 1000];
        let bytes = wav_bytes(&[left, right], 44100);

        let buffer = SymphoniaDecoder.decode(bytes, None).unwrap();
        assert_eq!(buffer.number_of_channels(), 2);
        assert_eq!(buffer.length(), 1000);
        assert!(buffer.channel(0).iter().all(|s| (s - 0.25).abs() < 1e-6));
        assert!(buffer.channel(1).iter().all(|s| (s + 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_decode_garbage() {
        let result = SymphoniaDecoder.decode(b"definitely not audio".to_vec(), Some("wav"));
        assert!(result.is_err());
    }
}
