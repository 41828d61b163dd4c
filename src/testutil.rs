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
use std::{
    f32::consts::PI,
    io::Cursor,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use hound::{SampleFormat, WavSpec, WavWriter};

use crate::fetch::{FetchError, FetchResponse, Fetcher};

/// Wait for the given predicate to return true or fail.
#[inline]
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = SystemTime::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        let elapsed = start.elapsed().expect("System time error");
        if elapsed > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }
        thread::sleep(tick);
    }
}

/// Generate a sine wave.
pub fn sine(frequency: f32, amplitude: f32, sample_rate: u32, duration_seconds: f32) -> Vec<f32> {
    let sample_count = (sample_rate as f32 * duration_seconds) as usize;
    (0..sample_count)
        .map(|i| amplitude * (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin())
        .collect()
}

/// Calculate RMS (Root Mean Square) of a signal
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|&x| x * x).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Counts zero crossings, a cheap pitch estimate for pure tones.
pub fn zero_crossings(samples: &[f32]) -> usize {
    samples
        .windows(2)
        .filter(|pair| (pair[0] < 0.0) != (pair[1] < 0.0))
        .count()
}

/// Encodes planar f32 samples as an in-memory 32-bit float WAV file.
pub fn wav_bytes(channels: &[Vec<f32>], sample_rate: u32) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(
            &mut cursor,
            WavSpec {
                channels: channels.len() as u16,
                sample_rate,
                bits_per_sample: 32,
                sample_format: SampleFormat::Float,
            },
        )
        .unwrap();

        let frames = channels.first().map(Vec::len).unwrap_or(0);
        for frame in 0..frames {
            for channel in channels {
                writer.write_sample(channel[frame]).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// A fetcher that serves fixed bytes in fixed-size chunks, yielding to the
/// runtime between chunks.
pub struct MockFetcher {
    bytes: Vec<u8>,
    chunk_size: usize,
    advertise_length: bool,
    fail_after: Option<usize>,
    status: Option<u16>,
    calls: Arc<AtomicUsize>,
}

impl MockFetcher {
    pub fn new(bytes: Vec<u8>, chunk_size: usize) -> MockFetcher {
        MockFetcher {
            bytes,
            chunk_size: chunk_size.max(1),
            advertise_length: true,
            fail_after: None,
            status: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Omits the content length from responses.
    pub fn without_length(mut self) -> MockFetcher {
        self.advertise_length = false;
        self
    }

    /// Fails the body stream after this many chunks.
    pub fn failing_after(mut self, chunks: usize) -> MockFetcher {
        self.fail_after = Some(chunks);
        self
    }

    /// Rejects every fetch as if the server answered with `status`.
    pub fn responding_with_status(mut self, status: u16) -> MockFetcher {
        self.status = Some(status);
        self
    }

    /// Shared counter of fetch calls.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.status {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let mut chunks: Vec<Result<Vec<u8>, FetchError>> = self
            .bytes
            .chunks(self.chunk_size)
            .map(|chunk| Ok(chunk.to_vec()))
            .collect();
        if let Some(fail_after) = self.fail_after {
            chunks.truncate(fail_after);
            chunks.push(Err(FetchError::Stream("connection reset".to_string())));
        }

        let body = stream::iter(chunks)
            .then(|chunk| async move {
                tokio::task::yield_now().await;
                chunk
            })
            .boxed();

        Ok(FetchResponse {
            content_length: self.advertise_length.then_some(self.bytes.len() as u64),
            body,
        })
    }
}
