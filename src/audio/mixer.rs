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
// Core audio mixing logic that can be used by both CPAL and test implementations
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::{CancelHandle, HostError, Source};

/// Identifies a scheduled voice.
pub type VoiceId = u64;

/// A voice handed to a host for playback.
pub struct ScheduledVoice {
    pub id: VoiceId,
    pub source: Box<dyn Source>,
    /// Output-clock time in seconds at which the first frame renders.
    pub start_time: f64,
    pub cancel_handle: CancelHandle,
    /// Receives `id` once the voice has ended or was cancelled.
    pub finished_tx: Sender<VoiceId>,
}

/// Represents an active audio source in the mixer
struct ActiveSource {
    id: VoiceId,
    source: Box<dyn Source>,
    /// Absolute output frame of the first rendered frame.
    start_frame: u64,
    /// Precomputed channel mappings: source_channel_index -> Vec<output_channel_index>
    channel_mappings: Vec<Vec<usize>>,
    cancel_handle: CancelHandle,
    finished_tx: Sender<VoiceId>,
    /// Reused planar block buffer.
    scratch: Vec<Vec<f32>>,
}

/// Core audio mixing logic that's independent of any audio backend
#[derive(Clone)]
pub struct AudioMixer {
    /// Active audio sources currently playing
    active_sources: Arc<Mutex<Vec<ActiveSource>>>,
    /// Voices scheduled by the control thread, picked up at the next block.
    pending_tx: Sender<ScheduledVoice>,
    pending_rx: Receiver<ScheduledVoice>,
    /// Frames rendered since the mixer was created; drives the output clock.
    current_frame: Arc<AtomicU64>,
    num_channels: u16,
    sample_rate: u32,
}

impl AudioMixer {
    /// Creates a new audio mixer
    pub fn new(num_channels: u16, sample_rate: u32) -> Self {
        let (pending_tx, pending_rx) = crossbeam_channel::unbounded();
        Self {
            active_sources: Arc::new(Mutex::new(Vec::new())),
            pending_tx,
            pending_rx,
            current_frame: Arc::new(AtomicU64::new(0)),
            num_channels: num_channels.max(1),
            sample_rate,
        }
    }

    /// Mono sources feed every output; otherwise channel i feeds output i.
    fn precompute_channel_mappings(source_channels: usize, num_channels: usize) -> Vec<Vec<usize>> {
        if source_channels == 1 {
            return vec![(0..num_channels).collect()];
        }
        (0..source_channels)
            .map(|channel| {
                if channel < num_channels {
                    vec![channel]
                } else {
                    Vec::new()
                }
            })
            .collect()
    }

    /// Queues a voice for the render thread.
    pub fn schedule(&self, voice: ScheduledVoice) -> Result<(), HostError> {
        self.pending_tx.send(voice).map_err(|_| HostError::Closed)
    }

    fn activate_pending(&self, sources: &mut Vec<ActiveSource>) {
        while let Ok(voice) = self.pending_rx.try_recv() {
            let source_channels = voice.source.channel_count();
            let start_frame = (voice.start_time.max(0.0) * self.sample_rate as f64).round() as u64;
            trace!(id = voice.id, start_frame, "Activating voice");
            sources.push(ActiveSource {
                id: voice.id,
                channel_mappings: Self::precompute_channel_mappings(
                    source_channels,
                    self.num_channels as usize,
                ),
                source: voice.source,
                start_frame,
                cancel_handle: voice.cancel_handle,
                finished_tx: voice.finished_tx,
                scratch: vec![Vec::new(); source_channels],
            });
        }
    }

    /// Mixes the next `num_frames` frames into `output` (interleaved) and
    /// advances the output clock.
    pub fn process_into_output(&self, output: &mut [f32], num_frames: usize) {
        let num_channels = self.num_channels as usize;
        let num_frames = num_frames.min(output.len() / num_channels);
        output.fill(0.0);

        let block_start = self.current_frame.load(Ordering::Acquire);
        let block_end = block_start + num_frames as u64;

        let mut sources = self.active_sources.lock();
        self.activate_pending(&mut sources);

        sources.retain_mut(|active| {
            if active.cancel_handle.is_cancelled() {
                debug!(id = active.id, "Voice cancelled");
                let _ = active.finished_tx.try_send(active.id);
                return false;
            }
            if active.start_frame >= block_end {
                return true;
            }

            // Late voices start at the top of the block.
            let offset = active.start_frame.saturating_sub(block_start) as usize;
            let wanted = num_frames - offset;
            let read = active.source.next_frames(&mut active.scratch, wanted);

            for (source_channel, outputs) in active.channel_mappings.iter().enumerate() {
                let Some(samples) = active.scratch.get(source_channel) else {
                    continue;
                };
                for (frame, sample) in samples.iter().take(read).enumerate() {
                    let base = (offset + frame) * num_channels;
                    for &out in outputs {
                        output[base + out] += *sample;
                    }
                }
            }

            if read < wanted {
                trace!(id = active.id, "Voice finished");
                let _ = active.finished_tx.try_send(active.id);
                return false;
            }
            true
        });
        drop(sources);

        self.current_frame.store(block_end, Ordering::Release);
    }

    /// Frames rendered so far.
    pub fn current_frame(&self) -> u64 {
        self.current_frame.load(Ordering::Acquire)
    }

    /// Output clock in seconds.
    pub fn current_time(&self) -> f64 {
        self.current_frame() as f64 / self.sample_rate as f64
    }

    /// Number of voices that are playing or waiting for their start time.
    pub fn active_count(&self) -> usize {
        self.active_sources.lock().len() + self.pending_rx.len()
    }

    /// Cancels everything, including voices not yet picked up.
    pub fn cancel_all(&self) {
        let mut sources = self.active_sources.lock();
        self.activate_pending(&mut sources);
        for source in sources.iter() {
            source.cancel_handle.cancel();
        }
    }

    /// Gets the number of output channels
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Gets the sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::BufferSource;
    use crate::decode::DecodedBuffer;

    fn voice(
        id: VoiceId,
        channels: Vec<Vec<f32>>,
        start_time: f64,
        finished_tx: &Sender<VoiceId>,
    ) -> (ScheduledVoice, CancelHandle) {
        let length = channels[0].len();
        let buffer = Arc::new(DecodedBuffer::new(channels, 10).unwrap());
        let cancel_handle = CancelHandle::new();
        (
            ScheduledVoice {
                id,
                source: Box::new(BufferSource::new(buffer, 0, length)),
                start_time,
                cancel_handle: cancel_handle.clone(),
                finished_tx: finished_tx.clone(),
            },
            cancel_handle,
        )
    }

    #[test]
    fn test_mono_fans_out() {
        let mixer = AudioMixer::new(2, 10);
        let (tx, rx) = crossbeam_channel::unbounded();
        mixer.schedule(voice(1, vec![vec![0.5, 0.8]], 0.0, &tx).0).unwrap();

        let mut output = vec![0.0; 6];
        mixer.process_into_output(&mut output, 3);
        assert_eq!(output, vec![0.5, 0.5, 0.8, 0.8, 0.0, 0.0]);
        assert_eq!(rx.try_recv(), Ok(1));
        assert_eq!(mixer.active_count(), 0);
    }

    #[test]
    fn test_multiple_source_mixing() {
        let mixer = AudioMixer::new(2, 10);
        let (tx, _rx) = crossbeam_channel::unbounded();
        mixer
            .schedule(voice(1, vec![vec![0.5], vec![0.3]], 0.0, &tx).0)
            .unwrap();
        mixer
            .schedule(voice(2, vec![vec![0.25], vec![0.125]], 0.0, &tx).0)
            .unwrap();

        let mut output = vec![0.0; 2];
        mixer.process_into_output(&mut output, 1);
        assert_eq!(output, vec![0.75, 0.425]);
    }

    #[test]
    fn test_sample_accurate_start() {
        let mixer = AudioMixer::new(1, 10);
        let (tx, rx) = crossbeam_channel::unbounded();
        // Frame 6, in the middle of the second block.
        mixer.schedule(voice(7, vec![vec![1.0; 3]], 0.6, &tx).0).unwrap();

        let mut output = vec![0.0; 4];
        mixer.process_into_output(&mut output, 4);
        assert_eq!(output, vec![0.0; 4]);
        assert!(rx.try_recv().is_err());

        mixer.process_into_output(&mut output, 4);
        assert_eq!(output, vec![0.0, 0.0, 1.0, 1.0]);

        mixer.process_into_output(&mut output, 4);
        assert_eq!(output, vec![1.0, 0.0, 0.0, 0.0]);
        assert_eq!(rx.try_recv(), Ok(7));
        assert_eq!(mixer.current_frame(), 12);
        assert!((mixer.current_time() - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_late_start_plays_immediately() {
        let mixer = AudioMixer::new(1, 10);
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut output = vec![0.0; 4];
        mixer.process_into_output(&mut output, 4);

        mixer.schedule(voice(1, vec![vec![1.0; 2]], 0.0, &tx).0).unwrap();
        mixer.process_into_output(&mut output, 4);
        assert_eq!(output, vec![1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_cancel() {
        let mixer = AudioMixer::new(1, 10);
        let (tx, rx) = crossbeam_channel::unbounded();
        let (scheduled, cancel_handle) = voice(3, vec![vec![1.0; 100]], 0.0, &tx);
        mixer.schedule(scheduled).unwrap();

        let mut output = vec![0.0; 4];
        mixer.process_into_output(&mut output, 4);
        assert_eq!(mixer.active_count(), 1);

        cancel_handle.cancel();
        mixer.process_into_output(&mut output, 4);
        assert_eq!(output, vec![0.0; 4]);
        assert_eq!(rx.try_recv(), Ok(3));
        assert_eq!(mixer.active_count(), 0);
    }

    #[test]
    fn test_cancel_all_reaches_pending() {
        let mixer = AudioMixer::new(1, 10);
        let (tx, rx) = crossbeam_channel::unbounded();
        mixer.schedule(voice(1, vec![vec![1.0; 100]], 5.0, &tx).0).unwrap();
        mixer.cancel_all();

        let mut output = vec![0.0; 4];
        mixer.process_into_output(&mut output, 4);
        assert_eq!(rx.try_recv(), Ok(1));
    }
}
