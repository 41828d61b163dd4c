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
    fmt,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use parking_lot::Mutex;
use tracing::{debug, span, Level};

use super::{AudioHost, AudioMixer, HostError, ScheduledVoice};

/// A mock host. Renders only when told to, and keeps everything it rendered.
pub struct MockHost {
    name: String,
    mixer: AudioMixer,
    rendered: Mutex<Vec<f32>>,
    fail_processor: AtomicBool,
    processor_loads: AtomicUsize,
}

impl MockHost {
    /// Gets the given mock host.
    pub fn new(name: &str, num_channels: u16, sample_rate: u32) -> MockHost {
        MockHost {
            name: name.to_string(),
            mixer: AudioMixer::new(num_channels, sample_rate),
            rendered: Mutex::new(Vec::new()),
            fail_processor: AtomicBool::new(false),
            processor_loads: AtomicUsize::new(0),
        }
    }

    /// Makes subsequent processor loads fail.
    pub fn fail_processor_loads(&self, fail: bool) {
        self.fail_processor.store(fail, Ordering::Relaxed);
    }

    /// How many times the processor was loaded.
    pub fn processor_loads(&self) -> usize {
        self.processor_loads.load(Ordering::Relaxed)
    }

    /// Renders `frames` frames and returns them interleaved.
    pub fn advance(&self, frames: usize) -> Vec<f32> {
        let span = span!(Level::TRACE, "render (mock)");
        let _enter = span.enter();

        let mut block = vec![0.0; frames * self.mixer.num_channels() as usize];
        self.mixer.process_into_output(&mut block, frames);
        self.rendered.lock().extend_from_slice(&block);
        block
    }

    /// Everything rendered so far, interleaved.
    pub fn rendered(&self) -> Vec<f32> {
        self.rendered.lock().clone()
    }

    /// One channel of everything rendered so far.
    pub fn rendered_channel(&self, channel: usize) -> Vec<f32> {
        let num_channels = self.mixer.num_channels() as usize;
        self.rendered
            .lock()
            .iter()
            .skip(channel)
            .step_by(num_channels)
            .copied()
            .collect()
    }

    /// Voices playing or waiting to start.
    pub fn active_voices(&self) -> usize {
        self.mixer.active_count()
    }
}

impl fmt::Display for MockHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Channels={}) (Mock)", self.name, self.mixer.num_channels())
    }
}

impl AudioHost for MockHost {
    fn sample_rate(&self) -> u32 {
        self.mixer.sample_rate()
    }

    fn num_channels(&self) -> u16 {
        self.mixer.num_channels()
    }

    fn current_time(&self) -> f64 {
        self.mixer.current_time()
    }

    fn load_processor(&self) -> Result<(), HostError> {
        self.processor_loads.fetch_add(1, Ordering::Relaxed);
        if self.fail_processor.load(Ordering::Relaxed) {
            return Err(HostError::ProcessorUnavailable(format!(
                "{} refused the processor",
                self.name
            )));
        }
        Ok(())
    }

    fn schedule(&self, voice: ScheduledVoice) -> Result<(), HostError> {
        debug!(host = self.name, id = voice.id, start_time = voice.start_time, "Scheduling voice");
        self.mixer.schedule(voice)
    }

    fn stop_all(&self) {
        self.mixer.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::audio::{BufferSource, CancelHandle};
    use crate::decode::DecodedBuffer;

    #[test]
    fn test_render_and_clock() {
        let host = MockHost::new("mock", 2, 100);
        let (tx, rx) = crossbeam_channel::unbounded();
        let buffer = Arc::new(DecodedBuffer::new(vec![vec![0.5; 30]], 100).unwrap());

        host.schedule(ScheduledVoice {
            id: 9,
            source: Box::new(BufferSource::new(buffer, 0, 30)),
            start_time: 0.1,
            cancel_handle: CancelHandle::new(),
            finished_tx: tx,
        })
        .unwrap();
        assert_eq!(host.active_voices(), 1);

        host.advance(50);
        assert!((host.current_time() - 0.5).abs() < 1e-9);
        assert_eq!(rx.try_recv(), Ok(9));

        let left = host.rendered_channel(0);
        assert_eq!(left.len(), 50);
        assert!(left[..10].iter().all(|s| *s == 0.0));
        assert!(left[10..40].iter().all(|s| *s == 0.5));
        assert!(left[40..].iter().all(|s| *s == 0.0));
        assert_eq!(host.rendered_channel(1), left);
    }

    #[test]
    fn test_processor_failure() {
        let host = MockHost::new("mock", 2, 100);
        assert!(host.load_processor().is_ok());
        host.fail_processor_loads(true);
        assert!(matches!(
            host.load_processor(),
            Err(HostError::ProcessorUnavailable(_))
        ));
        assert_eq!(host.processor_loads(), 2);
    }
}
