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
//! The playback engine: streams and decodes a sample, then plays it at any
//! pitch relative to its root note.
//!
//! Control operations run on the caller's thread. Audio renders on the host's
//! thread; finished voices come back through a channel drained by a small
//! reaper thread, which updates the active-voice list and emits
//! `NotesChanged`.
//!
//! Events are always emitted with the state lock released. A reentrant
//! dispatch lock serializes "mutate, then emit" sections across threads so
//! listeners observe events in the order the state changed, while still
//! letting a listener call back into the engine.
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Weak,
    },
    thread,
};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, error, info, warn};

use crate::audio::{AudioHost, BufferSource, CancelHandle, ScheduledVoice, VoiceId};
use crate::config::EngineConfig;
use crate::decode::{AudioDecoder, DecodedBuffer, SymphoniaDecoder};
use crate::dsp::{PitchParams, PitchShiftNode};
use crate::events::{EngineEvent, EventBus, EventKind, ListenerId};
use crate::fetch::{Fetcher, SourceFetcher};
use crate::note::{parse_note, pitch_ratio, NoteParseError};
use crate::sample::Sample;

mod error;
mod loader;
mod trim;
mod voice;

pub use self::error::{EngineError, LoadError};
pub use self::trim::TrimWindow;
use self::voice::{ActiveVoices, Voice};

/// Where the engine is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// No audio host; every operation is a warning no-op.
    Disabled,
    /// No sample, or a sample whose audio has not been loaded.
    Unloaded,
    /// A fetch/decode is in flight.
    Loading,
    /// Audio is decoded and notes can be played.
    Ready,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Disabled => "disabled",
            Status::Unloaded => "unloaded",
            Status::Loading => "loading",
            Status::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Facts about the decoded buffer, as announced by `Loaded`.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedInfo {
    pub sample_id: String,
    /// Seconds.
    pub buffer_duration: f64,
    /// Frames.
    pub buffer_length: usize,
    pub sample_rate: u32,
    pub number_of_channels: usize,
}

impl LoadedInfo {
    fn new(sample_id: &str, buffer: &DecodedBuffer) -> LoadedInfo {
        LoadedInfo {
            sample_id: sample_id.to_string(),
            buffer_duration: buffer.duration(),
            buffer_length: buffer.length(),
            sample_rate: buffer.sample_rate(),
            number_of_channels: buffer.number_of_channels(),
        }
    }

    fn to_event(&self) -> EngineEvent {
        EngineEvent::Loaded {
            sample_id: self.sample_id.clone(),
            buffer_duration: self.buffer_duration,
            buffer_length: self.buffer_length,
            sample_rate: self.sample_rate,
            number_of_channels: self.number_of_channels,
        }
    }
}

/// A snapshot of one sounding voice.
#[derive(Clone, Debug, PartialEq)]
pub struct VoiceInfo {
    pub note: String,
    /// Output-clock seconds at which the voice starts rendering.
    pub start_time: f64,
    /// Current pitch ratio of the voice's processor.
    pub pitch: f32,
}

/// Per-sample state. Replaced wholesale when a different sample is assigned.
#[derive(Default)]
struct EngineState {
    sample: Option<Sample>,
    buffer: Option<Arc<DecodedBuffer>>,
    trim: TrimWindow,
    voices: ActiveVoices,
    loading_progress: f64,
    /// Sample id of the load currently in flight.
    in_flight: Option<String>,
}

impl EngineState {
    fn new(sample: Option<Sample>) -> EngineState {
        EngineState {
            sample,
            ..Default::default()
        }
    }
}

struct EngineInner {
    host: Option<Arc<dyn AudioHost>>,
    fetcher: Arc<dyn Fetcher>,
    decoder: Arc<dyn AudioDecoder>,
    /// Seconds added to the output clock when scheduling a voice.
    schedule_ahead: f64,
    /// Pitch processor window in seconds.
    pitch_window: f64,
    state: Mutex<EngineState>,
    /// Voices from replaced samples that may still be sounding.
    detached: Mutex<Vec<(VoiceId, CancelHandle)>>,
    dispatch: ReentrantMutex<()>,
    events: EventBus,
    /// Bumped on every sample assignment; loads from an older generation are stale.
    generation: AtomicU64,
    processor_ready: AtomicBool,
    next_voice_id: AtomicU64,
    finished_tx: Sender<VoiceId>,
}

impl EngineInner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Called by the reaper when the mixer reports a voice as done.
    fn finish_voice(&self, id: VoiceId) {
        let _order = self.dispatch.lock();
        let notes = {
            let mut state = self.state.lock();
            if !state.voices.remove(id) {
                self.detached.lock().retain(|(detached, _)| *detached != id);
                return;
            }
            state.voices.notes()
        };
        debug!(id, ?notes, "Voice finished");
        self.events.emit(EngineEvent::NotesChanged { notes });
    }
}

/// Plays one sample across the keyboard. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct PlaybackEngine {
    inner: Arc<EngineInner>,
}

impl PlaybackEngine {
    /// Creates an engine that fetches over HTTP or from files and decodes with
    /// symphonia. A `None` host puts the engine in disabled mode.
    pub fn new(
        sample: Option<Sample>,
        config: &EngineConfig,
        host: Option<Arc<dyn AudioHost>>,
    ) -> Result<PlaybackEngine, EngineError> {
        PlaybackEngine::with_io(
            sample,
            config,
            host,
            Arc::new(SourceFetcher::new()),
            Arc::new(SymphoniaDecoder),
        )
    }

    /// Creates an engine with explicit fetch and decode collaborators.
    pub fn with_io(
        sample: Option<Sample>,
        config: &EngineConfig,
        host: Option<Arc<dyn AudioHost>>,
        fetcher: Arc<dyn Fetcher>,
        decoder: Arc<dyn AudioDecoder>,
    ) -> Result<PlaybackEngine, EngineError> {
        let schedule_ahead = config.schedule_ahead()?.as_secs_f64();
        let pitch_window = config.pitch_window()?.as_secs_f64();
        let (finished_tx, finished_rx) = crossbeam_channel::unbounded();

        if host.is_none() {
            warn!("No audio host available, playback engine is disabled");
        }

        let inner = Arc::new(EngineInner {
            host,
            fetcher,
            decoder,
            schedule_ahead,
            pitch_window,
            state: Mutex::new(EngineState::new(sample)),
            detached: Mutex::new(Vec::new()),
            dispatch: ReentrantMutex::new(()),
            events: EventBus::new(config.debug_logging()),
            generation: AtomicU64::new(0),
            processor_ready: AtomicBool::new(false),
            next_voice_id: AtomicU64::new(1),
            finished_tx,
        });

        spawn_reaper(Arc::downgrade(&inner), finished_rx)?;
        Ok(PlaybackEngine { inner })
    }

    /// Plays `note` (e.g. "C#4") from the trim window, pitch-shifted relative
    /// to the sample's root pitch.
    ///
    /// Missing preconditions (no host, no sample, no decoded audio, processor
    /// not loaded, empty trim window) log a warning and return `Ok`. A
    /// malformed note is an error and emits nothing.
    pub fn play(&self, note: &str) -> Result<(), NoteParseError> {
        let inner = &self.inner;
        let Some(host) = inner.host.as_ref() else {
            warn!(note, "Cannot play note, playback engine is disabled");
            return Ok(());
        };

        let _order = inner.dispatch.lock();
        let (notes, start_time) = {
            let mut state = inner.state.lock();
            let Some(root_pitch) = state.sample.as_ref().map(Sample::root_pitch) else {
                warn!(note, "Cannot play note, no sample assigned");
                return Ok(());
            };
            let Some(buffer) = state.buffer.clone() else {
                warn!(note, "Cannot play note, sample not loaded");
                return Ok(());
            };
            if !inner.processor_ready.load(Ordering::SeqCst) {
                warn!(note, "Cannot play note, pitch processor not ready");
                return Ok(());
            }
            let (offset, length) = state.trim.frame_range(&buffer);
            if length == 0 {
                warn!(note, trim = ?state.trim, "Cannot play note, trim window is empty");
                return Ok(());
            }

            let midi = parse_note(note)?;
            let params = Arc::new(PitchParams::new());
            params.set_pitch(pitch_ratio(midi, root_pitch) as f32);

            let window_frames = (inner.pitch_window * host.sample_rate() as f64).round() as usize;
            let source = PitchShiftNode::new(
                BufferSource::new(buffer, offset, length),
                params.clone(),
                window_frames,
            );

            let id = inner.next_voice_id.fetch_add(1, Ordering::Relaxed);
            let cancel_handle = CancelHandle::new();
            let start_time = host.current_time() + inner.schedule_ahead;

            // Registered first so the reaper always finds it.
            state
                .voices
                .push(Voice::new(id, note, start_time, cancel_handle.clone(), params));

            if let Err(e) = host.schedule(ScheduledVoice {
                id,
                source: Box::new(source),
                start_time,
                cancel_handle,
                finished_tx: inner.finished_tx.clone(),
            }) {
                state.voices.remove(id);
                error!(note, err = %e, "Unable to schedule voice");
                return Ok(());
            }

            debug!(note, midi, id, start_time, offset, length, "Scheduled voice");
            (state.voices.notes(), start_time)
        };

        inner.events.emit(EngineEvent::NotesChanged { notes });
        inner.events.emit(EngineEvent::Play {
            note: note.to_string(),
            start_time,
        });
        Ok(())
    }

    /// Replaces both trim bounds at once and emits a single `TrimChanged`.
    pub fn set_trim(&self, start_ms: f64, end_ms: f64) {
        self.update_trim(|trim| *trim = TrimWindow::new(start_ms, end_ms));
    }

    /// Replaces the trim start. Emits `TrimChanged`.
    pub fn set_trim_start(&self, start_ms: f64) {
        self.update_trim(|trim| trim.set_start_ms(start_ms));
    }

    /// Replaces the trim end. Emits `TrimChanged`.
    pub fn set_trim_end(&self, end_ms: f64) {
        self.update_trim(|trim| trim.set_end_ms(end_ms));
    }

    fn update_trim<F: FnOnce(&mut TrimWindow)>(&self, update: F) {
        let _order = self.inner.dispatch.lock();
        let trim = {
            let mut state = self.inner.state.lock();
            update(&mut state.trim);
            state.trim
        };
        debug!(start_ms = trim.start_ms(), end_ms = trim.end_ms(), "Trim changed");
        self.inner.events.emit(EngineEvent::TrimChanged {
            trim_start_ms: trim.start_ms(),
            trim_end_ms: trim.end_ms(),
        });
    }

    /// Assigns a different sample (or none), discarding all per-sample state.
    /// Any load in flight becomes stale. Voices already sounding keep playing
    /// but leave the active list; if there were any, `NotesChanged` is emitted
    /// with an empty list.
    pub fn set_sample(&self, sample: Option<Sample>) {
        let _order = self.inner.dispatch.lock();
        let orphaned = {
            let mut state = self.inner.state.lock();
            // Bumped under the state lock so a load never pairs a new
            // generation with the previous sample.
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            let orphaned = state.voices.take_all();
            *state = EngineState::new(sample);
            orphaned
        };
        info!(
            sample = self.sample().as_ref().map(Sample::id),
            "Sample assigned"
        );

        if !orphaned.is_empty() {
            self.inner.detached.lock().extend(
                orphaned
                    .iter()
                    .map(|voice| (voice.id(), voice.cancel_handle().clone())),
            );
            self.inner
                .events
                .emit(EngineEvent::NotesChanged { notes: Vec::new() });
        }
    }

    /// Assigns `sample` and loads it.
    pub async fn load(&self, sample: Sample) -> Result<(), LoadError> {
        self.set_sample(Some(sample));
        self.load_sample().await
    }

    /// Stops every voice this engine started. Each one leaves the active list
    /// through the normal finished path.
    pub fn stop_all(&self) {
        let state = self.inner.state.lock();
        info!(voices = state.voices.len(), "Stopping all voices");
        state.voices.cancel_all();
        for (_, cancel_handle) in self.inner.detached.lock().iter() {
            cancel_handle.cancel();
        }
    }

    /// Registers a listener for one kind of event.
    pub fn subscribe<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(kind, listener)
    }

    /// Registers a listener for every event.
    pub fn subscribe_all<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe_all(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.events.unsubscribe(id)
    }

    pub fn status(&self) -> Status {
        if self.inner.host.is_none() {
            return Status::Disabled;
        }
        let state = self.inner.state.lock();
        if state.in_flight.is_some() {
            Status::Loading
        } else if state.buffer.is_some() {
            Status::Ready
        } else {
            Status::Unloaded
        }
    }

    /// Decoded duration in seconds, 0 when nothing is loaded.
    pub fn duration(&self) -> f64 {
        self.inner
            .state
            .lock()
            .buffer
            .as_ref()
            .map(|buffer| buffer.duration())
            .unwrap_or(0.0)
    }

    /// Length of the trim window in seconds.
    pub fn trimmed_duration(&self) -> f64 {
        self.inner.state.lock().trim.trimmed_duration()
    }

    pub fn is_playing(&self) -> bool {
        !self.inner.state.lock().voices.is_empty()
    }

    pub fn trim(&self) -> TrimWindow {
        self.inner.state.lock().trim
    }

    /// Last reported loading progress in [0, 1].
    pub fn loading_progress(&self) -> f64 {
        self.inner.state.lock().loading_progress
    }

    /// Note names currently sounding, oldest first.
    pub fn active_notes(&self) -> Vec<String> {
        self.inner.state.lock().voices.notes()
    }

    pub fn active_voices(&self) -> Vec<VoiceInfo> {
        self.inner
            .state
            .lock()
            .voices
            .iter()
            .map(|voice| VoiceInfo {
                note: voice.note().to_string(),
                start_time: voice.start_time(),
                pitch: voice.params().pitch(),
            })
            .collect()
    }

    pub fn sample(&self) -> Option<Sample> {
        self.inner.state.lock().sample.clone()
    }

    pub fn loaded_info(&self) -> Option<LoadedInfo> {
        let state = self.inner.state.lock();
        let sample = state.sample.as_ref()?;
        let buffer = state.buffer.as_ref()?;
        Some(LoadedInfo::new(sample.id(), buffer))
    }

    pub fn host(&self) -> Option<Arc<dyn AudioHost>> {
        self.inner.host.clone()
    }

    /// Fraction of the trim window a voice started at `start_time` has played,
    /// clamped to [0, 1]. `None` when disabled or the window is empty.
    pub fn playhead(&self, start_time: f64) -> Option<f64> {
        let host = self.inner.host.as_ref()?;
        let trimmed = self.trimmed_duration();
        if trimmed <= 0.0 {
            return None;
        }
        Some(((host.current_time() - start_time) / trimmed).clamp(0.0, 1.0))
    }
}

fn spawn_reaper(inner: Weak<EngineInner>, finished_rx: Receiver<VoiceId>) -> std::io::Result<()> {
    thread::Builder::new()
        .name("vibeshift-voices".to_string())
        .spawn(move || {
            while let Ok(id) = finished_rx.recv() {
                match inner.upgrade() {
                    Some(inner) => inner.finish_voice(id),
                    None => return,
                }
            }
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use ::config::{Config, File, FileFormat};
    use parking_lot::Mutex;

    use super::*;
    use crate::audio::mock::MockHost;
    use crate::fetch::FetchError;
    use crate::testutil::{eventually, sine, wav_bytes, zero_crossings, MockFetcher};

    const RATE: u32 = 8000;

    fn mock_host() -> Arc<MockHost> {
        Arc::new(MockHost::new("mock", 1, RATE))
    }

    fn sine_wav(seconds: f32) -> Vec<u8> {
        wav_bytes(&[sine(100.0, 0.5, RATE, seconds)], RATE)
    }

    fn gunshot() -> Sample {
        Sample::new("gunshot", "https://cdn.example.com/samples/gunshot.wav")
    }

    fn engine_with(
        sample: Option<Sample>,
        host: Option<Arc<MockHost>>,
        fetcher: MockFetcher,
        config: &EngineConfig,
    ) -> PlaybackEngine {
        PlaybackEngine::with_io(
            sample,
            config,
            host.map(|host| host as Arc<dyn AudioHost>),
            Arc::new(fetcher),
            Arc::new(SymphoniaDecoder),
        )
        .expect("engine")
    }

    fn record(engine: &PlaybackEngine) -> Arc<Mutex<Vec<EngineEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        engine.subscribe_all(move |event| sink.lock().push(event.clone()));
        events
    }

    async fn loaded_engine(host: &Arc<MockHost>, sample: Sample, seconds: f32) -> PlaybackEngine {
        let engine = engine_with(
            Some(sample),
            Some(host.clone()),
            MockFetcher::new(sine_wav(seconds), 4096),
            &EngineConfig::default(),
        );
        engine.load_sample().await.expect("load");
        engine
    }

    #[tokio::test]
    async fn test_load_reports_progress_then_trim_then_loaded() {
        let host = mock_host();
        let engine = engine_with(
            Some(gunshot()),
            Some(host.clone()),
            MockFetcher::new(sine_wav(1.0), 1024),
            &EngineConfig::default(),
        );
        let events = record(&engine);
        assert_eq!(engine.status(), Status::Unloaded);

        engine.load_sample().await.expect("load");

        let events = events.lock().clone();
        let progress: Vec<f64> = events
            .iter()
            .filter_map(|event| match event {
                EngineEvent::SampleLoadingProgress { progress } => Some(*progress),
                _ => None,
            })
            .collect();
        assert!(progress.len() > 1);
        assert!(progress.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(progress.last(), Some(&1.0));

        let tail = &events[events.len() - 2..];
        assert_eq!(
            tail[0],
            EngineEvent::TrimChanged {
                trim_start_ms: 0.0,
                trim_end_ms: 1000.0
            }
        );
        assert_eq!(
            tail[1],
            EngineEvent::Loaded {
                sample_id: "gunshot".to_string(),
                buffer_duration: 1.0,
                buffer_length: 8000,
                sample_rate: RATE,
                number_of_channels: 1,
            }
        );
        assert_eq!(
            events
                .iter()
                .filter(|event| event.kind() == EventKind::Loaded)
                .count(),
            1
        );

        assert_eq!(engine.status(), Status::Ready);
        assert_eq!(engine.duration(), 1.0);
        assert_eq!(engine.loading_progress(), 1.0);
        assert_eq!(engine.sample().and_then(|s| s.duration_ms()), Some(1000.0));
        assert_eq!(host.processor_loads(), 1);
    }

    #[tokio::test]
    async fn test_load_without_content_length_jumps_to_complete() {
        let engine = engine_with(
            Some(gunshot()),
            Some(mock_host()),
            MockFetcher::new(sine_wav(0.5), 512).without_length(),
            &EngineConfig::default(),
        );
        let events = record(&engine);

        engine.load_sample().await.expect("load");

        let progress: Vec<EngineEvent> = events
            .lock()
            .iter()
            .filter(|event| event.kind() == EventKind::SampleLoadingProgress)
            .cloned()
            .collect();
        assert_eq!(
            progress,
            vec![EngineEvent::SampleLoadingProgress { progress: 1.0 }]
        );
        assert_eq!(engine.status(), Status::Ready);
    }

    #[tokio::test]
    async fn test_concurrent_loads_fetch_once() {
        let fetcher = MockFetcher::new(sine_wav(0.5), 512);
        let calls = fetcher.calls();
        let engine = engine_with(
            Some(gunshot()),
            Some(mock_host()),
            fetcher,
            &EngineConfig::default(),
        );
        let events = record(&engine);

        let (first, second) = tokio::join!(engine.load_sample(), engine.load_sample());
        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            events
                .lock()
                .iter()
                .filter(|event| event.kind() == EventKind::Loaded)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_superseded_load_is_discarded() {
        let fetcher = MockFetcher::new(sine_wav(1.0), 256);
        let calls = fetcher.calls();
        let engine = engine_with(
            Some(gunshot()),
            Some(mock_host()),
            fetcher,
            &EngineConfig::default(),
        );
        let events = record(&engine);

        let replace = async {
            tokio::task::yield_now().await;
            engine.set_sample(Some(Sample::new("laser", "file:///samples/laser.wav")));
        };
        let (result, ()) = tokio::join!(engine.load_sample(), replace);

        assert!(result.is_ok());
        assert_eq!(engine.status(), Status::Unloaded);
        assert_eq!(engine.sample().map(|s| s.id().to_string()), Some("laser".to_string()));
        assert!(events.lock().iter().all(|event| !matches!(
            event.kind(),
            EventKind::Loaded | EventKind::TrimChanged | EventKind::LoadFailed
        )));

        engine.load_sample().await.expect("load");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(engine.loaded_info().map(|info| info.sample_id), Some("laser".to_string()));
    }

    #[tokio::test]
    async fn test_decode_failure_resets_and_emits_load_failed() {
        let fetcher = MockFetcher::new(vec![0x5a; 4096], 1024);
        let calls = fetcher.calls();
        let engine = engine_with(
            Some(gunshot()),
            Some(mock_host()),
            fetcher,
            &EngineConfig::default(),
        );
        let events = record(&engine);

        let result = engine.load_sample().await;
        assert!(matches!(result, Err(LoadError::Decode(_))));
        assert_eq!(engine.status(), Status::Unloaded);
        assert!(engine.loaded_info().is_none());

        let failed = events
            .lock()
            .iter()
            .filter(|event| event.kind() == EventKind::LoadFailed)
            .cloned()
            .collect::<Vec<_>>();
        assert_eq!(failed.len(), 1);
        assert!(matches!(
            &failed[0],
            EngineEvent::LoadFailed { sample_id, .. } if sample_id == "gunshot"
        ));

        // The in-flight guard was cleared, so a retry fetches again.
        assert!(engine.load_sample().await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stream_failure_fails_load() {
        let engine = engine_with(
            Some(gunshot()),
            Some(mock_host()),
            MockFetcher::new(sine_wav(1.0), 1024).failing_after(2),
            &EngineConfig::default(),
        );
        let events = record(&engine);

        let result = engine.load_sample().await;
        assert!(matches!(
            result,
            Err(LoadError::Fetch(FetchError::Stream(_)))
        ));
        assert_eq!(
            events.lock().last().map(EngineEvent::kind),
            Some(EventKind::LoadFailed)
        );
        assert_eq!(engine.loading_progress(), 0.0);
    }

    #[tokio::test]
    async fn test_error_status_fails_load() {
        let engine = engine_with(
            Some(gunshot()),
            Some(mock_host()),
            MockFetcher::new(sine_wav(0.25), 1024).responding_with_status(404),
            &EngineConfig::default(),
        );
        let events = record(&engine);

        let result = engine.load_sample().await;
        assert!(matches!(
            result,
            Err(LoadError::Fetch(FetchError::Status { status: 404, .. }))
        ));
        assert_eq!(engine.status(), Status::Unloaded);

        let failed = events
            .lock()
            .iter()
            .filter(|event| event.kind() == EventKind::LoadFailed)
            .cloned()
            .collect::<Vec<_>>();
        assert_eq!(failed.len(), 1);
        assert!(matches!(
            &failed[0],
            EngineEvent::LoadFailed { sample_id, message }
                if sample_id == "gunshot" && message.contains("404")
        ));
    }

    #[tokio::test]
    async fn test_processor_is_loaded_once() {
        let host = mock_host();
        host.fail_processor_loads(true);
        let engine = engine_with(
            Some(gunshot()),
            Some(host.clone()),
            MockFetcher::new(sine_wav(0.25), 1024),
            &EngineConfig::default(),
        );

        assert!(matches!(
            engine.load_sample().await,
            Err(LoadError::Host(_))
        ));
        assert_eq!(engine.status(), Status::Unloaded);

        host.fail_processor_loads(false);
        engine.load_sample().await.expect("load");
        engine.load(Sample::new("laser", "file:///samples/laser.wav")).await.expect("load");
        assert_eq!(host.processor_loads(), 2);
        assert_eq!(engine.status(), Status::Ready);
    }

    #[tokio::test]
    async fn test_disabled_engine_is_inert() {
        let fetcher = MockFetcher::new(sine_wav(0.25), 1024);
        let calls = fetcher.calls();
        let engine = engine_with(Some(gunshot()), None, fetcher, &EngineConfig::default());
        let events = record(&engine);

        assert_eq!(engine.status(), Status::Disabled);
        assert!(engine.load_sample().await.is_ok());
        assert!(engine.play("C4").is_ok());
        assert!(engine.playhead(0.0).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(events.lock().is_empty());
    }

    #[test]
    fn test_play_before_load_is_silent() {
        let host = mock_host();
        let engine = engine_with(
            Some(gunshot()),
            Some(host.clone()),
            MockFetcher::new(Vec::new(), 1),
            &EngineConfig::default(),
        );
        let events = record(&engine);

        assert!(engine.play("C4").is_ok());
        assert!(engine.play("Z9").is_ok());
        assert!(events.lock().is_empty());
        assert_eq!(host.active_voices(), 0);
        assert!(!engine.is_playing());
    }

    #[tokio::test]
    async fn test_play_rejects_malformed_note() {
        let host = mock_host();
        let engine = loaded_engine(&host, gunshot(), 0.5).await;
        let events = record(&engine);

        assert!(matches!(
            engine.play("Z9"),
            Err(NoteParseError::Malformed(_))
        ));
        assert!(events.lock().is_empty());
        assert!(!engine.is_playing());
        assert_eq!(host.active_voices(), 0);
    }

    #[tokio::test]
    async fn test_play_emits_notes_changed_before_play() {
        let host = mock_host();
        let engine = loaded_engine(&host, gunshot(), 1.0).await;
        let events = record(&engine);

        engine.play("C#4").expect("play");
        assert_eq!(
            events.lock().clone(),
            vec![
                EngineEvent::NotesChanged {
                    notes: vec!["C#4".to_string()]
                },
                EngineEvent::Play {
                    note: "C#4".to_string(),
                    start_time: 0.0
                },
            ]
        );
        assert!(engine.is_playing());
        assert_eq!(host.active_voices(), 1);
    }

    #[tokio::test]
    async fn test_retrigger_keeps_independent_voices() {
        let host = mock_host();
        let engine = loaded_engine(&host, gunshot(), 1.0).await;
        let events = record(&engine);

        engine.play("C4").expect("play");
        host.advance(4000);
        engine.play("C4").expect("play");
        assert_eq!(engine.active_notes(), vec!["C4", "C4"]);
        let starts: Vec<f64> = engine.active_voices().iter().map(|v| v.start_time).collect();
        assert_eq!(starts, vec![0.0, 0.5]);

        // The first voice runs out during this block.
        host.advance(5000);
        eventually(|| engine.active_notes() == vec!["C4"], "First C4 never finished");
        assert_eq!(engine.active_voices()[0].start_time, 0.5);

        host.advance(4000);
        eventually(|| !engine.is_playing(), "Second C4 never finished");

        let notes: Vec<Vec<String>> = events
            .lock()
            .iter()
            .filter_map(|event| match event {
                EngineEvent::NotesChanged { notes } => Some(notes.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            notes,
            vec![
                vec!["C4".to_string()],
                vec!["C4".to_string(), "C4".to_string()],
                vec!["C4".to_string()],
                vec![],
            ]
        );
    }

    #[tokio::test]
    async fn test_voices_keep_their_own_pitch() {
        let host = mock_host();
        let engine = loaded_engine(&host, gunshot(), 1.0).await;

        engine.play("C5").expect("play");
        engine.play("C4").expect("play");
        let pitches: Vec<f32> = engine.active_voices().iter().map(|v| v.pitch).collect();
        assert_eq!(pitches, vec![2.0, 1.0]);
        engine.stop_all();
        host.advance(1);
        eventually(|| !engine.is_playing(), "Voices never stopped");

        // An octave up doubles the zero crossings of the 100 Hz source.
        engine.play("C5").expect("play");
        let rendered = host.advance(6000);
        let crossings = zero_crossings(&rendered[800..4800]);
        assert!(
            (170..=240).contains(&crossings),
            "expected ~200 crossings, got {}",
            crossings
        );
    }

    #[tokio::test]
    async fn test_pitch_ratio_is_not_limited_to_two_octaves() {
        let host = mock_host();
        let engine = loaded_engine(&host, gunshot(), 1.0).await;

        engine.play("C7").expect("play");
        engine.play("C1").expect("play");
        let pitches: Vec<f32> = engine.active_voices().iter().map(|v| v.pitch).collect();
        assert_eq!(pitches, vec![8.0, 0.125]);

        // Both still render for the whole trim window.
        host.advance(8001);
        eventually(|| !engine.is_playing(), "Voices never finished");
    }

    #[tokio::test]
    async fn test_set_trim_emits_once() {
        let host = mock_host();
        let engine = loaded_engine(&host, gunshot(), 4.0).await;
        let events = record(&engine);

        engine.set_trim(500.0, 2500.0);
        assert_eq!(engine.trim(), TrimWindow::new(500.0, 2500.0));
        assert_eq!(
            events.lock().clone(),
            vec![EngineEvent::TrimChanged {
                trim_start_ms: 500.0,
                trim_end_ms: 2500.0
            }]
        );

        engine.set_trim_start(1000.0);
        engine.set_trim_end(3000.0);
        assert_eq!(events.lock().len(), 3);
        assert_eq!(engine.trimmed_duration(), 2.0);
    }

    #[tokio::test]
    async fn test_persisted_trim_is_applied_on_load() {
        let host = mock_host();
        let sample = gunshot().with_trim(Some(500.0), Some(2500.0));
        let engine = loaded_engine(&host, sample, 4.0).await;

        assert_eq!(engine.trimmed_duration(), 2.0);
        assert_eq!(engine.trim(), TrimWindow::new(500.0, 2500.0));

        // Only the trimmed region is played.
        engine.play("C4").expect("play");
        host.advance(15999);
        assert!(engine.is_playing());
        host.advance(2);
        eventually(|| !engine.is_playing(), "Trimmed voice never finished");
    }

    #[tokio::test]
    async fn test_play_with_empty_trim_is_silent() {
        let host = mock_host();
        let engine = loaded_engine(&host, gunshot(), 1.0).await;
        engine.set_trim(400.0, 400.0);
        let events = record(&engine);

        assert!(engine.play("C4").is_ok());
        assert!(events.lock().is_empty());
        assert!(engine.playhead(0.0).is_none());
    }

    #[tokio::test]
    async fn test_schedule_ahead_offsets_start_time() {
        let config: EngineConfig = Config::builder()
            .add_source(File::from_str("schedule_ahead: 25ms", FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        let host = mock_host();
        let engine = engine_with(
            Some(gunshot()),
            Some(host.clone()),
            MockFetcher::new(sine_wav(1.0), 4096),
            &config,
        );
        engine.load_sample().await.expect("load");
        let events = record(&engine);

        host.advance(800);
        engine.play("A4").expect("play");
        let start_time = match events.lock().last() {
            Some(EngineEvent::Play { start_time, .. }) => *start_time,
            other => panic!("expected a play event, got {:?}", other),
        };
        assert!((start_time - 0.125).abs() < 1e-9);

        host.advance(200);
        assert!(engine.playhead(start_time).unwrap() < 1e-6);
        host.advance(4000);
        assert!((engine.playhead(start_time).unwrap() - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_set_sample_detaches_sounding_voices() {
        let host = mock_host();
        let engine = loaded_engine(&host, gunshot(), 1.0).await;
        engine.play("E4").expect("play");
        let events = record(&engine);

        engine.set_sample(Some(Sample::new("laser", "file:///samples/laser.wav")));
        assert_eq!(
            events.lock().clone(),
            vec![EngineEvent::NotesChanged { notes: vec![] }]
        );
        assert!(!engine.is_playing());
        assert_eq!(engine.status(), Status::Unloaded);
        assert_eq!(engine.duration(), 0.0);
        assert_eq!(host.active_voices(), 1);

        // Still reachable by stop_all, and its end is not reported again.
        engine.stop_all();
        host.advance(1);
        eventually(|| host.active_voices() == 0, "Detached voice never stopped");
        eventually(
            || engine.inner.detached.lock().is_empty(),
            "Detached voice never pruned",
        );
        assert_eq!(events.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_stop_all_clears_voices() {
        let host = mock_host();
        let engine = loaded_engine(&host, gunshot(), 1.0).await;
        engine.play("C4").expect("play");
        engine.play("G4").expect("play");
        host.advance(100);

        engine.stop_all();
        host.advance(100);
        eventually(|| !engine.is_playing(), "Voices never stopped");
        assert_eq!(host.active_voices(), 0);
    }

    #[tokio::test]
    async fn test_listeners_can_read_engine_state() {
        let host = mock_host();
        let engine = loaded_engine(&host, gunshot(), 1.0).await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let (sink, reader) = (seen.clone(), engine.clone());
        let id = engine.subscribe(EventKind::NotesChanged, move |_| {
            sink.lock().push(reader.active_notes());
        });

        engine.play("D4").expect("play");
        assert_eq!(seen.lock().clone(), vec![vec!["D4".to_string()]]);

        assert!(engine.unsubscribe(id));
        engine.play("D4").expect("play");
        assert_eq!(seen.lock().len(), 1);
    }
}
