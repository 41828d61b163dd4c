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
//! Fetching and decoding the assigned sample.
use std::sync::{atomic::Ordering, Arc};

use futures_util::StreamExt;
use tracing::{debug, error, info, span, warn, Instrument, Level};

use super::{LoadError, LoadedInfo, PlaybackEngine, TrimWindow};
use crate::audio::AudioHost;
use crate::decode::{extension_hint, resample, DecodeError, DecodedBuffer};
use crate::events::EngineEvent;
use crate::sample::Sample;

/// Upper bound on the byte buffer reserved up front from a content length.
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

impl PlaybackEngine {
    /// Fetches and decodes the assigned sample.
    ///
    /// Emits `sampleLoadingProgress` as bytes arrive, then `trimChanged` and
    /// `loaded` on success or `loadFailed` on failure. A second call while a
    /// load of the same sample is in flight does nothing. A load superseded by
    /// [`PlaybackEngine::set_sample`] stops quietly and returns `Ok`.
    pub async fn load_sample(&self) -> Result<(), LoadError> {
        let Some(host) = self.inner.host.clone() else {
            warn!("Cannot load sample, playback engine is disabled");
            return Ok(());
        };

        let (sample, generation) = {
            let mut state = self.inner.state.lock();
            let Some(sample) = state.sample.clone() else {
                warn!("Cannot load sample, no sample assigned");
                return Ok(());
            };
            if state.in_flight.as_deref() == Some(sample.id()) {
                debug!(sample = sample.id(), "Sample load already in flight");
                return Ok(());
            }
            state.in_flight = Some(sample.id().to_string());
            state.loading_progress = 0.0;
            (sample, self.inner.generation.load(Ordering::SeqCst))
        };

        let span = span!(Level::INFO, "load sample", sample = sample.id(), generation);
        async {
            info!(url = sample.source_url(), "Loading sample");
            match self.fetch_and_decode(&host, &sample, generation).await {
                Ok(Some(buffer)) => {
                    self.finish_load(generation, &sample, buffer);
                    Ok(())
                }
                Ok(None) => {
                    debug!("Sample load superseded");
                    Ok(())
                }
                Err(e) => self.fail_load(generation, &sample, e),
            }
        }
        .instrument(span)
        .await
    }

    /// Returns `None` if the load went stale along the way.
    async fn fetch_and_decode(
        &self,
        host: &Arc<dyn AudioHost>,
        sample: &Sample,
        generation: u64,
    ) -> Result<Option<DecodedBuffer>, LoadError> {
        let inner = &self.inner;
        if !inner.processor_ready.load(Ordering::SeqCst) {
            host.load_processor()?;
            inner.processor_ready.store(true, Ordering::SeqCst);
            info!(host = %host, "Pitch processor loaded");
        }

        let response = inner.fetcher.fetch(sample.source_url()).await?;
        let total = response.content_length.filter(|length| *length > 0);
        let mut bytes =
            Vec::with_capacity(total.map(|length| length.min(MAX_PREALLOCATION)).unwrap_or(0) as usize);

        let mut body = response.body;
        while let Some(chunk) = body.next().await {
            if !inner.is_current(generation) {
                return Ok(None);
            }
            bytes.extend_from_slice(&chunk?);
            if let Some(total) = total {
                self.report_progress(generation, (bytes.len() as f64 / total as f64).min(1.0));
            }
        }
        if !inner.is_current(generation) {
            return Ok(None);
        }
        if self.loading_progress() < 1.0 {
            self.report_progress(generation, 1.0);
        }
        debug!(bytes = bytes.len(), "Sample fetched");

        let decoder = inner.decoder.clone();
        let extension = extension_hint(sample.source_url());
        let target_rate = host.sample_rate();
        let buffer = tokio::task::spawn_blocking(move || -> Result<DecodedBuffer, DecodeError> {
            let decoded = decoder.decode(bytes, extension.as_deref())?;
            if decoded.sample_rate() == target_rate {
                Ok(decoded)
            } else {
                resample(&decoded, target_rate)
            }
        })
        .await
        .map_err(|e| LoadError::Task(e.to_string()))??;

        Ok(Some(buffer))
    }

    fn report_progress(&self, generation: u64, progress: f64) {
        let _order = self.inner.dispatch.lock();
        {
            let mut state = self.inner.state.lock();
            if !self.inner.is_current(generation) {
                return;
            }
            state.loading_progress = progress;
        }
        self.inner
            .events
            .emit(EngineEvent::SampleLoadingProgress { progress });
    }

    fn finish_load(&self, generation: u64, sample: &Sample, buffer: DecodedBuffer) {
        let _order = self.inner.dispatch.lock();
        let (trim, loaded) = {
            let mut state = self.inner.state.lock();
            if !self.inner.is_current(generation) {
                debug!("Discarding decoded sample from a superseded load");
                return;
            }

            let duration_ms = buffer.duration() * 1000.0;
            let trim = TrimWindow::resolve(sample.trim_start(), sample.trim_end(), duration_ms);
            if let Some(current) = state.sample.as_mut() {
                current.fill_duration_ms(duration_ms);
            }
            let loaded = LoadedInfo::new(sample.id(), &buffer);

            state.trim = trim;
            state.buffer = Some(Arc::new(buffer));
            state.in_flight = None;
            state.loading_progress = 1.0;
            (trim, loaded)
        };

        self.inner.events.emit(EngineEvent::TrimChanged {
            trim_start_ms: trim.start_ms(),
            trim_end_ms: trim.end_ms(),
        });
        self.inner.events.emit(loaded.to_event());
        info!(
            duration = loaded.buffer_duration,
            frames = loaded.buffer_length,
            sample_rate = loaded.sample_rate,
            channels = loaded.number_of_channels,
            "Sample loaded"
        );
    }

    fn fail_load(&self, generation: u64, sample: &Sample, err: LoadError) -> Result<(), LoadError> {
        let _order = self.inner.dispatch.lock();
        {
            let mut state = self.inner.state.lock();
            if !self.inner.is_current(generation) {
                debug!(err = %err, "Ignoring failure of a superseded load");
                return Ok(());
            }
            state.buffer = None;
            state.in_flight = None;
            state.loading_progress = 0.0;
        }

        error!(err = %err, "Unable to load sample");
        self.inner.events.emit(EngineEvent::LoadFailed {
            sample_id: sample.id().to_string(),
            message: err.to_string(),
        });
        Err(err)
    }
}
