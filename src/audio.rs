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
//! Audio output: the host abstraction, the mixer and its backends.
use std::{fmt, sync::Arc};

use tracing::info;

use crate::config;

mod cancel;
pub mod cpal;
mod error;
pub mod mixer;
pub mod mock;
mod source;
mod thread_priority;

pub use self::cancel::CancelHandle;
pub use self::error::HostError;
pub use self::mixer::{AudioMixer, ScheduledVoice, VoiceId};
pub use self::source::{BufferSource, Source};

/// A real-time audio graph the engine schedules voices on.
///
/// The host owns the output clock. All times are seconds on that clock.
pub trait AudioHost: fmt::Display + Send + Sync {
    /// Output sample rate. Decoded samples are resampled to this rate.
    fn sample_rate(&self) -> u32;

    fn num_channels(&self) -> u16;

    /// Current output clock time.
    fn current_time(&self) -> f64;

    /// Makes the pitch processor available for new voices.
    fn load_processor(&self) -> Result<(), HostError>;

    /// Hands a voice to the render thread.
    fn schedule(&self, voice: ScheduledVoice) -> Result<(), HostError>;

    /// Cancels every voice the host knows about.
    fn stop_all(&self);
}

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<cpal::DeviceInfo>, HostError> {
    cpal::list_devices()
}

/// Opens the host described by the configuration. Device names starting with
/// "mock" give an offline [`mock::MockHost`].
pub fn get_host(config: &config::Audio) -> Result<Arc<dyn AudioHost>, HostError> {
    let host: Arc<dyn AudioHost> = match config.device() {
        Some(device) if device.starts_with("mock") => Arc::new(mock::MockHost::new(
            device,
            config.channels(),
            config.sample_rate(),
        )),
        _ => Arc::new(cpal::CpalHost::get(config)?),
    };
    info!(host = %host, sample_rate = host.sample_rate(), "Audio host ready");
    Ok(host)
}
