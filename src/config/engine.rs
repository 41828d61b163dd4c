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
use std::{path::Path, time::Duration};

use config::{Config, File};
use duration_string::DurationString;
use serde::Deserialize;

use super::{Audio, ConfigError};

const DEFAULT_SCHEDULE_AHEAD: Duration = Duration::ZERO;
const DEFAULT_PITCH_WINDOW: Duration = Duration::from_millis(40);

/// A YAML representation of the playback engine configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct EngineConfig {
    /// Logs every dispatched event at info level.
    #[serde(default)]
    debug_logging: bool,

    /// How far ahead of the output clock a voice is scheduled, e.g. "5ms".
    schedule_ahead: Option<String>,

    /// Crossfade window of the pitch processor, e.g. "40ms".
    pitch_window: Option<String>,

    /// Output configuration. When unset the engine runs without an output.
    audio: Option<Audio>,
}

impl EngineConfig {
    /// Creates a configuration that plays through the given output.
    pub fn new(audio: Option<Audio>) -> EngineConfig {
        EngineConfig {
            debug_logging: false,
            schedule_ahead: None,
            pitch_window: None,
            audio,
        }
    }

    /// Parses an engine configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<EngineConfig, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<EngineConfig>()?)
    }

    /// Enables or disables per-event logging.
    pub fn with_debug_logging(mut self, debug_logging: bool) -> EngineConfig {
        self.debug_logging = debug_logging;
        self
    }

    pub fn debug_logging(&self) -> bool {
        self.debug_logging
    }

    /// Returns the schedule-ahead offset (default: 0ms).
    pub fn schedule_ahead(&self) -> Result<Duration, ConfigError> {
        parse_duration("schedule_ahead", &self.schedule_ahead, DEFAULT_SCHEDULE_AHEAD)
    }

    /// Returns the pitch processor window (default: 40ms). Must be non-zero.
    pub fn pitch_window(&self) -> Result<Duration, ConfigError> {
        let window = parse_duration("pitch_window", &self.pitch_window, DEFAULT_PITCH_WINDOW)?;
        if window.is_zero() {
            return Err(ConfigError::Invalid {
                field: "pitch_window",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(window)
    }

    pub fn audio(&self) -> Option<&Audio> {
        self.audio.as_ref()
    }
}

fn parse_duration(
    field: &'static str,
    value: &Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        Some(value) => DurationString::from_string(value.clone())
            .map(Into::into)
            .map_err(|e| ConfigError::Duration {
                field,
                message: e.to_string(),
            }),
        None => Ok(default),
    }
}
