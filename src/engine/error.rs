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
use crate::audio::HostError;
use crate::decode::DecodeError;
use crate::fetch::FetchError;

/// Reasons a load attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Unable to fetch sample: {0}")]
    Fetch(#[from] FetchError),

    #[error("Unable to decode sample: {0}")]
    Decode(#[from] DecodeError),

    #[error("Audio host error: {0}")]
    Host(#[from] HostError),

    #[error("Decode task failed: {0}")]
    Task(String),
}

/// Reasons an engine could not be constructed.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid engine configuration: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Unable to start voice reaper: {0}")]
    Io(#[from] std::io::Error),
}
