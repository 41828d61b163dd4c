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

/// Errors raised by audio hosts.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("No output device found with name {0}")]
    NoDevice(String),

    #[error("No default output device available")]
    NoDefaultDevice,

    #[error("Unsupported output sample format {0}")]
    UnsupportedFormat(String),

    #[error("Pitch processor could not be loaded: {0}")]
    ProcessorUnavailable(String),

    #[error("The audio output has shut down")]
    Closed,

    #[error("Audio host unavailable: {0}")]
    HostUnavailable(#[from] cpal::HostUnavailable),

    #[error("Unable to list devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("Unable to read device name: {0}")]
    DeviceName(#[from] cpal::DeviceNameError),

    #[error("Unable to query device configurations: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("Unable to query default output configuration: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
