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
//! Turns fetched bytes into planar f32 audio at the output rate.
mod buffer;
mod error;
mod media;
mod resample;

pub use self::buffer::DecodedBuffer;
pub use self::error::DecodeError;
pub use self::media::SymphoniaDecoder;
pub use self::resample::resample;

/// Decodes a complete encoded file held in memory.
pub trait AudioDecoder: Send + Sync {
    /// `extension` is a format hint such as "wav" or "mp3".
    fn decode(&self, bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedBuffer, DecodeError>;
}

/// Extracts a lowercase file extension from a URL or path, ignoring any query
/// string or fragment.
pub fn extension_hint(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let (stem, extension) = file_name.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}
