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
use std::path::Path;

use config::{Config, File};
use serde::{de, Deserialize, Deserializer, Serialize};

use crate::config::ConfigError;
use crate::note::{DEFAULT_ROOT_PITCH, MAX_MIDI_NOTE};

fn default_root_pitch() -> u8 {
    DEFAULT_ROOT_PITCH
}

fn deserialize_root_pitch<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let root_pitch = u8::deserialize(deserializer)?;
    if root_pitch > MAX_MIDI_NOTE {
        return Err(de::Error::custom(format!(
            "root pitch {root_pitch} is outside 0-{MAX_MIDI_NOTE}"
        )));
    }
    Ok(root_pitch)
}

/// A reference to a stored sound that the engine can stream, decode and play.
///
/// Field aliases accept the column names used by the sample library.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Sample {
    /// Opaque unique identifier.
    id: String,

    /// Where the raw audio bytes are fetched from (http(s) URL, file URL or path).
    #[serde(alias = "public_url", alias = "sourceUrl")]
    source_url: String,

    /// The MIDI note the sample was recorded at.
    #[serde(
        alias = "root_midi",
        alias = "rootPitch",
        default = "default_root_pitch",
        deserialize_with = "deserialize_root_pitch"
    )]
    root_pitch: u8,

    /// Persisted trim start in milliseconds.
    #[serde(alias = "trimStart", default)]
    trim_start: Option<f64>,

    /// Persisted trim end in milliseconds.
    #[serde(alias = "trimEnd", default)]
    trim_end: Option<f64>,

    /// Cached duration in milliseconds. The decoded buffer is authoritative.
    #[serde(alias = "duration", alias = "durationMs", default)]
    duration_ms: Option<f64>,
}

impl Sample {
    /// Creates a sample recorded at middle C with no trim.
    pub fn new(id: &str, source_url: &str) -> Sample {
        Sample {
            id: id.to_string(),
            source_url: source_url.to_string(),
            root_pitch: DEFAULT_ROOT_PITCH,
            trim_start: None,
            trim_end: None,
            duration_ms: None,
        }
    }

    /// Sets the root pitch, which must be a valid MIDI note.
    pub fn with_root_pitch(mut self, root_pitch: u8) -> Result<Sample, ConfigError> {
        if root_pitch > MAX_MIDI_NOTE {
            return Err(ConfigError::Invalid {
                field: "root_pitch",
                message: format!("{root_pitch} is outside 0-{MAX_MIDI_NOTE}"),
            });
        }
        self.root_pitch = root_pitch;
        Ok(self)
    }

    /// Sets the persisted trim window in milliseconds.
    pub fn with_trim(mut self, trim_start: Option<f64>, trim_end: Option<f64>) -> Sample {
        self.trim_start = trim_start;
        self.trim_end = trim_end;
        self
    }

    /// Parses a sample from a YAML or JSON file.
    pub fn deserialize(path: &Path) -> Result<Sample, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Sample>()?)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn root_pitch(&self) -> u8 {
        self.root_pitch
    }

    pub fn trim_start(&self) -> Option<f64> {
        self.trim_start
    }

    pub fn trim_end(&self) -> Option<f64> {
        self.trim_end
    }

    pub fn duration_ms(&self) -> Option<f64> {
        self.duration_ms
    }

    /// Records the decoded duration if none was cached.
    pub(crate) fn fill_duration_ms(&mut self, duration_ms: f64) {
        if self.duration_ms.is_none() {
            self.duration_ms = Some(duration_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use config::FileFormat;

    use super::*;

    #[test]
    fn test_sample_from_library_row() {
        let json = r#"{
            "id": "5d0c",
            "public_url": "https://example.com/audio/gunshot.mp3",
            "root_midi": 62,
            "trim_start": 500,
            "trim_end": null
        }"#;

        let sample: Sample = Config::builder()
            .add_source(config::File::from_str(json, FileFormat::Json))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(sample.id(), "5d0c");
        assert_eq!(sample.source_url(), "https://example.com/audio/gunshot.mp3");
        assert_eq!(sample.root_pitch(), 62);
        assert_eq!(sample.trim_start(), Some(500.0));
        assert_eq!(sample.trim_end(), None);
        assert_eq!(sample.duration_ms(), None);
    }

    #[test]
    fn test_sample_yaml_defaults() {
        let yaml = r#"
            id: kick
            source_url: samples/kick.wav
        "#;

        let sample: Sample = Config::builder()
            .add_source(config::File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(sample, Sample::new("kick", "samples/kick.wav"));
        assert_eq!(sample.root_pitch(), 60);
    }

    #[test]
    fn test_sample_deserialize_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.yaml");
        std::fs::write(
            &path,
            "id: laser\nsource_url: https://example.com/laser.wav\ntrim_end: 1200\n",
        )
        .unwrap();

        let sample = Sample::deserialize(&path).unwrap();
        assert_eq!(sample.id(), "laser");
        assert_eq!(sample.trim_end(), Some(1200.0));
    }

    #[test]
    fn test_root_pitch_above_midi_range_is_rejected() {
        let json = r#"{"id": "a", "public_url": "a.wav", "root_midi": 200}"#;
        let result = Config::builder()
            .add_source(config::File::from_str(json, FileFormat::Json))
            .build()
            .unwrap()
            .try_deserialize::<Sample>();
        assert!(result.is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.yaml");
        std::fs::write(&path, "id: a\nsource_url: a.wav\nroot_pitch: 128\n").unwrap();
        assert!(matches!(
            Sample::deserialize(&path),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_with_root_pitch_checks_midi_range() {
        let sample = Sample::new("a", "a.wav").with_root_pitch(127).unwrap();
        assert_eq!(sample.root_pitch(), 127);

        assert!(matches!(
            Sample::new("a", "a.wav").with_root_pitch(128),
            Err(ConfigError::Invalid {
                field: "root_pitch",
                ..
            })
        ));
    }

    #[test]
    fn test_fill_duration_keeps_cached_value() {
        let mut sample = Sample::new("a", "a.wav");
        sample.fill_duration_ms(1500.0);
        assert_eq!(sample.duration_ms(), Some(1500.0));
        sample.fill_duration_ms(2000.0);
        assert_eq!(sample.duration_ms(), Some(1500.0));
    }
}
