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
//! Plays the engine from a computer keyboard, one line of keys at a time.
use std::io;

use tokio::task::JoinHandle;
use tracing::{debug, info, span, warn, Level};

use crate::engine::PlaybackEngine;

/// One octave from C4 to C5 laid out on the home row, black keys above.
pub const KEY_TO_NOTE: [(char, &str); 13] = [
    ('a', "C4"),
    ('w', "C#4"),
    ('s', "D4"),
    ('e', "D#4"),
    ('d', "E4"),
    ('f', "F4"),
    ('t', "F#4"),
    ('g', "G4"),
    ('y', "G#4"),
    ('h', "A4"),
    ('u', "A#4"),
    ('j', "B4"),
    ('k', "C5"),
];

const TRIM: &str = "trim";
const STOP: &str = "stop";
const QUIT: &str = "quit";

/// Returns the note played by `key`, ignoring case.
pub fn note_for_key(key: char) -> Option<&'static str> {
    let key = key.to_ascii_lowercase();
    KEY_TO_NOTE
        .iter()
        .find(|(mapped, _)| *mapped == key)
        .map(|(_, note)| *note)
}

/// Returns the key that plays `note`.
pub fn key_for_note(note: &str) -> Option<char> {
    KEY_TO_NOTE
        .iter()
        .find(|(_, mapped)| *mapped == note)
        .map(|(key, _)| *key)
}

/// Reads lines of keys and plays the mapped notes.
pub struct Driver {
    engine: PlaybackEngine,
}

impl Driver {
    pub fn new(engine: PlaybackEngine) -> Driver {
        Driver { engine }
    }

    /// Handles one line of input. Returns false when input is exhausted or
    /// the user asked to quit.
    fn monitor_io<R, W>(&self, mut reader: R, mut writer: W) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Keys ({}), {} <start-ms> <end-ms>, {}, {}: ",
            KEY_TO_NOTE.iter().map(|(key, _)| *key).collect::<String>(),
            TRIM,
            STOP,
            QUIT,
        )?;
        writer.flush()?;

        let mut input = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }
        let input = input.trim().to_lowercase();
        let mut words = input.split_whitespace();

        match words.next() {
            None => {}
            Some(QUIT) => return Ok(false),
            Some(STOP) => self.engine.stop_all(),
            Some(TRIM) => {
                let bounds: Vec<f64> = words.filter_map(|word| word.parse().ok()).collect();
                match bounds.as_slice() {
                    [start, end] if start < end => self.engine.set_trim(*start, *end),
                    _ => warn!(input, "Trim needs a start and end in milliseconds"),
                }
            }
            Some(_) => self.play_keys(&input)?,
        }
        Ok(true)
    }

    fn play_keys(&self, keys: &str) -> Result<(), io::Error> {
        for key in keys.chars().filter(|key| !key.is_whitespace()) {
            let Some(note) = note_for_key(key) else {
                warn!(key = %key, "Unmapped key");
                continue;
            };
            debug!(key = %key, note, "Key pressed");
            self.engine
                .play(note)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        }
        Ok(())
    }

    /// Reads stdin on a blocking task until EOF or `quit`.
    pub fn monitor_stdin(self) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while self.monitor_io(io::stdin().lock(), io::stdout())? {}
            info!("Keyboard driver stopped.");
            Ok(())
        })
    }
}
