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

//! Note-name parsing and equal-tempered pitch math.
//!
//! Notes are written in scientific pitch notation: a letter `A`-`G` (either
//! case), an optional `#` or `b` accidental and a single-digit octave that may
//! be negative, e.g. `C4`, `c#4`, `Bb3`, `C-1`.

/// The MIDI note a sample is assumed to have been recorded at (middle C).
pub const DEFAULT_ROOT_PITCH: u8 = 60;

/// Highest valid MIDI note number (G9).
pub const MAX_MIDI_NOTE: u8 = 127;

/// Sharp spellings used when formatting MIDI numbers back into names.
const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Errors raised while parsing a note name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NoteParseError {
    #[error("Invalid note format: {0}")]
    Malformed(String),

    #[error("Note {note} resolves to MIDI {midi}, outside 0-127")]
    OutOfRange { note: String, midi: i32 },
}

/// Returns the semitone offset of a note letter from C.
fn letter_semitone(letter: char) -> Option<i32> {
    match letter.to_ascii_uppercase() {
        'C' => Some(0),
        'D' => Some(2),
        'E' => Some(4),
        'F' => Some(5),
        'G' => Some(7),
        'A' => Some(9),
        'B' => Some(11),
        _ => None,
    }
}

/// Parses a note name into its absolute MIDI number.
///
/// The result is `12 * (octave + 1) + semitone`, so `C4` is 60 and `A4` is 69.
pub fn parse_note(note: &str) -> Result<u8, NoteParseError> {
    let malformed = || NoteParseError::Malformed(note.to_string());

    let mut chars = note.chars();
    let semitone = chars.next().and_then(letter_semitone).ok_or_else(malformed)?;

    let rest = chars.as_str();
    let (accidental, octave) = match rest.as_bytes().first() {
        Some(b'#') => (1, &rest[1..]),
        Some(b'b') => (-1, &rest[1..]),
        _ => (0, rest),
    };

    let digits = octave.strip_prefix('-').unwrap_or(octave);
    if digits.len() != 1 || !digits.as_bytes()[0].is_ascii_digit() {
        return Err(malformed());
    }
    let octave: i32 = octave.parse().map_err(|_| malformed())?;

    let midi = 12 * (octave + 1) + semitone + accidental;
    u8::try_from(midi)
        .ok()
        .filter(|midi| *midi <= MAX_MIDI_NOTE)
        .ok_or_else(|| NoteParseError::OutOfRange {
            note: note.to_string(),
            midi,
        })
}

/// Formats a MIDI number as a note name using sharps, e.g. 61 -> `C#4`.
pub fn note_name(midi: u8) -> String {
    let octave = midi as i32 / 12 - 1;
    format!("{}{}", SHARP_NAMES[midi as usize % 12], octave)
}

/// The equal-tempered frequency ratio between `midi` and `root`.
///
/// One octave up is exactly 2.0, one octave down exactly 0.5.
pub fn pitch_ratio(midi: u8, root: u8) -> f64 {
    2f64.powf((midi as f64 - root as f64) / 12.0)
}
