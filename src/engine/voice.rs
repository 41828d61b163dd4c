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
//! Bookkeeping for sounding notes.
use std::sync::Arc;

use crate::audio::{CancelHandle, VoiceId};
use crate::dsp::PitchParams;

/// One triggered note that has not finished yet.
pub struct Voice {
    id: VoiceId,
    note: String,
    /// Output-clock time at which the voice starts rendering.
    start_time: f64,
    cancel_handle: CancelHandle,
    params: Arc<PitchParams>,
}

impl Voice {
    pub fn new(
        id: VoiceId,
        note: &str,
        start_time: f64,
        cancel_handle: CancelHandle,
        params: Arc<PitchParams>,
    ) -> Voice {
        Voice {
            id,
            note: note.to_string(),
            start_time,
            cancel_handle,
            params,
        }
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn params(&self) -> &Arc<PitchParams> {
        &self.params
    }

    pub fn cancel_handle(&self) -> &CancelHandle {
        &self.cancel_handle
    }
}

/// Sounding voices in trigger order. The same note may appear more than once.
#[derive(Default)]
pub struct ActiveVoices {
    voices: Vec<Voice>,
}

impl ActiveVoices {
    pub fn push(&mut self, voice: Voice) {
        self.voices.push(voice);
    }

    /// Removes the voice with this id. Returns false if it was not present.
    pub fn remove(&mut self, id: VoiceId) -> bool {
        let before = self.voices.len();
        self.voices.retain(|voice| voice.id != id);
        self.voices.len() != before
    }

    /// Note names, oldest first.
    pub fn notes(&self) -> Vec<String> {
        self.voices.iter().map(|voice| voice.note.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter()
    }

    /// Cancels every voice. They leave the list when the mixer reports them.
    pub fn cancel_all(&self) {
        for voice in &self.voices {
            voice.cancel_handle.cancel();
        }
    }

    /// Removes every voice without stopping it.
    pub fn take_all(&mut self) -> Vec<Voice> {
        std::mem::take(&mut self.voices)
    }
}
