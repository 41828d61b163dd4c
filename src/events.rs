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
//! Typed events published by the playback engine.
//!
//! Listeners register for a single [`EventKind`] or for every event. Dispatch is
//! synchronous on the emitting thread, in registration order.
use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, trace};

/// Everything the engine announces to the outside world.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum EngineEvent {
    /// Fraction of the sample's bytes received so far, in [0, 1].
    #[serde(rename_all = "camelCase")]
    SampleLoadingProgress { progress: f64 },

    /// The sample finished decoding and is playable.
    #[serde(rename_all = "camelCase")]
    Loaded {
        sample_id: String,
        /// Seconds.
        buffer_duration: f64,
        /// Frames.
        buffer_length: usize,
        sample_rate: u32,
        number_of_channels: usize,
    },

    /// Fetching or decoding the sample failed.
    #[serde(rename_all = "camelCase")]
    LoadFailed { sample_id: String, message: String },

    /// The trim window changed. Milliseconds.
    #[serde(rename_all = "camelCase")]
    TrimChanged { trim_start_ms: f64, trim_end_ms: f64 },

    /// Snapshot of the note names currently sounding, oldest first.
    #[serde(rename_all = "camelCase")]
    NotesChanged { notes: Vec<String> },

    /// A voice was scheduled. `start_time` is in output-clock seconds.
    #[serde(rename_all = "camelCase")]
    Play { note: String, start_time: f64 },
}

impl EngineEvent {
    /// Returns the kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            EngineEvent::SampleLoadingProgress { .. } => EventKind::SampleLoadingProgress,
            EngineEvent::Loaded { .. } => EventKind::Loaded,
            EngineEvent::LoadFailed { .. } => EventKind::LoadFailed,
            EngineEvent::TrimChanged { .. } => EventKind::TrimChanged,
            EngineEvent::NotesChanged { .. } => EventKind::NotesChanged,
            EngineEvent::Play { .. } => EventKind::Play,
        }
    }
}

/// The closed set of event kinds a listener can subscribe to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    SampleLoadingProgress,
    Loaded,
    LoadFailed,
    TrimChanged,
    NotesChanged,
    Play,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::SampleLoadingProgress => "sampleLoadingProgress",
            EventKind::Loaded => "loaded",
            EventKind::LoadFailed => "loadFailed",
            EventKind::TrimChanged => "trimChanged",
            EventKind::NotesChanged => "notesChanged",
            EventKind::Play => "play",
        };
        f.write_str(name)
    }
}

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A registered event callback.
pub type Listener = Arc<dyn Fn(&EngineEvent) + Send + Sync>;

struct Registration {
    id: ListenerId,
    kind: Option<EventKind>,
    listener: Listener,
}

/// Registry of listeners keyed by event kind.
pub struct EventBus {
    listeners: RwLock<Vec<Registration>>,
    next_id: AtomicU64,
    debug_logging: bool,
}

impl EventBus {
    pub fn new(debug_logging: bool) -> EventBus {
        EventBus {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
            debug_logging,
        }
    }

    /// Registers a listener for one event kind.
    pub fn subscribe<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        self.register(Some(kind), Arc::new(listener))
    }

    /// Registers a listener for every event kind.
    pub fn subscribe_all<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        self.register(None, Arc::new(listener))
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|registration| registration.id != id);
        listeners.len() != before
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers the event to every matching listener.
    ///
    /// The registry lock is released before listeners run, so a listener may
    /// subscribe, unsubscribe or call back into the engine.
    pub fn emit(&self, event: EngineEvent) {
        let kind = event.kind();
        if self.debug_logging {
            info!(%kind, ?event, "Dispatching event");
        } else {
            trace!(%kind, ?event, "Dispatching event");
        }

        let matching: Vec<Listener> = {
            let listeners = self.listeners.read();
            listeners
                .iter()
                .filter(|registration| registration.kind.is_none_or(|k| k == kind))
                .map(|registration| registration.listener.clone())
                .collect()
        };

        for listener in matching {
            listener(&event);
        }
    }

    fn register(&self, kind: Option<EventKind>, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push(Registration { id, kind, listener });
        id
    }
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new(false)
    }
}
