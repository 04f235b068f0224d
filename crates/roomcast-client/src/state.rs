//! Observable chat state
//!
//! State holder for the render layer: the append-only message list, the
//! replace-only presence mirror, and the current session. Projections
//! subscribe explicitly and are notified on every change; the holder itself
//! performs no I/O. Message history lives only here; reloading the process
//! loses it, by design.

use std::sync::Mutex;

use tokio::sync::watch;

use roomcast_core::{ChatMessage, PresenceSet, Session};

use crate::channel::ChannelEvent;

// ----------------------------------------------------------------------------
// Snapshot
// ----------------------------------------------------------------------------

/// Immutable view of the chat state handed to projections
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    /// Current session, if signed in
    pub session: Option<Session>,
    /// All messages received so far, in receipt order
    pub messages: Vec<ChatMessage>,
    /// Mirror of the latest presence sync
    pub online: PresenceSet,
    /// Monotonic change counter
    pub revision: u64,
}

// ----------------------------------------------------------------------------
// Chat State
// ----------------------------------------------------------------------------

/// Shared state holder notifying subscribed projections on change
pub struct ChatState {
    inner: Mutex<StateSnapshot>,
    notify: watch::Sender<StateSnapshot>,
}

impl ChatState {
    /// Create an empty state holder
    pub fn new() -> Self {
        let (notify, _) = watch::channel(StateSnapshot::default());
        Self {
            inner: Mutex::new(StateSnapshot::default()),
            notify,
        }
    }

    /// Subscribe a projection; the receiver always holds the latest snapshot
    pub fn subscribe(&self) -> watch::Receiver<StateSnapshot> {
        self.notify.subscribe()
    }

    /// Current snapshot
    pub fn snapshot(&self) -> StateSnapshot {
        self.inner.lock().expect("chat state poisoned").clone()
    }

    /// Record a session change. Signing out clears the online mirror: with
    /// no identity there is no channel, hence nobody to display.
    pub fn apply_session(&self, session: Option<Session>) {
        self.mutate(|state| {
            if session.is_none() {
                state.online = PresenceSet::new();
            }
            state.session = session;
        });
    }

    /// Append a received message (append-only; no edits, no removal)
    pub fn append_message(&self, message: ChatMessage) {
        self.mutate(|state| state.messages.push(message));
    }

    /// Replace the presence mirror with the latest sync payload
    pub fn replace_presence(&self, latest: PresenceSet) {
        self.mutate(|state| state.online.replace_with(latest));
    }

    /// Fold a channel event into the state
    pub fn apply_event(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::Broadcast(message) => self.append_message(message),
            ChannelEvent::PresenceSync(set) => self.replace_presence(set),
        }
    }

    fn mutate(&self, f: impl FnOnce(&mut StateSnapshot)) {
        let snapshot = {
            let mut state = self.inner.lock().expect("chat state poisoned");
            f(&mut state);
            state.revision += 1;
            state.clone()
        };
        let _ = self.notify.send(snapshot);
    }
}

impl Default for ChatState {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
