//! Channel API surface
//!
//! A [`Channel`] is one logical membership in one room. All events for the
//! channel, broadcasts and presence syncs alike, arrive through a single bounded
//! queue in receipt order, drained by one consumer. The cloneable
//! [`ChannelHandle`] carries the outbound side: sends, presence announcements,
//! and leave.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use roomcast_core::{
    ChatMessage, ClientFrame, MessageId, PresenceMeta, PresenceSet, RoomId, SendError, UserProfile,
    MESSAGE_EVENT,
};

// ----------------------------------------------------------------------------
// Channel Status
// ----------------------------------------------------------------------------

/// Externally visible channel lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Join in flight (first join or reconnect)
    Joining,
    /// Subscribed; broadcasts flow and sends are accepted
    Subscribed,
    /// Transport lost; auto-reconnect pending
    Degraded,
    /// Explicitly left, or the subscription was rejected; terminal
    Left,
}

// ----------------------------------------------------------------------------
// Channel Events
// ----------------------------------------------------------------------------

/// Events delivered to the channel's consumer, in receipt order
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A broadcast message (duplicates already suppressed)
    Broadcast(ChatMessage),
    /// The full recomputed membership set; replaces any local mirror
    PresenceSync(PresenceSet),
}

// ----------------------------------------------------------------------------
// Send Outcome
// ----------------------------------------------------------------------------

/// Result of a send attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The message was queued toward the relay
    Sent(MessageId),
    /// The text was empty or whitespace-only; nothing was sent
    SkippedEmpty,
}

// ----------------------------------------------------------------------------
// Channel
// ----------------------------------------------------------------------------

/// One logical room membership: the event queue plus an outbound handle
pub struct Channel {
    room: RoomId,
    events: mpsc::Receiver<ChannelEvent>,
    handle: ChannelHandle,
}

impl Channel {
    pub(crate) fn new(
        room: RoomId,
        events: mpsc::Receiver<ChannelEvent>,
        handle: ChannelHandle,
    ) -> Self {
        Self {
            room,
            events,
            handle,
        }
    }

    /// The room this channel is joined to
    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// A cloneable outbound handle
    pub fn handle(&self) -> ChannelHandle {
        self.handle.clone()
    }

    /// Receive the next event. Returns `None` once the channel was left (or
    /// its driver stopped); no event ever fires past that point.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    /// Split into the raw event receiver and the handle
    pub fn split(self) -> (mpsc::Receiver<ChannelEvent>, ChannelHandle) {
        (self.events, self.handle)
    }
}

// ----------------------------------------------------------------------------
// Channel Handle
// ----------------------------------------------------------------------------

/// Outbound side of a channel; cheap to clone
#[derive(Clone)]
pub struct ChannelHandle {
    room: RoomId,
    profile: UserProfile,
    outbound: mpsc::Sender<ClientFrame>,
    status: watch::Receiver<ChannelStatus>,
    leave: Arc<watch::Sender<bool>>,
}

impl ChannelHandle {
    pub(crate) fn new(
        room: RoomId,
        profile: UserProfile,
        outbound: mpsc::Sender<ClientFrame>,
        status: watch::Receiver<ChannelStatus>,
        leave: Arc<watch::Sender<bool>>,
    ) -> Self {
        Self {
            room,
            profile,
            outbound,
            status,
            leave,
        }
    }

    /// Current channel status
    pub fn status(&self) -> ChannelStatus {
        *self.status.borrow()
    }

    /// Broadcast a chat message to the room.
    ///
    /// Empty or whitespace-only text is a no-op: no frame is queued and no
    /// state changes. Fails with a typed error when the channel has no
    /// established subscription, so the caller can keep the input for a
    /// manual retry.
    pub fn send_chat(&self, text: &str) -> Result<SendOutcome, SendError> {
        if text.trim().is_empty() {
            return Ok(SendOutcome::SkippedEmpty);
        }
        if self.status() != ChannelStatus::Subscribed {
            return Err(SendError::NotConnected {
                room: self.room.clone(),
            });
        }

        let message = ChatMessage::compose(self.room.clone(), &self.profile, text);
        let id = message.id;
        self.broadcast(MESSAGE_EVENT, message)?;
        Ok(SendOutcome::Sent(id))
    }

    /// Broadcast a payload under an arbitrary event name. Best-effort: the
    /// relay fans it out to current subscribers only.
    pub fn broadcast(&self, event: &str, message: ChatMessage) -> Result<(), SendError> {
        if self.status() != ChannelStatus::Subscribed {
            return Err(SendError::NotConnected {
                room: self.room.clone(),
            });
        }
        self.queue(ClientFrame::Broadcast {
            event: event.to_string(),
            message,
        })
    }

    /// Explicitly re-announce local presence
    pub fn track(&self) -> Result<(), SendError> {
        self.queue(ClientFrame::Track {
            meta: PresenceMeta::new(self.profile.user_id.clone()),
        })
    }

    /// Leave the channel. Idempotent; after this no further event is
    /// delivered for this channel instance.
    pub fn leave(&self) {
        let _ = self.leave.send(true);
    }

    fn queue(&self, frame: ClientFrame) -> Result<(), SendError> {
        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::TransportFailed {
                room: self.room.clone(),
                reason: "outbound queue full".to_string(),
            },
            mpsc::error::TrySendError::Closed(_) => SendError::NotConnected {
                room: self.room.clone(),
            },
        })
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
