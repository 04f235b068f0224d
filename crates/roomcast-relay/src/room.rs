//! Room registry: broadcast fan-out and authoritative presence
//!
//! A room is a named topic. Every subscriber, the sender included, holds a
//! receiver on the room's broadcast channel, which makes fan-out
//! echo-inclusive. The registry also owns the authoritative presence set:
//! the mapping from connections to their tracked presence keys. Every
//! mutation recomputes the full membership set and pushes it to all
//! subscribers; syncs are never deltas.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Mutex;

use tokio::sync::broadcast;
use tracing::{debug, trace};

use roomcast_core::{PresenceSet, RoomId, ServerFrame, UserId};

// ----------------------------------------------------------------------------
// Connection Identifier
// ----------------------------------------------------------------------------

/// Identifier for one accepted relay connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(u64);

impl ConnId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Room
// ----------------------------------------------------------------------------

struct Room {
    /// Fan-out channel; one receiver per subscribed connection
    fanout: broadcast::Sender<ServerFrame>,
    /// Tracked presence keys by connection. Connections that joined but
    /// never tracked receive broadcasts yet stay absent from presence.
    members: HashMap<ConnId, UserId>,
}

impl Room {
    fn new(fanout_buffer: usize) -> Self {
        let (fanout, _) = broadcast::channel(fanout_buffer);
        Self {
            fanout,
            members: HashMap::new(),
        }
    }

    /// Full deduplicated membership set, in stable order
    fn member_keys(&self) -> Vec<UserId> {
        let unique: BTreeSet<&UserId> = self.members.values().collect();
        unique.into_iter().cloned().collect()
    }

    fn presence_frame(&self) -> ServerFrame {
        ServerFrame::PresenceSync {
            members: self.member_keys(),
        }
    }

    fn is_abandoned(&self) -> bool {
        self.members.is_empty() && self.fanout.receiver_count() == 0
    }
}

// ----------------------------------------------------------------------------
// Room Registry
// ----------------------------------------------------------------------------

/// Registry of all live rooms on this relay
pub struct RoomRegistry {
    rooms: Mutex<HashMap<RoomId, Room>>,
    fanout_buffer: usize,
}

impl RoomRegistry {
    /// Create an empty registry
    pub fn new(fanout_buffer: usize) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            fanout_buffer,
        }
    }

    /// Subscribe a connection to a room, creating the room lazily.
    /// Returns the fan-out receiver and the current presence snapshot so a
    /// fresh joiner learns the membership set immediately.
    pub fn subscribe(&self, room: &RoomId) -> (broadcast::Receiver<ServerFrame>, PresenceSet) {
        let mut rooms = self.rooms.lock().expect("room registry poisoned");
        rooms.retain(|_, r| !r.is_abandoned());

        let entry = rooms
            .entry(room.clone())
            .or_insert_with(|| Room::new(self.fanout_buffer));
        let snapshot = PresenceSet::from_members(entry.member_keys());
        debug!(%room, subscribers = entry.fanout.receiver_count() + 1, "subscribed");
        (entry.fanout.subscribe(), snapshot)
    }

    /// Fan a frame out to every current subscriber of the room, the sender
    /// included. Returns the number of receivers the frame reached.
    pub fn broadcast(&self, room: &RoomId, frame: ServerFrame) -> usize {
        let rooms = self.rooms.lock().expect("room registry poisoned");
        match rooms.get(room) {
            Some(entry) => {
                let reached = entry.fanout.send(frame).unwrap_or(0);
                trace!(%room, reached, "broadcast fanned out");
                reached
            }
            None => 0,
        }
    }

    /// Record a connection's presence key and push a fresh full sync
    pub fn track(&self, room: &RoomId, conn: ConnId, user: UserId) {
        let mut rooms = self.rooms.lock().expect("room registry poisoned");
        let Some(entry) = rooms.get_mut(room) else {
            return;
        };
        entry.members.insert(conn, user);
        let frame = entry.presence_frame();
        let _ = entry.fanout.send(frame);
        debug!(%room, %conn, online = entry.member_keys().len(), "presence tracked");
    }

    /// Remove a connection on leave or disconnect. Recomputes presence and
    /// pushes a sync when the connection was tracked.
    pub fn remove(&self, room: &RoomId, conn: ConnId) {
        let mut rooms = self.rooms.lock().expect("room registry poisoned");
        let Some(entry) = rooms.get_mut(room) else {
            return;
        };
        if entry.members.remove(&conn).is_some() {
            let frame = entry.presence_frame();
            let _ = entry.fanout.send(frame);
            debug!(%room, %conn, online = entry.member_keys().len(), "presence removed");
        }
        if entry.is_abandoned() {
            rooms.remove(room);
        }
    }

    /// Current presence snapshot for a room
    pub fn presence(&self, room: &RoomId) -> PresenceSet {
        let rooms = self.rooms.lock().expect("room registry poisoned");
        rooms
            .get(room)
            .map(|entry| PresenceSet::from_members(entry.member_keys()))
            .unwrap_or_default()
    }

    /// Number of live rooms
    pub fn room_count(&self) -> usize {
        self.rooms.lock().expect("room registry poisoned").len()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
