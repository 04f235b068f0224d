//! Chat message and presence payloads
//!
//! The broadcast payload mirrors what the relay fans out verbatim: the relay
//! never inspects message bodies, it only re-frames them for subscribers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::{MessageId, RoomId, Timestamp, UserId};

// ----------------------------------------------------------------------------
// User Profile
// ----------------------------------------------------------------------------

/// Profile data attached to a session by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Stable user identifier (presence key)
    pub user_id: UserId,
    /// Email-like handle
    pub email: String,
    /// Human-readable display name, if the provider supplied one
    pub display_name: Option<String>,
    /// Avatar image URL, if the provider supplied one
    pub avatar_url: Option<String>,
}

impl UserProfile {
    /// Name to render for this user: display name when present, otherwise
    /// the local part of the email handle.
    pub fn render_name(&self) -> &str {
        match &self.display_name {
            Some(name) => name,
            None => self.email.split('@').next().unwrap_or(&self.email),
        }
    }
}

// ----------------------------------------------------------------------------
// Chat Message
// ----------------------------------------------------------------------------

/// A single broadcast chat message. Immutable once created.
///
/// Ordering is receipt order at each client; there is no global sequence
/// number, so strict cross-client ordering is not guaranteed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender-assigned unique id, used for receiver-side deduplication
    pub id: MessageId,
    /// Room the message was broadcast on
    pub room: RoomId,
    /// Sender's user identifier
    pub sender: UserId,
    /// Sender's display name at send time
    pub display_name: Option<String>,
    /// Sender's avatar URL at send time
    pub avatar_url: Option<String>,
    /// Message text
    pub body: String,
    /// Sender-side wall-clock send time
    pub sent_at: Timestamp,
}

impl ChatMessage {
    /// Compose a new message from a sender profile
    pub fn compose(room: RoomId, profile: &UserProfile, body: impl Into<String>) -> Self {
        Self {
            id: MessageId::generate(),
            room,
            sender: profile.user_id.clone(),
            display_name: profile.display_name.clone(),
            avatar_url: profile.avatar_url.clone(),
            body: body.into(),
            sent_at: Timestamp::now(),
        }
    }

    /// Whether this message was sent by the given user
    pub fn is_from(&self, user: &UserId) -> bool {
        &self.sender == user
    }
}

// ----------------------------------------------------------------------------
// Presence
// ----------------------------------------------------------------------------

/// Metadata a client announces when tracking presence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceMeta {
    /// Presence key: the tracking user's identifier
    pub user_id: UserId,
}

impl PresenceMeta {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }
}

/// The set of users currently tracked in one room.
///
/// The authoritative copy lives on the relay; each client holds a mirror
/// that is replaced wholesale on every sync (last-sync-wins, no merging).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceSet {
    members: BTreeSet<UserId>,
}

impl PresenceSet {
    /// Create an empty presence set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a presence set from an iterator of user ids
    pub fn from_members(members: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            members: members.into_iter().collect(),
        }
    }

    /// Replace this mirror with the latest sync payload
    pub fn replace_with(&mut self, latest: PresenceSet) {
        self.members = latest.members;
    }

    /// Whether a user is currently present
    pub fn contains(&self, user: &UserId) -> bool {
        self.members.contains(user)
    }

    /// Number of users online
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether nobody is online
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterate members in stable (sorted) order
    pub fn iter(&self) -> impl Iterator<Item = &UserId> {
        self.members.iter()
    }
}

impl FromIterator<UserId> for PresenceSet {
    fn from_iter<I: IntoIterator<Item = UserId>>(iter: I) -> Self {
        Self::from_members(iter)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_profile() -> UserProfile {
        UserProfile {
            user_id: UserId::new("u-1"),
            email: "alice@example.com".to_string(),
            display_name: Some("Alice".to_string()),
            avatar_url: None,
        }
    }

    #[test]
    fn test_compose_carries_profile_fields() {
        let profile = test_profile();
        let msg = ChatMessage::compose(RoomId::new("room_one"), &profile, "hi");
        assert_eq!(msg.sender, profile.user_id);
        assert_eq!(msg.display_name.as_deref(), Some("Alice"));
        assert_eq!(msg.body, "hi");
        assert!(msg.is_from(&profile.user_id));
        assert!(!msg.is_from(&UserId::new("u-2")));
    }

    #[test]
    fn test_render_name_falls_back_to_handle() {
        let mut profile = test_profile();
        assert_eq!(profile.render_name(), "Alice");
        profile.display_name = None;
        assert_eq!(profile.render_name(), "alice");
    }

    #[test]
    fn test_presence_replace_is_wholesale() {
        let mut mirror = PresenceSet::from_members([UserId::new("a"), UserId::new("b")]);
        let latest = PresenceSet::from_members([UserId::new("c")]);
        mirror.replace_with(latest);

        // No stale partial merge: old members are gone
        assert!(!mirror.contains(&UserId::new("a")));
        assert!(!mirror.contains(&UserId::new("b")));
        assert!(mirror.contains(&UserId::new("c")));
        assert_eq!(mirror.len(), 1);
    }

    #[test]
    fn test_presence_iteration_is_sorted() {
        let set = PresenceSet::from_members([UserId::new("b"), UserId::new("a")]);
        let order: Vec<&str> = set.iter().map(|u| u.as_str()).collect();
        assert_eq!(order, vec!["a", "b"]);
    }
}
