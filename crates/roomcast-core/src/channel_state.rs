//! Channel Lifecycle State Machine
//!
//! Provides type-safe channel lifecycle management that eliminates invalid
//! state transitions through linear type enforcement. One machine exists per
//! logical channel:
//!
//! `Unjoined -> Joining -> Subscribed -> (Unjoined on leave | Degraded on
//! transport loss -> Joining on auto-reconnect)`
//!
//! The only terminal path is explicit leave; transport loss is always
//! recoverable.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{RoomId, Timestamp};

// ----------------------------------------------------------------------------
// Channel State Types
// ----------------------------------------------------------------------------

/// Linear channel state that must be consumed to transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChannelState {
    /// No subscription exists for the room
    Unjoined(UnjoinedState),
    /// Join frame sent, waiting for the relay's acknowledgment
    Joining(JoiningState),
    /// Actively subscribed: broadcasts and presence syncs flow
    Subscribed(SubscribedState),
    /// Transport lost; reconnect pending
    Degraded(DegradedState),
}

/// State before the first join or after leave
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnjoinedState {
    pub room: RoomId,
    /// Set once the channel was explicitly left; such a channel never
    /// rejoins and never delivers another event
    pub left: bool,
}

/// State while waiting for join acknowledgment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoiningState {
    pub room: RoomId,
    pub join_started: Timestamp,
    /// 0 on first join, incremented per reconnect attempt
    pub attempt: u32,
}

/// State while subscribed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribedState {
    pub room: RoomId,
    pub subscribed_since: Timestamp,
    /// Times this channel recovered from a transport drop
    pub resubscribe_count: u32,
}

/// State after transport loss, before reconnect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradedState {
    pub room: RoomId,
    pub lost_at: Timestamp,
    pub reason: String,
    pub attempt: u32,
}

// ----------------------------------------------------------------------------
// State Transition Events
// ----------------------------------------------------------------------------

/// Events that trigger channel state transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChannelLifecycleEvent {
    /// Caller asked to join (idempotent once joining/subscribed)
    JoinRequested,
    /// Relay acknowledged the join
    JoinAcked,
    /// Underlying transport dropped
    TransportLost { reason: String },
    /// Auto-reconnect fires a new join attempt
    ReconnectStarted,
    /// Caller explicitly left the channel
    Left,
}

// ----------------------------------------------------------------------------
// Effects
// ----------------------------------------------------------------------------

/// Side effects the driver must execute after a transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChannelEffect {
    /// Send a join frame for the room
    SendJoin { room: RoomId },
    /// Re-announce local presence (required after every (re)subscribe)
    TrackPresence { room: RoomId },
    /// Schedule a reconnect attempt (backoff policy belongs to the driver)
    ScheduleReconnect { room: RoomId, attempt: u32 },
    /// Close the event queue so no further callback fires
    StopDelivery { room: RoomId },
}

// ----------------------------------------------------------------------------
// State Transition Results
// ----------------------------------------------------------------------------

/// Result of a state transition
#[derive(Debug, Clone)]
pub struct ChannelTransition {
    /// New channel state
    pub new_state: ChannelState,
    /// Effects to execute as a result of the transition
    pub effects: Vec<ChannelEffect>,
}

// ----------------------------------------------------------------------------
// State Machine Implementation
// ----------------------------------------------------------------------------

impl ChannelState {
    /// Create the initial unjoined state for a room
    pub fn new_unjoined(room: RoomId) -> Self {
        ChannelState::Unjoined(UnjoinedState { room, left: false })
    }

    /// Get the room for any state
    pub fn room(&self) -> &RoomId {
        match self {
            ChannelState::Unjoined(s) => &s.room,
            ChannelState::Joining(s) => &s.room,
            ChannelState::Subscribed(s) => &s.room,
            ChannelState::Degraded(s) => &s.room,
        }
    }

    /// Get current state name for logging
    pub fn state_name(&self) -> &'static str {
        match self {
            ChannelState::Unjoined(_) => "Unjoined",
            ChannelState::Joining(_) => "Joining",
            ChannelState::Subscribed(_) => "Subscribed",
            ChannelState::Degraded(_) => "Degraded",
        }
    }

    /// Whether broadcasts may be sent in this state
    pub fn can_send(&self) -> bool {
        matches!(self, ChannelState::Subscribed(_))
    }

    /// Whether the channel was explicitly left
    pub fn is_left(&self) -> bool {
        matches!(self, ChannelState::Unjoined(s) if s.left)
    }

    /// Process an event and transition to a new state (consumes self)
    pub fn transition(
        self,
        event: ChannelLifecycleEvent,
    ) -> Result<ChannelTransition, StateTransitionError> {
        let room = self.room().clone();
        let from_state = self.state_name();

        let (new_state, effects) = match (self, event) {
            // From Unjoined
            (ChannelState::Unjoined(state), ChannelLifecycleEvent::JoinRequested) => {
                if state.left {
                    return Err(StateTransitionError::ChannelLeft { room });
                }
                let new_state = ChannelState::Joining(JoiningState {
                    room: state.room.clone(),
                    join_started: Timestamp::now(),
                    attempt: 0,
                });
                (new_state, vec![ChannelEffect::SendJoin { room: state.room }])
            }

            // Idempotent join: already joining or subscribed, nothing to do
            (state @ ChannelState::Joining(_), ChannelLifecycleEvent::JoinRequested)
            | (state @ ChannelState::Subscribed(_), ChannelLifecycleEvent::JoinRequested) => {
                (state, Vec::new())
            }

            // From Joining
            (ChannelState::Joining(state), ChannelLifecycleEvent::JoinAcked) => {
                let new_state = ChannelState::Subscribed(SubscribedState {
                    room: state.room.clone(),
                    subscribed_since: Timestamp::now(),
                    resubscribe_count: state.attempt,
                });
                // Presence must be (re)announced on every subscribe
                (
                    new_state,
                    vec![ChannelEffect::TrackPresence { room: state.room }],
                )
            }

            (ChannelState::Joining(state), ChannelLifecycleEvent::TransportLost { reason }) => {
                let attempt = state.attempt + 1;
                let new_state = ChannelState::Degraded(DegradedState {
                    room: state.room.clone(),
                    lost_at: Timestamp::now(),
                    reason,
                    attempt,
                });
                (
                    new_state,
                    vec![ChannelEffect::ScheduleReconnect {
                        room: state.room,
                        attempt,
                    }],
                )
            }

            // From Subscribed
            (ChannelState::Subscribed(state), ChannelLifecycleEvent::TransportLost { reason }) => {
                let new_state = ChannelState::Degraded(DegradedState {
                    room: state.room.clone(),
                    lost_at: Timestamp::now(),
                    reason,
                    attempt: 1,
                });
                (
                    new_state,
                    vec![ChannelEffect::ScheduleReconnect {
                        room: state.room,
                        attempt: 1,
                    }],
                )
            }

            // From Degraded
            (ChannelState::Degraded(state), ChannelLifecycleEvent::ReconnectStarted) => {
                let new_state = ChannelState::Joining(JoiningState {
                    room: state.room.clone(),
                    join_started: Timestamp::now(),
                    attempt: state.attempt,
                });
                (new_state, vec![ChannelEffect::SendJoin { room: state.room }])
            }

            (ChannelState::Degraded(state), ChannelLifecycleEvent::TransportLost { .. }) => {
                // Another failed attempt while already degraded
                let attempt = state.attempt + 1;
                let new_state = ChannelState::Degraded(DegradedState {
                    attempt,
                    ..state.clone()
                });
                (
                    new_state,
                    vec![ChannelEffect::ScheduleReconnect {
                        room: state.room,
                        attempt,
                    }],
                )
            }

            // Universal: explicit leave from any state stops delivery
            (_, ChannelLifecycleEvent::Left) => {
                let new_state = ChannelState::Unjoined(UnjoinedState {
                    room: room.clone(),
                    left: true,
                });
                (new_state, vec![ChannelEffect::StopDelivery { room }])
            }

            // Invalid transitions
            (_, event) => {
                return Err(StateTransitionError::InvalidTransition {
                    from_state: from_state.to_string(),
                    event: format!("{:?}", event),
                });
            }
        };

        Ok(ChannelTransition { new_state, effects })
    }
}

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors that can occur during channel state transitions
#[derive(Debug, Clone)]
pub enum StateTransitionError {
    /// Invalid state transition attempted
    InvalidTransition { from_state: String, event: String },
    /// The channel was explicitly left and cannot be reused
    ChannelLeft { room: RoomId },
}

impl fmt::Display for StateTransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateTransitionError::InvalidTransition { from_state, event } => {
                write!(f, "Invalid transition from {} on event {}", from_state, event)
            }
            StateTransitionError::ChannelLeft { room } => {
                write!(f, "Channel for room {} was left and cannot rejoin", room)
            }
        }
    }
}

impl std::error::Error for StateTransitionError {}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomId {
        RoomId::new("room_one")
    }

    #[test]
    fn test_initial_state() {
        let state = ChannelState::new_unjoined(room());
        assert_eq!(state.state_name(), "Unjoined");
        assert!(!state.can_send());
        assert!(!state.is_left());
    }

    #[test]
    fn test_join_flow() {
        let state = ChannelState::new_unjoined(room());

        let transition = state.transition(ChannelLifecycleEvent::JoinRequested).unwrap();
        assert_eq!(transition.new_state.state_name(), "Joining");
        assert_eq!(transition.effects, vec![ChannelEffect::SendJoin { room: room() }]);

        let transition = transition
            .new_state
            .transition(ChannelLifecycleEvent::JoinAcked)
            .unwrap();
        assert_eq!(transition.new_state.state_name(), "Subscribed");
        assert!(transition.new_state.can_send());
        // Presence is announced on subscribe
        assert_eq!(
            transition.effects,
            vec![ChannelEffect::TrackPresence { room: room() }]
        );
    }

    #[test]
    fn test_join_is_idempotent() {
        let state = ChannelState::new_unjoined(room());
        let state = state
            .transition(ChannelLifecycleEvent::JoinRequested)
            .unwrap()
            .new_state;

        // A second join request while joining is a no-op
        let transition = state.transition(ChannelLifecycleEvent::JoinRequested).unwrap();
        assert_eq!(transition.new_state.state_name(), "Joining");
        assert!(transition.effects.is_empty());
    }

    #[test]
    fn test_transport_loss_and_reconnect() {
        let state = ChannelState::new_unjoined(room());
        let state = state
            .transition(ChannelLifecycleEvent::JoinRequested)
            .unwrap()
            .new_state;
        let state = state
            .transition(ChannelLifecycleEvent::JoinAcked)
            .unwrap()
            .new_state;

        // Drop the transport
        let transition = state
            .transition(ChannelLifecycleEvent::TransportLost {
                reason: "socket closed".to_string(),
            })
            .unwrap();
        assert_eq!(transition.new_state.state_name(), "Degraded");
        assert_eq!(
            transition.effects,
            vec![ChannelEffect::ScheduleReconnect {
                room: room(),
                attempt: 1
            }]
        );

        // Reconnect goes back through Joining and re-tracks on ack
        let transition = transition
            .new_state
            .transition(ChannelLifecycleEvent::ReconnectStarted)
            .unwrap();
        assert_eq!(transition.new_state.state_name(), "Joining");

        let transition = transition
            .new_state
            .transition(ChannelLifecycleEvent::JoinAcked)
            .unwrap();
        match &transition.new_state {
            ChannelState::Subscribed(s) => assert_eq!(s.resubscribe_count, 1),
            other => panic!("expected Subscribed, got {:?}", other),
        }
        assert_eq!(
            transition.effects,
            vec![ChannelEffect::TrackPresence { room: room() }]
        );
    }

    #[test]
    fn test_repeated_failures_increment_attempt() {
        let state = ChannelState::new_unjoined(room());
        let state = state
            .transition(ChannelLifecycleEvent::JoinRequested)
            .unwrap()
            .new_state;
        let state = state
            .transition(ChannelLifecycleEvent::TransportLost {
                reason: "refused".to_string(),
            })
            .unwrap()
            .new_state;

        let transition = state
            .transition(ChannelLifecycleEvent::TransportLost {
                reason: "refused".to_string(),
            })
            .unwrap();
        assert_eq!(
            transition.effects,
            vec![ChannelEffect::ScheduleReconnect {
                room: room(),
                attempt: 2
            }]
        );
    }

    #[test]
    fn test_leave_is_terminal() {
        let state = ChannelState::new_unjoined(room());
        let state = state
            .transition(ChannelLifecycleEvent::JoinRequested)
            .unwrap()
            .new_state;
        let state = state
            .transition(ChannelLifecycleEvent::JoinAcked)
            .unwrap()
            .new_state;

        let transition = state.transition(ChannelLifecycleEvent::Left).unwrap();
        assert!(transition.new_state.is_left());
        assert_eq!(
            transition.effects,
            vec![ChannelEffect::StopDelivery { room: room() }]
        );

        // A left channel never rejoins
        let result = transition
            .new_state
            .transition(ChannelLifecycleEvent::JoinRequested);
        assert!(matches!(result, Err(StateTransitionError::ChannelLeft { .. })));
    }

    #[test]
    fn test_invalid_transition() {
        let state = ChannelState::new_unjoined(room());
        let result = state.transition(ChannelLifecycleEvent::JoinAcked);
        match result {
            Err(StateTransitionError::InvalidTransition { from_state, .. }) => {
                assert_eq!(from_state, "Unjoined");
            }
            other => panic!("expected InvalidTransition, got {:?}", other),
        }
    }
}
