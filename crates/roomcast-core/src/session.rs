//! Session and identity provider contract
//!
//! The authenticated identity is owned by an external identity provider; the
//! client holds a read-only, revocable reference. Credentials are never
//! persisted by this crate; implementations of [`SessionStore`] sit at the
//! provider seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::errors::AuthError;
use crate::message::UserProfile;
use crate::types::Timestamp;

// ----------------------------------------------------------------------------
// Sign-in Provider
// ----------------------------------------------------------------------------

/// Third-party identity provider selector for the OAuth-style redirect flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignInProvider {
    Google,
    Custom(String),
}

impl SignInProvider {
    pub fn name(&self) -> &str {
        match self {
            SignInProvider::Google => "google",
            SignInProvider::Custom(name) => name,
        }
    }
}

// ----------------------------------------------------------------------------
// Session
// ----------------------------------------------------------------------------

/// An authenticated session: identity token plus user profile.
///
/// Created on sign-in, refreshed transparently by the provider, destroyed on
/// sign-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque bearer token; the relay never interprets it
    pub access_token: String,
    /// Profile data from the identity provider
    pub profile: UserProfile,
    /// When the token was issued
    pub issued_at: Timestamp,
    /// When the token lapses, if the provider bounds it
    pub expires_at: Option<Timestamp>,
}

impl Session {
    /// Whether the session's token has lapsed
    pub fn is_expired(&self, now: Timestamp) -> bool {
        match self.expires_at {
            Some(expiry) => now >= expiry,
            None => false,
        }
    }
}

// ----------------------------------------------------------------------------
// Session Store Trait
// ----------------------------------------------------------------------------

/// Contract consumed from the identity provider.
///
/// `subscribe` fires on login, logout, and refresh; the receiver always sees
/// the latest session state (intermediate states may be skipped, which is
/// fine, since only the current identity matters to consumers).
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The current session, if signed in
    fn session(&self) -> Option<Session>;

    /// Run the provider's sign-in flow
    async fn sign_in(&self, provider: SignInProvider) -> Result<Session, AuthError>;

    /// Destroy the current session
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Watch session changes; the channel holds the latest state
    fn subscribe(&self) -> watch::Receiver<Option<Session>>;
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserId;

    fn test_session(expires_at: Option<Timestamp>) -> Session {
        Session {
            access_token: "tok-1".to_string(),
            profile: UserProfile {
                user_id: UserId::new("u-1"),
                email: "alice@example.com".to_string(),
                display_name: None,
                avatar_url: None,
            },
            issued_at: Timestamp::new(1_000),
            expires_at,
        }
    }

    #[test]
    fn test_unbounded_session_never_expires() {
        let session = test_session(None);
        assert!(!session.is_expired(Timestamp::new(u64::MAX)));
    }

    #[test]
    fn test_bounded_session_expiry() {
        let session = test_session(Some(Timestamp::new(2_000)));
        assert!(!session.is_expired(Timestamp::new(1_999)));
        assert!(session.is_expired(Timestamp::new(2_000)));
        assert!(session.is_expired(Timestamp::new(3_000)));
    }

    #[test]
    fn test_provider_names() {
        assert_eq!(SignInProvider::Google.name(), "google");
        assert_eq!(SignInProvider::Custom("corp".to_string()).name(), "corp");
    }
}
