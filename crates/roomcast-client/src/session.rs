//! Process-local session store
//!
//! Implements the [`SessionStore`] seam for environments without a reachable
//! OAuth redirect flow: tokens are minted locally and stay opaque to the
//! relay. The provider's real sign-in dance remains an external collaborator;
//! swapping it in means swapping this implementation.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::info;

use roomcast_core::{
    AuthError, Session, SessionStore, SignInProvider, Timestamp, UserProfile,
};

// ----------------------------------------------------------------------------
// Local Session Store
// ----------------------------------------------------------------------------

/// In-process identity provider for a single configured profile
pub struct LocalSessionStore {
    profile: UserProfile,
    current: Mutex<Option<Session>>,
    notify: watch::Sender<Option<Session>>,
}

impl LocalSessionStore {
    /// Create a store that signs the given profile in on demand
    pub fn new(profile: UserProfile) -> Self {
        let (notify, _) = watch::channel(None);
        Self {
            profile,
            current: Mutex::new(None),
            notify,
        }
    }
}

#[async_trait]
impl SessionStore for LocalSessionStore {
    fn session(&self) -> Option<Session> {
        self.current.lock().expect("session store poisoned").clone()
    }

    async fn sign_in(&self, provider: SignInProvider) -> Result<Session, AuthError> {
        let session = Session {
            access_token: uuid::Uuid::new_v4().to_string(),
            profile: self.profile.clone(),
            issued_at: Timestamp::now(),
            expires_at: None,
        };
        *self.current.lock().expect("session store poisoned") = Some(session.clone());
        let _ = self.notify.send(Some(session.clone()));
        info!(provider = provider.name(), user = %session.profile.user_id, "signed in");
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let previous = self
            .current
            .lock()
            .expect("session store poisoned")
            .take();
        if previous.is_none() {
            return Err(AuthError::NotSignedIn);
        }
        let _ = self.notify.send(None);
        info!(user = %self.profile.user_id, "signed out");
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.notify.subscribe()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use roomcast_core::UserId;

    fn store() -> LocalSessionStore {
        LocalSessionStore::new(UserProfile {
            user_id: UserId::new("u-1"),
            email: "alice@example.com".to_string(),
            display_name: Some("Alice".to_string()),
            avatar_url: None,
        })
    }

    #[tokio::test]
    async fn test_sign_in_creates_session() {
        let store = store();
        assert!(store.session().is_none());

        let session = store.sign_in(SignInProvider::Google).await.unwrap();
        assert!(!session.access_token.is_empty());
        assert_eq!(store.session().unwrap().access_token, session.access_token);
    }

    #[tokio::test]
    async fn test_sign_out_destroys_session() {
        let store = store();
        store.sign_in(SignInProvider::Google).await.unwrap();
        store.sign_out().await.unwrap();
        assert!(store.session().is_none());

        // Signing out twice is an auth failure, not a panic
        assert!(matches!(
            store.sign_out().await,
            Err(AuthError::NotSignedIn)
        ));
    }

    #[tokio::test]
    async fn test_subscribers_observe_lifecycle() {
        let store = store();
        let mut changes = store.subscribe();
        assert!(changes.borrow().is_none());

        store.sign_in(SignInProvider::Google).await.unwrap();
        changes.changed().await.unwrap();
        assert!(changes.borrow().is_some());

        store.sign_out().await.unwrap();
        changes.changed().await.unwrap();
        assert!(changes.borrow().is_none());
    }

    #[tokio::test]
    async fn test_each_sign_in_mints_a_fresh_token() {
        let store = store();
        let first = store.sign_in(SignInProvider::Google).await.unwrap();
        let second = store.sign_in(SignInProvider::Google).await.unwrap();
        assert_ne!(first.access_token, second.access_token);
    }
}
