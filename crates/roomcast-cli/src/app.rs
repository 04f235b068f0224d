//! Application wiring: session, connection, channel, and rendering
//!
//! The app owns the injected collaborators (session store, connection
//! manager, chat state) and drives the terminal front end. Rendering is
//! a projection subscribed to the state holder; it never touches the network.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;
use tracing::{info, warn};

use roomcast_client::{
    Channel, ChannelHandle, ChannelStatus, ChatState, ClientConfig, ConnectionManager,
    LocalSessionStore, SendOutcome, StateSnapshot,
};
use roomcast_core::{
    ChatMessage, RoomId, Session, SessionStore, SignInProvider, Timestamp, UserId, UserProfile,
};

use crate::config::AppConfig;
use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// Chat Application
// ----------------------------------------------------------------------------

/// The assembled chat application
pub struct ChatApp {
    config: AppConfig,
    sessions: Arc<LocalSessionStore>,
    manager: ConnectionManager,
    state: Arc<ChatState>,
}

impl ChatApp {
    /// Assemble the app for a display name
    pub fn new(config: AppConfig, display_name: &str) -> Result<Self> {
        let profile = build_profile(&config, display_name);
        let sessions = Arc::new(LocalSessionStore::new(profile));
        let manager = ConnectionManager::new(ClientConfig::new(config.relay.url.clone()))?;
        Ok(Self {
            config,
            sessions,
            manager,
            state: Arc::new(ChatState::new()),
        })
    }

    /// Room to use: explicit override or the configured default
    pub fn resolve_room(&self, room: Option<String>) -> RoomId {
        RoomId::new(room.unwrap_or_else(|| self.config.chat.room.clone()))
    }

    /// Interactive chat: join, render incoming traffic, send stdin lines
    pub async fn run_chat(&self, room: RoomId) -> Result<()> {
        let (session, handle) = self.open_channel(room.clone()).await?;
        let own_id = session.profile.user_id.clone();

        println!(
            "joined {} as {} (type to chat, /quit to exit)",
            room,
            session.profile.render_name()
        );
        let render = tokio::spawn(render_projection(self.state.subscribe(), own_id));

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let Some(line) = lines.next_line().await? else {
                break;
            };
            let trimmed = line.trim();
            if trimmed == "/quit" {
                break;
            }
            if trimmed == "/who" {
                let snapshot = self.state.snapshot();
                println!("* online: {}", render_members(&snapshot));
                continue;
            }
            match handle.send_chat(&line) {
                Ok(SendOutcome::Sent(_)) | Ok(SendOutcome::SkippedEmpty) => {}
                // Input is echoed back so the user can retry by hand
                Err(e) => println!("! send failed ({}); your message was: {}", e, line),
            }
        }

        render.abort();
        self.shutdown(handle).await;
        Ok(())
    }

    /// One-shot send: join, deliver, wait for the echo, exit
    pub async fn run_send(&self, room: RoomId, message: &str) -> Result<()> {
        let (_session, handle) = self.open_channel(room).await?;

        match handle.send_chat(message)? {
            SendOutcome::SkippedEmpty => {
                println!("nothing to send");
            }
            SendOutcome::Sent(id) => {
                // The echo-inclusive broadcast confirms the relay fanned it out
                self.wait_for_state("send confirmation", |snapshot| {
                    snapshot.messages.iter().any(|m| m.id == id)
                })
                .await?;
                info!(%id, "message delivered");
            }
        }

        self.shutdown(handle).await;
        Ok(())
    }

    /// Show the current membership set and exit
    pub async fn run_who(&self, room: RoomId) -> Result<()> {
        let (session, handle) = self.open_channel(room).await?;
        let own_id = session.profile.user_id.clone();

        // Once our own track round-trips, the mirror is current
        self.wait_for_state("presence sync", move |snapshot| {
            snapshot.online.contains(&own_id)
        })
        .await?;

        let snapshot = self.state.snapshot();
        println!("{} online: {}", snapshot.online.len(), render_members(&snapshot));

        self.shutdown(handle).await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    /// Sign in, join the room, and start pumping events into the state
    async fn open_channel(&self, room: RoomId) -> Result<(Session, ChannelHandle)> {
        let session = self.sessions.sign_in(SignInProvider::Google).await?;
        self.state.apply_session(Some(session.clone()));

        let channel = self.manager.join(room, &session)?;
        let handle = channel.handle();
        spawn_pump(channel, Arc::clone(&self.state));

        self.wait_subscribed(&handle).await?;
        Ok((session, handle))
    }

    async fn wait_subscribed(&self, handle: &ChannelHandle) -> Result<()> {
        let deadline =
            Instant::now() + Duration::from_secs(self.config.chat.subscribe_timeout_secs);
        while handle.status() != ChannelStatus::Subscribed {
            if handle.status() == ChannelStatus::Left {
                return Err(CliError::Config("subscription was rejected".to_string()));
            }
            if Instant::now() >= deadline {
                return Err(CliError::Timeout("waiting for channel subscribe".to_string()));
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Ok(())
    }

    async fn wait_for_state(
        &self,
        what: &str,
        cond: impl Fn(&StateSnapshot) -> bool,
    ) -> Result<()> {
        let deadline =
            Instant::now() + Duration::from_secs(self.config.chat.subscribe_timeout_secs);
        let mut changes = self.state.subscribe();
        loop {
            if cond(&changes.borrow().clone()) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(CliError::Timeout(format!("waiting for {}", what)));
            }
            if changes.changed().await.is_err() {
                return Err(CliError::Timeout(format!("waiting for {}", what)));
            }
        }
    }

    async fn shutdown(&self, handle: ChannelHandle) {
        handle.leave();
        self.manager.dispose().await;
        if let Err(e) = self.sessions.sign_out().await {
            warn!(error = %e, "sign-out failed");
        }
        self.state.apply_session(None);
    }
}

// ----------------------------------------------------------------------------
// Projections and Helpers
// ----------------------------------------------------------------------------

fn build_profile(config: &AppConfig, display_name: &str) -> UserProfile {
    let handle = display_name.to_lowercase().replace(char::is_whitespace, "-");
    UserProfile {
        user_id: UserId::new(handle.clone()),
        email: config
            .identity
            .email
            .clone()
            .unwrap_or_else(|| format!("{}@local", handle)),
        display_name: Some(display_name.to_string()),
        avatar_url: config.identity.avatar_url.clone(),
    }
}

fn spawn_pump(mut channel: Channel, state: Arc<ChatState>) {
    tokio::spawn(async move {
        while let Some(event) = channel.recv().await {
            state.apply_event(event);
        }
    });
}

/// Print new messages and presence changes as the state advances
async fn render_projection(
    mut changes: tokio::sync::watch::Receiver<StateSnapshot>,
    own_id: UserId,
) {
    let mut rendered_messages = 0;
    let mut last_online = None;

    loop {
        let snapshot = changes.borrow().clone();

        for message in snapshot.messages.iter().skip(rendered_messages) {
            println!("{}", render_message(message, &own_id));
        }
        rendered_messages = snapshot.messages.len();

        let online = snapshot.online.len();
        if last_online != Some(online) {
            println!("* {} online", online);
            last_online = Some(online);
        }

        if changes.changed().await.is_err() {
            break;
        }
    }
}

fn render_message(message: &ChatMessage, own_id: &UserId) -> String {
    let who = if message.is_from(own_id) {
        "You".to_string()
    } else {
        message
            .display_name
            .clone()
            .unwrap_or_else(|| message.sender.to_string())
    };
    format!("[{}] {}: {}", render_time(message.sent_at), who, message.body)
}

fn render_time(ts: Timestamp) -> String {
    let secs = ts.as_millis() / 1000;
    format!("{:02}:{:02}", (secs / 3600) % 24, (secs / 60) % 60)
}

fn render_members(snapshot: &StateSnapshot) -> String {
    let names: Vec<String> = snapshot.online.iter().map(|u| u.to_string()).collect();
    if names.is_empty() {
        "nobody".to_string()
    } else {
        names.join(", ")
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
