//! Connection manager and channel driver
//!
//! The [`ConnectionManager`] is a process-scoped handle with explicit
//! construction and disposal; consumers receive it by injection rather than
//! reaching for an ambient singleton. Each joined room gets one driver task
//! that owns the WebSocket and multiplexes outbound frames, inbound frames,
//! and the heartbeat timer. Transport loss degrades the channel and triggers
//! exponential-backoff reconnection with automatic re-join and presence
//! re-announcement; only explicit leave is terminal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};
use url::Url;

use roomcast_core::{
    wire, AuthError, ChannelEffect, ChannelLifecycleEvent, ChannelState, ClientFrame, PresenceMeta,
    PresenceSet, Result, RoomId, RoomcastError, ServerFrame, Session, Timestamp, UserProfile,
    DedupWindow,
};

use crate::channel::{Channel, ChannelEvent, ChannelHandle, ChannelStatus};
use crate::config::ClientConfig;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

// ----------------------------------------------------------------------------
// Connection Manager
// ----------------------------------------------------------------------------

struct ChannelRegistration {
    room: RoomId,
    leave: Arc<watch::Sender<bool>>,
    task: JoinHandle<()>,
}

/// Process-scoped owner of all channel connections
pub struct ConnectionManager {
    config: ClientConfig,
    channels: Mutex<Vec<ChannelRegistration>>,
    disposed: AtomicBool,
}

impl ConnectionManager {
    /// Create a manager for the configured relay. Validates the relay URL
    /// up front so a misconfiguration fails at init, not at first join.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Url::parse(&config.relay_url).map_err(|e| {
            RoomcastError::config_error(format!("invalid relay url {}: {}", config.relay_url, e))
        })?;
        Ok(Self {
            config,
            channels: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
        })
    }

    /// Open a logical channel on a room for the given session.
    ///
    /// Spawns the driver task; the returned [`Channel`] delivers events in
    /// receipt order until it is left or the manager is disposed.
    pub fn join(&self, room: RoomId, session: &Session) -> Result<Channel> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(RoomcastError::channel_unavailable(
                room,
                "connection manager disposed",
            ));
        }
        if session.access_token.trim().is_empty() {
            return Err(AuthError::MissingToken.into());
        }

        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.channel.outbound_buffer_size);
        let (event_tx, event_rx) = mpsc::channel(self.config.channel.event_buffer_size);
        let (status_tx, status_rx) = watch::channel(ChannelStatus::Joining);
        let (leave_tx, leave_rx) = watch::channel(false);
        let leave_tx = Arc::new(leave_tx);

        let driver = ChannelDriver {
            config: self.config.clone(),
            room: room.clone(),
            token: session.access_token.clone(),
            profile: session.profile.clone(),
            state: ChannelState::new_unjoined(room.clone()),
            dedup: DedupWindow::with_default_parameters(),
            outbound: outbound_rx,
            events: event_tx,
            status: status_tx,
            leave: leave_rx,
        };
        let task = tokio::spawn(driver.run());

        self.channels
            .lock()
            .expect("channel registry poisoned")
            .push(ChannelRegistration {
                room: room.clone(),
                leave: Arc::clone(&leave_tx),
                task,
            });

        let handle = ChannelHandle::new(
            room.clone(),
            session.profile.clone(),
            outbound_tx,
            status_rx,
            leave_tx,
        );
        Ok(Channel::new(room, event_rx, handle))
    }

    /// Leave every channel and stop all driver tasks. Idempotent; after
    /// disposal no channel delivers another event and `join` is refused.
    pub async fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        let drained: Vec<ChannelRegistration> = {
            let mut channels = self.channels.lock().expect("channel registry poisoned");
            channels.drain(..).collect()
        };
        for registration in drained {
            debug!(room = %registration.room, "disposing channel");
            let _ = registration.leave.send(true);
            let _ = registration.task.await;
        }
    }
}

// ----------------------------------------------------------------------------
// Channel Driver
// ----------------------------------------------------------------------------

/// Why one connection attempt ended
enum SessionEnd {
    /// Explicit leave (or handles dropped): terminal
    Left,
    /// The event consumer went away: terminal
    ConsumerGone,
    /// The relay rejected the subscription: terminal, no retry
    Rejected(String),
    /// Transport dropped: recoverable via reconnect
    TransportLost(String),
}

/// Outcome of waiting for the relay's join acknowledgment
enum JoinWait {
    Acked,
    Rejected(String),
    TransportLost(String),
}

struct ChannelDriver {
    config: ClientConfig,
    room: RoomId,
    token: String,
    profile: UserProfile,
    state: ChannelState,
    dedup: DedupWindow,
    outbound: mpsc::Receiver<ClientFrame>,
    events: mpsc::Sender<ChannelEvent>,
    status: watch::Sender<ChannelStatus>,
    leave: watch::Receiver<bool>,
}

impl ChannelDriver {
    async fn run(mut self) {
        self.apply(ChannelLifecycleEvent::JoinRequested);

        loop {
            match self.connect_and_run().await {
                SessionEnd::Left => {
                    self.apply(ChannelLifecycleEvent::Left);
                    self.set_status(ChannelStatus::Left);
                    info!(room = %self.room, "channel left");
                    break;
                }
                SessionEnd::ConsumerGone => {
                    self.set_status(ChannelStatus::Left);
                    debug!(room = %self.room, "event consumer gone, stopping driver");
                    break;
                }
                SessionEnd::Rejected(reason) => {
                    self.apply(ChannelLifecycleEvent::Left);
                    self.set_status(ChannelStatus::Left);
                    warn!(room = %self.room, %reason, "subscription rejected");
                    break;
                }
                SessionEnd::TransportLost(reason) => {
                    let effects = self.apply(ChannelLifecycleEvent::TransportLost {
                        reason: reason.clone(),
                    });
                    self.set_status(ChannelStatus::Degraded);
                    let attempt = effects
                        .iter()
                        .find_map(|effect| match effect {
                            ChannelEffect::ScheduleReconnect { attempt, .. } => Some(*attempt),
                            _ => None,
                        })
                        .unwrap_or(1);
                    let delay = self.config.reconnect.delay_for(attempt);
                    debug!(room = %self.room, %reason, attempt, ?delay, "transport lost, reconnecting");

                    let interrupted = tokio::select! {
                        _ = tokio::time::sleep(delay) => false,
                        _ = self.leave.changed() => true,
                    };
                    if interrupted || self.leave_requested() {
                        self.apply(ChannelLifecycleEvent::Left);
                        self.set_status(ChannelStatus::Left);
                        break;
                    }

                    self.apply(ChannelLifecycleEvent::ReconnectStarted);
                    self.set_status(ChannelStatus::Joining);
                }
            }
        }
        // Dropping the driver closes the event queue: delivery stops here,
        // nothing can fire against stale state
    }

    /// One full connection attempt: connect, join, subscribe, then pump
    /// frames until the session ends.
    async fn connect_and_run(&mut self) -> SessionEnd {
        let ws = tokio::select! {
            connected = connect_async(self.config.relay_url.as_str()) => match connected {
                Ok((ws, _)) => ws,
                Err(e) => return SessionEnd::TransportLost(e.to_string()),
            },
            _ = self.leave.changed() => return SessionEnd::Left,
        };
        let (mut sink, mut stream) = ws.split();

        let join = ClientFrame::Join {
            room: self.room.clone(),
            token: self.token.clone(),
            presence_key: self.profile.user_id.clone(),
        };
        if let Err(e) = send_frame(&mut sink, &join).await {
            return SessionEnd::TransportLost(e);
        }

        let wait = tokio::time::timeout(self.config.join_timeout, await_joined(&mut stream, &self.room));
        match wait.await {
            Err(_) => return SessionEnd::TransportLost("join acknowledgment timed out".to_string()),
            Ok(JoinWait::TransportLost(reason)) => return SessionEnd::TransportLost(reason),
            Ok(JoinWait::Rejected(reason)) => return SessionEnd::Rejected(reason),
            Ok(JoinWait::Acked) => {}
        }

        // Subscribed: presence must be (re)announced on every subscribe
        let effects = self.apply(ChannelLifecycleEvent::JoinAcked);
        self.set_status(ChannelStatus::Subscribed);
        for effect in effects {
            if let ChannelEffect::TrackPresence { .. } = effect {
                let track = ClientFrame::Track {
                    meta: PresenceMeta::new(self.profile.user_id.clone()),
                };
                if let Err(e) = send_frame(&mut sink, &track).await {
                    return SessionEnd::TransportLost(e);
                }
            }
        }
        info!(room = %self.room, "channel subscribed");

        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut last_ack = Instant::now();
        let mut nonce: u64 = 0;

        loop {
            tokio::select! {
                _ = self.leave.changed() => {
                    let _ = send_frame(&mut sink, &ClientFrame::Leave).await;
                    let _ = sink.close().await;
                    return SessionEnd::Left;
                }
                queued = self.outbound.recv() => match queued {
                    Some(frame) => {
                        if let Err(e) = send_frame(&mut sink, &frame).await {
                            return SessionEnd::TransportLost(e);
                        }
                    }
                    None => return SessionEnd::ConsumerGone,
                },
                inbound = stream.next() => match inbound {
                    None => return SessionEnd::TransportLost("connection closed".to_string()),
                    Some(Err(e)) => return SessionEnd::TransportLost(e.to_string()),
                    Some(Ok(Message::Text(text))) => match wire::decode::<ServerFrame>(&text) {
                        Ok(frame) => {
                            if let Some(end) = self.handle_server_frame(frame, &mut last_ack).await {
                                return end;
                            }
                        }
                        Err(e) => warn!(room = %self.room, error = %e, "dropping malformed frame"),
                    },
                    Some(Ok(Message::Ping(payload))) => {
                        if sink.send(Message::Pong(payload)).await.is_err() {
                            return SessionEnd::TransportLost("pong send failed".to_string());
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        return SessionEnd::TransportLost("closed by relay".to_string());
                    }
                    Some(Ok(_)) => {}
                },
                _ = heartbeat.tick() => {
                    if last_ack.elapsed() > self.config.heartbeat_timeout {
                        return SessionEnd::TransportLost("heartbeat timed out".to_string());
                    }
                    nonce = nonce.wrapping_add(1);
                    if let Err(e) = send_frame(&mut sink, &ClientFrame::Heartbeat { nonce }).await {
                        return SessionEnd::TransportLost(e);
                    }
                }
            }
        }
    }

    /// Route one relay frame. Returns `Some` when the session must end.
    async fn handle_server_frame(
        &mut self,
        frame: ServerFrame,
        last_ack: &mut Instant,
    ) -> Option<SessionEnd> {
        match frame {
            ServerFrame::Broadcast { message, .. } => {
                if self.dedup.observe(message.id, Timestamp::now()) {
                    debug!(room = %self.room, id = %message.id, "duplicate broadcast suppressed");
                    return None;
                }
                if self
                    .events
                    .send(ChannelEvent::Broadcast(message))
                    .await
                    .is_err()
                {
                    return Some(SessionEnd::ConsumerGone);
                }
                None
            }
            ServerFrame::PresenceSync { members } => {
                let set = PresenceSet::from_members(members);
                if self
                    .events
                    .send(ChannelEvent::PresenceSync(set))
                    .await
                    .is_err()
                {
                    return Some(SessionEnd::ConsumerGone);
                }
                None
            }
            ServerFrame::HeartbeatAck { .. } => {
                *last_ack = Instant::now();
                None
            }
            // Re-join acknowledgments over a live connection carry no news
            ServerFrame::Joined { .. } => None,
            ServerFrame::Error { code, reason } => {
                warn!(room = %self.room, ?code, %reason, "relay reported an error");
                None
            }
        }
    }

    fn apply(&mut self, event: ChannelLifecycleEvent) -> Vec<ChannelEffect> {
        let current = std::mem::replace(&mut self.state, ChannelState::new_unjoined(self.room.clone()));
        match current.transition(event) {
            Ok(transition) => {
                trace!(
                    room = %self.room,
                    state = transition.new_state.state_name(),
                    "lifecycle transition"
                );
                self.state = transition.new_state;
                transition.effects
            }
            Err(e) => {
                warn!(room = %self.room, error = %e, "lifecycle transition refused");
                Vec::new()
            }
        }
    }

    fn set_status(&self, status: ChannelStatus) {
        let _ = self.status.send(status);
    }

    fn leave_requested(&self) -> bool {
        *self.leave.borrow()
    }
}

// ----------------------------------------------------------------------------
// Frame Helpers
// ----------------------------------------------------------------------------

async fn send_frame(sink: &mut WsSink, frame: &ClientFrame) -> std::result::Result<(), String> {
    let text = wire::encode(frame).map_err(|e| e.to_string())?;
    sink.send(Message::Text(text)).await.map_err(|e| e.to_string())
}

/// Read frames until the relay acknowledges the join
async fn await_joined(stream: &mut WsStream, room: &RoomId) -> JoinWait {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => match wire::decode::<ServerFrame>(&text) {
                Ok(ServerFrame::Joined { room: joined }) if &joined == room => {
                    return JoinWait::Acked;
                }
                Ok(ServerFrame::Error { code, reason }) => {
                    return JoinWait::Rejected(format!("{:?}: {}", code, reason));
                }
                Ok(_) => {}
                Err(e) => warn!(%room, error = %e, "dropping malformed frame before join ack"),
            },
            Ok(Message::Close(_)) => return JoinWait::TransportLost("closed by relay".to_string()),
            Ok(_) => {}
            Err(e) => return JoinWait::TransportLost(e.to_string()),
        }
    }
    JoinWait::TransportLost("connection closed".to_string())
}
