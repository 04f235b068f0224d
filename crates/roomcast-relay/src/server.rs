//! Relay WebSocket server
//!
//! Accepts connections, upgrades them to WebSocket, and drives one task per
//! connection. Each task multiplexes the room's fan-out stream and the
//! client's inbound frames with `select!`; a connection holds at most one
//! logical room membership.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use tracing::{debug, info, warn};

use roomcast_core::{wire, ClientFrame, ErrorCode, RoomId, RoomcastError, ServerFrame};

use crate::config::RelayConfig;
use crate::error::Result;
use crate::room::{ConnId, RoomRegistry};

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsStream = SplitStream<WebSocketStream<TcpStream>>;

// ----------------------------------------------------------------------------
// Relay Server
// ----------------------------------------------------------------------------

/// The relay: a WebSocket listener over a shared room registry
pub struct RelayServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    registry: Arc<RoomRegistry>,
    config: RelayConfig,
}

impl RelayServer {
    /// Bind the configured address. Binding and running are separate so
    /// callers (and tests) can learn the bound port before serving.
    pub async fn bind(config: RelayConfig) -> Result<Self> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        let registry = Arc::new(RoomRegistry::new(config.channel.fanout_buffer_size));
        Ok(Self {
            listener,
            local_addr,
            registry,
            config,
        })
    }

    /// The address the listener actually bound
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Shared room registry handle
    pub fn registry(&self) -> Arc<RoomRegistry> {
        Arc::clone(&self.registry)
    }

    /// Accept connections until the listener fails. Connection tasks live in
    /// a `JoinSet`, so dropping or aborting this future tears them down too.
    pub async fn run(self) -> Result<()> {
        info!(addr = %self.local_addr, "relay listening");
        let mut next_conn: u64 = 0;
        let mut connections = tokio::task::JoinSet::new();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    next_conn += 1;
                    let conn = ConnId::new(next_conn);
                    let registry = Arc::clone(&self.registry);
                    let config = self.config.clone();

                    connections.spawn(async move {
                        debug!(%peer, %conn, "connection accepted");
                        if let Err(e) = handle_connection(stream, conn, registry, config).await {
                            debug!(%peer, %conn, error = %e, "connection closed with error");
                        } else {
                            debug!(%peer, %conn, "connection closed");
                        }
                    });
                }
                Some(_) = connections.join_next() => {}
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Connection Handling
// ----------------------------------------------------------------------------

async fn handle_connection(
    stream: TcpStream,
    conn: ConnId,
    registry: Arc<RoomRegistry>,
    config: RelayConfig,
) -> Result<()> {
    let ws = accept_async(stream).await?;
    let (mut sink, mut inbound) = ws.split();

    // A connection must join before anything else flows
    let Some((room, fanout)) = await_join(&mut sink, &mut inbound, conn, &registry, &config).await?
    else {
        return Ok(());
    };

    let result = room_loop(
        &mut sink, &mut inbound, fanout, &room, conn, &registry, &config,
    )
    .await;

    // Disconnect or leave: drop presence and resync the survivors
    registry.remove(&room, conn);
    result
}

/// Phase one: read frames until a valid join arrives.
/// Returns `None` when the peer disconnects before joining.
async fn await_join(
    sink: &mut WsSink,
    inbound: &mut WsStream,
    conn: ConnId,
    registry: &RoomRegistry,
    config: &RelayConfig,
) -> Result<Option<(RoomId, broadcast::Receiver<ServerFrame>)>> {
    while let Some(msg) = inbound.next().await {
        match msg? {
            Message::Text(text) => {
                let frame = match decode_frame(&text, config) {
                    Ok(frame) => frame,
                    Err(reason) => {
                        send_error(sink, ErrorCode::BadFrame, reason).await?;
                        continue;
                    }
                };
                match frame {
                    ClientFrame::Join {
                        room,
                        token,
                        presence_key,
                    } => {
                        // Tokens are opaque here; verification belongs to the
                        // identity provider. Absence is still rejected.
                        if token.trim().is_empty() {
                            send_error(sink, ErrorCode::Unauthorized, "missing access token")
                                .await?;
                            continue;
                        }
                        let (rx, snapshot) = registry.subscribe(&room);
                        send_frame(sink, &ServerFrame::Joined { room: room.clone() }).await?;
                        send_frame(
                            sink,
                            &ServerFrame::PresenceSync {
                                members: snapshot.iter().cloned().collect(),
                            },
                        )
                        .await?;
                        debug!(%conn, %room, user = %presence_key, "joined");
                        return Ok(Some((room, rx)));
                    }
                    ClientFrame::Heartbeat { nonce } => {
                        send_frame(sink, &ServerFrame::HeartbeatAck { nonce }).await?;
                    }
                    ClientFrame::Leave => return Ok(None),
                    _ => {
                        send_error(sink, ErrorCode::NotJoined, "join required first").await?;
                    }
                }
            }
            Message::Ping(payload) => sink.send(Message::Pong(payload)).await?,
            Message::Close(_) => return Ok(None),
            _ => {}
        }
    }
    Ok(None)
}

/// Whether the connection loop should continue
enum Flow {
    Continue,
    Stop,
}

/// Phase two: multiplex room fan-out and client frames
async fn room_loop(
    sink: &mut WsSink,
    inbound: &mut WsStream,
    mut fanout: broadcast::Receiver<ServerFrame>,
    room: &RoomId,
    conn: ConnId,
    registry: &RoomRegistry,
    config: &RelayConfig,
) -> Result<()> {
    loop {
        tokio::select! {
            fanned = fanout.recv() => match fanned {
                Ok(frame) => send_frame(sink, &frame).await?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Best-effort delivery: a lagging subscriber loses frames
                    // rather than stalling the room
                    warn!(%conn, %room, skipped, "subscriber lagged, frames dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            msg = inbound.next() => match msg {
                None => break,
                Some(Err(e)) => {
                    debug!(%conn, %room, error = %e, "transport error");
                    break;
                }
                Some(Ok(Message::Text(text))) => {
                    match handle_client_frame(sink, &text, room, conn, registry, config).await? {
                        Flow::Continue => {}
                        Flow::Stop => break,
                    }
                }
                Some(Ok(Message::Ping(payload))) => sink.send(Message::Pong(payload)).await?,
                Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            },
        }
    }
    Ok(())
}

async fn handle_client_frame(
    sink: &mut WsSink,
    text: &str,
    room: &RoomId,
    conn: ConnId,
    registry: &RoomRegistry,
    config: &RelayConfig,
) -> Result<Flow> {
    let frame = match decode_frame(text, config) {
        Ok(frame) => frame,
        Err(reason) => {
            send_error(sink, ErrorCode::BadFrame, reason).await?;
            return Ok(Flow::Continue);
        }
    };

    match frame {
        ClientFrame::Broadcast { event, message } => {
            registry.broadcast(room, ServerFrame::Broadcast { event, message });
        }
        ClientFrame::Track { meta } => {
            registry.track(room, conn, meta.user_id);
        }
        ClientFrame::Heartbeat { nonce } => {
            send_frame(sink, &ServerFrame::HeartbeatAck { nonce }).await?;
        }
        ClientFrame::Join { room: requested, .. } => {
            if requested == *room {
                // Idempotent rejoin over the same connection: re-ack with a
                // fresh presence snapshot
                send_frame(sink, &ServerFrame::Joined { room: room.clone() }).await?;
                let snapshot = registry.presence(room);
                send_frame(
                    sink,
                    &ServerFrame::PresenceSync {
                        members: snapshot.iter().cloned().collect(),
                    },
                )
                .await?;
            } else {
                send_error(
                    sink,
                    ErrorCode::BadFrame,
                    format!("connection already joined to {}", room),
                )
                .await?;
            }
        }
        ClientFrame::Leave => {
            let _ = sink.send(Message::Close(None)).await;
            return Ok(Flow::Stop);
        }
    }
    Ok(Flow::Continue)
}

// ----------------------------------------------------------------------------
// Frame Helpers
// ----------------------------------------------------------------------------

fn decode_frame(text: &str, config: &RelayConfig) -> std::result::Result<ClientFrame, String> {
    if text.len() > config.max_frame_bytes {
        return Err(format!(
            "frame too large: {} bytes (max: {})",
            text.len(),
            config.max_frame_bytes
        ));
    }
    wire::decode(text).map_err(|e| e.to_string())
}

async fn send_frame(sink: &mut WsSink, frame: &ServerFrame) -> Result<()> {
    let text = wire::encode(frame).map_err(RoomcastError::from)?;
    sink.send(Message::Text(text)).await?;
    Ok(())
}

async fn send_error(sink: &mut WsSink, code: ErrorCode, reason: impl Into<String>) -> Result<()> {
    send_frame(
        sink,
        &ServerFrame::Error {
            code,
            reason: reason.into(),
        },
    )
    .await
}
