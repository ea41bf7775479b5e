//! Authenticated websocket fan-out.
//!
//! Every registry event is serialized once into an [`Envelope`] and pushed
//! through a tokio broadcast channel. Each connection owns a receiver, so a
//! slow viewer only ever lags itself; when it falls behind it is sent a full
//! `resync` snapshot instead of the dropped events.

use crate::validate;
use crate::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use claw_office_engine::{now_ms, ConnectionId, EventSink, RegistryError};
use claw_office_protocol::events::{ClientMessage, ServerEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct Envelope {
    /// Connection that caused the event; it is not echoed back there.
    pub origin: Option<ConnectionId>,
    pub text: Arc<str>,
}

pub struct Hub {
    tx: broadcast::Sender<Envelope>,
    next_id: AtomicU64,
}

impl Hub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    pub fn next_connection_id(&self) -> ConnectionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn viewers(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl EventSink for Hub {
    fn publish(&self, event: ServerEvent, skip: Option<ConnectionId>) {
        let text = match serde_json::to_string(&event) {
            Ok(text) => text,
            Err(err) => {
                warn!(kind = event.kind(), error = %err, "event serialization failed");
                return;
            }
        };
        // No receivers is fine: nobody is watching.
        let _ = self.tx.send(Envelope {
            origin: skip,
            text: text.into(),
        });
    }
}

/// What the socket loop should do after an inbound frame.
#[derive(Debug)]
pub enum Reply {
    Nothing,
    Send(ServerEvent),
    /// Authentication succeeded: start forwarding broadcasts from `receiver`,
    /// after sending the snapshot.
    Subscribe {
        receiver: broadcast::Receiver<Envelope>,
        snapshot: ServerEvent,
    },
}

/// What the socket loop should do with one broadcast receive.
#[derive(Debug)]
pub enum Outbound {
    Skip,
    Text(Arc<str>),
    Send(ServerEvent),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connected,
    Authenticated,
}

/// Per-connection state machine. A connection starts in `Connected`, moves
/// to `Authenticated` on the first valid `auth`, and stays there until the
/// socket closes. Unauthenticated traffic gets an error but the socket is
/// left open so the client can retry.
#[derive(Debug)]
pub struct Session {
    pub id: ConnectionId,
    phase: Phase,
}

impl Session {
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            phase: Phase::Connected,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn on_frame(&mut self, text: &str, state: &AppState, now_ms: i64) -> Reply {
        let msg: ClientMessage = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(err) => {
                debug!(conn = self.id, error = %err, "malformed frame");
                return Reply::Send(ServerEvent::error("BadRequest", "malformed message"));
            }
        };

        match (self.phase, msg) {
            (Phase::Connected, ClientMessage::Auth { token }) => {
                match state.tokens.verify(&token, now_ms) {
                    Ok(()) => {
                        // Subscribe before taking the snapshot so no event
                        // can fall between the two.
                        let receiver = state.hub.subscribe();
                        self.phase = Phase::Authenticated;
                        info!(conn = self.id, "viewer authenticated");
                        Reply::Subscribe {
                            receiver,
                            snapshot: ServerEvent::AuthSuccess {
                                bots: state.registry.views(),
                            },
                        }
                    }
                    Err(err) => {
                        debug!(conn = self.id, error = %err, "auth failed");
                        Reply::Send(ServerEvent::AuthFailed {
                            error: err.to_string(),
                        })
                    }
                }
            }
            (Phase::Connected, ClientMessage::BotUpdate { .. }) => Reply::Send(
                ServerEvent::error("Unauthenticated", "authenticate before sending updates"),
            ),
            (Phase::Authenticated, ClientMessage::Auth { .. }) => Reply::Send(
                ServerEvent::Resync {
                    bots: state.registry.views(),
                },
            ),
            (Phase::Authenticated, ClientMessage::BotUpdate { bot }) => {
                let position = match validate::position(bot.x, bot.y) {
                    Ok(p) => p,
                    Err(err) => return Reply::Send(ServerEvent::error("BadRequest", err.message)),
                };
                match state.registry.sync_position(&bot.id, position, Some(self.id)) {
                    Ok(()) => Reply::Nothing,
                    Err(RegistryError::NotFound(id)) => Reply::Send(ServerEvent::error(
                        "NotFound",
                        format!("bot {id} not found"),
                    )),
                    Err(err) => Reply::Send(ServerEvent::error("Internal", err.to_string())),
                }
            }
        }
    }

    /// Decides the fate of one broadcast receive. Nothing is forwarded before
    /// authentication, and a connection never sees events it caused itself.
    pub fn on_broadcast(
        &self,
        received: Result<Envelope, broadcast::error::RecvError>,
        state: &AppState,
    ) -> Outbound {
        if self.phase != Phase::Authenticated {
            return Outbound::Skip;
        }
        match received {
            Ok(envelope) if envelope.origin == Some(self.id) => Outbound::Skip,
            Ok(envelope) => Outbound::Text(envelope.text),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(conn = self.id, skipped, "viewer lagged; sending resync");
                Outbound::Send(ServerEvent::Resync {
                    bots: state.registry.views(),
                })
            }
            Err(broadcast::error::RecvError::Closed) => Outbound::Close,
        }
    }
}

pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_socket(socket, state))
}

async fn run_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let mut session = Session::new(state.hub.next_connection_id());
    let mut rx: Option<broadcast::Receiver<Envelope>> = None;
    debug!(conn = session.id, "viewer connected");

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match session.on_frame(text.as_str(), &state, now_ms()) {
                            Reply::Nothing => {}
                            Reply::Send(event) => {
                                if send_event(&mut socket, &event).await.is_err() {
                                    break;
                                }
                            }
                            Reply::Subscribe { receiver, snapshot } => {
                                rx = Some(receiver);
                                if send_event(&mut socket, &snapshot).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
            received = next_broadcast(&mut rx) => {
                let sent = match session.on_broadcast(received, &state) {
                    Outbound::Skip => Ok(()),
                    Outbound::Text(text) => socket.send(Message::Text(text.to_string().into())).await,
                    Outbound::Send(event) => send_event(&mut socket, &event).await,
                    Outbound::Close => break,
                };
                if sent.is_err() {
                    break;
                }
            }
        }
    }
    debug!(conn = session.id, "viewer disconnected");
}

/// Pends forever until the connection has subscribed.
async fn next_broadcast(
    rx: &mut Option<broadcast::Receiver<Envelope>>,
) -> Result<Envelope, broadcast::error::RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> Result<(), axum::Error> {
    let payload = serde_json::to_string(event).map_err(axum::Error::new)?;
    socket.send(Message::Text(payload.into())).await
}
