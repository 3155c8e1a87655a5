//! Connection gateway: authentication gate, per-connection event loop and the
//! shared fan-out state.
//!
//! Handlers for a single connection run sequentially inside that connection's
//! task; connections run concurrently. All presence/room mutations go through
//! `GatewayState`, whose tables are concurrent maps, so no further locking is
//! needed on the event path.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, HeaderMap},
    response::Response,
};
use dashmap::DashMap;
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    auth::{token_from_cookie_header, verify_token},
    error::ApiError,
    models::ChatView,
    realtime::{events::ClientEvent, events::ServerEvent, presence::PresenceRegistry, rooms::RoomRouter},
    store::ChatStore,
    AppState,
};

const JOIN_ERROR: &str = "Error joining chat";

/// Shared connection/presence/room state for one gateway process.
pub struct GatewayState {
    connections: DashMap<String, mpsc::Sender<ServerEvent>>,
    pub presence: PresenceRegistry,
    pub rooms: RoomRouter,
    buffer: usize,
}

impl GatewayState {
    pub fn new(buffer: usize) -> Self {
        Self {
            connections: DashMap::new(),
            presence: PresenceRegistry::new(),
            rooms: RoomRouter::new(),
            buffer: buffer.max(16),
        }
    }

    /// Outbound event queue for one connection.
    pub fn channel(&self) -> (mpsc::Sender<ServerEvent>, mpsc::Receiver<ServerEvent>) {
        mpsc::channel(self.buffer)
    }

    /// Register an authenticated connection: track its outbox, subscribe it to
    /// the user's personal channel, take over presence and announce the roster.
    pub fn connect(&self, user_id: &str, conn_id: &str, tx: mpsc::Sender<ServerEvent>) {
        self.connections.insert(conn_id.to_string(), tx);
        self.rooms.join_personal(user_id, conn_id);
        self.presence.register(user_id, conn_id);
        self.broadcast_all(ServerEvent::OnlineUsers {
            users: self.presence.roster(),
        });
    }

    /// Tear down a closing connection. The presence entry is only dropped (and
    /// the roster re-broadcast) when this connection still owns it.
    pub fn disconnect(&self, user_id: &str, conn_id: &str) {
        self.rooms.drop_connection(conn_id);
        self.rooms.leave_personal(user_id, conn_id);
        if self.presence.unregister(user_id, conn_id) {
            self.broadcast_all(ServerEvent::OnlineUsers {
                users: self.presence.roster(),
            });
        }
        self.connections.remove(conn_id);
    }

    pub fn send_to_conn(&self, conn_id: &str, event: ServerEvent) {
        if let Some(tx) = self.connections.get(conn_id) {
            if tx.try_send(event).is_err() {
                warn!(conn = %conn_id, "Slow consumer, dropping event");
            }
        }
    }

    pub fn broadcast_all(&self, event: ServerEvent) {
        for entry in self.connections.iter() {
            if entry.value().try_send(event.clone()).is_err() {
                warn!(conn = %entry.key(), "Slow consumer, dropping event");
            }
        }
    }

    /// Fan out to a chat room, optionally excluding one connection
    /// (the sender already holds an optimistic local copy).
    pub fn broadcast_room(&self, chat_id: &str, event: ServerEvent, except: Option<&str>) {
        for conn in self.rooms.members(chat_id) {
            if Some(conn.as_str()) == except {
                continue;
            }
            self.send_to_conn(&conn, event.clone());
        }
    }

    /// Fan out on a user's personal channel, independent of room membership.
    pub fn send_to_user(&self, user_id: &str, event: ServerEvent) {
        for conn in self.rooms.personal_members(user_id) {
            self.send_to_conn(&conn, event.clone());
        }
    }

    /// Announce a newly created chat to every participant's personal channel.
    pub fn notify_chat_created(&self, participant_ids: &[String], chat: ChatView) {
        for user_id in participant_ids {
            self.send_to_user(user_id, ServerEvent::ChatNew { chat: chat.clone() });
        }
    }
}

/// WebSocket entry point. The credential gate runs before the upgrade: a
/// connection that cannot present a valid `accessToken` cookie never reaches
/// any other handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let raw_cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;
    let token = token_from_cookie_header(raw_cookie).ok_or(ApiError::Unauthorized)?;
    let claims = verify_token(token, &state.config.jwt_secret)?;
    let user_id = claims.user_id;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user_id)))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: String) {
    let conn_id = Uuid::new_v4().to_string();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = state.gateway.channel();

    state.gateway.connect(&user_id, &conn_id, tx);
    info!(user = %user_id, conn = %conn_id, "Connection registered");

    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(j) => j,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize event");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_rx.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => {
                    handle_client_event(
                        &state.gateway,
                        state.store.as_ref(),
                        &user_id,
                        &conn_id,
                        event,
                    )
                    .await;
                }
                Err(e) => {
                    debug!(error = %e, "Ignoring malformed client event");
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.gateway.disconnect(&user_id, &conn_id);
    send_task.abort();
    info!(user = %user_id, conn = %conn_id, "Connection closed");
}

/// Handle one event from an authenticated connection. Sequential per
/// connection; the ws loop awaits each call before reading the next frame.
pub async fn handle_client_event(
    gateway: &GatewayState,
    store: &dyn ChatStore,
    user_id: &str,
    conn_id: &str,
    event: ClientEvent,
) {
    match event {
        ClientEvent::Join { chat_id } => {
            let allowed = match store.is_participant(&chat_id, user_id).await {
                Ok(ok) => ok,
                Err(e) => {
                    warn!(chat = %chat_id, error = ?e, "Participant check failed");
                    false
                }
            };
            if allowed {
                gateway.rooms.join(conn_id, &chat_id);
                gateway.send_to_conn(
                    conn_id,
                    ServerEvent::JoinAck {
                        chat_id,
                        error: None,
                    },
                );
            } else {
                gateway.send_to_conn(
                    conn_id,
                    ServerEvent::JoinAck {
                        chat_id,
                        error: Some(JOIN_ERROR.to_string()),
                    },
                );
            }
        }

        ClientEvent::Leave { chat_id } => {
            gateway.rooms.leave(conn_id, &chat_id);
        }

        // Relay only; the 1000 ms debounce lives on the sending client.
        // Self-exclusion uses the sender's current connection from presence;
        // when unknown, the full room hears it (tolerable self-echo).
        ClientEvent::Typing {
            chat_id,
            user_id: typing_user,
            name,
        } => {
            let except = gateway.presence.conn_of(&typing_user);
            gateway.broadcast_room(
                &chat_id,
                ServerEvent::Typing {
                    user_id: typing_user,
                    name,
                },
                except.as_deref(),
            );
        }

        ClientEvent::StopTyping {
            chat_id,
            user_id: typing_user,
            name,
        } => {
            let except = gateway.presence.conn_of(&typing_user);
            gateway.broadcast_room(
                &chat_id,
                ServerEvent::StopTyping {
                    user_id: typing_user,
                    name,
                },
                except.as_deref(),
            );
        }
    }
}
