//! Per-connection lifecycle: one task per accepted socket, a dedicated
//! writer task draining an unbounded channel so a slow client never blocks
//! a handler, and a single auth timer that disables itself once the
//! connection authenticates.

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::ids::{NetworkId, SocketId, UserId};
use crate::iphash;
use crate::protocol::{ErrorCode, ErrorPayload};
use crate::registry::{ConnectionFlags, SocketHandle};
use crate::server::SharedState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connected,
    Authed,
    Registered,
}

/// Mutable state owned by a single connection's task. Never shared —
/// cross-connection state lives in the registries.
pub struct ConnectionState {
    pub socket_id: SocketId,
    pub phase: Phase,
    pub user_id: Option<UserId>,
    pub network_id: Option<NetworkId>,
    pub identity_display_name: Option<String>,
    pub ip_hash: String,
    pub connected_at: Instant,
}

impl ConnectionState {
    fn new(socket_id: SocketId, ip_hash: String) -> Self {
        Self {
            socket_id,
            phase: Phase::Connected,
            user_id: None,
            network_id: None,
            identity_display_name: None,
            ip_hash,
            connected_at: Instant::now(),
        }
    }
}

/// Drives one accepted socket end to end: registers it, runs the auth
/// timer and read loop, then runs the disconnect path exactly once
/// regardless of how the loop ended.
pub async fn handle_socket(state: Arc<SharedState>, socket: WebSocket, remote_addr: SocketAddr) {
    let socket_id = SocketId::generate();
    let ip_hash = iphash::hash_ip(&state.ip_hash_salt, remote_addr.ip());
    info!(%socket_id, "connection accepted");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

    let writer_socket_id = socket_id.clone();
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_tx.send(msg).await.is_err() {
                break;
            }
        }
        tracing::debug!(socket_id = %writer_socket_id, "writer task exiting");
    });

    let flags = ConnectionFlags::new();
    let handle = SocketHandle::new(tx, flags.clone());
    state.registries.sockets.register(socket_id.clone(), handle.clone());

    let mut conn = ConnectionState::new(socket_id.clone(), ip_hash);

    let auth_deadline = tokio::time::sleep(state.config.auth_timeout());
    tokio::pin!(auth_deadline);

    loop {
        tokio::select! {
            _ = &mut auth_deadline, if conn.phase == Phase::Connected => {
                handle.send_frame("ERROR", &ErrorPayload::new(ErrorCode::TokenMissing));
                handle.send_close_with_code(crate::protocol::CLOSE_AUTH_TIMEOUT, "authentication timeout");
                break;
            }
            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        flags.mark_alive();
                        if let handlers::DispatchOutcome::Close =
                            handlers::dispatch(&state, &mut conn, &handle, &text).await
                        {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => {
                        flags.mark_alive();
                    }
                    Some(Ok(WsMessage::Binary(_))) => {}
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Err(err)) => {
                        warn!(%socket_id, %err, "websocket read error");
                        break;
                    }
                }
            }
        }
    }

    if flags.try_begin_cleanup() {
        state.disconnect_socket(&socket_id);
    }
}
