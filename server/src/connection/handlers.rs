//! Event handlers. Each is a function of (state, connection, outbound
//! handle, payload) that mutates registries and/or emits frames; none of
//! them suspend except `AUTH`, which is the one event allowed to call out
//! to the identity verifier and membership resolver.

use tracing::{debug, info};

use super::{ConnectionState, Phase};
use crate::broadcast::{broadcast_peer_status, connection_mode_for, profile_of};
use crate::error::{AuthError, VerifyError};
use crate::ids::{NetworkId, RequestId, SessionId, UserId};
use crate::protocol::{
    AuthPayload, AuthSuccessPayload, ConnectionAcceptedPayload, ConnectionRejectedPayload,
    ConnectionRequestPayload, ConnectionRequestReceivedPayload, ConnectionResponsePayload, ErrorCode,
    ErrorPayload, FromPeer, InboundFrame, MessageReceivedPayload, PeerListEntry, PeerRegisterPayload,
    PeerRegisteredPayload, PeersListPayload, PongPayload, SendMessagePayload, SessionCreatedPayload,
    StatusSetPayload,
};
use crate::registry::{NewPeer, PeerStatus, RoleTag};
use crate::server::SharedState;

pub enum DispatchOutcome {
    Continue,
    Close,
}

pub async fn dispatch(
    state: &SharedState,
    conn: &mut ConnectionState,
    handle: &crate::registry::SocketHandle,
    text: &str,
) -> DispatchOutcome {
    let frame = match InboundFrame::parse(text) {
        Ok(frame) => frame,
        Err(_) => {
            handle.send_frame("ERROR", &ErrorPayload::new(ErrorCode::InvalidMessage));
            return DispatchOutcome::Continue;
        }
    };
    debug!(event = %frame.event, "inbound frame");

    match frame.event.as_str() {
        "AUTH" => handle_auth(state, conn, handle, &frame).await,
        "PING" => handle_ping(state, conn, handle),
        "PEER_REGISTER" => handle_peer_register(state, conn, handle, &frame),
        "DISCOVER_PEERS" => handle_discover_peers(state, conn, handle),
        "CONNECTION_REQUEST" => handle_connection_request(state, conn, handle, &frame),
        "CONNECTION_RESPONSE" => handle_connection_response(state, conn, handle, &frame),
        "SEND_MESSAGE" => handle_send_message(state, conn, handle, &frame),
        "STATUS_SET" => handle_status_set(state, conn, handle, &frame),
        other => {
            handle.send_frame(
                "ERROR",
                &ErrorPayload::with_message(ErrorCode::InvalidMessage, format!("unknown event: {other}")),
            );
            DispatchOutcome::Continue
        }
    }
}

/// Gate for REGISTERED-only events. Emits the appropriate error and
/// returns `false` if the connection isn't there yet.
fn require_registered(conn: &ConnectionState, handle: &crate::registry::SocketHandle) -> bool {
    match conn.phase {
        Phase::Registered => true,
        Phase::Connected => {
            handle.send_frame("ERROR", &ErrorPayload::new(ErrorCode::SocketNotAuthenticated));
            false
        }
        Phase::Authed => {
            handle.send_frame("ERROR", &ErrorPayload::new(ErrorCode::PeerMustRegisterFirst));
            false
        }
    }
}

async fn handle_auth(
    state: &SharedState,
    conn: &mut ConnectionState,
    handle: &crate::registry::SocketHandle,
    frame: &InboundFrame,
) -> DispatchOutcome {
    if conn.phase != Phase::Connected {
        handle.send_frame("ERROR", &ErrorPayload::new(ErrorCode::ValidationFailed));
        return DispatchOutcome::Continue;
    }
    let payload: AuthPayload = match frame.payload() {
        Ok(p) => p,
        Err(_) => {
            handle.send_frame("ERROR", &ErrorPayload::new(ErrorCode::InvalidMessage));
            return DispatchOutcome::Continue;
        }
    };

    let verified = if payload.token.is_empty() {
        Err(AuthError::TokenMissing)
    } else {
        state.identity_verifier.verify(&payload.token).await.map_err(AuthError::from)
    };

    let identity = match verified {
        Ok(identity) => identity,
        Err(auth_err) => {
            let code = match auth_err {
                AuthError::TokenMissing | AuthError::Verify(VerifyError::Missing) => ErrorCode::TokenMissing,
                AuthError::Verify(VerifyError::Expired) => ErrorCode::TokenExpired,
                AuthError::Verify(VerifyError::Invalid | VerifyError::Unavailable) => ErrorCode::TokenInvalid,
            };
            handle.send_frame("AUTH_FAILED", &ErrorPayload::new(code));
            handle.send_close_with_code(crate::protocol::CLOSE_AUTH_TIMEOUT, "authentication failure");
            return DispatchOutcome::Close;
        }
    };

    let user_id = UserId::from(identity.user_id.clone());

    // The prior connection must be gone before AUTH_SUCCESS for the new
    // one is emitted.
    state.supersede_prior(&user_id);
    state.registries.auth_sessions.insert(user_id.clone(), conn.socket_id.clone());

    let network_id = state.membership_resolver.active_network(identity.user_id.as_str()).await.map(NetworkId::from);

    conn.user_id = Some(user_id.clone());
    conn.network_id = network_id;
    conn.identity_display_name = Some(identity.display_name.clone());
    conn.phase = Phase::Authed;

    info!(%user_id, "auth success");

    handle.send_frame(
        "AUTH_SUCCESS",
        &AuthSuccessPayload {
            user_id: identity.user_id,
            display_name: identity.display_name,
            email: identity.email,
        },
    );
    DispatchOutcome::Continue
}

fn handle_peer_register(
    state: &SharedState,
    conn: &mut ConnectionState,
    handle: &crate::registry::SocketHandle,
    frame: &InboundFrame,
) -> DispatchOutcome {
    if conn.phase != Phase::Authed {
        let code = if conn.phase == Phase::Connected {
            ErrorCode::SocketNotAuthenticated
        } else {
            ErrorCode::ValidationFailed
        };
        handle.send_frame("ERROR", &ErrorPayload::new(code));
        return DispatchOutcome::Continue;
    }
    let payload: PeerRegisterPayload = match frame.payload() {
        Ok(p) => p,
        Err(_) => {
            handle.send_frame("ERROR", &ErrorPayload::new(ErrorCode::InvalidMessage));
            return DispatchOutcome::Continue;
        }
    };

    let user_id = conn.user_id.clone().expect("AUTHED implies user_id is set");
    let display_name = payload
        .display_name
        .or_else(|| conn.identity_display_name.clone())
        .unwrap_or_else(|| user_id.to_string());
    let ide_tag = payload.ide.unwrap_or_else(|| "other".to_string());
    let role_tag = RoleTag::parse(payload.role.as_deref().unwrap_or("guest"));

    let peer = state.registries.peers.register(
        user_id.clone(),
        conn.socket_id.clone(),
        NewPeer {
            display_name,
            ide_tag,
            role_tag,
            ip_hash: conn.ip_hash.clone(),
            network_id: conn.network_id.clone(),
        },
    );
    conn.phase = Phase::Registered;

    handle.send_frame(
        "PEER_REGISTERED",
        &PeerRegisteredPayload {
            id: peer.user_id.to_string(),
            profile: profile_of(&peer),
            status: peer.status.as_str().to_string(),
        },
    );

    // PEER_REGISTERED to the caller precedes PEER_STATUS_UPDATE to others
    // for the same registration.
    broadcast_peer_status(&state.registries.peers, &state.registries.sockets, &peer, PeerStatus::Online, true);

    DispatchOutcome::Continue
}

fn handle_discover_peers(
    state: &SharedState,
    conn: &ConnectionState,
    handle: &crate::registry::SocketHandle,
) -> DispatchOutcome {
    if !require_registered(conn, handle) {
        return DispatchOutcome::Continue;
    }
    let user_id = conn.user_id.clone().expect("REGISTERED implies user_id is set");
    let peers = match &conn.network_id {
        None => Vec::new(),
        Some(network_id) => state
            .registries
            .peers
            .online_in_network(network_id)
            .into_iter()
            .filter(|p| p.user_id != user_id)
            .collect::<Vec<_>>(),
    };
    let entries = peers
        .iter()
        .map(|p| PeerListEntry {
            id: p.user_id.to_string(),
            profile: profile_of(p),
            status: p.status.as_str().to_string(),
            connection_mode: connection_mode_for(&state.registries.peers, &user_id, &p.user_id),
        })
        .collect();
    handle.send_frame("PEERS_LIST", &PeersListPayload { peers: entries });
    DispatchOutcome::Continue
}

fn handle_connection_request(
    state: &SharedState,
    conn: &ConnectionState,
    handle: &crate::registry::SocketHandle,
    frame: &InboundFrame,
) -> DispatchOutcome {
    if !require_registered(conn, handle) {
        return DispatchOutcome::Continue;
    }
    let payload: ConnectionRequestPayload = match frame.payload() {
        Ok(p) => p,
        Err(_) => {
            handle.send_frame("ERROR", &ErrorPayload::new(ErrorCode::InvalidMessage));
            return DispatchOutcome::Continue;
        }
    };

    let requester_id = conn.user_id.clone().expect("REGISTERED implies user_id is set");
    let target_id = UserId::from(payload.target_id);

    let target_peer = match state.registries.peers.lookup_by_user(&target_id) {
        Some(p) => p,
        None => {
            handle.send_frame("ERROR", &ErrorPayload::new(ErrorCode::PeerNotFound));
            return DispatchOutcome::Continue;
        }
    };

    let same_network = conn.network_id.is_some() && conn.network_id == target_peer.network_id;
    if !same_network {
        handle.send_frame("ERROR", &ErrorPayload::new(ErrorCode::PeerNotSameNetwork));
        return DispatchOutcome::Continue;
    }

    let Some(target_handle) = state.registries.sockets.get(&target_peer.socket_id) else {
        handle.send_frame("ERROR", &ErrorPayload::new(ErrorCode::TargetOffline));
        return DispatchOutcome::Continue;
    };

    let request_id = state.registries.requests.create(requester_id.clone(), target_id);

    let requester_peer = state.registries.peers.lookup_by_user(&requester_id);
    let from_profile = requester_peer
        .as_ref()
        .map(profile_of)
        .unwrap_or_else(|| crate::protocol::ProfileSummary {
            display_name: requester_id.to_string(),
            role: RoleTag::Guest.as_str().to_string(),
            ide: "other".to_string(),
        });

    target_handle.send_frame(
        "CONNECTION_REQUEST_RECEIVED",
        &ConnectionRequestReceivedPayload {
            request_id: request_id.to_string(),
            from: FromPeer { id: requester_id.to_string(), profile: from_profile },
        },
    );
    DispatchOutcome::Continue
}

fn handle_connection_response(
    state: &SharedState,
    conn: &ConnectionState,
    handle: &crate::registry::SocketHandle,
    frame: &InboundFrame,
) -> DispatchOutcome {
    if !require_registered(conn, handle) {
        return DispatchOutcome::Continue;
    }
    let payload: ConnectionResponsePayload = match frame.payload() {
        Ok(p) => p,
        Err(_) => {
            handle.send_frame("ERROR", &ErrorPayload::new(ErrorCode::InvalidMessage));
            return DispatchOutcome::Continue;
        }
    };

    let responder_id = conn.user_id.clone().expect("REGISTERED implies user_id is set");
    let request_id = RequestId::from(payload.request_id);

    let request = match state.registries.requests.get(&request_id) {
        Some(r) => r,
        None => {
            handle.send_frame("ERROR", &ErrorPayload::new(ErrorCode::RequestNotFound));
            return DispatchOutcome::Continue;
        }
    };
    if request.to_user_id != responder_id {
        handle.send_frame("ERROR", &ErrorPayload::new(ErrorCode::RequestUnauthorized));
        return DispatchOutcome::Continue;
    }
    state.registries.requests.remove(&request_id);

    let Some(requester_peer) = state.registries.peers.lookup_by_user(&request.from_user_id) else {
        handle.send_frame("ERROR", &ErrorPayload::new(ErrorCode::PeerNotFound));
        return DispatchOutcome::Continue;
    };

    if payload.accepted {
        let responder_peer = state
            .registries
            .peers
            .lookup_by_user(&responder_id)
            .expect("REGISTERED implies a Peer record exists");
        let session = state.registries.sessions.create_for_pair(
            &state.registries.peers,
            requester_peer.user_id.clone(),
            requester_peer.socket_id.clone(),
            responder_peer.user_id.clone(),
            responder_peer.socket_id.clone(),
        );
        info!(session_id = %session.session_id, "session created");

        if let Some(requester_handle) = state.registries.sockets.get(&requester_peer.socket_id) {
            requester_handle.send_frame(
                "CONNECTION_ACCEPTED",
                &ConnectionAcceptedPayload {
                    request_id: request_id.to_string(),
                    session_id: session.session_id.to_string(),
                    peer: FromPeer { id: responder_peer.user_id.to_string(), profile: profile_of(&responder_peer) },
                },
            );
        }
        handle.send_frame(
            "SESSION_CREATED",
            &SessionCreatedPayload {
                session_id: session.session_id.to_string(),
                peer: FromPeer { id: requester_peer.user_id.to_string(), profile: profile_of(&requester_peer) },
            },
        );
    } else if let Some(requester_handle) = state.registries.sockets.get(&requester_peer.socket_id) {
        requester_handle.send_frame(
            "CONNECTION_REJECTED",
            &ConnectionRejectedPayload { request_id: request_id.to_string(), target_id: responder_id.to_string() },
        );
    }
    DispatchOutcome::Continue
}

fn handle_send_message(
    state: &SharedState,
    conn: &ConnectionState,
    handle: &crate::registry::SocketHandle,
    frame: &InboundFrame,
) -> DispatchOutcome {
    if !require_registered(conn, handle) {
        return DispatchOutcome::Continue;
    }
    let payload: SendMessagePayload = match frame.payload() {
        Ok(p) => p,
        Err(_) => {
            handle.send_frame("ERROR", &ErrorPayload::new(ErrorCode::InvalidMessage));
            return DispatchOutcome::Continue;
        }
    };

    let sender_id = conn.user_id.clone().expect("REGISTERED implies user_id is set");
    let session_id = SessionId::from(payload.session_id);

    let session = match state.registries.sessions.get(&session_id) {
        Some(s) => s,
        None => {
            handle.send_frame("ERROR", &ErrorPayload::new(ErrorCode::SessionNotFound));
            return DispatchOutcome::Continue;
        }
    };
    if !session.participants.contains_key(&sender_id) {
        handle.send_frame("ERROR", &ErrorPayload::new(ErrorCode::NotAParticipant));
        return DispatchOutcome::Continue;
    }

    let _ = state.registries.sessions.update_activity(&session_id, &sender_id);
    let _ = state.registries.peers.update_activity(&sender_id);

    let timestamp = chrono::Utc::now().to_rfc3339();

    for (participant_id, participant) in &session.participants {
        if *participant_id == sender_id {
            continue;
        }
        let Some(target_handle) = state.registries.sockets.get(&participant.socket_id) else { continue };
        target_handle.send_frame(
            "MESSAGE_RECEIVED",
            &MessageReceivedPayload {
                session_id: session_id.to_string(),
                from: sender_id.to_string(),
                content: payload.content.clone(),
                message_type: payload.message_type.clone(),
                correlation_id: payload.correlation_id.clone(),
                timestamp: timestamp.clone(),
            },
        );
    }
    DispatchOutcome::Continue
}

fn handle_ping(state: &SharedState, conn: &ConnectionState, handle: &crate::registry::SocketHandle) -> DispatchOutcome {
    if conn.phase == Phase::Registered {
        if let Some(user_id) = &conn.user_id {
            let _ = state.registries.peers.update_activity(user_id);
        }
    }
    let timestamp = state.started_at.elapsed().as_millis() as u64;
    handle.send_frame("PONG", &PongPayload { timestamp });
    DispatchOutcome::Continue
}

fn handle_status_set(
    state: &SharedState,
    conn: &ConnectionState,
    handle: &crate::registry::SocketHandle,
    frame: &InboundFrame,
) -> DispatchOutcome {
    if !require_registered(conn, handle) {
        return DispatchOutcome::Continue;
    }
    let payload: StatusSetPayload = match frame.payload() {
        Ok(p) => p,
        Err(_) => {
            handle.send_frame("ERROR", &ErrorPayload::new(ErrorCode::InvalidMessage));
            return DispatchOutcome::Continue;
        }
    };
    let status = match payload.status.as_str() {
        "online" => PeerStatus::Online,
        "away" => PeerStatus::Away,
        "busy" => PeerStatus::Busy,
        _ => {
            handle.send_frame("ERROR", &ErrorPayload::new(ErrorCode::ValidationFailed));
            return DispatchOutcome::Continue;
        }
    };

    let user_id = conn.user_id.clone().expect("REGISTERED implies user_id is set");
    if state.registries.peers.update_status(&user_id, status).is_err() {
        handle.send_frame("ERROR", &ErrorPayload::new(ErrorCode::PeerNotFound));
        return DispatchOutcome::Continue;
    }
    if let Some(peer) = state.registries.peers.lookup_by_user(&user_id) {
        broadcast_peer_status(&state.registries.peers, &state.registries.sockets, &peer, status, false);
    }
    DispatchOutcome::Continue
}
