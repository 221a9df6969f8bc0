//! Broadcast engine. Recipient sets are derived from the registries at
//! emission time — never cached — and frames go out in peer registry
//! insertion order, so a subject's own status change is always ordered
//! consistently for everyone watching it.

use crate::ids::UserId;
use crate::protocol::{ConnectionMode, ProfileSummary};
use crate::registry::{Peer, PeerRegistry, PeerStatus, SocketRegistry};

pub fn profile_of(peer: &Peer) -> ProfileSummary {
    ProfileSummary {
        display_name: peer.display_name.clone(),
        role: peer.role_tag.as_str().to_string(),
        ide: peer.ide_tag.clone(),
    }
}

pub fn connection_mode_for(peers: &PeerRegistry, subject: &UserId, recipient: &UserId) -> ConnectionMode {
    if peers.same_lan(subject, recipient) {
        ConnectionMode::Lan
    } else {
        ConnectionMode::Remote
    }
}

/// Sends `PEER_STATUS_UPDATE` for `subject` to every other online peer,
/// skipping `subject` itself. `include_profile` lets registration include
/// a full profile while a bare status/offline change omits one, since the
/// client already has it — callers decide which applies.
pub fn broadcast_peer_status(
    peers: &PeerRegistry,
    sockets: &SocketRegistry,
    subject: &Peer,
    status: PeerStatus,
    include_profile: bool,
) {
    for recipient in peers.online_peers_in_order() {
        if recipient.user_id == subject.user_id {
            continue;
        }
        let Some(handle) = sockets.get(&recipient.socket_id) else { continue };
        let connection_mode = connection_mode_for(peers, &subject.user_id, &recipient.user_id);
        let payload = crate::protocol::PeerStatusUpdatePayload {
            id: subject.user_id.to_string(),
            profile: if include_profile { Some(profile_of(subject)) } else { None },
            status: status.as_str().to_string(),
            connection_mode,
        };
        handle.send_frame("PEER_STATUS_UPDATE", &payload);
    }
}
