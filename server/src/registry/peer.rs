//! Peer registry: user_id -> Peer, plus the secondary socket_id -> user_id
//! index that keeps socket/peer consistency cheap to check. Both maps are
//! behind one lock so every operation here is atomic with respect to the
//! other.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use parking_lot::Mutex;

use crate::error::RegistryError;
use crate::ids::{NetworkId, SessionId, SocketId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerStatus {
    Online,
    Away,
    Busy,
    Offline,
}

impl PeerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PeerStatus::Online => "online",
            PeerStatus::Away => "away",
            PeerStatus::Busy => "busy",
            PeerStatus::Offline => "offline",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleTag {
    Host,
    Guest,
    Observer,
}

impl RoleTag {
    pub fn as_str(self) -> &'static str {
        match self {
            RoleTag::Host => "host",
            RoleTag::Guest => "guest",
            RoleTag::Observer => "observer",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "host" => RoleTag::Host,
            "observer" => RoleTag::Observer,
            _ => RoleTag::Guest,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Peer {
    pub user_id: UserId,
    pub socket_id: SocketId,
    pub display_name: String,
    pub ide_tag: String,
    pub role_tag: RoleTag,
    pub status: PeerStatus,
    pub session_ids: Vec<SessionId>,
    pub ip_hash: String,
    pub network_id: Option<NetworkId>,
    pub connected_at: Instant,
    pub last_activity_at: Instant,
}

pub struct NewPeer {
    pub display_name: String,
    pub ide_tag: String,
    pub role_tag: RoleTag,
    pub ip_hash: String,
    pub network_id: Option<NetworkId>,
}

#[derive(Default)]
struct Inner {
    by_user: HashMap<UserId, Peer>,
    socket_to_user: HashMap<SocketId, UserId>,
}

#[derive(Default)]
pub struct PeerRegistry {
    inner: Mutex<Inner>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `user_id` on `socket_id`. If a Peer already exists for this
    /// user, its socket mapping is dropped and its session list carried
    /// forward into the new record — a defensive fallback; the
    /// supersession path normally removes the prior record first.
    pub fn register(&self, user_id: UserId, socket_id: SocketId, new: NewPeer) -> Peer {
        let mut inner = self.inner.lock();
        let carried_sessions = inner
            .by_user
            .get(&user_id)
            .map(|p| p.session_ids.clone())
            .unwrap_or_default();
        if let Some(prior) = inner.by_user.get(&user_id) {
            inner.socket_to_user.remove(&prior.socket_id);
        }
        let now = Instant::now();
        let peer = Peer {
            user_id: user_id.clone(),
            socket_id: socket_id.clone(),
            display_name: new.display_name,
            ide_tag: new.ide_tag,
            role_tag: new.role_tag,
            status: PeerStatus::Online,
            session_ids: carried_sessions,
            ip_hash: new.ip_hash,
            network_id: new.network_id,
            connected_at: now,
            last_activity_at: now,
        };
        inner.socket_to_user.insert(socket_id, user_id.clone());
        inner.by_user.insert(user_id, peer.clone());
        peer
    }

    pub fn unregister_by_user(&self, user_id: &UserId) -> Option<Peer> {
        let mut inner = self.inner.lock();
        let peer = inner.by_user.remove(user_id)?;
        inner.socket_to_user.remove(&peer.socket_id);
        Some(peer)
    }

    pub fn unregister_by_socket(&self, socket_id: &SocketId) -> Option<Peer> {
        let mut inner = self.inner.lock();
        let user_id = inner.socket_to_user.remove(socket_id)?;
        inner.by_user.remove(&user_id)
    }

    pub fn lookup_by_user(&self, user_id: &UserId) -> Option<Peer> {
        self.inner.lock().by_user.get(user_id).cloned()
    }

    pub fn lookup_by_socket(&self, socket_id: &SocketId) -> Option<Peer> {
        let inner = self.inner.lock();
        let user_id = inner.socket_to_user.get(socket_id)?;
        inner.by_user.get(user_id).cloned()
    }

    pub fn update_status(&self, user_id: &UserId, status: PeerStatus) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        let peer = inner.by_user.get_mut(user_id).ok_or(RegistryError::PeerNotFound)?;
        peer.status = status;
        Ok(())
    }

    pub fn update_activity(&self, user_id: &UserId) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        let peer = inner.by_user.get_mut(user_id).ok_or(RegistryError::PeerNotFound)?;
        peer.last_activity_at = Instant::now();
        Ok(())
    }

    /// Idempotent insert.
    pub fn add_session(&self, user_id: &UserId, session_id: SessionId) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        let peer = inner.by_user.get_mut(user_id).ok_or(RegistryError::PeerNotFound)?;
        if !peer.session_ids.contains(&session_id) {
            peer.session_ids.push(session_id);
        }
        Ok(())
    }

    pub fn remove_session(&self, user_id: &UserId, session_id: &SessionId) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        let peer = inner.by_user.get_mut(user_id).ok_or(RegistryError::PeerNotFound)?;
        peer.session_ids.retain(|s| s != session_id);
        Ok(())
    }

    /// Peers with status=online whose network_id equals `network_id`. A null
    /// network never matches, even against another null.
    pub fn online_in_network(&self, network_id: &NetworkId) -> Vec<Peer> {
        self.inner
            .lock()
            .by_user
            .values()
            .filter(|p| p.status == PeerStatus::Online && p.network_id.as_ref() == Some(network_id))
            .cloned()
            .collect()
    }

    pub fn same_lan(&self, user_a: &UserId, user_b: &UserId) -> bool {
        let inner = self.inner.lock();
        match (inner.by_user.get(user_a), inner.by_user.get(user_b)) {
            (Some(a), Some(b)) => !a.ip_hash.is_empty() && a.ip_hash == b.ip_hash,
            _ => false,
        }
    }

    /// All online peers, in registration order — used by the broadcast
    /// engine.
    pub fn online_peers_in_order(&self) -> Vec<Peer> {
        self.inner
            .lock()
            .by_user
            .values()
            .filter(|p| p.status == PeerStatus::Online)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().by_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All user ids currently in the registry.
    pub fn all_user_ids(&self) -> HashSet<UserId> {
        self.inner.lock().by_user.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_peer(ip_hash: &str, network: Option<&str>) -> NewPeer {
        NewPeer {
            display_name: "Ada".to_string(),
            ide_tag: "vscode".to_string(),
            role_tag: RoleTag::Guest,
            ip_hash: ip_hash.to_string(),
            network_id: network.map(NetworkId::from),
        }
    }

    #[test]
    fn register_then_lookup_round_trips() {
        let reg = PeerRegistry::new();
        let user = UserId::from("user_1");
        let socket = SocketId::generate();
        reg.register(user.clone(), socket.clone(), new_peer("h1", Some("net_x")));
        let peer = reg.lookup_by_user(&user).unwrap();
        assert_eq!(peer.socket_id, socket);
        assert_eq!(reg.lookup_by_socket(&socket).unwrap().user_id, user);
    }

    #[test]
    fn register_unregister_returns_to_empty_state() {
        let reg = PeerRegistry::new();
        let user = UserId::from("user_1");
        let socket = SocketId::generate();
        reg.register(user.clone(), socket, new_peer("h1", None));
        reg.unregister_by_user(&user);
        assert!(reg.is_empty());
        assert!(reg.lookup_by_user(&user).is_none());
    }

    #[test]
    fn add_session_is_idempotent() {
        let reg = PeerRegistry::new();
        let user = UserId::from("user_1");
        let socket = SocketId::generate();
        reg.register(user.clone(), socket, new_peer("h1", None));
        let sid = SessionId::generate();
        reg.add_session(&user, sid.clone()).unwrap();
        reg.add_session(&user, sid.clone()).unwrap();
        assert_eq!(reg.lookup_by_user(&user).unwrap().session_ids.len(), 1);
    }

    #[test]
    fn null_network_never_matches_in_discovery() {
        let reg = PeerRegistry::new();
        let user = UserId::from("user_1");
        reg.register(user, SocketId::generate(), new_peer("h1", None));
        assert!(reg.online_in_network(&NetworkId::from("net_x")).is_empty());
    }

    #[test]
    fn online_in_network_filters_by_exact_network() {
        let reg = PeerRegistry::new();
        reg.register(UserId::from("a"), SocketId::generate(), new_peer("h1", Some("net_x")));
        reg.register(UserId::from("b"), SocketId::generate(), new_peer("h2", Some("net_y")));
        let found = reg.online_in_network(&NetworkId::from("net_x"));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].user_id, UserId::from("a"));
    }

    #[test]
    fn same_lan_requires_nonempty_matching_hash() {
        let reg = PeerRegistry::new();
        reg.register(UserId::from("a"), SocketId::generate(), new_peer("h1", None));
        reg.register(UserId::from("b"), SocketId::generate(), new_peer("h1", None));
        reg.register(UserId::from("c"), SocketId::generate(), new_peer("", None));
        assert!(reg.same_lan(&UserId::from("a"), &UserId::from("b")));
        assert!(!reg.same_lan(&UserId::from("a"), &UserId::from("c")));
    }

    #[test]
    fn register_preserves_prior_sessions_on_reregister() {
        let reg = PeerRegistry::new();
        let user = UserId::from("user_1");
        reg.register(user.clone(), SocketId::generate(), new_peer("h1", None));
        let sid = SessionId::generate();
        reg.add_session(&user, sid.clone()).unwrap();
        reg.register(user.clone(), SocketId::generate(), new_peer("h1", None));
        assert_eq!(reg.lookup_by_user(&user).unwrap().session_ids, vec![sid]);
    }
}
