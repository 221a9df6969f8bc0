//! The in-memory registries and their shared locking discipline.
//! Cross-registry operations acquire locks in the fixed order
//! socket → peer → session → request → auth; none of the individual
//! registries ever calls back into another while holding its own lock, so
//! this ordering is enough to rule out deadlock.

pub mod auth;
pub mod peer;
pub mod request;
pub mod session;
pub mod socket;

pub use auth::AuthRegistry;
pub use peer::{NewPeer, Peer, PeerRegistry, PeerStatus, RoleTag};
pub use request::{ConnectionRequest, RequestRegistry};
pub use session::{Participant, Session, SessionRegistry, SessionStatus};
pub use socket::{ConnectionFlags, SocketHandle, SocketRegistry, SweepAction};

use std::time::Duration;

/// Bundles the five registries behind the config-driven request TTL.
/// Owned by `server::SharedState`.
pub struct Registries {
    pub sockets: SocketRegistry,
    pub peers: PeerRegistry,
    pub sessions: SessionRegistry,
    pub requests: RequestRegistry,
    pub auth_sessions: AuthRegistry,
}

impl Registries {
    pub fn new(request_ttl: Duration) -> Self {
        Self {
            sockets: SocketRegistry::new(),
            peers: PeerRegistry::new(),
            sessions: SessionRegistry::new(),
            requests: RequestRegistry::new(request_ttl),
            auth_sessions: AuthRegistry::new(),
        }
    }
}
