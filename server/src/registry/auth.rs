//! Tracks authenticated-but-not-yet-registered connections: user_id ->
//! socket_id, with a secondary socket_id -> user_id index so disconnect
//! cleanup can clear a record without the caller needing to have kept the
//! user_id around. Supersession needs this because a connection that has
//! only sent AUTH has no `Peer` record yet — `PeerRegistry` alone can't
//! tell a second AUTH for the same user apart from a brand new one.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::ids::{SocketId, UserId};

#[derive(Default)]
struct Inner {
    by_user: HashMap<UserId, SocketId>,
    socket_to_user: HashMap<SocketId, UserId>,
}

#[derive(Default)]
pub struct AuthRegistry {
    inner: Mutex<Inner>,
}

impl AuthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `user_id` authenticated on `socket_id`, replacing any
    /// prior mapping for this user. Does not touch the socket registry —
    /// evicting the prior connection is the caller's responsibility.
    pub fn insert(&self, user_id: UserId, socket_id: SocketId) {
        let mut inner = self.inner.lock();
        if let Some(prior_socket) = inner.by_user.insert(user_id.clone(), socket_id.clone()) {
            inner.socket_to_user.remove(&prior_socket);
        }
        inner.socket_to_user.insert(socket_id, user_id);
    }

    pub fn lookup_by_user(&self, user_id: &UserId) -> Option<SocketId> {
        self.inner.lock().by_user.get(user_id).cloned()
    }

    pub fn remove_by_user(&self, user_id: &UserId) {
        let mut inner = self.inner.lock();
        if let Some(socket_id) = inner.by_user.remove(user_id) {
            inner.socket_to_user.remove(&socket_id);
        }
    }

    pub fn remove_by_socket(&self, socket_id: &SocketId) -> Option<UserId> {
        let mut inner = self.inner.lock();
        let user_id = inner.socket_to_user.remove(socket_id)?;
        inner.by_user.remove(&user_id);
        Some(user_id)
    }
}
