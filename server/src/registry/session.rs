//! Session registry. Always exactly two participants in this core — no
//! multi-party sessions. Every mutation that touches participant
//! membership also updates the peer registry's `session_ids`, so the two
//! stay consistent without either owning the other.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;

use crate::error::RegistryError;
use crate::ids::{SessionId, SocketId, UserId};
use crate::registry::peer::PeerRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Pending,
    Active,
    Paused,
    Ended,
}

#[derive(Debug, Clone)]
pub struct Participant {
    pub socket_id: SocketId,
    pub joined_at: Instant,
    pub last_activity_at: Instant,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: SessionId,
    pub host_user_id: UserId,
    pub participants: HashMap<UserId, Participant>,
    pub status: SessionStatus,
    pub created_at: Instant,
    pub last_activity_at: Instant,
}

impl Session {
    pub fn other_participant(&self, user_id: &UserId) -> Option<&UserId> {
        self.participants.keys().find(|u| *u != user_id)
    }
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `user_a` is the host (the original requester). Writes `session_id`
    /// into both peers' `session_ids` via `peers`.
    pub fn create_for_pair(
        &self,
        peers: &PeerRegistry,
        user_a: UserId,
        socket_a: SocketId,
        user_b: UserId,
        socket_b: SocketId,
    ) -> Session {
        let session_id = SessionId::generate();
        let now = Instant::now();
        let mut participants = HashMap::new();
        participants.insert(
            user_a.clone(),
            Participant { socket_id: socket_a, joined_at: now, last_activity_at: now },
        );
        participants.insert(
            user_b.clone(),
            Participant { socket_id: socket_b, joined_at: now, last_activity_at: now },
        );
        let session = Session {
            session_id: session_id.clone(),
            host_user_id: user_a.clone(),
            participants,
            status: SessionStatus::Active,
            created_at: now,
            last_activity_at: now,
        };
        self.sessions.lock().insert(session_id.clone(), session.clone());
        let _ = peers.add_session(&user_a, session_id.clone());
        let _ = peers.add_session(&user_b, session_id);
        session
    }

    pub fn get(&self, session_id: &SessionId) -> Option<Session> {
        self.sessions.lock().get(session_id).cloned()
    }

    pub fn is_participant(&self, session_id: &SessionId, user_id: &UserId) -> bool {
        self.sessions
            .lock()
            .get(session_id)
            .map(|s| s.participants.contains_key(user_id))
            .unwrap_or(false)
    }

    pub fn participants(&self, session_id: &SessionId) -> Vec<UserId> {
        self.sessions
            .lock()
            .get(session_id)
            .map(|s| s.participants.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn update_activity(&self, session_id: &SessionId, user_id: &UserId) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.lock();
        let session = sessions.get_mut(session_id).ok_or(RegistryError::SessionNotFound)?;
        let now = Instant::now();
        session.last_activity_at = now;
        if let Some(p) = session.participants.get_mut(user_id) {
            p.last_activity_at = now;
        }
        Ok(())
    }

    /// If the departing user is the host, or the session becomes empty, the
    /// session is ended.
    pub fn remove_participant(&self, peers: &PeerRegistry, session_id: &SessionId, user_id: &UserId) {
        let should_end = {
            let mut sessions = self.sessions.lock();
            match sessions.get_mut(session_id) {
                Some(session) => {
                    session.participants.remove(user_id);
                    session.host_user_id == *user_id || session.participants.is_empty()
                }
                None => false,
            }
        };
        if should_end {
            self.end(peers, session_id);
        }
    }

    /// Marks status=ended, removes `session_id` from remaining peers'
    /// session lists, deletes the session record.
    pub fn end(&self, peers: &PeerRegistry, session_id: &SessionId) {
        let session = {
            let mut sessions = self.sessions.lock();
            sessions.remove(session_id)
        };
        if let Some(session) = session {
            for user_id in session.participants.keys() {
                let _ = peers.remove_session(user_id, session_id);
            }
        }
    }

    /// For every session `user_id` participates in, ends or shrinks it.
    /// Returns the distinct set of session ids that were touched, so callers
    /// can notify remaining participants.
    pub fn handle_user_disconnect(&self, peers: &PeerRegistry, user_id: &UserId) -> Vec<SessionId> {
        let affected: Vec<SessionId> = {
            let sessions = self.sessions.lock();
            sessions
                .values()
                .filter(|s| s.participants.contains_key(user_id))
                .map(|s| s.session_id.clone())
                .collect()
        };
        for session_id in &affected {
            self.remove_participant(peers, session_id, user_id);
        }
        affected
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
