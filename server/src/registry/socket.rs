//! Socket registry: opaque socket id -> outbound handle.
//! The handle is a channel end into the connection's dedicated writer task,
//! never the socket itself, so the broadcast engine can fan out without
//! touching I/O under the registry lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::ids::SocketId;
use crate::protocol::encode_frame;

/// What the heartbeat sweep should do with a connection this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepAction {
    Ping,
    Terminate,
}

/// Liveness and single-shot cleanup bookkeeping shared between a
/// connection's own task and the heartbeat supervisor, so whichever side
/// notices the connection is gone first runs cleanup exactly once.
pub struct ConnectionFlags {
    missed_sweeps: AtomicU32,
    cleaned_up: AtomicBool,
}

impl ConnectionFlags {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { missed_sweeps: AtomicU32::new(0), cleaned_up: AtomicBool::new(false) })
    }

    pub fn mark_alive(&self) {
        self.missed_sweeps.store(0, Ordering::SeqCst);
    }

    /// Heartbeat sweep step: counts this tick as a miss unless activity
    /// reset the counter since the last sweep. Pings on every miss up to
    /// `miss_limit`, then signals termination.
    pub fn sweep(&self, miss_limit: u32) -> SweepAction {
        let missed = self.missed_sweeps.fetch_add(1, Ordering::SeqCst) + 1;
        if missed >= miss_limit.max(1) {
            SweepAction::Terminate
        } else {
            SweepAction::Ping
        }
    }

    /// Whoever wins this race performs disconnect cleanup exactly once.
    pub fn try_begin_cleanup(&self) -> bool {
        self.cleaned_up
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

#[derive(Clone)]
pub struct SocketHandle {
    sender: mpsc::UnboundedSender<Message>,
    pub flags: Arc<ConnectionFlags>,
}

impl SocketHandle {
    pub fn new(sender: mpsc::UnboundedSender<Message>, flags: Arc<ConnectionFlags>) -> Self {
        Self { sender, flags }
    }

    /// Best-effort: a closed channel means the socket is already gone, and
    /// the caller has no action to take.
    pub fn send_frame<T: serde::Serialize>(&self, event: &str, data: &T) {
        let text = encode_frame(event, data);
        let _ = self.sender.send(Message::Text(text.into()));
    }

    pub fn send_ping(&self) {
        let _ = self.sender.send(Message::Ping(Vec::new().into()));
    }

    pub fn send_close(&self) {
        let _ = self.sender.send(Message::Close(None));
    }

    /// Application-level close with a reason code (4001/4002).
    pub fn send_close_with_code(&self, code: u16, reason: &'static str) {
        let frame = CloseFrame { code, reason: reason.into() };
        let _ = self.sender.send(Message::Close(Some(frame)));
    }
}

#[derive(Default)]
pub struct SocketRegistry {
    sockets: Mutex<HashMap<SocketId, SocketHandle>>,
}

impl SocketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, socket_id: SocketId, handle: SocketHandle) {
        self.sockets.lock().insert(socket_id, handle);
    }

    pub fn unregister(&self, socket_id: &SocketId) -> Option<SocketHandle> {
        self.sockets.lock().remove(socket_id)
    }

    pub fn get(&self, socket_id: &SocketId) -> Option<SocketHandle> {
        self.sockets.lock().get(socket_id).cloned()
    }

    /// Snapshot of every live socket, used by the heartbeat sweep.
    pub fn all(&self) -> Vec<(SocketId, SocketHandle)> {
        self.sockets.lock().iter().map(|(id, h)| (id.clone(), h.clone())).collect()
    }

    pub fn len(&self) -> usize {
        self.sockets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_get_round_trips() {
        let reg = SocketRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let socket_id = SocketId::generate();
        reg.register(socket_id.clone(), SocketHandle::new(tx, ConnectionFlags::new()));
        assert!(reg.get(&socket_id).is_some());
        reg.unregister(&socket_id);
        assert!(reg.get(&socket_id).is_none());
    }

    #[test]
    fn cleanup_race_is_won_exactly_once() {
        let flags = ConnectionFlags::new();
        assert!(flags.try_begin_cleanup());
        assert!(!flags.try_begin_cleanup());
    }

    #[test]
    fn sweep_pings_until_miss_limit_then_terminates() {
        let flags = ConnectionFlags::new();
        assert_eq!(flags.sweep(2), SweepAction::Ping);
        assert_eq!(flags.sweep(2), SweepAction::Terminate);
    }

    #[test]
    fn mark_alive_resets_the_miss_counter() {
        let flags = ConnectionFlags::new();
        assert_eq!(flags.sweep(2), SweepAction::Ping);
        flags.mark_alive();
        assert_eq!(flags.sweep(2), SweepAction::Ping);
    }

    #[test]
    fn miss_limit_of_one_terminates_on_first_sweep() {
        let flags = ConnectionFlags::new();
        assert_eq!(flags.sweep(1), SweepAction::Terminate);
    }
}
