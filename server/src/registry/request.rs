//! Request registry: short-lived pending connection requests with a 30s
//! TTL. `get` enforces the TTL itself — an expired entry is never
//! returned, and is evicted as a side effect of being seen.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::ids::{RequestId, UserId};

#[derive(Debug, Clone)]
pub struct ConnectionRequest {
    pub request_id: RequestId,
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub created_at: Instant,
}

pub struct RequestRegistry {
    requests: Mutex<HashMap<RequestId, ConnectionRequest>>,
    ttl: Duration,
}

impl RequestRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self { requests: Mutex::new(HashMap::new()), ttl }
    }

    pub fn create(&self, from: UserId, to: UserId) -> RequestId {
        let request_id = RequestId::generate();
        let request = ConnectionRequest {
            request_id: request_id.clone(),
            from_user_id: from,
            to_user_id: to,
            created_at: Instant::now(),
        };
        self.requests.lock().insert(request_id.clone(), request);
        request_id
    }

    /// Returns `None` if absent or expired; an expired entry is evicted.
    pub fn get(&self, request_id: &RequestId) -> Option<ConnectionRequest> {
        let mut requests = self.requests.lock();
        let request = requests.get(request_id)?.clone();
        if request.created_at.elapsed() > self.ttl {
            requests.remove(request_id);
            return None;
        }
        Some(request)
    }

    pub fn remove(&self, request_id: &RequestId) -> Option<ConnectionRequest> {
        self.requests.lock().remove(request_id)
    }

    /// Evicts every expired entry; called by the periodic sweep. Also
    /// called transitively whenever a user disconnects, to purge their
    /// pending requests regardless of age.
    pub fn sweep_expired(&self) {
        let mut requests = self.requests.lock();
        requests.retain(|_, r| r.created_at.elapsed() <= self.ttl);
    }

    /// Removes every request where `user_id` is either endpoint.
    pub fn purge_for_user(&self, user_id: &UserId) {
        let mut requests = self.requests.lock();
        requests.retain(|_, r| r.from_user_id != *user_id && r.to_user_id != *user_id);
    }

    pub fn len(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_get_round_trips() {
        let reg = RequestRegistry::new(Duration::from_secs(30));
        let id = reg.create(UserId::from("a"), UserId::from("b"));
        let got = reg.get(&id).unwrap();
        assert_eq!(got.from_user_id, UserId::from("a"));
        assert_eq!(got.to_user_id, UserId::from("b"));
    }

    #[test]
    fn expired_request_is_absent_and_evicted() {
        let reg = RequestRegistry::new(Duration::from_millis(0));
        let id = reg.create(UserId::from("a"), UserId::from("b"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(reg.get(&id).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn purge_for_user_removes_both_directions() {
        let reg = RequestRegistry::new(Duration::from_secs(30));
        reg.create(UserId::from("a"), UserId::from("b"));
        reg.create(UserId::from("c"), UserId::from("a"));
        reg.create(UserId::from("c"), UserId::from("d"));
        reg.purge_for_user(&UserId::from("a"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn remove_is_unconditional() {
        let reg = RequestRegistry::new(Duration::from_secs(30));
        let id = reg.create(UserId::from("a"), UserId::from("b"));
        assert!(reg.remove(&id).is_some());
        assert!(reg.get(&id).is_none());
    }
}
