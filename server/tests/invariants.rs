//! Randomized invariant checks against the registries directly. Drives a
//! small universe of user ids through a sequence of
//! register/unregister/pair/request operations and re-checks every
//! invariant after each step, rather than only at the end.

use std::time::Duration;

use proptest::prelude::*;
use rendezvous_server::ids::{SessionId, SocketId, UserId};
use rendezvous_server::registry::{NewPeer, PeerRegistry, RequestRegistry, RoleTag, SessionRegistry};

#[derive(Debug, Clone)]
enum Op {
    Register(usize),
    Unregister(usize),
    Pair(usize, usize),
    RequestConnect(usize, usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..4).prop_map(Op::Register),
        (0usize..4).prop_map(Op::Unregister),
        (0usize..4, 0usize..4).prop_map(|(a, b)| Op::Pair(a, b)),
        (0usize..4, 0usize..4).prop_map(|(a, b)| Op::RequestConnect(a, b)),
    ]
}

fn user_id(n: usize) -> UserId {
    UserId::from(format!("user_{n}"))
}

fn assert_invariants(peers: &PeerRegistry, sessions: &SessionRegistry) {
    // At most one live peer record per user_id is trivially true here since
    // PeerRegistry is keyed by user_id, but the socket index must never
    // disagree with it.
    for uid in peers.all_user_ids() {
        let peer = peers.lookup_by_user(&uid).expect("listed id must resolve");
        let via_socket = peers.lookup_by_socket(&peer.socket_id).expect("socket index must resolve back");
        assert_eq!(via_socket.user_id, uid, "socket->peer index disagrees with peer's own user_id");
    }

    // Every session's participants carry that session id in their own peer
    // record (when still registered).
    for uid in peers.all_user_ids() {
        let peer = peers.lookup_by_user(&uid).unwrap();
        for session_id in &peer.session_ids {
            assert!(
                sessions.is_participant(session_id, &uid),
                "peer lists session {session_id:?} it is not a participant of"
            );
        }
    }
}

fn apply(op: &Op, peers: &PeerRegistry, sessions: &SessionRegistry) {
    match op {
        Op::Register(n) => {
            let uid = user_id(*n);
            peers.register(
                uid,
                SocketId::generate(),
                NewPeer {
                    display_name: format!("user_{n}"),
                    ide_tag: "other".to_string(),
                    role_tag: RoleTag::Guest,
                    ip_hash: "deadbeef".to_string(),
                    network_id: None,
                },
            );
        }
        Op::Unregister(n) => {
            let uid = user_id(*n);
            sessions.handle_user_disconnect(peers, &uid);
            peers.unregister_by_user(&uid);
        }
        Op::Pair(a, b) => {
            if a == b {
                return;
            }
            let (ua, ub) = (user_id(*a), user_id(*b));
            let (Some(pa), Some(pb)) = (peers.lookup_by_user(&ua), peers.lookup_by_user(&ub)) else { return };
            sessions.create_for_pair(peers, pa.user_id, pa.socket_id, pb.user_id, pb.socket_id);
        }
        Op::RequestConnect(a, b) => {
            if a == b {
                return;
            }
            let requests = RequestRegistry::new(Duration::from_secs(30));
            let _ = requests.create(user_id(*a), user_id(*b));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn registry_invariants_hold_after_every_op(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let peers = PeerRegistry::new();
        let sessions = SessionRegistry::new();
        for op in &ops {
            apply(op, &peers, &sessions);
            assert_invariants(&peers, &sessions);
        }
    }
}

#[test]
fn register_then_unregister_returns_to_empty() {
    let peers = PeerRegistry::new();
    let uid = user_id(0);
    peers.register(
        uid.clone(),
        SocketId::generate(),
        NewPeer {
            display_name: "a".to_string(),
            ide_tag: "other".to_string(),
            role_tag: RoleTag::Guest,
            ip_hash: "h".to_string(),
            network_id: None,
        },
    );
    peers.unregister_by_user(&uid);
    assert!(peers.is_empty());
}

#[test]
fn add_session_is_idempotent() {
    let peers = PeerRegistry::new();
    let uid = user_id(0);
    peers.register(
        uid.clone(),
        SocketId::generate(),
        NewPeer {
            display_name: "a".to_string(),
            ide_tag: "other".to_string(),
            role_tag: RoleTag::Guest,
            ip_hash: "h".to_string(),
            network_id: None,
        },
    );
    let sid = SessionId::generate();
    for _ in 0..5 {
        peers.add_session(&uid, sid.clone()).unwrap();
    }
    assert_eq!(peers.lookup_by_user(&uid).unwrap().session_ids.len(), 1);
}

#[test]
fn request_ttl_never_exceeded_on_read() {
    let requests = RequestRegistry::new(Duration::from_millis(50));
    let id = requests.create(user_id(0), user_id(1));
    std::thread::sleep(Duration::from_millis(10));
    let got = requests.get(&id).expect("not yet expired");
    assert!(got.created_at.elapsed() <= Duration::from_millis(50));
    std::thread::sleep(Duration::from_millis(60));
    assert!(requests.get(&id).is_none(), "expired entries must never be returned");
}
