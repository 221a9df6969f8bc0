//! Shared integration-test harness: binds a real server on an ephemeral
//! port and drives it with a `tokio-tungstenite` client, mirroring the
//! teacher's `Server::start()`-style test helpers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use rendezvous_server::config::Config;
use rendezvous_server::identity::{IdentityVerifier, StaticIdentityVerifier, UserIdentity};
use rendezvous_server::membership::{MembershipResolver, StaticMembershipResolver};
use rendezvous_server::Server;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message as TMessage;

pub struct TestUser {
    pub token: &'static str,
    pub user_id: &'static str,
    pub display_name: &'static str,
    pub network_id: Option<&'static str>,
}

pub async fn start_test_server(users: &[TestUser]) -> SocketAddr {
    start_test_server_with(users, |_| {}).await
}

pub async fn start_test_server_with(users: &[TestUser], configure: impl FnOnce(&mut Config)) -> SocketAddr {
    start_test_server_with_state(users, configure).await.0
}

/// Same as `start_test_server_with`, but also hands back the server's
/// `SharedState` — needed by tests that assert on registry contents
/// directly rather than through a client-observed frame or close code.
pub async fn start_test_server_with_state(
    users: &[TestUser],
    configure: impl FnOnce(&mut Config),
) -> (SocketAddr, Arc<rendezvous_server::SharedState>) {
    let mut identities = StaticIdentityVerifier::new();
    let mut memberships = StaticMembershipResolver::new();
    for user in users {
        identities = identities.with_identity(
            user.token,
            UserIdentity {
                user_id: user.user_id.to_string(),
                display_name: user.display_name.to_string(),
                email: format!("{}@example.com", user.user_id),
                provider_tag: "static".to_string(),
                roles: vec![],
            },
        );
        if let Some(network_id) = user.network_id {
            memberships = memberships.with_membership(user.user_id, network_id);
        }
    }

    let mut config = Config::parse_from(["rendezvous-server"]);
    config.listen_addr = "127.0.0.1:0".to_string();
    configure(&mut config);

    let identity_verifier: Arc<dyn IdentityVerifier> = Arc::new(identities);
    let membership_resolver: Arc<dyn MembershipResolver> = Arc::new(memberships);
    let server = Server::with_collaborators(config, identity_verifier, membership_resolver);
    server.spawn_for_test().await.expect("server binds")
}

pub type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

pub async fn connect(addr: SocketAddr) -> WsStream {
    let url = format!("ws://{addr}/ws");
    let (stream, _response) = tokio_tungstenite::connect_async(url).await.expect("ws connect");
    stream
}

pub async fn send_event(stream: &mut WsStream, event: &str, data: Value) {
    let frame = json!({ "event": event, "data": data }).to_string();
    stream.send(TMessage::Text(frame.into())).await.expect("ws send");
}

/// Waits (with a generous timeout) for the next text frame and parses it.
pub async fn recv_event(stream: &mut WsStream) -> Value {
    let deadline = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match stream.next().await {
                Some(Ok(TMessage::Text(text))) => return serde_json::from_str(&text).unwrap(),
                Some(Ok(_)) => continue,
                Some(Err(err)) => panic!("ws error: {err}"),
                None => panic!("stream closed while waiting for a frame"),
            }
        }
    });
    deadline.await.expect("timed out waiting for a frame")
}

pub async fn auth(stream: &mut WsStream, token: &str) -> Value {
    send_event(stream, "AUTH", json!({ "token": token })).await;
    recv_event(stream).await
}

pub async fn register(stream: &mut WsStream, display_name: &str) -> Value {
    send_event(stream, "PEER_REGISTER", json!({ "displayName": display_name })).await;
    recv_event(stream).await
}
