//! End-to-end protocol scenarios: auth timeout, supersession, and
//! cross-network isolation, driven over a real WebSocket connection
//! against a server bound to an ephemeral port.

mod common;

use common::{auth, connect, recv_event, send_event, start_test_server_with, TestUser};
use serde_json::json;

#[tokio::test]
async fn auth_timeout_closes_with_4001() {
    let addr = start_test_server_with(&[], |cfg| cfg.auth_timeout_secs = 1).await;
    let mut client = connect(addr).await;

    let error = recv_event(&mut client).await;
    assert_eq!(error["event"], "ERROR");
    assert_eq!(error["data"]["code"], "ERR_1001");

    let close = tokio::time::timeout(std::time::Duration::from_secs(2), futures_util::StreamExt::next(&mut client))
        .await
        .expect("closes promptly");
    match close {
        Some(Ok(tokio_tungstenite::tungstenite::Message::Close(Some(frame)))) => {
            assert_eq!(frame.code, tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode::from(4001u16));
        }
        Some(Ok(tokio_tungstenite::tungstenite::Message::Close(None))) | None => {
            // Some clients surface a bare close after the server's close frame; either is acceptable here.
        }
        other => panic!("expected a close frame, got {other:?}"),
    }
}

#[tokio::test]
async fn supersession_closes_prior_with_4002() {
    let addr = start_test_server_with(
        &[TestUser { token: "tok", user_id: "user_1", display_name: "Ada", network_id: None }],
        |_| {},
    )
    .await;

    let mut client_a = connect(addr).await;
    let auth_a = auth(&mut client_a, "tok").await;
    assert_eq!(auth_a["event"], "AUTH_SUCCESS");

    let mut client_b = connect(addr).await;
    let auth_b = auth(&mut client_b, "tok").await;
    assert_eq!(auth_b["event"], "AUTH_SUCCESS");
    assert_eq!(auth_b["data"]["userId"], "user_1");

    let error_a = recv_event(&mut client_a).await;
    assert_eq!(error_a["event"], "ERROR");
    assert_eq!(error_a["data"]["code"], "ERR_2005");
}

#[tokio::test]
async fn cross_network_isolation() {
    let addr = start_test_server_with(
        &[
            TestUser { token: "tok_a", user_id: "user_A", display_name: "A", network_id: Some("net_x") },
            TestUser { token: "tok_b", user_id: "user_B", display_name: "B", network_id: Some("net_y") },
        ],
        |_| {},
    )
    .await;

    let mut a = connect(addr).await;
    auth(&mut a, "tok_a").await;
    common::register(&mut a, "A").await;

    let mut b = connect(addr).await;
    auth(&mut b, "tok_b").await;
    common::register(&mut b, "B").await;

    send_event(&mut a, "DISCOVER_PEERS", json!({})).await;
    let list = recv_event(&mut a).await;
    assert_eq!(list["event"], "PEERS_LIST");
    assert_eq!(list["data"]["peers"].as_array().unwrap().len(), 0);

    send_event(&mut a, "CONNECTION_REQUEST", json!({ "targetId": "user_B" })).await;
    let error = recv_event(&mut a).await;
    assert_eq!(error["event"], "ERROR");
    assert_eq!(error["data"]["code"], "ERR_2007");
}
