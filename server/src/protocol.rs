//! Wire protocol: UTF-8 JSON frames of shape `{ "event": <string>, "data": <object?> }`.
//! Frame (de)serialization and the fixed error-code catalogue live here;
//! the dispatcher (`connection::mod`) owns parsing-into-handler dispatch,
//! and handlers (`connection::handlers`) own the per-event logic.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A parsed inbound frame, before its `data` is validated against a
/// specific event's expected shape.
#[derive(Debug, Deserialize)]
pub struct InboundFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl InboundFrame {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Deserialize `data` into a specific payload type. A missing `data`
    /// field parses as an empty object, matching events like PING/DISCOVER_PEERS
    /// whose payload is `{}`.
    pub fn payload<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        if self.data.is_null() {
            serde_json::from_value(Value::Object(Default::default()))
        } else {
            serde_json::from_value(self.data.clone())
        }
    }
}

/// Render an outbound event as wire text (one JSON object, no trailing newline —
/// the WebSocket framing itself delimits messages).
pub fn encode_frame<T: Serialize>(event: &str, data: &T) -> String {
    #[derive(Serialize)]
    struct Frame<'a, T> {
        event: &'a str,
        data: &'a T,
    }
    serde_json::to_string(&Frame { event, data }).expect("frame payloads are always serializable")
}

// ── Application close codes ─────────────────────────────────────────────

pub const CLOSE_AUTH_TIMEOUT: u16 = 4001;
pub const CLOSE_SUPERSEDED: u16 = 4002;

// ── Error code catalogue (stable) ───────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    TokenMissing,
    TokenInvalid,
    TokenExpired,
    PeerNotFound,
    PeerAlreadyConnected,
    PeerMustRegisterFirst,
    PeerNotSameNetwork,
    SessionNotFound,
    NotAParticipant,
    TargetOffline,
    InvalidMessage,
    SocketNotAuthenticated,
    RequestNotFound,
    RequestUnauthorized,
    ValidationFailed,
}

impl ErrorCode {
    pub fn code(self) -> &'static str {
        match self {
            ErrorCode::TokenMissing => "ERR_1001",
            ErrorCode::TokenInvalid => "ERR_1002",
            ErrorCode::TokenExpired => "ERR_1003",
            ErrorCode::PeerNotFound => "ERR_2001",
            ErrorCode::PeerAlreadyConnected => "ERR_2005",
            ErrorCode::PeerMustRegisterFirst => "ERR_2006",
            ErrorCode::PeerNotSameNetwork => "ERR_2007",
            ErrorCode::SessionNotFound => "ERR_3001",
            ErrorCode::NotAParticipant => "ERR_3008",
            ErrorCode::TargetOffline => "ERR_4003",
            ErrorCode::InvalidMessage => "ERR_5003",
            ErrorCode::SocketNotAuthenticated => "ERR_5005",
            ErrorCode::RequestNotFound => "ERR_6001",
            ErrorCode::RequestUnauthorized => "ERR_6004",
            ErrorCode::ValidationFailed => "ERR_9003",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::TokenMissing => "token missing",
            ErrorCode::TokenInvalid => "token invalid",
            ErrorCode::TokenExpired => "token expired",
            ErrorCode::PeerNotFound => "peer not found",
            ErrorCode::PeerAlreadyConnected => "peer already connected",
            ErrorCode::PeerMustRegisterFirst => "peer must register first",
            ErrorCode::PeerNotSameNetwork => "peer not in same network",
            ErrorCode::SessionNotFound => "session not found",
            ErrorCode::NotAParticipant => "not a participant",
            ErrorCode::TargetOffline => "target offline",
            ErrorCode::InvalidMessage => "invalid message",
            ErrorCode::SocketNotAuthenticated => "socket not authenticated",
            ErrorCode::RequestNotFound => "request not found",
            ErrorCode::RequestUnauthorized => "request unauthorized",
            ErrorCode::ValidationFailed => "validation failed",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: &'static str,
    pub message: String,
}

impl ErrorPayload {
    pub fn new(code: ErrorCode) -> Self {
        Self { code: code.code(), message: code.message().to_string() }
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code: code.code(), message: message.into() }
    }

    pub fn to_frame(&self) -> String {
        encode_frame("ERROR", self)
    }
}

// ── Client → server payloads ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AuthPayload {
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PeerRegisterPayload {
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    pub ide: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectionRequestPayload {
    #[serde(rename = "targetId")]
    pub target_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ConnectionResponsePayload {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub accepted: bool,
}

#[derive(Debug, Deserialize)]
pub struct SendMessagePayload {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub content: Value,
    #[serde(default)]
    #[serde(rename = "type")]
    pub message_type: Option<String>,
    #[serde(default)]
    #[serde(rename = "correlationId")]
    pub correlation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusSetPayload {
    pub status: String,
}

// ── Server → client payloads ────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct AuthSuccessPayload {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileSummary {
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub role: String,
    pub ide: String,
}

#[derive(Debug, Serialize)]
pub struct PeerRegisteredPayload {
    pub id: String,
    pub profile: ProfileSummary,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionMode {
    Lan,
    Remote,
}

#[derive(Debug, Serialize)]
pub struct PeerStatusUpdatePayload {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileSummary>,
    pub status: String,
    #[serde(rename = "connectionMode")]
    pub connection_mode: ConnectionMode,
}

#[derive(Debug, Serialize)]
pub struct PeerListEntry {
    pub id: String,
    pub profile: ProfileSummary,
    pub status: String,
    #[serde(rename = "connectionMode")]
    pub connection_mode: ConnectionMode,
}

#[derive(Debug, Serialize)]
pub struct PeersListPayload {
    pub peers: Vec<PeerListEntry>,
}

#[derive(Debug, Serialize)]
pub struct FromPeer {
    pub id: String,
    pub profile: ProfileSummary,
}

#[derive(Debug, Serialize)]
pub struct ConnectionRequestReceivedPayload {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub from: FromPeer,
}

#[derive(Debug, Serialize)]
pub struct ConnectionAcceptedPayload {
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub peer: FromPeer,
}

#[derive(Debug, Serialize)]
pub struct ConnectionRejectedPayload {
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(rename = "targetId")]
    pub target_id: String,
}

#[derive(Debug, Serialize)]
pub struct SessionCreatedPayload {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub peer: FromPeer,
}

#[derive(Debug, Serialize)]
pub struct MessageReceivedPayload {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub from: String,
    pub content: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "type")]
    pub message_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "correlationId")]
    pub correlation_id: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct PongPayload {
    pub timestamp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_auth_frame() {
        let frame = InboundFrame::parse(r#"{"event":"AUTH","data":{"token":"abc"}}"#).unwrap();
        assert_eq!(frame.event, "AUTH");
        let payload: AuthPayload = frame.payload().unwrap();
        assert_eq!(payload.token, "abc");
    }

    #[test]
    fn missing_data_parses_as_empty_object() {
        let frame = InboundFrame::parse(r#"{"event":"PING"}"#).unwrap();
        let payload: PeerRegisterPayload = frame.payload().unwrap();
        assert!(payload.display_name.is_none());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(InboundFrame::parse("not json").is_err());
    }

    #[test]
    fn error_payload_has_stable_code() {
        let err = ErrorPayload::new(ErrorCode::PeerNotSameNetwork);
        assert_eq!(err.code, "ERR_2007");
    }

    #[test]
    fn encode_frame_roundtrips_event_name() {
        let text = encode_frame("PONG", &PongPayload { timestamp: 42 });
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["event"], "PONG");
        assert_eq!(value["data"]["timestamp"], 42);
    }
}
