//! Internal error taxonomy.
//!
//! Registry operations are total (spec: "not found" is a typed result,
//! never a panic). These errors never leak their `Display` text into a
//! wire `ERROR` frame — the dispatcher maps each variant to one of the
//! fixed `ERR_*` codes and a fixed message string.

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    #[error("peer not found")]
    PeerNotFound,
    #[error("session not found")]
    SessionNotFound,
    #[error("request not found")]
    RequestNotFound,
    #[error("socket not found")]
    SocketNotFound,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed frame")]
    MalformedFrame,
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    #[error("event not permitted in current state")]
    WrongState,
}

/// Outcome of identity verification against the external identity provider.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    #[error("token missing")]
    Missing,
    #[error("token invalid")]
    Invalid,
    #[error("token expired")]
    Expired,
    #[error("identity provider unavailable")]
    Unavailable,
}

/// The AUTH handler's view of what can go wrong — a thin wrapper over
/// `VerifyError` plus the locally-detected empty-token case, so the
/// handler has one type to map onto `AUTH_FAILED` + close 4001.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("token missing")]
    TokenMissing,
    #[error(transparent)]
    Verify(#[from] VerifyError),
}
