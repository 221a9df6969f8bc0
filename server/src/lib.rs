//! Real-time peer rendezvous and message-routing service.
//!
//! Authenticated clients connect over a WebSocket, register as peers
//! scoped to an invite-code network, discover other peers in the same
//! network, negotiate pairwise sessions, and exchange application-defined
//! messages through those sessions. This crate is the core: connection
//! lifecycle, in-memory registries, discovery/pairing policy, heartbeat
//! liveness, and the wire protocol. Identity verification and membership
//! lookup are external collaborators, consumed through the traits in
//! `identity` and `membership`.

pub mod broadcast;
pub mod config;
pub mod connection;
pub mod error;
pub mod heartbeat;
pub mod identity;
pub mod ids;
pub mod iphash;
pub mod membership;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod web;

pub use config::Config;
pub use server::{Server, SharedState};
