//! Opaque identifier newtypes.
//!
//! Wrapping each id kind distinguishes "a session id" from "a socket id"
//! from "a bare string" at the type level, so a registry call site can't
//! accidentally pass the wrong kind of id where another is expected.

use std::fmt;

use rand::Rng;
use uuid::Uuid;

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

opaque_id!(UserId);
opaque_id!(SocketId);
opaque_id!(SessionId);
opaque_id!(RequestId);
opaque_id!(NetworkId);

impl SocketId {
    /// `sock_<uuid-v4>`.
    pub fn generate() -> Self {
        Self(format!("sock_{}", Uuid::new_v4()))
    }
}

impl SessionId {
    /// `ses_<uuid-v4>`.
    pub fn generate() -> Self {
        Self(format!("ses_{}", Uuid::new_v4()))
    }
}

impl RequestId {
    /// `req_<base36-timestamp>_<random-suffix>`.
    pub fn generate() -> Self {
        const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
        let now_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        let mut ts = now_ms;
        let mut ts_buf = Vec::new();
        if ts == 0 {
            ts_buf.push(ALPHABET[0]);
        }
        while ts > 0 {
            ts_buf.push(ALPHABET[(ts % 36) as usize]);
            ts /= 36;
        }
        ts_buf.reverse();
        let ts_str = String::from_utf8(ts_buf).expect("alphabet is ascii");

        let mut rng = rand::thread_rng();
        let suffix: String = (0..8)
            .map(|_| ALPHABET[rng.gen_range(0..36)] as char)
            .collect();

        Self(format!("req_{ts_str}_{suffix}"))
    }
}
