//! Salted IP hashing — raw IP addresses are never stored, only this digest.

use sha2::{Digest, Sha256};
use std::net::IpAddr;

/// 32 lowercase hex chars (16 bytes of a SHA-256 digest over `salt || ip`).
pub fn hash_ip(salt: &str, ip: IpAddr) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(ip.to_string().as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}

/// Generate a random salt for a fresh server instance.
pub fn generate_salt() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: [u8; 16] = rng.r#gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_salt_and_ip() {
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        assert_eq!(hash_ip("salt", ip), hash_ip("salt", ip));
    }

    #[test]
    fn differs_across_salts() {
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        assert_ne!(hash_ip("salt-a", ip), hash_ip("salt-b", ip));
    }

    #[test]
    fn is_fixed_length_hex() {
        let ip: IpAddr = "10.0.0.5".parse().unwrap();
        let hash = hash_ip("x", ip);
        assert_eq!(hash.len(), 32);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!hash.contains('.'));
    }
}
