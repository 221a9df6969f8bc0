//! Identity verification against an external identity provider, consumed
//! through a narrow trait. The default implementation is an in-process
//! static table, suitable for standalone operation and tests; a real
//! deployment swaps it for an HTTP-backed verifier without touching the
//! connection state machine.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::VerifyError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_id: String,
    pub display_name: String,
    pub email: String,
    pub provider_tag: String,
    pub roles: Vec<String>,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<UserIdentity, VerifyError>;
}

/// Table-driven verifier: token string is looked up directly. A stand-in
/// for an OAuth-backed verifier — real verification is an external
/// collaborator, not part of this core.
pub struct StaticIdentityVerifier {
    tokens: HashMap<String, UserIdentity>,
}

#[derive(Debug, Deserialize)]
struct StaticIdentitiesFile {
    #[serde(default)]
    identity: Vec<StaticIdentityEntry>,
}

#[derive(Debug, Deserialize)]
struct StaticIdentityEntry {
    token: String,
    user_id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default = "default_provider_tag")]
    provider_tag: String,
    #[serde(default)]
    roles: Vec<String>,
}

fn default_provider_tag() -> String {
    "static".to_string()
}

impl StaticIdentityVerifier {
    pub fn new() -> Self {
        Self { tokens: HashMap::new() }
    }

    pub fn with_identity(mut self, token: impl Into<String>, identity: UserIdentity) -> Self {
        self.tokens.insert(token.into(), identity);
        self
    }

    /// Load from a TOML file of `[[identity]]` tables.
    pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let parsed: StaticIdentitiesFile = toml::from_str(&text)?;
        let mut verifier = Self::new();
        for entry in parsed.identity {
            let display_name = entry.display_name.unwrap_or_else(|| entry.user_id.clone());
            let email = entry.email.unwrap_or_default();
            verifier = verifier.with_identity(
                entry.token,
                UserIdentity {
                    user_id: entry.user_id,
                    display_name,
                    email,
                    provider_tag: entry.provider_tag,
                    roles: entry.roles,
                },
            );
        }
        Ok(verifier)
    }
}

impl Default for StaticIdentityVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityVerifier for StaticIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<UserIdentity, VerifyError> {
        if token.is_empty() {
            return Err(VerifyError::Missing);
        }
        self.tokens.get(token).cloned().ok_or(VerifyError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(user_id: &str) -> UserIdentity {
        UserIdentity {
            user_id: user_id.to_string(),
            display_name: user_id.to_string(),
            email: format!("{user_id}@example.com"),
            provider_tag: "static".to_string(),
            roles: vec![],
        }
    }

    #[tokio::test]
    async fn verifies_known_token() {
        let verifier = StaticIdentityVerifier::new().with_identity("tok1", identity("user_1"));
        let got = verifier.verify("tok1").await.unwrap();
        assert_eq!(got.user_id, "user_1");
    }

    #[tokio::test]
    async fn rejects_missing_token() {
        let verifier = StaticIdentityVerifier::new();
        assert_eq!(verifier.verify("").await.unwrap_err(), VerifyError::Missing);
    }

    #[tokio::test]
    async fn rejects_unknown_token() {
        let verifier = StaticIdentityVerifier::new();
        assert_eq!(verifier.verify("nope").await.unwrap_err(), VerifyError::Invalid);
    }
}
