//! Membership resolution against the durable store backing network
//! records, consumed through a narrow trait. Returning `None` (or the
//! resolver being unavailable) degrades the peer to a null network: they
//! stay connected but cannot discover or be discovered.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

#[async_trait]
pub trait MembershipResolver: Send + Sync {
    async fn active_network(&self, user_id: &str) -> Option<String>;
}

/// Table-driven resolver backed by an in-process map.
pub struct StaticMembershipResolver {
    memberships: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct StaticMembershipsFile {
    #[serde(default)]
    membership: Vec<StaticMembershipEntry>,
}

#[derive(Debug, Deserialize)]
struct StaticMembershipEntry {
    user_id: String,
    network_id: String,
}

impl StaticMembershipResolver {
    pub fn new() -> Self {
        Self { memberships: HashMap::new() }
    }

    pub fn with_membership(mut self, user_id: impl Into<String>, network_id: impl Into<String>) -> Self {
        self.memberships.insert(user_id.into(), network_id.into());
        self
    }

    pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let parsed: StaticMembershipsFile = toml::from_str(&text)?;
        let mut resolver = Self::new();
        for entry in parsed.membership {
            resolver = resolver.with_membership(entry.user_id, entry.network_id);
        }
        Ok(resolver)
    }
}

impl Default for StaticMembershipResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MembershipResolver for StaticMembershipResolver {
    async fn active_network(&self, user_id: &str) -> Option<String> {
        self.memberships.get(user_id).cloned()
    }
}
