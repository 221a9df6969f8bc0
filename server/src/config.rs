//! Server configuration, loaded from CLI args and environment.

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "rendezvous-server", about = "Peer rendezvous and message-routing service")]
pub struct Config {
    /// Address the WebSocket endpoint (`/ws`) binds to.
    #[arg(long = "listen", env = "RENDEZVOUS_LISTEN", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// Optional address for the `/healthz` liveness probe. Unset = disabled.
    #[arg(long = "health-addr", env = "RENDEZVOUS_HEALTH_ADDR")]
    pub health_addr: Option<String>,

    /// Seconds a connection has to send AUTH before it is closed (4001).
    #[arg(long, env = "RENDEZVOUS_AUTH_TIMEOUT_SECS", default_value_t = 10)]
    pub auth_timeout_secs: u64,

    /// TTL, in seconds, for a pending connection request.
    #[arg(long, env = "RENDEZVOUS_REQUEST_TTL_SECS", default_value_t = 30)]
    pub request_ttl_secs: u64,

    /// How often the request-registry sweep runs.
    #[arg(long, env = "RENDEZVOUS_REQUEST_SWEEP_SECS", default_value_t = 10)]
    pub request_sweep_interval_secs: u64,

    /// Heartbeat ping interval, in seconds.
    #[arg(long, env = "RENDEZVOUS_HEARTBEAT_SECS", default_value_t = 30)]
    pub heartbeat_interval_secs: u64,

    /// Consecutive missed heartbeat sweeps before a connection is terminated.
    #[arg(long, env = "RENDEZVOUS_HEARTBEAT_MISS_LIMIT", default_value_t = 2)]
    pub heartbeat_miss_limit: u32,

    /// Salt mixed into the IP hash. Generated randomly if unset.
    #[arg(long, env = "RENDEZVOUS_IP_HASH_SALT")]
    pub ip_hash_salt: Option<String>,

    /// Path to a TOML file of static `user_id -> token` identities, used by
    /// the default in-process identity verifier. See `identity::StaticIdentityVerifier`.
    #[arg(long, env = "RENDEZVOUS_STATIC_IDENTITIES")]
    pub static_identities: Option<String>,

    /// Path to a TOML file of static `user_id -> network_id` memberships,
    /// used by the default in-process membership resolver.
    #[arg(long, env = "RENDEZVOUS_STATIC_MEMBERSHIPS")]
    pub static_memberships: Option<String>,
}

impl Config {
    pub fn auth_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.auth_timeout_secs)
    }

    pub fn request_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_ttl_secs)
    }

    pub fn request_sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_sweep_interval_secs)
    }

    pub fn heartbeat_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.heartbeat_interval_secs)
    }
}
