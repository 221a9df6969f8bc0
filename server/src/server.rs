//! Shared server state and process entry point. `SharedState` is the one
//! value every connection task and background sweep holds an `Arc` to;
//! everything reachable from it is internally synchronized, so handing out
//! clones of the `Arc` is the whole story for fan-out.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::broadcast::broadcast_peer_status;
use crate::config::Config;
use crate::identity::{IdentityVerifier, StaticIdentityVerifier};
use crate::ids::UserId;
use crate::iphash;
use crate::membership::{MembershipResolver, StaticMembershipResolver};
use crate::protocol::{ErrorCode, ErrorPayload, CLOSE_SUPERSEDED};
use crate::registry::{PeerStatus, Registries};

pub struct SharedState {
    pub config: Config,
    pub registries: Registries,
    pub identity_verifier: Arc<dyn IdentityVerifier>,
    pub membership_resolver: Arc<dyn MembershipResolver>,
    pub ip_hash_salt: String,
    pub started_at: Instant,
}

impl SharedState {
    pub fn new(
        config: Config,
        identity_verifier: Arc<dyn IdentityVerifier>,
        membership_resolver: Arc<dyn MembershipResolver>,
    ) -> Self {
        let ip_hash_salt = config.ip_hash_salt.clone().unwrap_or_else(iphash::generate_salt);
        let registries = Registries::new(config.request_ttl());
        Self {
            config,
            registries,
            identity_verifier,
            membership_resolver,
            ip_hash_salt,
            started_at: Instant::now(),
        }
    }

    /// Evicts a user's prior live connection, if any, before a new one is
    /// installed. A prior connection counts whether or not it ever reached
    /// `PEER_REGISTER` — an authenticated-only connection has no `Peer`
    /// record yet, so the authed-socket map is consulted whenever the peer
    /// registry doesn't have one. Holds no lock across the socket write —
    /// the handle's own send path is independently synchronized.
    pub fn supersede_prior(&self, user_id: &UserId) {
        let prior_socket_id = match self.registries.peers.lookup_by_user(user_id) {
            Some(peer) => Some(peer.socket_id),
            None => self.registries.auth_sessions.lookup_by_user(user_id),
        };
        let Some(prior_socket_id) = prior_socket_id else { return };
        if let Some(prior_handle) = self.registries.sockets.get(&prior_socket_id) {
            if prior_handle.flags.try_begin_cleanup() {
                info!(%user_id, "superseding prior connection");
                prior_handle.send_frame("ERROR", &ErrorPayload::new(ErrorCode::PeerAlreadyConnected));
                prior_handle.send_close_with_code(CLOSE_SUPERSEDED, "superseded");
            }
        }
        self.registries.sockets.unregister(&prior_socket_id);
        self.registries.peers.unregister_by_user(user_id);
        self.registries.auth_sessions.remove_by_user(user_id);
    }

    /// Idempotent disconnect path. Safe to call from either the owning
    /// connection task or the heartbeat supervisor — exactly one caller
    /// wins the `ConnectionFlags::try_begin_cleanup` race.
    pub fn disconnect_socket(&self, socket_id: &crate::ids::SocketId) {
        let Some(handle) = self.registries.sockets.unregister(socket_id) else { return };
        self.registries.auth_sessions.remove_by_socket(socket_id);
        let peer = self.registries.peers.lookup_by_socket(socket_id);
        if let Some(peer) = &peer {
            self.registries.sessions.handle_user_disconnect(&self.registries.peers, &peer.user_id);
            self.registries.peers.unregister_by_user(&peer.user_id);
            self.registries.requests.purge_for_user(&peer.user_id);
            broadcast_peer_status(
                &self.registries.peers,
                &self.registries.sockets,
                peer,
                PeerStatus::Offline,
                false,
            );
        }
        handle.send_close();
    }
}

pub struct Server {
    pub state: Arc<SharedState>,
}

impl Server {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let identity_verifier: Arc<dyn IdentityVerifier> = match &config.static_identities {
            Some(path) => Arc::new(StaticIdentityVerifier::load_from_file(path)?),
            None => Arc::new(StaticIdentityVerifier::new()),
        };
        let membership_resolver: Arc<dyn MembershipResolver> = match &config.static_memberships {
            Some(path) => Arc::new(StaticMembershipResolver::load_from_file(path)?),
            None => Arc::new(StaticMembershipResolver::new()),
        };
        Ok(Self::with_collaborators(config, identity_verifier, membership_resolver))
    }

    /// Bypasses config-file loading for the two external collaborators —
    /// used by integration tests to wire fixed tokens/memberships directly.
    pub fn with_collaborators(
        config: Config,
        identity_verifier: Arc<dyn IdentityVerifier>,
        membership_resolver: Arc<dyn MembershipResolver>,
    ) -> Self {
        let state = Arc::new(SharedState::new(config, identity_verifier, membership_resolver));
        Self { state }
    }

    fn spawn_background_tasks(&self) {
        let heartbeat_state = self.state.clone();
        tokio::spawn(async move {
            crate::heartbeat::run(heartbeat_state).await;
        });

        let sweep_state = self.state.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_state.config.request_sweep_interval());
            loop {
                ticker.tick().await;
                sweep_state.registries.requests.sweep_expired();
            }
        });
    }

    async fn spawn_health_listener(&self) -> anyhow::Result<()> {
        let Some(health_addr) = self.state.config.health_addr.clone() else { return Ok(()) };
        let health_router = crate::web::health_router();
        let listener = tokio::net::TcpListener::bind(&health_addr).await?;
        info!(%health_addr, "health endpoint listening");
        tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, health_router).await {
                tracing::error!(%err, "health listener exited");
            }
        });
        Ok(())
    }

    /// Runs forever, binding `config.listen_addr` directly. Used by `main`.
    pub async fn run(self) -> anyhow::Result<()> {
        self.spawn_background_tasks();
        self.spawn_health_listener().await?;

        let listen_addr = self.state.config.listen_addr.clone();
        let router = crate::web::router(self.state.clone());
        let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
        info!(%listen_addr, "rendezvous server listening");
        axum::serve(listener, router.into_make_service_with_connect_info::<std::net::SocketAddr>())
            .await?;
        Ok(())
    }

    /// Binds immediately and returns the actual local address plus a handle
    /// to the background `serve` task — used by integration tests that need
    /// an ephemeral port (`listen_addr = "127.0.0.1:0"`).
    pub async fn spawn_for_test(self) -> anyhow::Result<(std::net::SocketAddr, Arc<SharedState>)> {
        self.spawn_background_tasks();
        self.spawn_health_listener().await?;

        let router = crate::web::router(self.state.clone());
        let listener = tokio::net::TcpListener::bind(&self.state.config.listen_addr).await?;
        let local_addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router.into_make_service_with_connect_info::<std::net::SocketAddr>())
                .await;
        });
        Ok((local_addr, self.state))
    }
}
