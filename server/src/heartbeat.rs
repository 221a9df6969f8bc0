//! Heartbeat supervisor. Runs as its own background task, independent of
//! any connection's read loop, so a connection that's stuck writing can
//! still be reaped.

use std::sync::Arc;

use tracing::debug;

use crate::registry::SweepAction;
use crate::server::SharedState;

pub async fn run(state: Arc<SharedState>) {
    let mut ticker = tokio::time::interval(state.config.heartbeat_interval());
    loop {
        ticker.tick().await;
        sweep(&state);
    }
}

fn sweep(state: &SharedState) {
    let miss_limit = state.config.heartbeat_miss_limit;
    for (socket_id, handle) in state.registries.sockets.all() {
        match handle.flags.sweep(miss_limit) {
            SweepAction::Ping => handle.send_ping(),
            SweepAction::Terminate => {
                if handle.flags.try_begin_cleanup() {
                    debug!(%socket_id, "heartbeat: terminating unresponsive connection");
                    state.disconnect_socket(&socket_id);
                }
            }
        }
    }
}
