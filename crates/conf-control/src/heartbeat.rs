//! Per-session liveness watchdog (§5): a session that misses three
//! successive heartbeat windows is closed. Mirrors the fixed-cadence
//! sweep task used for fragment-reassembly TTL expiry — same shape,
//! different table.

use crate::directory::SessionRegistry;
use conf_registry::Registry;
use conf_wire::ClientId;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

/// Heartbeats are expected at least this often (the client's `PING`
/// cadence). Three missed windows close the session.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
pub const MAX_MISSED_HEARTBEATS: u32 = 3;

/// Spawn a watchdog for one session. `last_seen` is updated by the
/// session's message loop on every inbound frame (not just `PING`).
pub fn spawn_heartbeat_watchdog(
    client_id: ClientId,
    last_seen: Arc<Mutex<Instant>>,
    registry: Arc<Registry>,
    directory: Arc<SessionRegistry>,
    interval: Duration,
) -> JoinHandle<()> {
    let timeout = interval * MAX_MISSED_HEARTBEATS;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if !directory.is_active(&client_id) {
                return;
            }
            let elapsed = last_seen.lock().await.elapsed();
            if elapsed >= timeout {
                info!(client = %client_id, ?elapsed, "heartbeat timeout, closing session");
                if let Some(conference) = registry.current_conference(&client_id) {
                    registry.exit(&conference, client_id).await;
                }
                directory.unregister(&client_id);
                return;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn missed_heartbeats_close_the_session() {
        let registry = Arc::new(Registry::new(false));
        let directory = Arc::new(SessionRegistry::new());
        let client = ClientId::new();
        let _rx = directory.register(client);
        let last_seen = Arc::new(Mutex::new(Instant::now()));

        let handle = spawn_heartbeat_watchdog(
            client,
            last_seen,
            registry.clone(),
            directory.clone(),
            Duration::from_millis(10),
        );

        tokio::time::sleep(Duration::from_millis(10) * (MAX_MISSED_HEARTBEATS + 2)).await;
        handle.await.unwrap();
        assert!(!directory.is_active(&client));
    }

    #[tokio::test(start_paused = true)]
    async fn recent_activity_keeps_the_session_alive() {
        let registry = Arc::new(Registry::new(false));
        let directory = Arc::new(SessionRegistry::new());
        let client = ClientId::new();
        let _rx = directory.register(client);
        let last_seen = Arc::new(Mutex::new(Instant::now()));

        let watchdog_last_seen = last_seen.clone();
        let handle = spawn_heartbeat_watchdog(
            client,
            watchdog_last_seen,
            registry,
            directory.clone(),
            Duration::from_millis(10),
        );

        for _ in 0..5 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            *last_seen.lock().await = Instant::now();
        }
        assert!(directory.is_active(&client));
        handle.abort();
    }
}
