//! Control channel: wire protocol, per-session request handler, and the
//! connection loop wiring the two together over an abstract transport.

pub mod directory;
pub mod error;
pub mod heartbeat;
pub mod protocol;
pub mod session;
pub mod transport;

pub use directory::{SessionDirectory, SessionRegistry};
pub use error::ControlError;
pub use protocol::{ClientRequest, MeetingSummary, ServerMessage};
pub use session::{ControlSession, SessionEvent};
pub use transport::ControlTransport;

use conf_registry::Registry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, Instrument};

/// Drives one connection end to end: the pre-`INIT` handshake, then the
/// steady-state loop that interleaves inbound requests with outbound
/// pushes (replies and broadcasts alike, so delivery stays ordered on a
/// single queue per session) until the transport closes or the session
/// is torn down.
pub async fn run_connection(
    mut transport: impl ControlTransport,
    registry: Arc<Registry>,
    directory: Arc<SessionRegistry>,
    heartbeat_interval: Duration,
) {
    let mut session = ControlSession::new(registry.clone(), directory.clone());

    let (client_id, mut outbound) = loop {
        let Some(text) = transport.recv_text().await else {
            return;
        };
        match session.handle_text(&text).await {
            SessionEvent::DirectReply(message) => {
                if let Ok(json) = serde_json::to_string(&message) {
                    if !transport.send_text(json).await {
                        return;
                    }
                }
            }
            SessionEvent::Initialised { client_id, ack, outbound } => {
                if let Ok(json) = serde_json::to_string(&ack) {
                    if !transport.send_text(json).await {
                        return;
                    }
                }
                break (client_id, outbound);
            }
            SessionEvent::Handled => {}
            SessionEvent::Close => return,
        }
    };

    let span = tracing::info_span!("control_session", client = %client_id);
    async {
        debug!("entering steady-state loop");
        let last_seen = Arc::new(Mutex::new(Instant::now()));
        let watchdog = heartbeat::spawn_heartbeat_watchdog(
            client_id,
            last_seen.clone(),
            registry.clone(),
            directory.clone(),
            heartbeat_interval,
        );

        loop {
            tokio::select! {
                inbound = transport.recv_text() => {
                    let Some(text) = inbound else { break };
                    *last_seen.lock().await = Instant::now();
                    if matches!(session.handle_text(&text).await, SessionEvent::Close) {
                        break;
                    }
                }
                pushed = outbound.recv() => {
                    let Some(message) = pushed else { break };
                    let Ok(json) = serde_json::to_string(&message) else { continue };
                    if !transport.send_text(json).await {
                        break;
                    }
                }
            }
        }

        watchdog.abort();
        session.close().await;
        debug!("session closed");
    }
    .instrument(span)
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    /// In-memory stand-in for a real socket: feeds a fixed script of
    /// inbound frames and records everything the session sends back.
    struct ScriptedTransport {
        inbound: mpsc::Receiver<String>,
        outbound: mpsc::Sender<String>,
    }

    #[async_trait]
    impl ControlTransport for ScriptedTransport {
        async fn recv_text(&mut self) -> Option<String> {
            self.inbound.recv().await
        }

        async fn send_text(&mut self, text: String) -> bool {
            self.outbound.send(text).await.is_ok()
        }
    }

    #[tokio::test]
    async fn init_then_ping_round_trips_over_the_connection_loop() {
        let registry = Arc::new(Registry::new(false));
        let directory = Arc::new(SessionRegistry::new());

        let (inbound_tx, inbound_rx) = mpsc::channel(8);
        let (outbound_tx, mut outbound_rx) = mpsc::channel(8);
        let transport = ScriptedTransport {
            inbound: inbound_rx,
            outbound: outbound_tx,
        };

        let handle = tokio::spawn(run_connection(
            transport,
            registry,
            directory,
            Duration::from_secs(30),
        ));

        inbound_tx.send(r#"{"action":"INIT"}"#.to_string()).await.unwrap();
        let init_ack: ServerMessage = serde_json::from_str(&outbound_rx.recv().await.unwrap()).unwrap();
        assert!(matches!(init_ack, ServerMessage::InitAck { .. }));

        inbound_tx.send(r#"{"action":"PING"}"#.to_string()).await.unwrap();
        let pong: ServerMessage = serde_json::from_str(&outbound_rx.recv().await.unwrap()).unwrap();
        assert_eq!(pong, ServerMessage::Pong {});

        drop(inbound_tx);
        handle.await.unwrap();
    }
}
