//! Outbound delivery to active sessions, keyed by `ClientId`.
//!
//! This is the seam the Topology Controller and the media-relay layer
//! push directives through (`P2P_ADDRESS`, `STOP_P2P`, ...) without
//! depending on however the control channel is actually transported.

use crate::error::ControlError;
use crate::protocol::ServerMessage;
use async_trait::async_trait;
use conf_wire::ClientId;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::warn;

/// Bounded outbound queue depth per session. A session that can't drain
/// its outbound queue this fast is treated as stalled (§5, channel
/// overflow closes the session).
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 64;

#[async_trait]
pub trait SessionDirectory: Send + Sync {
    async fn send_to(&self, client: ClientId, message: ServerMessage) -> Result<(), ControlError>;
}

/// The live map of `ClientId -> outbound sender`. A session registers
/// itself (receiving the paired `Receiver` to forward over its
/// transport) at `INIT_ACK` time and unregisters on close.
pub struct SessionRegistry {
    senders: DashMap<ClientId, mpsc::Sender<ServerMessage>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry { senders: DashMap::new() }
    }

    pub fn register(&self, client: ClientId) -> mpsc::Receiver<ServerMessage> {
        let (tx, rx) = mpsc::channel(DEFAULT_OUTBOUND_CAPACITY);
        self.senders.insert(client, tx);
        rx
    }

    pub fn unregister(&self, client: &ClientId) {
        self.senders.remove(client);
    }

    pub fn is_active(&self, client: &ClientId) -> bool {
        self.senders.contains_key(client)
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionDirectory for SessionRegistry {
    async fn send_to(&self, client: ClientId, message: ServerMessage) -> Result<(), ControlError> {
        let Some(sender) = self.senders.get(&client).map(|entry| entry.value().clone()) else {
            return Err(ControlError::SessionClosed);
        };

        match sender.try_send(message) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(client = %client, "control outbound queue full, closing session");
                self.senders.remove(&client);
                Err(ControlError::ChannelOverflow)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.senders.remove(&client);
                Err(ControlError::SessionClosed)
            }
        }
    }
}
