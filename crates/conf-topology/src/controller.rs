//! Drives `Conference.topology` off Registry events (§4.5): recomputes
//! the pure topology function after every membership change, and issues
//! `P2P_ADDRESS` / `STOP_P2P` directives plus relay/compositor
//! start-stop calls across the transitions.

use crate::lifecycle::RelayLifecycle;
use conf_control::{ServerMessage, SessionDirectory};
use conf_registry::{ConferenceSnapshot, Registry, RegistryEvent, Topology};
use conf_wire::ConferenceId;
use dashmap::DashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub struct TopologyController {
    registry: Arc<Registry>,
    directory: Arc<dyn SessionDirectory>,
    relay: Arc<dyn RelayLifecycle>,
    /// Conferences for which the asymmetric `P2P_ADDRESS` pair has
    /// already been sent for the current p2p episode. Cleared whenever
    /// the conference leaves `p2p`.
    p2p_addresses_sent: DashSet<ConferenceId>,
}

impl TopologyController {
    pub fn new(registry: Arc<Registry>, directory: Arc<dyn SessionDirectory>, relay: Arc<dyn RelayLifecycle>) -> Self {
        TopologyController {
            registry,
            directory,
            relay,
            p2p_addresses_sent: DashSet::new(),
        }
    }

    /// Consumes registry events until the channel is closed (or lags —
    /// a lagged receiver just resubscribes and recomputes from current
    /// state, since every handler here is idempotent given a snapshot).
    pub async fn run(self, mut events: broadcast::Receiver<RegistryEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => self.handle_event(event).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "topology controller lagged registry events");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }

    async fn handle_event(&self, event: RegistryEvent) {
        match event {
            RegistryEvent::ParticipantJoined { conference, .. }
            | RegistryEvent::ParticipantLeft { conference, .. } => {
                self.recompute(&conference).await;
            }
            RegistryEvent::ConferenceCancelled { conference, .. } => {
                self.p2p_addresses_sent.remove(&conference);
                self.relay.stop_relay(conference).await;
            }
            RegistryEvent::EndpointAttached { conference, .. } => {
                if let Some(snapshot) = self.registry.snapshot(&conference).await {
                    if snapshot.topology == Topology::P2p {
                        self.try_emit_p2p_addresses(&conference, &snapshot).await;
                    }
                }
            }
            RegistryEvent::TopologyChanged { .. } => {}
        }
    }

    async fn recompute(&self, conference: &ConferenceId) {
        let Some(snapshot) = self.registry.snapshot(conference).await else {
            // Conference destroyed between the event firing and this lookup.
            self.p2p_addresses_sent.remove(conference);
            self.relay.stop_relay(conference.clone()).await;
            return;
        };

        let old = snapshot.topology;
        let new = conf_registry::topology_for(snapshot.participants.len(), self.registry.force_composite());

        if new == old {
            if new == Topology::P2p {
                self.try_emit_p2p_addresses(conference, &snapshot).await;
            }
            return;
        }

        debug!(conference = %conference, ?old, ?new, "topology transition");

        if old == Topology::Relay {
            self.relay.stop_relay(conference.clone()).await;
        }
        if old == Topology::P2p {
            self.p2p_addresses_sent.remove(conference);
        }

        match new {
            Topology::Idle => {
                if let Some(remaining) = snapshot.participants.first() {
                    self.send(remaining.client_id, ServerMessage::StopP2p {}).await;
                }
            }
            Topology::P2p => {
                self.try_emit_p2p_addresses(conference, &snapshot).await;
            }
            Topology::Relay => {
                for participant in snapshot.participant_ids() {
                    self.send(participant, ServerMessage::StopP2p {}).await;
                }
                self.relay.start_relay(conference.clone()).await;
            }
        }

        if let Err(e) = self.registry.set_topology(conference, new).await {
            warn!(conference = %conference, error = %e, "failed to persist topology change");
        }
    }

    async fn try_emit_p2p_addresses(&self, conference: &ConferenceId, snapshot: &ConferenceSnapshot) {
        if snapshot.participants.len() != 2 {
            return;
        }
        if !self.p2p_addresses_sent.insert(conference.clone()) {
            return;
        }

        let a = &snapshot.participants[0];
        let b = &snapshot.participants[1];
        let (Some(a_addr), Some(b_addr)) = (a.endpoint, b.endpoint) else {
            // Not both registered yet; undo the reservation so a later
            // EndpointAttached event retries.
            self.p2p_addresses_sent.remove(conference);
            return;
        };

        self.send(
            a.client_id,
            ServerMessage::P2pAddress {
                client_id: b.client_id,
                ip: b_addr.ip().to_string(),
                port: b_addr.port(),
            },
        )
        .await;
        self.send(
            b.client_id,
            ServerMessage::P2pAddress {
                client_id: a.client_id,
                ip: a_addr.ip().to_string(),
                port: a_addr.port(),
            },
        )
        .await;
    }

    async fn send(&self, client: conf_wire::ClientId, message: ServerMessage) {
        if let Err(e) = self.directory.send_to(client, message).await {
            warn!(client = %client, error = %e, "failed to deliver topology directive");
        }
    }
}
