//! The session-close / endpoint-attach cascade (§5): bridges `Registry`
//! membership events into the media-plane layer. Lives here rather than
//! in `conf-control` or `conf-relay` because it needs both — a dependency
//! no single lower crate can take without an upward edge.

use conf_registry::{Registry, RegistryEvent};
use conf_relay::{EgressPool, MediaRelay};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

pub async fn run(registry: Arc<Registry>, relay: Arc<MediaRelay>, egress: Arc<EgressPool>, mut events: broadcast::Receiver<RegistryEvent>) {
    loop {
        match events.recv().await {
            Ok(RegistryEvent::EndpointAttached { conference, client }) => {
                let Some(snapshot) = registry.snapshot(&conference).await else {
                    continue;
                };
                let Some(addr) = snapshot.participants.iter().find(|p| p.client_id == client).and_then(|p| p.endpoint)
                else {
                    continue;
                };
                if let Err(e) = egress.attach(client, addr).await {
                    warn!(client = %client, error = %e, "failed to bind egress socket for attached endpoint");
                }
            }
            Ok(RegistryEvent::ParticipantLeft { conference, client }) => {
                conf_relay::remove_participant(&relay, &conference, client).await;
            }
            Ok(RegistryEvent::ConferenceCancelled { conference, participants }) => {
                for client in participants {
                    conf_relay::remove_participant(&relay, &conference, client).await;
                }
            }
            Ok(RegistryEvent::ParticipantJoined { .. } | RegistryEvent::TopologyChanged { .. }) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "session cascade lagged registry events");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}
