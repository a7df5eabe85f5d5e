//! Capability interface the media-relay layer implements so the
//! Topology Controller can start and stop per-conference relay/compositing
//! work without depending on `conf-relay` directly (it sits upstream of
//! it in the dependency order).

use async_trait::async_trait;
use conf_wire::ConferenceId;

#[async_trait]
pub trait RelayLifecycle: Send + Sync {
    /// Start fan-out (and, where applicable, compositing/mixing) for a
    /// conference that just entered `relay` topology.
    async fn start_relay(&self, conference: ConferenceId);

    /// Tear down relay/compositing state for a conference that left
    /// `relay` topology, cooperatively, within one tick period.
    async fn stop_relay(&self, conference: ConferenceId);
}

/// No-op implementation for configurations that never reach relay mode,
/// and for tests that only exercise directive delivery.
pub struct NoRelayLifecycle;

#[async_trait]
impl RelayLifecycle for NoRelayLifecycle {
    async fn start_relay(&self, _conference: ConferenceId) {}
    async fn stop_relay(&self, _conference: ConferenceId) {}
}
