//! Top-level compositing/mixing service: the `CompositingLifecycle`
//! implementation `conf-relay`'s `MediaRelay` drives on topology
//! transitions and composite-mode media ingest (§4.6, §4.7, §4.8).

use crate::compositor::{CompositorConfig, ConferenceCompositor};
use crate::mixer::ConferenceMixer;
use async_trait::async_trait;
use conf_reassembly::CompletedFrame;
use conf_registry::Registry;
use conf_relay::{CompositingLifecycle, EgressPool};
use conf_wire::{ClientId, ConferenceId};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

pub struct CompositingService {
    registry: Arc<Registry>,
    egress: Arc<EgressPool>,
    video_config: Arc<CompositorConfig>,
    compositors: DashMap<ConferenceId, ConferenceCompositor>,
    mixers: DashMap<ConferenceId, Arc<ConferenceMixer>>,
}

impl CompositingService {
    pub fn new(registry: Arc<Registry>, egress: Arc<EgressPool>, video_config: CompositorConfig) -> Arc<Self> {
        Arc::new(CompositingService {
            registry,
            egress,
            video_config: Arc::new(video_config),
            compositors: DashMap::new(),
            mixers: DashMap::new(),
        })
    }
}

#[async_trait]
impl CompositingLifecycle for CompositingService {
    /// Starts compositing/mixing for a conference that has just
    /// transitioned into relay topology with `forceComposite` active.
    /// Idempotent: a conference that already has a compositor is left
    /// alone (the lifecycle's `start`/`stop` calls are edge-triggered by
    /// the Topology Controller, but guard here anyway).
    async fn start(&self, conference: ConferenceId) {
        if self.compositors.contains_key(&conference) {
            return;
        }
        info!(conference = %conference, "starting composite video/audio for conference");
        let compositor = ConferenceCompositor::spawn(
            conference.clone(),
            self.registry.clone(),
            self.egress.clone(),
            self.video_config.clone(),
        );
        self.compositors.insert(conference.clone(), compositor);
        self.mixers.insert(conference, Arc::new(ConferenceMixer::new()));
    }

    async fn stop(&self, conference: ConferenceId) {
        info!(conference = %conference, "stopping composite video/audio for conference");
        if let Some((_, compositor)) = self.compositors.remove(&conference) {
            compositor.stop();
        }
        self.mixers.remove(&conference);
    }

    async fn ingest_video(&self, conference: ConferenceId, frame: CompletedFrame) {
        if let Some(compositor) = self.compositors.get(&conference) {
            compositor.ingest(frame);
        }
    }

    async fn ingest_audio(&self, conference: ConferenceId, frame: CompletedFrame) {
        let Some(mixer) = self.mixers.get(&conference).map(|m| m.clone()) else {
            return;
        };
        mixer
            .ingest(&conference, frame.sender, &frame.bytes, &self.registry, &self.egress)
            .await;
    }

    /// Evicts this participant's video slot and audio ring without
    /// tearing down the rest of the conference's compositing/mixing
    /// state (§3: per-participant media-plane state is torn down on
    /// departure, the conference-wide task lives until relay mode ends).
    async fn participant_left(&self, conference: ConferenceId, client: ClientId) {
        if let Some(compositor) = self.compositors.get(&conference) {
            compositor.evict(&client);
        }
        if let Some(mixer) = self.mixers.get(&conference) {
            mixer.evict(&client);
        }
    }
}
