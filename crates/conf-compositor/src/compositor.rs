//! Per-conference video compositor: a ticking task that snapshots the
//! latest frame from every sender, composes a grid, and fans the result
//! out as a server-synthesized video stream (§4.7).

use crate::grid::{compose, decode_jpeg, encode_jpeg, DEFAULT_CELL_HEIGHT, DEFAULT_CELL_WIDTH, DEFAULT_JPEG_QUALITY};
use crate::time::now_millis;
use crate::video::VideoSlots;
use conf_reassembly::CompletedFrame;
use conf_registry::Registry;
use conf_relay::{fragment, EgressPool};
use conf_wire::{ClientId, ConferenceId, PayloadType};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// The `ClientId` the server stamps onto composited/mixed output it
/// synthesizes itself, rather than relays on a sender's behalf.
pub fn synthetic_server_id() -> ClientId {
    ClientId(Uuid::nil())
}

#[derive(Debug, Clone)]
pub struct CompositorConfig {
    pub cadence: Duration,
    pub cell_width: u32,
    pub cell_height: u32,
    pub jpeg_quality: u8,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        CompositorConfig {
            cadence: Duration::from_secs_f64(1.0 / 30.0),
            cell_width: DEFAULT_CELL_WIDTH,
            cell_height: DEFAULT_CELL_HEIGHT,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// One conference's compositing state: the latest per-sender frames and
/// the ticking task that periodically composes and emits them.
pub struct ConferenceCompositor {
    slots: Arc<VideoSlots>,
    handle: JoinHandle<()>,
}

impl ConferenceCompositor {
    pub fn spawn(
        conference: ConferenceId,
        registry: Arc<Registry>,
        egress: Arc<EgressPool>,
        config: Arc<CompositorConfig>,
    ) -> Self {
        let slots = Arc::new(VideoSlots::new());
        let tick_slots = slots.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.cadence);
            loop {
                interval.tick().await;
                if tick_slots.is_empty() {
                    continue;
                }
                let snapshot = tick_slots.snapshot();
                let canvas = compose(&snapshot, config.cell_width, config.cell_height);
                let Some(jpeg) = encode_jpeg(&canvas, config.jpeg_quality) else {
                    continue;
                };
                let Some(members) = registry.snapshot(&conference).await else {
                    // Conference torn down underneath us; the lifecycle
                    // stop() call will abort this task shortly.
                    continue;
                };
                let datagrams = fragment(
                    PayloadType::Video,
                    synthetic_server_id(),
                    conference.clone(),
                    now_millis(),
                    &jpeg,
                );
                for participant in members.participants {
                    for datagram in &datagrams {
                        egress.send(participant.client_id, datagram.clone());
                    }
                }
            }
        });

        ConferenceCompositor { slots, handle }
    }

    /// Decode and store the latest frame from `frame.sender`. A frame
    /// that fails to decode is dropped and warned about rather than
    /// poisoning the conference's grid with a stale slot.
    pub fn ingest(&self, frame: CompletedFrame) {
        match decode_jpeg(&frame.bytes) {
            Some(decoded) => self.slots.update(frame.sender, decoded),
            None => {
                warn!(sender = %frame.sender, conference = %frame.conference, "dropping undecodable video frame");
            }
        }
    }

    pub fn evict(&self, sender: &ClientId) {
        self.slots.evict(sender);
    }

    pub fn stop(self) {
        debug!("stopping conference compositor");
        self.handle.abort();
    }
}
