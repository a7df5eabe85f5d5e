//! Per-conference `VideoSlot` storage (§3, §4.7): the latest decoded
//! frame per sender, retained until the sender leaves or the conference
//! stops compositing.

use conf_wire::ClientId;
use dashmap::DashMap;
use image::RgbImage;
use std::time::Instant;

struct VideoSlot {
    frame: RgbImage,
    #[allow(dead_code)]
    updated_at: Instant,
}

/// One conference's worth of video slots, one per sender that has
/// delivered at least one decodable frame.
#[derive(Default)]
pub struct VideoSlots {
    slots: DashMap<ClientId, VideoSlot>,
}

impl VideoSlots {
    pub fn new() -> Self {
        VideoSlots::default()
    }

    /// Replace the sender's slot with a newly decoded frame.
    pub fn update(&self, sender: ClientId, frame: RgbImage) {
        self.slots.insert(
            sender,
            VideoSlot {
                frame,
                updated_at: Instant::now(),
            },
        );
    }

    /// Evicted when the sender leaves the conference (§3 lifecycle).
    pub fn evict(&self, sender: &ClientId) {
        self.slots.remove(sender);
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// A stable-ordered snapshot (by `ClientId`) for deterministic grid
    /// placement. Cells with no update since the last tick simply carry
    /// forward their last decoded frame, satisfying "cells without
    /// updates retain the previous content" (§4.7 step 3).
    pub fn snapshot(&self) -> Vec<(ClientId, RgbImage)> {
        let mut out: Vec<(ClientId, RgbImage)> =
            self.slots.iter().map(|e| (*e.key(), e.value().frame.clone())).collect();
        out.sort_by_key(|(id, _)| *id);
        out
    }
}
