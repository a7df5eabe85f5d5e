//! Per-conference `AudioRing` storage (§3, §4.8): a bounded queue of
//! decoded PCM frames per sender.

use conf_wire::ClientId;
use dashmap::DashMap;
use std::collections::VecDeque;

/// `ceil(sampleRate * bufferDuration / frameSize)` (§4.8 defaults:
/// 44 100 Hz, 1 s, 1024 samples/frame).
pub fn ring_capacity(sample_rate: u32, buffer_duration_secs: f64, frame_size: usize) -> usize {
    ((sample_rate as f64 * buffer_duration_secs) / frame_size as f64).ceil() as usize
}

/// One conference's worth of audio rings, one per sender.
#[derive(Default)]
pub struct AudioRings {
    capacity: usize,
    rings: DashMap<ClientId, VecDeque<Vec<i16>>>,
}

impl AudioRings {
    pub fn new(capacity: usize) -> Self {
        AudioRings {
            capacity: capacity.max(1),
            rings: DashMap::new(),
        }
    }

    /// Enqueue a decoded frame, dropping the oldest queued frame once
    /// the ring is at capacity (§4.8: "bounded by a 1-second ring").
    pub fn push(&self, sender: ClientId, frame: Vec<i16>) {
        let mut ring = self.rings.entry(sender).or_insert_with(VecDeque::new);
        if ring.len() >= self.capacity {
            ring.pop_front();
        }
        ring.push_back(frame);
    }

    /// Pop the oldest queued frame from every sender that currently has
    /// one buffered. A sender with an empty ring simply contributes
    /// nothing to this tick's mix — mixing proceeds at the natural
    /// ingest rate rather than waiting for every stream to catch up.
    pub fn drain_ready(&self) -> Vec<Vec<i16>> {
        self.rings.iter_mut().filter_map(|mut ring| ring.value_mut().pop_front()).collect()
    }

    pub fn evict(&self, sender: &ClientId) {
        self.rings.remove(sender);
    }
}
