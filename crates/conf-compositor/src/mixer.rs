//! Per-conference audio mixer: accumulates decoded PCM frames per
//! sender in a bounded ring and mixes whatever is ready on each
//! incoming frame (§4.8).

use crate::audio::{ring_capacity, AudioRings};
use crate::compositor::synthetic_server_id;
use crate::time::now_millis;
use conf_registry::Registry;
use conf_relay::{fragment, EgressPool};
use conf_wire::{ClientId, ConferenceId, PayloadType};
use std::sync::Arc;

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub const DEFAULT_BUFFER_DURATION_SECS: f64 = 1.0;
pub const DEFAULT_FRAME_SIZE: usize = 1024;

/// Sum every ready frame sample-wise in `i32` and clamp back to `i16`
/// (§4.8: "samples are summed and clamped to the 16-bit range").
fn mix(frames: &[Vec<i16>]) -> Vec<i16> {
    let len = frames.iter().map(Vec::len).max().unwrap_or(0);
    let mut out = vec![0i16; len];
    for i in 0..len {
        let sum: i32 = frames.iter().map(|f| *f.get(i).unwrap_or(&0) as i32).sum();
        out[i] = sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
    }
    out
}

fn decode_pcm(payload: &[u8]) -> Vec<i16> {
    payload
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

fn encode_pcm(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

pub struct ConferenceMixer {
    rings: AudioRings,
}

impl ConferenceMixer {
    pub fn new() -> Self {
        ConferenceMixer {
            rings: AudioRings::new(ring_capacity(DEFAULT_SAMPLE_RATE, DEFAULT_BUFFER_DURATION_SECS, DEFAULT_FRAME_SIZE)),
        }
    }

    pub fn evict(&self, sender: &ClientId) {
        self.rings.evict(sender);
    }

    /// Buffer `payload` from `sender`, then mix and fan out whatever
    /// frames are ready across every sender's ring. A sender's frame
    /// that hasn't arrived yet this tick simply contributes silence by
    /// omission — the mix proceeds rather than waiting.
    pub async fn ingest(
        &self,
        conference: &ConferenceId,
        sender: ClientId,
        payload: &[u8],
        registry: &Registry,
        egress: &EgressPool,
    ) {
        self.rings.push(sender, decode_pcm(payload));

        let ready = self.rings.drain_ready();
        if ready.is_empty() {
            return;
        }
        let mixed = encode_pcm(&mix(&ready));

        let Some(members) = registry.snapshot(conference).await else {
            return;
        };
        let datagrams = fragment(PayloadType::Audio, synthetic_server_id(), conference.clone(), now_millis(), &mixed);
        for participant in members.participants {
            for datagram in &datagrams {
                egress.send(participant.client_id, datagram.clone());
            }
        }
    }
}

impl Default for ConferenceMixer {
    fn default() -> Self {
        Self::new()
    }
}
