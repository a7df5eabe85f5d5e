//! Per-`(sender, conference)` frame-in-flight tracking and completion.

use conf_wire::{ClientId, ConferenceId, MediaPacket, PayloadType};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// TTL for a frame-in-flight, per spec: 5 seconds since creation.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

/// Why a fragment was rejected outright (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectCause {
    ZeroTotalFragments,
    SequenceExceedsTotal { sequence: u16, total: u16 },
    ZeroSequenceForVideo,
    DuplicateSequenceMismatch { sequence: u16 },
}

/// Outcome of ingesting a single fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// All fragments for this frame have arrived; here is the assembled byte stream.
    Complete(CompletedFrame),
    /// Fragment accepted, frame still in flight.
    PartialAccepted,
    /// Fragment rejected outright; no state was mutated.
    Rejected(RejectCause),
}

/// The full result of an `ingest` call: the outcome for the incoming
/// fragment, plus (when a new frame key bumped a sufficiently-complete
/// prior partial out) the forced completion of that prior frame.
///
/// Spec §4.2: "if the prior partial has ≥80% fragments, attempt delivery
/// padded with zero-length filler ... otherwise discard."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestResult {
    pub outcome: IngestOutcome,
    pub forced_prior: Option<CompletedFrame>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedFrame {
    pub sender: ClientId,
    pub conference: ConferenceId,
    pub frame_timestamp: u64,
    pub payload_type: PayloadType,
    pub bytes: Vec<u8>,
    /// `true` if missing fragments were padded with zero-length filler
    /// because the frame was force-finalized at ≥80% completion.
    pub padded: bool,
}

struct StreamState {
    payload_type: PayloadType,
    frame_timestamp: u64,
    total_fragments: u16,
    fragments: HashMap<u16, Vec<u8>>,
    created_at: Instant,
}

impl StreamState {
    fn new(payload_type: PayloadType, frame_timestamp: u64, total_fragments: u16, now: Instant) -> Self {
        StreamState {
            payload_type,
            frame_timestamp,
            total_fragments,
            fragments: HashMap::new(),
            created_at: now,
        }
    }

    fn completion_ratio(&self) -> f64 {
        if self.total_fragments == 0 {
            return 0.0;
        }
        self.fragments.len() as f64 / self.total_fragments as f64
    }

    fn is_complete(&self) -> bool {
        self.fragments.len() as u16 >= self.total_fragments
    }

    /// Concatenate payloads in sequence order, 1..=total_fragments for
    /// video, or the single fragment at seq 0 for audio. Missing slots
    /// are padded with zero-length filler (i.e. simply skipped — a
    /// zero-length filler contributes no bytes).
    fn finalize(&self, sender: ClientId, conference: ConferenceId, padded: bool) -> CompletedFrame {
        let order: Vec<u16> = match self.payload_type {
            PayloadType::Audio => vec![0],
            PayloadType::Video => (1..=self.total_fragments).collect(),
        };
        let mut bytes = Vec::new();
        for seq in order {
            if let Some(chunk) = self.fragments.get(&seq) {
                bytes.extend_from_slice(chunk);
            }
        }
        CompletedFrame {
            sender,
            conference,
            frame_timestamp: self.frame_timestamp,
            payload_type: self.payload_type,
            bytes,
            padded,
        }
    }
}

/// Owns every `(sender, conference)` frame-in-flight. Spec §5: "FrameAssembly
/// maps are owned by the reassembler task for that stream; no external
/// access" — in this implementation the table is still wrapped in a mutex
/// so an independent sweeper task can purge TTL-expired entries without
/// coordinating with the ingress task by hand.
pub struct ReassemblyTable {
    streams: Mutex<HashMap<(ClientId, ConferenceId), StreamState>>,
    ttl: Duration,
}

impl ReassemblyTable {
    pub fn new(ttl: Duration) -> Self {
        ReassemblyTable {
            streams: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Ingest one fragment. See [`IngestResult`] for the return shape.
    pub async fn ingest(&self, packet: MediaPacket) -> IngestResult {
        let header = packet.header.clone();

        if header.total_fragments == 0 {
            return IngestResult {
                outcome: IngestOutcome::Rejected(RejectCause::ZeroTotalFragments),
                forced_prior: None,
            };
        }
        if header.sequence_number > header.total_fragments {
            return IngestResult {
                outcome: IngestOutcome::Rejected(RejectCause::SequenceExceedsTotal {
                    sequence: header.sequence_number,
                    total: header.total_fragments,
                }),
                forced_prior: None,
            };
        }
        if header.payload_type == PayloadType::Video && header.sequence_number == 0 {
            return IngestResult {
                outcome: IngestOutcome::Rejected(RejectCause::ZeroSequenceForVideo),
                forced_prior: None,
            };
        }

        let key = (header.client_id, header.conference_id.clone());
        let now = Instant::now();
        let mut streams = self.streams.lock().await;

        let mut forced_prior = None;

        let needs_new_state = match streams.get(&key) {
            Some(state) => state.frame_timestamp != header.timestamp,
            None => true,
        };

        if needs_new_state {
            if let Some(prior) = streams.remove(&key) {
                if prior.completion_ratio() >= 0.8 {
                    debug!(
                        sender = %key.0,
                        conference = %key.1,
                        ratio = prior.completion_ratio(),
                        "force-finalizing prior partial frame on frame-key change"
                    );
                    forced_prior = Some(prior.finalize(key.0, key.1.clone(), true));
                } else {
                    warn!(
                        sender = %key.0,
                        conference = %key.1,
                        ratio = prior.completion_ratio(),
                        "discarding prior partial frame on frame-key change"
                    );
                }
            }
            streams.insert(
                key.clone(),
                StreamState::new(header.payload_type, header.timestamp, header.total_fragments, now),
            );
        }

        let state = streams.get_mut(&key).expect("just inserted or already present");

        if let Some(existing) = state.fragments.get(&header.sequence_number) {
            if existing.len() != packet.payload.len() {
                return IngestResult {
                    outcome: IngestOutcome::Rejected(RejectCause::DuplicateSequenceMismatch {
                        sequence: header.sequence_number,
                    }),
                    forced_prior,
                };
            }
            // Idempotent duplicate: already counted, nothing more to do.
            return IngestResult {
                outcome: IngestOutcome::PartialAccepted,
                forced_prior,
            };
        }

        state.fragments.insert(header.sequence_number, packet.payload);

        let outcome = if state.is_complete() {
            let completed = state.finalize(key.0, key.1.clone(), false);
            streams.remove(&key);
            IngestOutcome::Complete(completed)
        } else {
            IngestOutcome::PartialAccepted
        };

        IngestResult { outcome, forced_prior }
    }

    /// Drop this stream's in-flight assembly, if any. Called from the
    /// session-close cascade (§5) when a participant's egress socket is
    /// torn down, so a departing sender's partial frame doesn't linger
    /// until TTL sweep.
    pub async fn drop_stream(&self, client: ClientId, conference: ConferenceId) {
        self.streams.lock().await.remove(&(client, conference));
    }

    /// Purge assemblies older than the configured TTL. Returns how many
    /// were dropped, for the caller to feed into a `ReassemblyTimeout`
    /// counter (§7).
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let ttl = self.ttl;
        let mut streams = self.streams.lock().await;
        let before = streams.len();
        streams.retain(|key, state| {
            let expired = now.duration_since(state.created_at) > ttl;
            if expired {
                warn!(sender = %key.0, conference = %key.1, "reassembly TTL expired, dropping partial frame");
            }
            !expired
        });
        before - streams.len()
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.streams.lock().await.len()
    }
}
