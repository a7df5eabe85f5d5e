//! Per-`(sender, conference)` frame reassembly over the datagram codec.

pub mod assembler;
pub mod sweeper;

pub use assembler::{CompletedFrame, IngestOutcome, IngestResult, ReassemblyTable, RejectCause, DEFAULT_TTL};
pub use sweeper::{spawn_sweeper, SweeperMetrics};

#[cfg(test)]
mod tests {
    use super::*;
    use conf_wire::{ClientId, ConferenceId, MediaPacket, PacketHeader, PayloadType};

    fn video_fragment(client: ClientId, conference: &str, ts: u64, seq: u16, total: u16, payload: &[u8]) -> MediaPacket {
        MediaPacket {
            header: PacketHeader {
                payload_type: PayloadType::Video,
                payload_length: payload.len() as u16,
                client_id: client,
                conference_id: ConferenceId::from(conference),
                sequence_number: seq,
                total_fragments: total,
                timestamp: ts,
            },
            payload: payload.to_vec(),
        }
    }

    /// Property 5: if all N fragments arrive before TTL, the emitted
    /// frame's byte length equals the sum of payload sizes in seq order.
    #[tokio::test]
    async fn reassembly_completeness() {
        let table = ReassemblyTable::new(DEFAULT_TTL);
        let client = ClientId::new();
        let chunks: [&[u8]; 3] = [&[1, 2, 3], &[4, 5], &[6, 7, 8, 9]];

        let r1 = table.ingest(video_fragment(client, "m-1", 500, 1, 3, chunks[0])).await;
        assert!(matches!(r1.outcome, IngestOutcome::PartialAccepted));
        let r2 = table.ingest(video_fragment(client, "m-1", 500, 3, 3, chunks[2])).await;
        assert!(matches!(r2.outcome, IngestOutcome::PartialAccepted));
        let r3 = table.ingest(video_fragment(client, "m-1", 500, 2, 3, chunks[1])).await;

        match r3.outcome {
            IngestOutcome::Complete(frame) => {
                let expected_len: usize = chunks.iter().map(|c| c.len()).sum();
                assert_eq!(frame.bytes.len(), expected_len);
                assert_eq!(frame.bytes, [1, 2, 3, 4, 5, 6, 7, 8, 9]);
                assert!(!frame.padded);
            }
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    /// Property 6: duplicate fragments with identical length do not
    /// produce duplicate completions.
    #[tokio::test]
    async fn reassembly_idempotence() {
        let table = ReassemblyTable::new(DEFAULT_TTL);
        let client = ClientId::new();

        let _ = table.ingest(video_fragment(client, "m-1", 10, 1, 2, &[1, 2])).await;
        let dup = table.ingest(video_fragment(client, "m-1", 10, 1, 2, &[1, 2])).await;
        assert!(matches!(dup.outcome, IngestOutcome::PartialAccepted));

        let complete = table.ingest(video_fragment(client, "m-1", 10, 2, 2, &[3, 4])).await;
        assert!(matches!(complete.outcome, IngestOutcome::Complete(_)));

        // A second delivery of the final fragment now starts a brand new
        // frame-in-flight (the prior one already finalized and was
        // evicted), so it is accepted as a fresh partial, not a second
        // completion of the old frame.
        let after = table.ingest(video_fragment(client, "m-1", 10, 2, 2, &[3, 4])).await;
        assert!(matches!(after.outcome, IngestOutcome::PartialAccepted));
    }

    #[tokio::test]
    async fn duplicate_sequence_with_mismatched_length_is_rejected() {
        let table = ReassemblyTable::new(DEFAULT_TTL);
        let client = ClientId::new();

        let _ = table.ingest(video_fragment(client, "m-1", 10, 1, 2, &[1, 2])).await;
        let result = table.ingest(video_fragment(client, "m-1", 10, 1, 2, &[1, 2, 3])).await;
        assert_eq!(
            result.outcome,
            IngestOutcome::Rejected(RejectCause::DuplicateSequenceMismatch { sequence: 1 })
        );
    }

    #[tokio::test]
    async fn rejects_zero_total_fragments() {
        let table = ReassemblyTable::new(DEFAULT_TTL);
        let client = ClientId::new();
        let result = table.ingest(video_fragment(client, "m-1", 10, 1, 0, &[1])).await;
        assert_eq!(result.outcome, IngestOutcome::Rejected(RejectCause::ZeroTotalFragments));
    }

    #[tokio::test]
    async fn rejects_sequence_exceeding_total() {
        let table = ReassemblyTable::new(DEFAULT_TTL);
        let client = ClientId::new();
        let result = table.ingest(video_fragment(client, "m-1", 10, 5, 3, &[1])).await;
        assert_eq!(
            result.outcome,
            IngestOutcome::Rejected(RejectCause::SequenceExceedsTotal { sequence: 5, total: 3 })
        );
    }

    #[tokio::test]
    async fn rejects_zero_sequence_for_video() {
        let table = ReassemblyTable::new(DEFAULT_TTL);
        let client = ClientId::new();
        let result = table.ingest(video_fragment(client, "m-1", 10, 0, 3, &[1])).await;
        assert_eq!(result.outcome, IngestOutcome::Rejected(RejectCause::ZeroSequenceForVideo));
    }

    #[tokio::test]
    async fn drop_stream_discards_a_partial_without_completing_it() {
        let table = ReassemblyTable::new(DEFAULT_TTL);
        let client = ClientId::new();
        let conference = ConferenceId::from("m-1");

        let _ = table.ingest(video_fragment(client, "m-1", 10, 1, 2, &[1, 2])).await;
        table.drop_stream(client, conference).await;

        let result = table.ingest(video_fragment(client, "m-1", 10, 2, 2, &[3, 4])).await;
        assert!(matches!(result.outcome, IngestOutcome::PartialAccepted));
    }

    #[tokio::test]
    async fn audio_single_fragment_completes_immediately() {
        let table = ReassemblyTable::new(DEFAULT_TTL);
        let client = ClientId::new();
        let packet = MediaPacket {
            header: PacketHeader {
                payload_type: PayloadType::Audio,
                payload_length: 4,
                client_id: client,
                conference_id: ConferenceId::from("m-1"),
                sequence_number: 0,
                total_fragments: 1,
                timestamp: 77,
            },
            payload: vec![9, 9, 9, 9],
        };
        let result = table.ingest(packet).await;
        match result.outcome {
            IngestOutcome::Complete(frame) => assert_eq!(frame.bytes, vec![9, 9, 9, 9]),
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    /// A new frame key for the same stream force-finalizes a prior
    /// partial once it has reached 80% completion, padding the rest.
    #[tokio::test]
    async fn frame_key_change_force_finalizes_near_complete_prior() {
        let table = ReassemblyTable::new(DEFAULT_TTL);
        let client = ClientId::new();

        // 4 of 5 fragments of the first frame arrive (80%).
        for seq in 1..=4u16 {
            let _ = table
                .ingest(video_fragment(client, "m-1", 1, seq, 5, &[seq as u8]))
                .await;
        }

        // A fragment of a new frame (different timestamp) arrives.
        let result = table.ingest(video_fragment(client, "m-1", 2, 1, 2, &[0xAA])).await;

        let forced = result.forced_prior.expect("prior frame should be force-finalized");
        assert!(forced.padded);
        assert_eq!(forced.frame_timestamp, 1);
        assert_eq!(forced.bytes, vec![1, 2, 3, 4]);
        assert!(matches!(result.outcome, IngestOutcome::PartialAccepted));
    }

    /// Below 80% completion, the prior partial is silently discarded, not
    /// force-finalized.
    #[tokio::test]
    async fn frame_key_change_discards_sparse_prior() {
        let table = ReassemblyTable::new(DEFAULT_TTL);
        let client = ClientId::new();

        let _ = table.ingest(video_fragment(client, "m-1", 1, 1, 5, &[1])).await;

        let result = table.ingest(video_fragment(client, "m-1", 2, 1, 2, &[0xAA])).await;
        assert!(result.forced_prior.is_none());
    }
}
