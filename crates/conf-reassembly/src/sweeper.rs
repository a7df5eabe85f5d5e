//! Background TTL sweeper for in-flight frame assemblies.

use crate::assembler::ReassemblyTable;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Counts of `ReassemblyTimeout` drops observed across the table's
/// lifetime, readable independently of the sweeper task.
#[derive(Default)]
pub struct SweeperMetrics {
    expired_total: AtomicU64,
}

impl SweeperMetrics {
    pub fn expired_total(&self) -> u64 {
        self.expired_total.load(Ordering::Relaxed)
    }
}

/// Spawn a task that sweeps `table` for TTL-expired assemblies every
/// `period`. Runs until the returned handle is aborted; callers should do
/// so as part of their own shutdown sequence.
pub fn spawn_sweeper(
    table: Arc<ReassemblyTable>,
    period: Duration,
) -> (JoinHandle<()>, Arc<SweeperMetrics>) {
    let metrics = Arc::new(SweeperMetrics::default());
    let metrics_task = metrics.clone();

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let expired = table.sweep().await;
            if expired > 0 {
                metrics_task.expired_total.fetch_add(expired as u64, Ordering::Relaxed);
                debug!(expired, "reassembly sweeper purged expired frame assemblies");
            }
        }
    });

    (handle, metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::DEFAULT_TTL;
    use conf_wire::{ClientId, ConferenceId, MediaPacket, PacketHeader, PayloadType};

    fn fragment(total: u16, seq: u16, ts: u64) -> MediaPacket {
        MediaPacket {
            header: PacketHeader {
                payload_type: PayloadType::Video,
                payload_length: 4,
                client_id: ClientId::new(),
                conference_id: ConferenceId::from("m-1"),
                sequence_number: seq,
                total_fragments: total,
                timestamp: ts,
            },
            payload: vec![0, 1, 2, 3],
        }
    }

    /// Scenario S5: a 3-fragment frame loses sequence 2; after the TTL
    /// the assembly is swept and no frame is ever emitted.
    #[tokio::test(start_paused = true)]
    async fn s5_fragment_drop_is_swept_after_ttl() {
        let table = Arc::new(ReassemblyTable::new(DEFAULT_TTL));
        let (handle, metrics) = spawn_sweeper(table.clone(), Duration::from_millis(100));

        let result = table.ingest(fragment(3, 1, 1_000)).await;
        assert!(matches!(result.outcome, crate::assembler::IngestOutcome::PartialAccepted));
        let result = table.ingest(fragment(3, 3, 1_000)).await;
        assert!(matches!(result.outcome, crate::assembler::IngestOutcome::PartialAccepted));

        assert_eq!(table.len().await, 1);

        tokio::time::advance(DEFAULT_TTL + Duration::from_secs(1)).await;
        tokio::time::advance(Duration::from_millis(200)).await;
        // Let the sweeper task actually run.
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;

        assert_eq!(table.len().await, 0);
        assert_eq!(metrics.expired_total(), 1);

        handle.abort();
    }
}
