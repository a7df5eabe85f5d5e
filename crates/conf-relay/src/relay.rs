//! Media Relay (§4.6): a shared ingress socket dispatching datagrams by
//! conference topology, and the per-participant egress fan-out.

use crate::egress::EgressPool;
use crate::fragment::fragment;
use async_trait::async_trait;
use conf_reassembly::{CompletedFrame, IngestOutcome, ReassemblyTable};
use conf_registry::{Registry, Topology};
use conf_wire::{ClientId, ConferenceId, MediaPacket, PayloadType};
use conf_topology::RelayLifecycle;
use dashmap::DashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Capability interface the Compositor/Mixer implements so `MediaRelay`
/// can start and stop per-conference compositing without depending on
/// `conf-compositor` (which sits downstream of this crate).
#[async_trait]
pub trait CompositingLifecycle: Send + Sync {
    async fn start(&self, conference: ConferenceId);
    async fn stop(&self, conference: ConferenceId);
    async fn ingest_video(&self, conference: ConferenceId, frame: CompletedFrame);
    async fn ingest_audio(&self, conference: ConferenceId, frame: CompletedFrame);

    /// Evict this participant's per-conference media-plane state (a
    /// `VideoSlot`/`AudioRing`, §3) without tearing down the whole
    /// conference's compositing/mixing task. Default no-op: a lifecycle
    /// with no per-participant state needs nothing here.
    async fn participant_left(&self, _conference: ConferenceId, _client: ClientId) {}
}

#[derive(Debug, Default)]
pub struct RelayMetrics {
    pub malformed_dropped: AtomicU64,
    pub unmembered_dropped: AtomicU64,
    pub p2p_dropped: AtomicU64,
}

pub struct MediaRelay {
    registry: Arc<Registry>,
    egress: Arc<EgressPool>,
    reassembly: Arc<ReassemblyTable>,
    compositing: OnceCell<Arc<dyn CompositingLifecycle>>,
    metrics: Arc<RelayMetrics>,
    warned_p2p_flows: DashSet<(ClientId, ConferenceId)>,
}

impl MediaRelay {
    pub fn new(registry: Arc<Registry>, egress: Arc<EgressPool>, reassembly: Arc<ReassemblyTable>) -> Arc<Self> {
        Arc::new(MediaRelay {
            registry,
            egress,
            reassembly,
            compositing: OnceCell::new(),
            metrics: Arc::new(RelayMetrics::default()),
            warned_p2p_flows: DashSet::new(),
        })
    }

    pub fn metrics(&self) -> Arc<RelayMetrics> {
        self.metrics.clone()
    }

    pub fn egress(&self) -> Arc<EgressPool> {
        self.egress.clone()
    }

    /// Wires the compositor in after construction — `conf-compositor`
    /// depends on this crate, so it can't be supplied to `new`.
    pub fn set_compositing(&self, compositing: Arc<dyn CompositingLifecycle>) {
        let _ = self.compositing.set(compositing);
    }

    /// Binds the shared ingress socket and runs the receive loop until
    /// the task is aborted.
    pub async fn run_ingress(self: Arc<Self>, port: u16) -> std::io::Result<()> {
        let socket = UdpSocket::bind(("0.0.0.0", port)).await?;
        let mut buf = vec![0u8; conf_wire::MAX_DATAGRAM_SIZE];
        loop {
            let (n, _peer) = socket.recv_from(&mut buf).await?;
            self.handle_datagram(&buf[..n]).await;
        }
    }

    async fn handle_datagram(&self, data: &[u8]) {
        let packet = match MediaPacket::parse(data) {
            Ok(packet) => packet,
            Err(e) => {
                debug!(error = %e, "dropping malformed datagram");
                self.metrics.malformed_dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        let sender = packet.header.client_id;
        let conference_id = packet.header.conference_id.clone();

        // Revalidate the sender-supplied conference id against the
        // Registry rather than trusting the datagram (see design notes).
        if self.registry.current_conference(&sender) != Some(conference_id.clone()) {
            self.metrics.unmembered_dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let Some(snapshot) = self.registry.snapshot(&conference_id).await else {
            self.metrics.unmembered_dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };
        if !snapshot.participants.iter().any(|p| p.client_id == sender && p.endpoint.is_some()) {
            self.metrics.unmembered_dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        match snapshot.topology {
            Topology::Idle | Topology::P2p => {
                if self.warned_p2p_flows.insert((sender, conference_id.clone())) {
                    debug!(client = %sender, conference = %conference_id, "dropping media on non-relay topology");
                }
                self.metrics.p2p_dropped.fetch_add(1, Ordering::Relaxed);
            }
            Topology::Relay => {
                self.warned_p2p_flows.remove(&(sender, conference_id.clone()));
                self.handle_relay_datagram(packet, conference_id).await;
            }
        }
    }

    async fn handle_relay_datagram(&self, packet: MediaPacket, conference_id: ConferenceId) {
        let composite = self.registry.force_composite()
            && self
                .registry
                .snapshot(&conference_id)
                .await
                .map(|s| s.participants.len() >= 3)
                .unwrap_or(false);

        let result = self.reassembly.ingest(packet).await;

        // A frame-key change can force-finalize a prior ≥80%-complete
        // partial (§4.2); deliver that one first so frames for one
        // sender still leave in arrival-completion order.
        if let Some(forced) = result.forced_prior {
            self.deliver_frame(&conference_id, forced, composite).await;
        }

        if let IngestOutcome::Complete(frame) = result.outcome {
            self.deliver_frame(&conference_id, frame, composite).await;
        }
    }

    async fn deliver_frame(&self, conference_id: &ConferenceId, frame: CompletedFrame, composite: bool) {
        match frame.payload_type {
            PayloadType::Video if composite => {
                if let Some(compositing) = self.compositing.get() {
                    compositing.ingest_video(conference_id.clone(), frame).await;
                }
            }
            PayloadType::Audio if composite => {
                if let Some(compositing) = self.compositing.get() {
                    compositing.ingest_audio(conference_id.clone(), frame).await;
                }
            }
            PayloadType::Video | PayloadType::Audio => {
                self.fan_out(conference_id, &frame).await;
            }
        }
    }

    /// Passthrough fan-out: re-fragments the reassembled frame and sends
    /// it to every other participant's egress, preserving sender identity.
    async fn fan_out(&self, conference_id: &ConferenceId, frame: &CompletedFrame) {
        let Some(snapshot) = self.registry.snapshot(conference_id).await else {
            return;
        };
        let datagrams = fragment(
            frame.payload_type,
            frame.sender,
            conference_id.clone(),
            frame.frame_timestamp,
            &frame.bytes,
        );
        for participant in snapshot.participants {
            if participant.client_id == frame.sender {
                continue;
            }
            for datagram in &datagrams {
                self.egress.send(participant.client_id, datagram.clone());
            }
        }
    }
}

#[async_trait]
impl RelayLifecycle for MediaRelay {
    async fn start_relay(&self, conference: ConferenceId) {
        if let Some(compositing) = self.compositing.get() {
            compositing.start(conference).await;
        }
    }

    async fn stop_relay(&self, conference: ConferenceId) {
        if let Some(compositing) = self.compositing.get() {
            compositing.stop(conference).await;
        }
    }
}

/// Called from the session-close cascade (§5): tears down this
/// participant's egress socket and pending reassembly state.
pub async fn remove_participant(relay: &MediaRelay, conference: &ConferenceId, client: ClientId) {
    relay.egress.detach(&client);
    relay.reassembly.drop_stream(client, conference.clone()).await;
    if let Some(compositing) = relay.compositing.get() {
        compositing.participant_left(conference.clone(), client).await;
    }
}

pub fn egress_peer_addr(ip: &str, port: u16) -> Option<SocketAddr> {
    format!("{ip}:{port}").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use conf_reassembly::DEFAULT_TTL;
    use conf_wire::PacketHeader;
    use tokio::net::UdpSocket as TestUdpSocket;
    use tokio::time::Duration;

    struct Harness {
        relay: Arc<MediaRelay>,
        registry: Arc<Registry>,
        listeners: std::collections::HashMap<ClientId, TestUdpSocket>,
    }

    async fn build_conference(n: usize, force_composite: bool) -> (Harness, ConferenceId, Vec<ClientId>) {
        let registry = Arc::new(Registry::new(force_composite));
        let egress = Arc::new(EgressPool::new());
        let reassembly = Arc::new(ReassemblyTable::new(DEFAULT_TTL));
        let relay = MediaRelay::new(registry.clone(), egress.clone(), reassembly);

        let creator = ClientId::new();
        let conference = registry.create_conference(creator).await;
        let mut clients = vec![creator];
        for _ in 1..n {
            let client = ClientId::new();
            registry.join(&conference, client).await;
            clients.push(client);
        }

        let mut listeners = std::collections::HashMap::new();
        for &client in &clients {
            let listener = TestUdpSocket::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            registry.attach_endpoint(&conference, client, addr).await.unwrap();
            egress.attach(client, addr).await.unwrap();
            listeners.insert(client, listener);
        }
        let topology = conf_registry::topology_for(clients.len(), force_composite);
        registry.set_topology(&conference, topology).await.unwrap();

        (
            Harness {
                relay,
                registry,
                listeners,
            },
            conference,
            clients,
        )
    }

    fn video_datagram(client: ClientId, conference: &ConferenceId, ts: u64) -> Vec<u8> {
        let header = PacketHeader {
            payload_type: PayloadType::Video,
            payload_length: 4,
            client_id: client,
            conference_id: conference.clone(),
            sequence_number: 1,
            total_fragments: 1,
            timestamp: ts,
        };
        MediaPacket {
            header,
            payload: vec![1, 2, 3, 4],
        }
        .to_datagram()
        .unwrap()
    }

    async fn recv_within(socket: &TestUdpSocket, timeout: Duration) -> Option<Vec<u8>> {
        let mut buf = [0u8; 2048];
        match tokio::time::timeout(timeout, socket.recv_from(&mut buf)).await {
            Ok(Ok((n, _))) => Some(buf[..n].to_vec()),
            _ => None,
        }
    }

    /// Property 7: a forwarded media datagram is never delivered back to
    /// its own sender.
    #[tokio::test]
    async fn fan_out_excludes_the_sender() {
        let (harness, conference, clients) = build_conference(3, false).await;
        let sender = clients[0];
        let datagram = video_datagram(sender, &conference, 1000);

        harness.relay.handle_datagram(&datagram).await;

        let sender_got = recv_within(&harness.listeners[&sender], Duration::from_millis(200)).await;
        assert!(sender_got.is_none(), "sender must not receive its own forwarded frame");

        for &other in &clients[1..] {
            let got = recv_within(&harness.listeners[&other], Duration::from_secs(1)).await;
            let parsed = MediaPacket::parse(&got.expect("other participant should receive the frame")).unwrap();
            assert_eq!(parsed.header.client_id, sender);
            assert_eq!(parsed.payload, vec![1, 2, 3, 4]);
        }
    }

    /// Property 8: while a conference is in `p2p`, the relay emits no
    /// media to its two participants.
    #[tokio::test]
    async fn p2p_topology_silences_the_relay() {
        let (harness, conference, clients) = build_conference(2, false).await;
        let sender = clients[0];
        let datagram = video_datagram(sender, &conference, 2000);

        harness.relay.handle_datagram(&datagram).await;

        for &client in &clients {
            let got = recv_within(&harness.listeners[&client], Duration::from_millis(200)).await;
            assert!(got.is_none(), "relay must stay silent while topology is p2p");
        }
        assert_eq!(harness.relay.metrics.p2p_dropped.load(Ordering::Relaxed), 1);
        let _ = &harness.registry;
    }

    /// A datagram whose claimed conference id does not match the
    /// sender's actual registry membership is dropped outright.
    #[tokio::test]
    async fn mismatched_conference_id_is_dropped() {
        let (harness, _conference, clients) = build_conference(3, false).await;
        let sender = clients[0];
        let bogus = ConferenceId::from("m-999");
        let datagram = video_datagram(sender, &bogus, 3000);

        harness.relay.handle_datagram(&datagram).await;

        assert_eq!(harness.relay.metrics.unmembered_dropped.load(Ordering::Relaxed), 1);
        for &client in &clients {
            let got = recv_within(&harness.listeners[&client], Duration::from_millis(100)).await;
            assert!(got.is_none());
        }
    }
}
