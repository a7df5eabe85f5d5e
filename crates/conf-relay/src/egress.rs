//! Per-recipient egress sockets (§4.6): one exclusive UDP socket per
//! participant, fed by a bounded channel so a slow peer's socket can
//! never block another recipient's writer task.

use conf_wire::ClientId;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Egress writer queues hold at most this many pending datagrams; a
/// recipient that can't keep up has the newest datagram dropped (§5).
const EGRESS_QUEUE_CAPACITY: usize = 256;

/// First port the pool tries to bind an egress socket to; on conflict
/// it retries the next one (`AddressConflict` policy, §7).
const DEFAULT_EGRESS_START_PORT: u16 = 16000;

#[derive(Debug, Default)]
pub struct EgressMetrics {
    pub dropped: AtomicU64,
}

struct EgressHandle {
    tx: mpsc::Sender<Vec<u8>>,
    writer: JoinHandle<()>,
}

/// Owns every participant's egress socket and writer task.
pub struct EgressPool {
    sockets: DashMap<ClientId, EgressHandle>,
    next_port: AtomicU16,
    metrics: Arc<EgressMetrics>,
}

impl EgressPool {
    pub fn new() -> Self {
        Self::with_start_port(DEFAULT_EGRESS_START_PORT)
    }

    pub fn with_start_port(start_port: u16) -> Self {
        EgressPool {
            sockets: DashMap::new(),
            next_port: AtomicU16::new(start_port),
            metrics: Arc::new(EgressMetrics::default()),
        }
    }

    pub fn metrics(&self) -> Arc<EgressMetrics> {
        self.metrics.clone()
    }

    /// Binds a fresh egress socket for `client`, auto-incrementing the
    /// candidate port on bind conflicts, and spawns its writer task.
    /// Replaces any existing egress for this client.
    pub async fn attach(&self, client: ClientId, peer: SocketAddr) -> std::io::Result<()> {
        let socket = self.bind_next().await?;
        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(EGRESS_QUEUE_CAPACITY);
        let writer = tokio::spawn(async move {
            while let Some(datagram) = rx.recv().await {
                if let Err(e) = socket.send_to(&datagram, peer).await {
                    warn!(error = %e, "egress send failed");
                }
            }
        });
        if let Some(old) = self.sockets.insert(client, EgressHandle { tx, writer }) {
            old.writer.abort();
        }
        Ok(())
    }

    async fn bind_next(&self) -> std::io::Result<UdpSocket> {
        loop {
            let port = self.next_port.fetch_add(1, Ordering::Relaxed);
            match UdpSocket::bind(("0.0.0.0", port)).await {
                Ok(socket) => return Ok(socket),
                Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                    debug!(port, "egress port busy, retrying next port");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Enqueues a datagram for `client`'s egress writer. Drops the
    /// datagram and counts it if the queue is full or the client has no
    /// egress socket.
    pub fn send(&self, client: ClientId, datagram: Vec<u8>) {
        let Some(handle) = self.sockets.get(&client) else {
            self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };
        if handle.tx.try_send(datagram).is_err() {
            self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn detach(&self, client: &ClientId) {
        if let Some((_, handle)) = self.sockets.remove(client) {
            handle.writer.abort();
        }
    }

    pub fn is_attached(&self, client: &ClientId) -> bool {
        self.sockets.contains_key(client)
    }
}

impl Default for EgressPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn attach_and_send_delivers_datagram() {
        let pool = EgressPool::new();
        let client = ClientId::new();

        let listener = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let listener_addr = listener.local_addr().unwrap();

        pool.attach(client, listener_addr).await.unwrap();
        pool.send(client, vec![1, 2, 3, 4]);

        let mut buf = [0u8; 16];
        let (n, _) = tokio::time::timeout(std::time::Duration::from_secs(1), listener.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..n], &[1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn send_to_unattached_client_is_counted_as_dropped() {
        let pool = EgressPool::new();
        pool.send(ClientId::new(), vec![1]);
        assert_eq!(pool.metrics().dropped.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn detach_stops_the_writer() {
        let pool = EgressPool::new();
        let client = ClientId::new();
        let listener = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        pool.attach(client, listener.local_addr().unwrap()).await.unwrap();
        assert!(pool.is_attached(&client));
        pool.detach(&client);
        assert!(!pool.is_attached(&client));
    }
}
