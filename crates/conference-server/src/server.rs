//! Wires the control channel, media relay, topology controller and
//! compositor together and drives the accept loops (§1, §4).

use crate::config::ServerConfig;
use conf_compositor::{CompositingService, CompositorConfig};
use conf_control::SessionRegistry;
use conf_reassembly::ReassemblyTable;
use conf_registry::Registry;
use conf_relay::{EgressPool, MediaRelay};
use conf_topology::TopologyController;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let registry = Arc::new(Registry::new(config.force_composite));
    let session_directory = Arc::new(SessionRegistry::new());
    let reassembly = Arc::new(ReassemblyTable::new(Duration::from_secs(config.reassembly_ttl_secs)));
    let egress = Arc::new(EgressPool::with_start_port(config.egress_start_port));
    let relay = MediaRelay::new(registry.clone(), egress.clone(), reassembly.clone());

    let compositing = CompositingService::new(
        registry.clone(),
        egress.clone(),
        CompositorConfig {
            cadence: Duration::from_secs_f64(1.0 / config.composite_cadence_fps as f64),
            cell_width: config.cell_width,
            cell_height: config.cell_height,
            jpeg_quality: config.jpeg_quality,
        },
    );
    relay.set_compositing(compositing);

    let (sweeper, _sweeper_metrics) = conf_reassembly::spawn_sweeper(reassembly.clone(), Duration::from_secs(1));

    let topology_controller = TopologyController::new(registry.clone(), session_directory.clone(), relay.clone());
    let topology_task = tokio::spawn(topology_controller.run(registry.subscribe()));

    let cascade_task = tokio::spawn(crate::cascade::run(
        registry.clone(),
        relay.clone(),
        egress.clone(),
        registry.subscribe(),
    ));

    let ingress_relay = relay.clone();
    let media_port = config.media_port;
    let ingress_task = tokio::spawn(async move {
        if let Err(e) = ingress_relay.run_ingress(media_port).await {
            error!(error = %e, "media ingress socket failed");
        }
    });

    info!(port = config.control_port, "control channel listening");
    let listener = TcpListener::bind(("0.0.0.0", config.control_port)).await?;
    let heartbeat_interval = Duration::from_secs(config.heartbeat_interval_secs.max(1));

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "failed to accept control connection");
                continue;
            }
        };

        let registry = registry.clone();
        let directory = session_directory.clone();
        tokio::spawn(async move {
            let ws = match tokio_tungstenite::accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!(%peer, error = %e, "WebSocket handshake failed");
                    return;
                }
            };
            conf_control::run_connection(ws, registry, directory, heartbeat_interval).await;
        });
    }
}
