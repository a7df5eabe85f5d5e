//! Conference relay server entry point: parses CLI flags, loads the
//! layered configuration, sets up logging, and runs the server.

mod cascade;
mod cli;
mod config;
mod server;

use clap::Parser;
use infra_common::logging::setup::{parse_log_level, setup_logging, LoggingConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let mut server_config = config::load(cli.config.as_deref()).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    if let Some(port) = cli.port {
        server_config.control_port = port;
        server_config.media_port = port;
    }
    if cli.force_composite {
        server_config.force_composite = true;
    }

    let log_level = parse_log_level(&server_config.log_level).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    setup_logging(LoggingConfig::new(log_level, "conference-server")).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    infra_common::logging::setup::log_welcome("conference-server", env!("CARGO_PKG_VERSION"));

    server::run(server_config).await
}
