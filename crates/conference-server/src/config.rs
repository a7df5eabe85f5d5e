//! Layered server configuration (defaults → optional TOML file →
//! `CONF_`-prefixed environment variables), per §1.3.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// The fixed control-channel port and media-plane ingress port the
/// reference implementation uses absent any override (§1.3, §6).
const DEFAULT_PORT: u16 = 5555;
const DEFAULT_EGRESS_START_PORT: u16 = 16000;
const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;
const DEFAULT_REASSEMBLY_TTL_SECS: u64 = 5;
const DEFAULT_COMPOSITE_CADENCE_FPS: u32 = 30;
const DEFAULT_CELL_WIDTH: u32 = 960;
const DEFAULT_CELL_HEIGHT: u32 = 540;
const DEFAULT_JPEG_QUALITY: u8 = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port the control-channel WebSocket listener binds.
    pub control_port: u16,
    /// Port the shared media-plane ingress UDP socket binds.
    pub media_port: u16,
    /// First port the per-participant egress pool tries to bind.
    pub egress_start_port: u16,
    pub heartbeat_interval_secs: u64,
    pub reassembly_ttl_secs: u64,
    pub composite_cadence_fps: u32,
    pub cell_width: u32,
    pub cell_height: u32,
    pub jpeg_quality: u8,
    /// `CHANGE_CS_MODE_TO_SAME` sets this at runtime too; this is only
    /// the boot-time default (§4.3, §6.1).
    pub force_composite: bool,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            control_port: DEFAULT_PORT,
            media_port: DEFAULT_PORT,
            egress_start_port: DEFAULT_EGRESS_START_PORT,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            reassembly_ttl_secs: DEFAULT_REASSEMBLY_TTL_SECS,
            composite_cadence_fps: DEFAULT_COMPOSITE_CADENCE_FPS,
            cell_width: DEFAULT_CELL_WIDTH,
            cell_height: DEFAULT_CELL_HEIGHT,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            force_composite: false,
            log_level: "info".to_string(),
        }
    }
}

/// Merges defaults, an optional TOML file, then `CONF_`-prefixed
/// environment variables (later sources win).
pub fn load(file: Option<&Path>) -> Result<ServerConfig, config::ConfigError> {
    let mut builder = config::Config::builder().add_source(config::Config::try_from(&ServerConfig::default())?);

    if let Some(path) = file {
        builder = builder.add_source(config::File::from(path).required(false));
    }

    builder = builder.add_source(config::Environment::with_prefix("CONF").separator("_"));
    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = ServerConfig::default();
        assert_eq!(config.control_port, 5555);
        assert_eq!(config.egress_start_port, 16000);
        assert_eq!(config.composite_cadence_fps, 30);
    }

    #[test]
    fn load_with_no_file_falls_back_to_defaults() {
        let config = load(None).expect("defaults alone always build");
        assert_eq!(config.control_port, ServerConfig::default().control_port);
    }
}
