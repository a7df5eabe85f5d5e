//! Command-line flags (§1.5): everything here overrides the layered
//! file/env configuration when present.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "conference-server")]
#[command(about = "Multi-party conferencing relay: control channel, media relay, and compositor")]
#[command(version)]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Overrides both the control-channel and media-ingress port.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Forces relay/composite mode even for two-party conferences.
    #[arg(long)]
    pub force_composite: bool,
}
