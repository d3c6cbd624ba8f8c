use std::path::PathBuf;

use clap::Parser;

/// Axon model gateway
#[derive(Debug, Parser)]
#[command(name = "axon", about = "Complexity-routed gateway for language model providers")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "axon.toml", env = "AXON_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "AXON_LISTEN")]
    pub listen: Option<std::net::SocketAddr>,
}
