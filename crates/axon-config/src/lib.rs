#![allow(clippy::must_use_candidate)]

pub mod alerts;
mod env;
mod loader;
pub mod providers;
pub mod routing;
pub mod server;

use indexmap::IndexMap;
use serde::Deserialize;

pub use alerts::*;
pub use providers::*;
pub use routing::*;
pub use server::*;

/// Top-level Axon configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Provider descriptors keyed by name
    #[serde(default)]
    pub providers: IndexMap<String, ProviderConfig>,
    /// Routing thresholds
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Alert thresholds for the metrics loop
    #[serde(default)]
    pub alerts: AlertThresholds,
}
