use std::net::SocketAddr;

use serde::Deserialize;

/// Server listen and logging configuration
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen address; defaults to 0.0.0.0:3000
    pub listen_address: Option<SocketAddr>,
    /// Default tracing filter, overridable with `RUST_LOG`
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Health check endpoint
    #[serde(default)]
    pub health: HealthConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: None,
            log_filter: default_log_filter(),
            health: HealthConfig::default(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// Health check endpoint configuration
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_path(),
        }
    }
}

const fn default_enabled() -> bool {
    true
}

fn default_path() -> String {
    "/healthz".to_string()
}
