use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

/// Coarse class of backend a provider can serve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    /// Cheap, on-box
    Local,
    /// Mid-tier
    Hybrid,
    /// Expensive, highest quality
    Remote,
}

impl ModelType {
    /// Next cheaper type in the downgrade chain, if any
    pub const fn downgrade(self) -> Option<Self> {
        match self {
            Self::Remote => Some(Self::Hybrid),
            Self::Hybrid => Some(Self::Local),
            Self::Local => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Hybrid => "hybrid",
            Self::Remote => "remote",
        }
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Availability status of a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    #[default]
    Online,
    Degraded,
    Offline,
}

/// Wire protocol spoken by a provider's adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    /// llama.cpp-style local completion server
    Local,
    /// OpenAI-compatible chat completions API
    Openai,
    /// Anthropic Messages API
    Anthropic,
    /// Deterministic echo backend for smoke testing
    Echo,
}

/// Retry policy for an adapter's transient-fault handling
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts including the first (default 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Initial backoff in milliseconds (default 1000)
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Multiplier applied to the backoff after each attempt (default 2.0)
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    1000
}

const fn default_backoff_factor() -> f64 {
    2.0
}

/// Configuration for a single provider
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Adapter protocol for this provider
    #[serde(rename = "type")]
    pub adapter: AdapterKind,
    /// Initial availability status
    #[serde(default)]
    pub status: ProviderStatus,
    /// Model types this provider can serve
    pub types: Vec<ModelType>,
    /// Capability tags advertised to callers
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Concurrency cap; admissions beyond this are refused
    pub max_concurrent: u32,
    /// Base cost per request (USD) before complexity/length scaling
    pub base_cost: f64,
    /// Ceiling on any single estimated cost (USD)
    pub max_cost: f64,
    /// Static cost-efficiency rating in [0, 1]
    pub cost_efficiency: f64,
    /// Endpoint for HTTP-backed adapters
    #[serde(default)]
    pub endpoint: Option<Url>,
    /// API key for authenticated adapters
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Model identifier sent to the backend
    #[serde(default)]
    pub model: Option<String>,
    /// Per-call deadline in milliseconds; adapter defaults apply if unset
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Transient-fault retry policy
    #[serde(default)]
    pub retry: RetryConfig,
}
