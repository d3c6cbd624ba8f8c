use serde::Deserialize;

/// Thresholds for the metrics loop's alert rules
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertThresholds {
    /// Error fraction above which an `error_rate` alert fires
    #[serde(default = "default_error_rate")]
    pub error_rate: f64,
    /// Average latency (ms) above which a `latency` alert fires
    #[serde(default = "default_avg_latency_ms")]
    pub avg_latency_ms: f64,
    /// Process RSS / system memory fraction above which a `memory` alert fires
    #[serde(default = "default_memory_fraction")]
    pub memory_fraction: f64,
    /// CPU fraction above which a `cpu` alert fires
    #[serde(default = "default_cpu_fraction")]
    pub cpu_fraction: f64,
    /// Spend (USD) over the trailing 24 h above which a `cost_daily` alert fires
    #[serde(default = "default_cost_daily")]
    pub cost_daily: f64,
    /// Spend (USD) over the trailing 30 d above which a `cost_monthly` alert fires
    #[serde(default = "default_cost_monthly")]
    pub cost_monthly: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            error_rate: default_error_rate(),
            avg_latency_ms: default_avg_latency_ms(),
            memory_fraction: default_memory_fraction(),
            cpu_fraction: default_cpu_fraction(),
            cost_daily: default_cost_daily(),
            cost_monthly: default_cost_monthly(),
        }
    }
}

const fn default_error_rate() -> f64 {
    0.1
}

const fn default_avg_latency_ms() -> f64 {
    2000.0
}

const fn default_memory_fraction() -> f64 {
    0.9
}

const fn default_cpu_fraction() -> f64 {
    0.8
}

const fn default_cost_daily() -> f64 {
    1000.0
}

const fn default_cost_monthly() -> f64 {
    20_000.0
}
