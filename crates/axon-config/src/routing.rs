use serde::Deserialize;

/// Complexity thresholds driving model-type selection
///
/// Scores below `low_threshold` route to local providers, scores in
/// `[low_threshold, high_threshold)` to hybrid, and the rest to remote.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    #[serde(default = "default_low_threshold")]
    pub low_threshold: f64,
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            low_threshold: default_low_threshold(),
            high_threshold: default_high_threshold(),
        }
    }
}

const fn default_low_threshold() -> f64 {
    0.3
}

const fn default_high_threshold() -> f64 {
    0.7
}
