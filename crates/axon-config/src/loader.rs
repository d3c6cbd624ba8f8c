use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        let expanded = crate::env::expand_env(&raw)
            .map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self =
            toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if no providers are configured, the routing
    /// thresholds are out of order, or any provider descriptor is invalid
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.providers.is_empty() {
            anyhow::bail!("at least one provider must be configured");
        }

        let (lo, hi) = (self.routing.low_threshold, self.routing.high_threshold);
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
            anyhow::bail!("routing thresholds must satisfy 0 <= low <= high <= 1, got ({lo}, {hi})");
        }

        for (name, provider) in &self.providers {
            if provider.types.is_empty() {
                anyhow::bail!("provider '{name}' must declare at least one model type");
            }
            if provider.max_concurrent == 0 {
                anyhow::bail!("provider '{name}' must allow at least one concurrent request");
            }
            if !(0.0..=1.0).contains(&provider.cost_efficiency) {
                anyhow::bail!("provider '{name}' cost_efficiency must be within [0, 1]");
            }
            if provider.base_cost < 0.0 || provider.base_cost > provider.max_cost {
                anyhow::bail!("provider '{name}' requires 0 <= base_cost <= max_cost");
            }
        }

        Ok(())
    }
}
