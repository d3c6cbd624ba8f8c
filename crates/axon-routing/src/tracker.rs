//! Per-provider load and performance accounting
//!
//! Tracks inflight request counts against each provider's concurrency cap
//! and a cumulative running mean of latency, success rate, and cost
//! efficiency. In-memory only; state is born at first use and lives for
//! the process lifetime.

use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;

use crate::error::RoutingError;
use crate::registry::ProviderRegistry;

/// Assumed latency for a provider with no recorded calls (ms)
pub const DEFAULT_EMA_LATENCY_MS: f64 = 500.0;

/// Assumed success rate for a provider with no recorded calls
pub const DEFAULT_EMA_SUCCESS_RATE: f64 = 0.95;

/// Assumed cost efficiency for a provider with no recorded calls
pub const DEFAULT_EMA_COST_EFFICIENCY: f64 = 0.8;

/// Observation recorded after a call reaches an adapter
#[derive(Debug, Clone, Copy)]
pub struct CallSample {
    pub latency_ms: f64,
    pub success: bool,
    pub cost_efficiency: f64,
}

/// Runtime counters for a single provider
#[derive(Debug, Clone)]
pub struct ProviderStats {
    pub inflight: u32,
    pub total_calls: u64,
    pub ema_latency_ms: f64,
    pub ema_success_rate: f64,
    pub ema_cost_efficiency: f64,
    /// Number of samples folded into the running means
    pub samples: u64,
}

impl ProviderStats {
    fn fresh() -> Self {
        Self {
            inflight: 0,
            total_calls: 0,
            ema_latency_ms: DEFAULT_EMA_LATENCY_MS,
            ema_success_rate: DEFAULT_EMA_SUCCESS_RATE,
            ema_cost_efficiency: DEFAULT_EMA_COST_EFFICIENCY,
            samples: 0,
        }
    }
}

/// Track inflight load and running performance means per provider
///
/// Each provider entry carries its own lock so admission checks on one
/// provider never contend with another. `begin` performs the limit check
/// and increment under a single lock acquisition.
pub struct LoadTracker {
    registry: Arc<ProviderRegistry>,
    stats: DashMap<String, Mutex<ProviderStats>>,
}

impl LoadTracker {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            stats: DashMap::new(),
        }
    }

    /// Admit a request to a provider
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::UnknownProvider`] for names not in the
    /// registry and [`RoutingError::OverConcurrencyLimit`] when the
    /// provider is at its cap.
    pub fn begin(&self, provider: &str) -> Result<(), RoutingError> {
        let descriptor = self
            .registry
            .get(provider)
            .ok_or_else(|| RoutingError::UnknownProvider {
                name: provider.to_string(),
            })?;

        let entry = self
            .stats
            .entry(provider.to_string())
            .or_insert_with(|| Mutex::new(ProviderStats::fresh()));
        let mut stats = entry.lock().unwrap_or_else(PoisonError::into_inner);

        if stats.inflight >= descriptor.max_concurrent {
            return Err(RoutingError::OverConcurrencyLimit {
                provider: provider.to_string(),
            });
        }

        stats.inflight += 1;
        Ok(())
    }

    /// Release an admission, folding in a sample if the call ran
    ///
    /// Must be called exactly once per successful `begin`. The running
    /// means use the cumulative form `new = (old*n + x) / (n + 1)`; they
    /// are untouched when no sample is supplied (admission refused paths
    /// never reach here).
    pub fn end(&self, provider: &str, sample: Option<CallSample>) {
        let Some(entry) = self.stats.get(provider) else {
            tracing::warn!(provider, "end() without prior begin()");
            return;
        };
        let mut stats = entry.lock().unwrap_or_else(PoisonError::into_inner);

        if stats.inflight == 0 {
            tracing::warn!(provider, "inflight underflow suppressed");
        }
        stats.inflight = stats.inflight.saturating_sub(1);

        if let Some(sample) = sample {
            let n = stats.samples as f64;
            let success = if sample.success { 1.0 } else { 0.0 };

            stats.ema_latency_ms = (stats.ema_latency_ms * n + sample.latency_ms) / (n + 1.0);
            stats.ema_success_rate = (stats.ema_success_rate * n + success) / (n + 1.0);
            stats.ema_cost_efficiency =
                (stats.ema_cost_efficiency * n + sample.cost_efficiency) / (n + 1.0);

            stats.samples += 1;
            stats.total_calls += 1;
        }
    }

    /// Current inflight count for a provider
    pub fn inflight(&self, provider: &str) -> u32 {
        self.stats.get(provider).map_or(0, |entry| {
            entry.lock().unwrap_or_else(PoisonError::into_inner).inflight
        })
    }

    /// Snapshot of a provider's runtime stats
    ///
    /// Providers never referenced before report the no-history defaults.
    pub fn snapshot(&self, provider: &str) -> ProviderStats {
        self.stats
            .get(provider)
            .map_or_else(ProviderStats::fresh, |entry| {
                entry.lock().unwrap_or_else(PoisonError::into_inner).clone()
            })
    }
}
