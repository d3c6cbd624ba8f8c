//! Provider selection with cost control and backup lookup
//!
//! Type choice follows the complexity thresholds; within a type the
//! winner maximizes a weighted blend of spare capacity, cost efficiency,
//! and observed performance. Ties break lexicographically by name so
//! selection is deterministic.

use std::collections::HashMap;
use std::sync::Arc;

use axon_config::{ModelType, ProviderStatus, RoutingConfig};

use crate::complexity::ComplexityFactor;
use crate::error::RoutingError;
use crate::registry::{ProviderDescriptor, ProviderRegistry};
use crate::tracker::LoadTracker;

const WEIGHT_LOAD: f64 = 0.4;
const WEIGHT_COST: f64 = 0.3;
const WEIGHT_PERF: f64 = 0.3;

/// Complexity assumed when re-deciding on a downgraded type
const DOWNGRADE_SCORE: f64 = 0.5;

/// Result of a routing decision
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    /// Selected provider name
    pub provider: String,
    /// Model type the decision was made for
    pub model_type: ModelType,
    /// Estimated cost of serving the request (USD)
    pub estimated_cost: f64,
    /// Whether this decision came from backup selection
    pub is_backup: bool,
    /// Whether the budget forced a type downgrade
    pub was_cost_downgraded: bool,
}

/// Map complexity scores to concrete provider choices
pub struct Router {
    registry: Arc<ProviderRegistry>,
    tracker: Arc<LoadTracker>,
    config: RoutingConfig,
}

impl Router {
    pub fn new(registry: Arc<ProviderRegistry>, tracker: Arc<LoadTracker>, config: RoutingConfig) -> Self {
        Self {
            registry,
            tracker,
            config,
        }
    }

    /// Model type for a complexity score
    ///
    /// The local band is half-open below and the remote band closed
    /// above: `score == low` routes hybrid, `score == high` routes remote.
    pub fn model_type_for(&self, score: f64) -> ModelType {
        if score < self.config.low_threshold {
            ModelType::Local
        } else if score < self.config.high_threshold {
            ModelType::Hybrid
        } else {
            ModelType::Remote
        }
    }

    /// Pick a provider for the given complexity score and routing hints
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::NoCandidates`] when no provider of the
    /// chosen type can admit the request, and
    /// [`RoutingError::CostLimitExceeded`] when `metadata.budget` is set
    /// and the downgrade chain cannot fit it.
    pub fn select(
        &self,
        score: f64,
        factors: &[ComplexityFactor],
        metadata: &HashMap<String, String>,
    ) -> Result<RoutingDecision, RoutingError> {
        let model_type = self.model_type_for(score);
        let query_len = metadata
            .get("queryLength")
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(0);

        let candidates = self.candidates(model_type);
        if candidates.is_empty() {
            return Err(RoutingError::NoCandidates { model_type });
        }

        let chosen = self
            .preferred_candidate(metadata, &candidates)
            .unwrap_or_else(|| self.rank(candidates));
        let estimated_cost = estimate_cost(&chosen, score, query_len);

        tracing::debug!(
            provider = %chosen.name,
            %model_type,
            score,
            estimated_cost,
            ?factors,
            "provider selected"
        );

        let decision = RoutingDecision {
            provider: chosen.name.clone(),
            model_type,
            estimated_cost,
            is_backup: false,
            was_cost_downgraded: false,
        };

        match parse_budget(metadata) {
            Some(budget) if estimated_cost > budget => {
                self.downgrade_for_budget(model_type, budget, query_len)
                    .ok_or(RoutingError::CostLimitExceeded {
                        estimated: estimated_cost,
                        budget,
                    })
            }
            _ => Ok(decision),
        }
    }

    /// Best candidate of the same type excluding `primary`
    ///
    /// Falls through the `remote -> hybrid -> local` chain when the
    /// requested type has no other provider to offer.
    pub fn backup_for(
        &self,
        primary: &str,
        model_type: ModelType,
        score: f64,
        query_len: u64,
    ) -> Option<RoutingDecision> {
        let mut current = Some(model_type);

        while let Some(model_type) = current {
            let candidates: Vec<_> = self
                .candidates(model_type)
                .into_iter()
                .filter(|candidate| candidate.name != primary)
                .collect();

            if !candidates.is_empty() {
                let chosen = self.rank(candidates);
                return Some(RoutingDecision {
                    estimated_cost: estimate_cost(&chosen, score, query_len),
                    provider: chosen.name.clone(),
                    model_type,
                    is_backup: true,
                    was_cost_downgraded: false,
                });
            }

            current = model_type.downgrade();
        }

        None
    }

    /// Providers of a type that are not offline and have spare capacity
    fn candidates(&self, model_type: ModelType) -> Vec<Arc<ProviderDescriptor>> {
        self.registry
            .list_by_type(model_type)
            .into_iter()
            .filter(|descriptor| descriptor.status != ProviderStatus::Offline)
            .filter(|descriptor| self.tracker.inflight(&descriptor.name) < descriptor.max_concurrent)
            .collect()
    }

    /// Honor an advisory `preferredProvider` hint when it is viable
    fn preferred_candidate(
        &self,
        metadata: &HashMap<String, String>,
        candidates: &[Arc<ProviderDescriptor>],
    ) -> Option<Arc<ProviderDescriptor>> {
        let preferred = metadata.get("preferredProvider")?;
        candidates
            .iter()
            .find(|candidate| candidate.name == *preferred)
            .cloned()
    }

    /// Highest weighted score wins; ties break by name
    fn rank(&self, candidates: Vec<Arc<ProviderDescriptor>>) -> Arc<ProviderDescriptor> {
        debug_assert!(!candidates.is_empty());

        let mut scored: Vec<_> = candidates
            .into_iter()
            .map(|candidate| {
                let score = self.weighted_score(&candidate);
                (candidate, score)
            })
            .collect();

        scored.sort_by(|(a, score_a), (b, score_b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });

        scored.swap_remove(0).0
    }

    /// Weighted blend of spare capacity, cost efficiency, and performance
    fn weighted_score(&self, descriptor: &ProviderDescriptor) -> f64 {
        let stats = self.tracker.snapshot(&descriptor.name);

        let load = 1.0 - f64::from(stats.inflight) / f64::from(descriptor.max_concurrent);
        let cost = descriptor.cost_efficiency;
        let perf = stats.ema_success_rate * 1000.0 / (stats.ema_latency_ms + 100.0);

        WEIGHT_LOAD * load + WEIGHT_COST * cost + WEIGHT_PERF * perf
    }

    /// Walk the downgrade chain looking for a decision within budget
    ///
    /// Each step re-decides at a mid-band score on the cheaper type's
    /// least expensive candidate; the first fit wins.
    fn downgrade_for_budget(
        &self,
        from: ModelType,
        budget: f64,
        query_len: u64,
    ) -> Option<RoutingDecision> {
        let mut current = from.downgrade();

        while let Some(model_type) = current {
            let mut candidates = self.candidates(model_type);
            candidates.sort_by(|a, b| {
                let cost_a = estimate_cost(a, DOWNGRADE_SCORE, query_len);
                let cost_b = estimate_cost(b, DOWNGRADE_SCORE, query_len);
                cost_a
                    .partial_cmp(&cost_b)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.name.cmp(&b.name))
            });

            if let Some(cheapest) = candidates.first() {
                let estimated_cost = estimate_cost(cheapest, DOWNGRADE_SCORE, query_len);
                if estimated_cost <= budget {
                    tracing::info!(
                        provider = %cheapest.name,
                        %model_type,
                        estimated_cost,
                        budget,
                        "cost control downgraded model type"
                    );
                    return Some(RoutingDecision {
                        provider: cheapest.name.clone(),
                        model_type,
                        estimated_cost,
                        is_backup: false,
                        was_cost_downgraded: true,
                    });
                }
            }

            current = model_type.downgrade();
        }

        None
    }
}

/// Estimated cost of a request, clamped to the provider's ceiling
fn estimate_cost(descriptor: &ProviderDescriptor, score: f64, query_len: u64) -> f64 {
    let scaled = descriptor.base_cost * (1.0 + score) * (1.0 + query_len as f64 / 1000.0);
    scaled.min(descriptor.max_cost)
}

/// Parse `metadata.budget` as a positive finite amount
fn parse_budget(metadata: &HashMap<String, String>) -> Option<f64> {
    metadata
        .get("budget")
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .filter(|budget| budget.is_finite() && *budget > 0.0)
}

#[cfg(test)]
mod tests {
    use axon_config::ProviderStatus;

    use super::*;
    use crate::tracker::CallSample;

    fn descriptor(name: &str, types: &[ModelType], base_cost: f64) -> ProviderDescriptor {
        ProviderDescriptor {
            name: name.to_string(),
            status: ProviderStatus::Online,
            supported_types: types.to_vec(),
            capabilities: vec![],
            max_concurrent: 4,
            base_cost,
            max_cost: base_cost * 50.0,
            cost_efficiency: 0.8,
        }
    }

    fn fleet() -> Vec<ProviderDescriptor> {
        vec![
            descriptor("llama-local", &[ModelType::Local], 0.0004),
            descriptor("phi-local", &[ModelType::Local], 0.0006),
            descriptor("mixtral-hybrid", &[ModelType::Hybrid], 0.004),
            descriptor("qwen-hybrid", &[ModelType::Hybrid], 0.005),
            descriptor("gpt-remote", &[ModelType::Remote], 0.04),
            descriptor("claude-remote", &[ModelType::Remote], 0.05),
        ]
    }

    fn build(descriptors: Vec<ProviderDescriptor>) -> (Router, Arc<LoadTracker>) {
        let registry = Arc::new(ProviderRegistry::new(descriptors));
        let tracker = Arc::new(LoadTracker::new(Arc::clone(&registry)));
        let router = Router::new(registry, Arc::clone(&tracker), RoutingConfig::default());
        (router, tracker)
    }

    fn meta(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn score_bands_honor_threshold_boundaries() {
        let (router, _) = build(fleet());

        assert_eq!(router.model_type_for(0.0), ModelType::Local);
        assert_eq!(router.model_type_for(0.29), ModelType::Local);
        // Exactly at the low threshold leaves the local band.
        assert_eq!(router.model_type_for(0.3), ModelType::Hybrid);
        assert_eq!(router.model_type_for(0.69), ModelType::Hybrid);
        // Exactly at the high threshold enters the remote band.
        assert_eq!(router.model_type_for(0.7), ModelType::Remote);
        assert_eq!(router.model_type_for(1.0), ModelType::Remote);
    }

    #[test]
    fn empty_candidate_set_fails() {
        let (router, _) = build(vec![descriptor("only-local", &[ModelType::Local], 0.001)]);
        let err = router.select(0.9, &[], &meta(&[])).unwrap_err();
        assert!(matches!(
            err,
            RoutingError::NoCandidates {
                model_type: ModelType::Remote
            }
        ));
    }

    #[test]
    fn offline_providers_are_excluded() {
        let mut offline = descriptor("llama-local", &[ModelType::Local], 0.0004);
        offline.status = ProviderStatus::Offline;
        let (router, _) = build(vec![offline, descriptor("phi-local", &[ModelType::Local], 0.0006)]);

        let decision = router.select(0.1, &[], &meta(&[])).unwrap();
        assert_eq!(decision.provider, "phi-local");
    }

    #[test]
    fn saturated_providers_are_excluded() {
        let (router, tracker) = build(fleet());
        for _ in 0..4 {
            tracker.begin("llama-local").unwrap();
        }

        let decision = router.select(0.1, &[], &meta(&[])).unwrap();
        assert_eq!(decision.provider, "phi-local");
    }

    #[test]
    fn identical_candidates_tie_break_lexicographically() {
        let (router, _) = build(vec![
            descriptor("zulu", &[ModelType::Local], 0.001),
            descriptor("alpha", &[ModelType::Local], 0.001),
        ]);

        let decision = router.select(0.1, &[], &meta(&[])).unwrap();
        assert_eq!(decision.provider, "alpha");
    }

    #[test]
    fn loaded_provider_loses_to_idle_peer() {
        let (router, tracker) = build(fleet());
        for _ in 0..3 {
            tracker.begin("llama-local").unwrap();
        }

        let decision = router.select(0.1, &[], &meta(&[])).unwrap();
        assert_eq!(decision.provider, "phi-local");
    }

    #[test]
    fn poor_performance_history_demotes() {
        let (router, tracker) = build(fleet());
        // llama-local would win the tie-break; give it a bad record.
        for _ in 0..20 {
            tracker.begin("llama-local").unwrap();
            tracker.end(
                "llama-local",
                Some(CallSample {
                    latency_ms: 4000.0,
                    success: false,
                    cost_efficiency: 0.2,
                }),
            );
        }

        let decision = router.select(0.1, &[], &meta(&[])).unwrap();
        assert_eq!(decision.provider, "phi-local");
    }

    #[test]
    fn cost_estimate_scales_and_clamps() {
        let d = descriptor("p", &[ModelType::Remote], 0.04);

        // base * (1 + score) * (1 + len/1000)
        let est = estimate_cost(&d, 0.5, 500);
        assert!((est - 0.04 * 1.5 * 1.5).abs() < 1e-12);

        // Clamped to max_cost for absurd lengths.
        let est = estimate_cost(&d, 1.0, 1_000_000);
        assert!((est - d.max_cost).abs() < 1e-12);
    }

    #[test]
    fn generous_budget_never_downgrades() {
        let (router, _) = build(fleet());
        let decision = router
            .select(0.9, &[], &meta(&[("budget", "100.0")]))
            .unwrap();
        assert_eq!(decision.model_type, ModelType::Remote);
        assert!(!decision.was_cost_downgraded);
    }

    #[test]
    fn tight_budget_walks_the_chain_to_local() {
        let (router, _) = build(fleet());
        // Remote at score 0.9 costs ~0.076; hybrid at 0.5 costs ~0.006;
        // only local fits a 0.002 budget.
        let decision = router
            .select(0.9, &[], &meta(&[("budget", "0.002")]))
            .unwrap();
        assert_eq!(decision.model_type, ModelType::Local);
        assert!(decision.was_cost_downgraded);
        assert_eq!(decision.provider, "llama-local");
        assert!(decision.estimated_cost <= 0.002);
    }

    #[test]
    fn budget_midway_stops_at_hybrid() {
        let (router, _) = build(fleet());
        let decision = router
            .select(0.9, &[], &meta(&[("budget", "0.01")]))
            .unwrap();
        assert_eq!(decision.model_type, ModelType::Hybrid);
        assert!(decision.was_cost_downgraded);
    }

    #[test]
    fn exhausted_chain_exceeds_cost_limit() {
        let (router, _) = build(fleet());
        let err = router
            .select(0.9, &[], &meta(&[("budget", "0.0001")]))
            .unwrap_err();
        assert!(matches!(err, RoutingError::CostLimitExceeded { .. }));
    }

    #[test]
    fn unparsable_budget_is_ignored() {
        let (router, _) = build(fleet());
        let decision = router
            .select(0.9, &[], &meta(&[("budget", "lots")]))
            .unwrap();
        assert_eq!(decision.model_type, ModelType::Remote);
        assert!(!decision.was_cost_downgraded);
    }

    #[test]
    fn preferred_provider_wins_when_viable() {
        let (router, _) = build(fleet());
        let decision = router
            .select(0.1, &[], &meta(&[("preferredProvider", "phi-local")]))
            .unwrap();
        assert_eq!(decision.provider, "phi-local");
    }

    #[test]
    fn preferred_provider_of_wrong_type_is_ignored() {
        let (router, _) = build(fleet());
        let decision = router
            .select(0.1, &[], &meta(&[("preferredProvider", "gpt-remote")]))
            .unwrap();
        assert_ne!(decision.provider, "gpt-remote");
    }

    #[test]
    fn backup_excludes_the_primary() {
        let (router, _) = build(fleet());
        let backup = router
            .backup_for("gpt-remote", ModelType::Remote, 0.9, 0)
            .unwrap();
        assert_eq!(backup.provider, "claude-remote");
        assert!(backup.is_backup);
    }

    #[test]
    fn backup_recurses_down_the_chain() {
        let (router, _) = build(vec![
            descriptor("gpt-remote", &[ModelType::Remote], 0.04),
            descriptor("mixtral-hybrid", &[ModelType::Hybrid], 0.004),
        ]);

        let backup = router
            .backup_for("gpt-remote", ModelType::Remote, 0.9, 0)
            .unwrap();
        assert_eq!(backup.provider, "mixtral-hybrid");
        assert_eq!(backup.model_type, ModelType::Hybrid);
    }

    #[test]
    fn backup_exhausts_to_none() {
        let (router, _) = build(vec![descriptor("gpt-remote", &[ModelType::Remote], 0.04)]);
        assert!(router
            .backup_for("gpt-remote", ModelType::Remote, 0.9, 0)
            .is_none());
    }
}
