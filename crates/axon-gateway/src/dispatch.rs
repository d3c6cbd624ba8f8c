//! Per-request dispatch state machine
//!
//! validate → evaluate → route → admit → call, with a single fallback to
//! a backup provider when the primary call fails. Every successful
//! admission is released exactly once, and every dispatch emits exactly
//! one terminal metrics record.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axon_core::{DispatchContext, GatewayError};
use axon_metrics::{MetricsHandle, RequestRecord};
use axon_routing::{
    ComplexityReport, LoadTracker, ProviderRegistry, Router, RoutingDecision, RoutingError,
    complexity,
};

use crate::adapter::{Adapter, AdapterError, AdapterQuery, CallOptions, CallOutcome, TokenUsage};
use crate::types::{QueryRequest, QueryResponse};
use crate::validate::{NormalizedRequest, validate_and_normalize};

/// Provider recorded on metrics events emitted before routing chose one
const UNROUTED: &str = "unrouted";

/// Orchestrates every query from validation to response
pub struct Dispatcher {
    registry: Arc<ProviderRegistry>,
    tracker: Arc<LoadTracker>,
    router: Router,
    adapters: HashMap<String, Arc<dyn Adapter>>,
    metrics: MetricsHandle,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        tracker: Arc<LoadTracker>,
        router: Router,
        adapters: HashMap<String, Arc<dyn Adapter>>,
        metrics: MetricsHandle,
    ) -> Self {
        Self {
            registry,
            tracker,
            router,
            adapters,
            metrics,
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Run one request through the full state machine
    pub async fn dispatch(&self, raw: QueryRequest) -> Result<QueryResponse, GatewayError> {
        let received = Instant::now();

        let normalized = match validate_and_normalize(raw) {
            Ok(normalized) => normalized,
            Err(error) => {
                self.emit_failure(UNROUTED, UNROUTED, &error, received.elapsed(), 0.0);
                return Err(error);
            }
        };

        let mut ctx = DispatchContext::new(normalized.request_id.clone());

        let report = complexity::evaluate(&normalized.query);
        if !report.score.is_finite() {
            let error =
                GatewayError::ComplexityEvaluationFailed("score is not finite".to_string());
            self.emit_failure(ctx.request_id(), UNROUTED, &error, received.elapsed(), 0.0);
            return Err(error);
        }

        let decision = match self
            .router
            .select(report.score, &report.factors, &normalized.metadata)
        {
            Ok(decision) => decision,
            Err(routing) => {
                let error = routing_to_gateway(routing);
                self.emit_failure(
                    ctx.request_id(),
                    UNROUTED,
                    &error,
                    received.elapsed(),
                    report.score,
                );
                return Err(error);
            }
        };

        match self
            .call_with_fallback(&normalized, &report, decision, &mut ctx)
            .await
        {
            Ok((decision, outcome)) => {
                let actual_cost = outcome.cost.unwrap_or(decision.estimated_cost);
                let token_usage = outcome
                    .token_usage
                    .unwrap_or_else(|| TokenUsage::estimate(&normalized.query, &outcome.text));
                let processing_time_ms = ctx.elapsed_ms();

                self.metrics.record_request(RequestRecord {
                    request_id: ctx.request_id().to_string(),
                    provider: decision.provider.clone(),
                    success: true,
                    latency_ms: processing_time_ms as f64,
                    model_latency_ms: outcome.processing_time.as_secs_f64() * 1000.0,
                    cost: actual_cost,
                    tokens: token_usage.total,
                    complexity: report.score,
                    failure_kind: None,
                });

                tracing::info!(
                    request_id = ctx.request_id(),
                    provider = %decision.provider,
                    model = %outcome.model,
                    score = report.score,
                    cost = actual_cost,
                    latency_ms = processing_time_ms,
                    is_backup = decision.is_backup,
                    was_cost_downgraded = decision.was_cost_downgraded,
                    "dispatch completed"
                );

                Ok(QueryResponse {
                    request_id: ctx.request_id().to_string(),
                    response: outcome.text,
                    complexity_score: report.score,
                    model_used: decision.provider,
                    cost: actual_cost,
                    token_usage,
                    processing_time_ms,
                })
            }
            Err(error) => {
                let provider = ctx.provider().unwrap_or(UNROUTED).to_string();
                self.emit_failure(
                    ctx.request_id(),
                    &provider,
                    &error,
                    received.elapsed(),
                    report.score,
                );
                tracing::warn!(
                    request_id = ctx.request_id(),
                    provider = %provider,
                    kind = error.code().kind(),
                    error = %error,
                    "dispatch failed"
                );
                Err(error)
            }
        }
    }

    /// Admit and call the primary, falling back at most once
    ///
    /// Admission refusals cost nothing and may still be rescued by the
    /// backup path; a failed adapter call is recorded against the
    /// provider before the backup is tried.
    async fn call_with_fallback(
        &self,
        request: &NormalizedRequest,
        report: &ComplexityReport,
        primary: RoutingDecision,
        ctx: &mut DispatchContext,
    ) -> Result<(RoutingDecision, CallOutcome), GatewayError> {
        let query_len = request
            .metadata
            .get("queryLength")
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(0);

        let adapter = self.adapter_for(&primary.provider)?;
        let primary_admitted = match self.tracker.begin(&primary.provider) {
            Ok(()) => true,
            Err(RoutingError::OverConcurrencyLimit { .. }) => {
                tracing::debug!(
                    provider = %primary.provider,
                    "primary refused admission, trying backup"
                );
                false
            }
            Err(other) => return Err(routing_to_gateway(other)),
        };

        if primary_admitted {
            ctx.set_provider(primary.provider.clone());
            match self.invoke(&adapter, &primary, request, report).await {
                Ok(outcome) => return Ok((primary, outcome)),
                Err(error) => {
                    tracing::warn!(
                        provider = %primary.provider,
                        error = %error,
                        "primary provider failed, attempting fallback"
                    );
                }
            }
        }

        let Some(backup) =
            self.router
                .backup_for(&primary.provider, primary.model_type, report.score, query_len)
        else {
            return Err(GatewayError::ModelUnavailable(format!(
                "provider '{}' is unavailable and no backup exists",
                primary.provider
            )));
        };

        let backup_adapter = self.adapter_for(&backup.provider)?;
        self.tracker
            .begin(&backup.provider)
            .map_err(routing_to_gateway)?;
        ctx.set_provider(backup.provider.clone());

        match self.invoke(&backup_adapter, &backup, request, report).await {
            Ok(outcome) => Ok((backup, outcome)),
            Err(error) => Err(GatewayError::ModelUnavailable(format!(
                "backup provider '{}' also failed: {error}",
                backup.provider
            ))),
        }
    }

    /// Resolve the adapter registered for a provider
    ///
    /// The registry and the adapter map are built from the same config,
    /// so a miss is an internal inconsistency, not provider
    /// unavailability.
    fn adapter_for(&self, provider: &str) -> Result<Arc<dyn Adapter>, GatewayError> {
        self.adapters.get(provider).map(Arc::clone).ok_or_else(|| {
            GatewayError::Internal(anyhow::anyhow!(
                "no adapter registered for provider '{provider}'"
            ))
        })
    }

    /// Call the adapter behind a decision
    ///
    /// Pairs the caller's `begin` with exactly one `end`; the recorded
    /// sample covers exactly the adapter call.
    async fn invoke(
        &self,
        adapter: &Arc<dyn Adapter>,
        decision: &RoutingDecision,
        request: &NormalizedRequest,
        report: &ComplexityReport,
    ) -> Result<CallOutcome, AdapterError> {
        let query = AdapterQuery {
            text: request.query.clone(),
            context: Vec::new(),
            score: report.score,
        };
        let options = call_options(&request.metadata);

        let started = Instant::now();
        let result = adapter.call(adapter.model(), &query, &options).await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let cost_efficiency = match &result {
            Ok(outcome) => observed_efficiency(decision, outcome),
            Err(_) => 0.0,
        };
        self.tracker.end(
            &decision.provider,
            Some(axon_routing::CallSample {
                latency_ms,
                success: result.is_ok(),
                cost_efficiency,
            }),
        );

        result
    }

    fn emit_failure(
        &self,
        request_id: &str,
        provider: &str,
        error: &GatewayError,
        elapsed: Duration,
        complexity: f64,
    ) {
        self.metrics.record_request(RequestRecord {
            request_id: request_id.to_string(),
            provider: provider.to_string(),
            success: false,
            latency_ms: elapsed.as_secs_f64() * 1000.0,
            model_latency_ms: 0.0,
            cost: 0.0,
            tokens: 0,
            complexity,
            failure_kind: Some(error.code()),
        });
    }
}

/// Efficiency sample for a completed call
///
/// The ratio of estimated to actual cost, clamped to [0, 1]. Backends
/// that report no cost are billed at the estimate and score 1.
fn observed_efficiency(decision: &RoutingDecision, outcome: &CallOutcome) -> f64 {
    match outcome.cost {
        Some(actual) if actual > 0.0 => (decision.estimated_cost / actual).clamp(0.0, 1.0),
        _ => 1.0,
    }
}

/// Build adapter call options from recognized metadata keys
fn call_options(metadata: &HashMap<String, String>) -> CallOptions {
    CallOptions {
        max_tokens: metadata
            .get("maxTokens")
            .and_then(|raw| raw.parse().ok()),
        temperature: metadata
            .get("temperature")
            .and_then(|raw| raw.parse().ok()),
        top_p: metadata.get("topP").and_then(|raw| raw.parse().ok()),
        system_message: metadata.get("systemMessage").cloned(),
        stop_sequences: Vec::new(),
        budget: metadata.get("budget").and_then(|raw| raw.parse().ok()),
        timeout: metadata
            .get("timeout")
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(Duration::from_millis),
    }
}

/// Map routing failures onto the caller-facing error taxonomy
fn routing_to_gateway(error: RoutingError) -> GatewayError {
    match error {
        RoutingError::CostLimitExceeded { .. } => GatewayError::CostLimitExceeded(error.to_string()),
        RoutingError::UnknownFeature { .. } => {
            GatewayError::ComplexityEvaluationFailed(error.to_string())
        }
        RoutingError::NoCandidates { .. }
        | RoutingError::OverConcurrencyLimit { .. }
        | RoutingError::UnknownProvider { .. } => GatewayError::ModelUnavailable(error.to_string()),
    }
}
