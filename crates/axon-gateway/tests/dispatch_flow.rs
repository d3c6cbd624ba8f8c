//! End-to-end dispatch flow against scripted adapters

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axon_config::{AlertThresholds, ModelType, ProviderStatus, RoutingConfig};
use axon_core::{ErrorCode, GatewayError};
use axon_gateway::adapter::{
    Adapter, AdapterError, AdapterQuery, CallOptions, CallOutcome, TokenUsage,
};
use axon_gateway::dispatch::Dispatcher;
use axon_gateway::types::QueryRequest;
use axon_metrics::{MetricsHandle, MetricsState};
use axon_routing::{LoadTracker, ProviderDescriptor, ProviderRegistry, Router};

/// Adapter whose behavior is scripted per test
struct ScriptedAdapter {
    name: String,
    reply: Option<String>,
    calls: Arc<AtomicU32>,
}

impl ScriptedAdapter {
    fn succeeding(name: &str, reply: &str, calls: &Arc<AtomicU32>) -> Arc<dyn Adapter> {
        Arc::new(Self {
            name: name.to_string(),
            reply: Some(reply.to_string()),
            calls: Arc::clone(calls),
        })
    }

    fn failing(name: &str, calls: &Arc<AtomicU32>) -> Arc<dyn Adapter> {
        Arc::new(Self {
            name: name.to_string(),
            reply: None,
            calls: Arc::clone(calls),
        })
    }
}

#[async_trait]
impl Adapter for ScriptedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn call(
        &self,
        _model: &str,
        query: &AdapterQuery,
        _options: &CallOptions,
    ) -> Result<CallOutcome, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Some(reply) => Ok(CallOutcome {
                text: reply.clone(),
                token_usage: Some(TokenUsage::estimate(&query.text, reply)),
                cost: None,
                model: "scripted-model".to_string(),
                processing_time: Duration::from_millis(5),
            }),
            None => Err(AdapterError::Upstream("scripted failure".to_string())),
        }
    }
}

fn descriptor(name: &str, model_type: ModelType, base_cost: f64, cap: u32) -> ProviderDescriptor {
    ProviderDescriptor {
        name: name.to_string(),
        status: ProviderStatus::Online,
        supported_types: vec![model_type],
        capabilities: vec!["text_generation".to_string()],
        max_concurrent: cap,
        base_cost,
        max_cost: base_cost * 100.0,
        cost_efficiency: 0.8,
    }
}

fn standard_fleet() -> Vec<ProviderDescriptor> {
    vec![
        descriptor("local-a", ModelType::Local, 0.0004, 4),
        descriptor("local-b", ModelType::Local, 0.0006, 4),
        descriptor("hybrid-a", ModelType::Hybrid, 0.004, 4),
        descriptor("hybrid-b", ModelType::Hybrid, 0.005, 4),
        descriptor("remote-a", ModelType::Remote, 0.04, 4),
        descriptor("remote-b", ModelType::Remote, 0.05, 4),
    ]
}

struct Harness {
    dispatcher: Dispatcher,
    tracker: Arc<LoadTracker>,
    metrics: Arc<MetricsState>,
    registry: Arc<ProviderRegistry>,
}

fn harness(
    descriptors: Vec<ProviderDescriptor>,
    adapters: HashMap<String, Arc<dyn Adapter>>,
) -> Harness {
    let registry = Arc::new(ProviderRegistry::new(descriptors));
    let tracker = Arc::new(LoadTracker::new(Arc::clone(&registry)));
    let router = Router::new(
        Arc::clone(&registry),
        Arc::clone(&tracker),
        RoutingConfig::default(),
    );
    let metrics = Arc::new(MetricsState::new(AlertThresholds::default()));

    let dispatcher = Dispatcher::new(
        Arc::clone(&registry),
        Arc::clone(&tracker),
        router,
        adapters,
        MetricsHandle::inline(Arc::clone(&metrics)),
    );

    Harness {
        dispatcher,
        tracker,
        metrics,
        registry,
    }
}

/// Every provider in the fleet answers successfully
fn all_succeeding(
    descriptors: &[ProviderDescriptor],
    calls: &Arc<AtomicU32>,
) -> HashMap<String, Arc<dyn Adapter>> {
    descriptors
        .iter()
        .map(|d| {
            let reply = format!("response from {}", d.name);
            (
                d.name.clone(),
                ScriptedAdapter::succeeding(&d.name, &reply, calls),
            )
        })
        .collect()
}

fn request(query: &str, metadata: &[(&str, &str)]) -> QueryRequest {
    QueryRequest {
        request_id: None,
        query: query.to_string(),
        metadata: Some(
            metadata
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        ),
    }
}

/// A single long sentence of long words, scoring deep into the remote band
fn high_complexity_query() -> String {
    "comprehensively analyze the multidimensional ramifications of artificial intelligence \
     deployments across contemporary healthcare infrastructure considering diagnostics \
     therapeutics administration logistics governance accountability interoperability "
        .split_whitespace()
        .cycle()
        .take(120)
        .collect::<Vec<_>>()
        .join(" ")
}

fn total_records(metrics: &MetricsState) -> u64 {
    metrics.snapshot().providers.iter().map(|p| p.count).sum()
}

#[tokio::test]
async fn low_complexity_routes_local() {
    let calls = Arc::new(AtomicU32::new(0));
    let fleet = standard_fleet();
    let h = harness(fleet.clone(), all_succeeding(&fleet, &calls));

    let response = h
        .dispatcher
        .dispatch(request("今天天气怎么样？", &[]))
        .await
        .unwrap();

    assert!(response.complexity_score < 0.3);
    assert!(["local-a", "local-b"].contains(&response.model_used.as_str()));
    assert!(response.cost > 0.0);
    assert!(!response.response.is_empty());
}

#[tokio::test]
async fn mid_complexity_routes_hybrid() {
    let calls = Arc::new(AtomicU32::new(0));
    let fleet = standard_fleet();
    let h = harness(fleet.clone(), all_succeeding(&fleet, &calls));

    let response = h
        .dispatcher
        .dispatch(request("解释一下量子力学的基本原理", &[]))
        .await
        .unwrap();

    assert!(response.complexity_score >= 0.3 && response.complexity_score < 0.7);
    assert!(["hybrid-a", "hybrid-b"].contains(&response.model_used.as_str()));
}

#[tokio::test]
async fn high_complexity_routes_remote() {
    let calls = Arc::new(AtomicU32::new(0));
    let fleet = standard_fleet();
    let h = harness(fleet.clone(), all_succeeding(&fleet, &calls));

    let response = h
        .dispatcher
        .dispatch(request(&high_complexity_query(), &[]))
        .await
        .unwrap();

    assert!(response.complexity_score >= 0.7);
    assert!(["remote-a", "remote-b"].contains(&response.model_used.as_str()));
}

#[tokio::test]
async fn chosen_provider_matches_model_used_and_books_cleanly() {
    let calls = Arc::new(AtomicU32::new(0));
    let fleet = standard_fleet();
    let h = harness(fleet.clone(), all_succeeding(&fleet, &calls));

    let response = h.dispatcher.dispatch(request("hello there", &[])).await.unwrap();

    // One adapter call, one metrics record, no dangling admissions.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(total_records(&h.metrics), 1);
    for d in &fleet {
        assert_eq!(h.tracker.inflight(&d.name), 0);
    }
    // The tracker saw exactly the provider named in the response.
    assert_eq!(h.tracker.snapshot(&response.model_used).total_calls, 1);
}

#[tokio::test]
async fn primary_failure_falls_back_to_backup() {
    let calls = Arc::new(AtomicU32::new(0));
    let fleet = vec![
        descriptor("remote-a", ModelType::Remote, 0.04, 4),
        descriptor("remote-b", ModelType::Remote, 0.05, 4),
    ];
    // remote-a wins selection (tie-break and cheaper); script it to fail.
    let adapters: HashMap<String, Arc<dyn Adapter>> = [
        ("remote-a".to_string(), ScriptedAdapter::failing("remote-a", &calls)),
        (
            "remote-b".to_string(),
            ScriptedAdapter::succeeding("remote-b", "Backup model response from remote-b", &calls),
        ),
    ]
    .into_iter()
    .collect();
    let h = harness(fleet, adapters);

    let response = h
        .dispatcher
        .dispatch(request(&high_complexity_query(), &[]))
        .await
        .unwrap();

    assert!(response.response.contains("Backup model"));
    assert_eq!(response.model_used, "remote-b");
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // Both begins were ended; the failure was sampled against remote-a.
    assert_eq!(h.tracker.inflight("remote-a"), 0);
    assert_eq!(h.tracker.inflight("remote-b"), 0);
    assert_eq!(h.tracker.snapshot("remote-a").total_calls, 1);
    assert!(h.tracker.snapshot("remote-a").ema_success_rate < 0.5);
}

#[tokio::test]
async fn all_providers_failing_surfaces_unavailable() {
    let calls = Arc::new(AtomicU32::new(0));
    let fleet = vec![
        descriptor("remote-a", ModelType::Remote, 0.04, 4),
        descriptor("remote-b", ModelType::Remote, 0.05, 4),
    ];
    let adapters: HashMap<String, Arc<dyn Adapter>> = fleet
        .iter()
        .map(|d| (d.name.clone(), ScriptedAdapter::failing(&d.name, &calls)))
        .collect();
    let h = harness(fleet, adapters);

    let error = h
        .dispatcher
        .dispatch(request(&high_complexity_query(), &[]))
        .await
        .unwrap_err();

    assert!(matches!(error, GatewayError::ModelUnavailable(_)));
    // One fallback at most: two calls, then surface.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.tracker.inflight("remote-a"), 0);
    assert_eq!(h.tracker.inflight("remote-b"), 0);

    // The failure was recorded exactly once, with its kind.
    let snapshot = h.metrics.snapshot();
    assert_eq!(total_records(&h.metrics), 1);
    assert!(snapshot.providers.iter().any(|p| p.error_count == 1));
}

#[tokio::test]
async fn impossible_budget_exceeds_cost_limit() {
    let calls = Arc::new(AtomicU32::new(0));
    // Even the local tier is too expensive for the budget.
    let fleet = vec![
        descriptor("local-a", ModelType::Local, 0.01, 4),
        descriptor("remote-a", ModelType::Remote, 0.04, 4),
    ];
    let h = harness(fleet.clone(), all_succeeding(&fleet, &calls));

    let error = h
        .dispatcher
        .dispatch(request(&high_complexity_query(), &[("budget", "0.001")]))
        .await
        .unwrap_err();

    assert!(matches!(error, GatewayError::CostLimitExceeded(_)));
    assert_eq!(error.code(), ErrorCode::CostLimitExceeded);
    // No adapter was ever consulted.
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unsafe_query_is_rejected_before_any_call() {
    let calls = Arc::new(AtomicU32::new(0));
    let fleet = standard_fleet();
    let h = harness(fleet.clone(), all_succeeding(&fleet, &calls));

    let error = h
        .dispatcher
        .dispatch(request("exec(\"rm -rf /\")", &[]))
        .await
        .unwrap_err();

    assert_eq!(error.code(), ErrorCode::InvalidRequest);
    assert!(error.to_string().contains("unsafe"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    // The rejection still produced its metrics record.
    assert_eq!(total_records(&h.metrics), 1);
}

#[tokio::test]
async fn budget_downgrade_lands_on_cheaper_tier() {
    let calls = Arc::new(AtomicU32::new(0));
    let fleet = standard_fleet();
    let h = harness(fleet.clone(), all_succeeding(&fleet, &calls));

    let response = h
        .dispatcher
        .dispatch(request(&high_complexity_query(), &[("budget", "0.002")]))
        .await
        .unwrap();

    assert!(["local-a", "local-b"].contains(&response.model_used.as_str()));
    assert!(response.cost <= 0.002);
}

#[tokio::test]
async fn saturated_provider_is_routed_around() {
    let calls = Arc::new(AtomicU32::new(0));
    let fleet = vec![
        descriptor("remote-a", ModelType::Remote, 0.04, 1),
        descriptor("remote-b", ModelType::Remote, 0.05, 4),
    ];
    let h = harness(fleet.clone(), all_succeeding(&fleet, &calls));

    // Fill remote-a's only slot; the router must not offer it.
    h.tracker.begin("remote-a").unwrap();

    let response = h
        .dispatcher
        .dispatch(request(&high_complexity_query(), &[]))
        .await
        .unwrap();

    assert_eq!(response.model_used, "remote-b");
    // A provider that served nothing never updates its running means.
    assert_eq!(h.tracker.snapshot("remote-a").samples, 0);
    assert_eq!(h.tracker.inflight("remote-a"), 1);
    assert_eq!(h.tracker.inflight("remote-b"), 0);
}

#[tokio::test]
async fn offline_fleet_is_unavailable() {
    let calls = Arc::new(AtomicU32::new(0));
    let mut fleet = vec![descriptor("remote-a", ModelType::Remote, 0.04, 4)];
    fleet[0].status = ProviderStatus::Offline;
    let h = harness(fleet.clone(), all_succeeding(&fleet, &calls));

    let error = h
        .dispatcher
        .dispatch(request(&high_complexity_query(), &[]))
        .await
        .unwrap_err();

    assert_eq!(error.code(), ErrorCode::ModelUnavailable);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_adapter_is_an_internal_error() {
    // A provider present in the registry but absent from the adapter
    // map is a wiring inconsistency, not provider unavailability.
    let fleet = vec![descriptor("local-a", ModelType::Local, 0.0004, 4)];
    let h = harness(fleet.clone(), HashMap::new());

    let error = h.dispatcher.dispatch(request("hi there", &[])).await.unwrap_err();

    assert_eq!(error.code(), ErrorCode::Internal);
    // The caller never sees the wiring detail.
    assert_eq!(
        axon_core::HttpError::client_message(&error),
        "an internal error occurred"
    );
    // Resolution failed before admission, so nothing leaks.
    assert_eq!(h.tracker.inflight("local-a"), 0);
    assert_eq!(h.tracker.snapshot("local-a").samples, 0);
    assert_eq!(total_records(&h.metrics), 1);
}

#[tokio::test]
async fn preferred_provider_hint_is_honored() {
    let calls = Arc::new(AtomicU32::new(0));
    let fleet = standard_fleet();
    let h = harness(fleet.clone(), all_succeeding(&fleet, &calls));

    let response = h
        .dispatcher
        .dispatch(request("hello there", &[("preferredProvider", "local-b")]))
        .await
        .unwrap();

    assert_eq!(response.model_used, "local-b");
}

#[tokio::test]
async fn degraded_provider_still_serves() {
    let calls = Arc::new(AtomicU32::new(0));
    let mut fleet = vec![descriptor("local-a", ModelType::Local, 0.0004, 4)];
    fleet[0].status = ProviderStatus::Degraded;
    let h = harness(fleet.clone(), all_succeeding(&fleet, &calls));

    let response = h.dispatcher.dispatch(request("hi there", &[])).await.unwrap();
    assert_eq!(response.model_used, "local-a");
}

#[tokio::test]
async fn status_flip_via_registry_replacement_takes_effect() {
    let calls = Arc::new(AtomicU32::new(0));
    let fleet = vec![
        descriptor("local-a", ModelType::Local, 0.0004, 4),
        descriptor("local-b", ModelType::Local, 0.0006, 4),
    ];
    let h = harness(fleet.clone(), all_succeeding(&fleet, &calls));

    let mut downed = fleet[0].clone();
    downed.status = ProviderStatus::Offline;
    h.registry.replace(downed);

    let response = h.dispatcher.dispatch(request("hi there", &[])).await.unwrap();
    assert_eq!(response.model_used, "local-b");
}

#[tokio::test]
async fn concurrent_dispatches_keep_invariants() {
    let calls = Arc::new(AtomicU32::new(0));
    let fleet = standard_fleet();
    let h = Arc::new(harness(fleet.clone(), all_succeeding(&fleet, &calls)));

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let h = Arc::clone(&h);
            tokio::spawn(async move {
                h.dispatcher
                    .dispatch(request(&format!("hello number {i}"), &[]))
                    .await
            })
        })
        .collect();

    let mut ok = 0;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            ok += 1;
        }
    }

    assert_eq!(ok, 32);
    assert_eq!(total_records(&h.metrics), 32);
    for d in &fleet {
        assert_eq!(h.tracker.inflight(&d.name), 0);
    }
}
