//! Axum handlers for the gateway's RPC surface

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use axon_config::ProviderStatus;
use axon_core::{GatewayError, HttpError};
use axon_metrics::MetricsState;
use axon_routing::complexity;

use crate::dispatch::Dispatcher;
use crate::types::{
    CapabilitiesResponse, ComplexityRequest, ComplexityResponse, ProviderCapabilities,
    QueryRequest,
};
use crate::validate::validate_and_normalize;

/// Shared state for the RPC handlers
#[derive(Clone)]
pub struct GatewayState {
    inner: Arc<GatewayStateInner>,
}

struct GatewayStateInner {
    dispatcher: Dispatcher,
    metrics: Arc<MetricsState>,
}

impl GatewayState {
    pub fn new(dispatcher: Dispatcher, metrics: Arc<MetricsState>) -> Self {
        Self {
            inner: Arc::new(GatewayStateInner {
                dispatcher,
                metrics,
            }),
        }
    }
}

/// Build the router with every RPC endpoint
pub fn gateway_router(state: GatewayState) -> Router {
    Router::new()
        .route("/v1/query", routing::post(process_query))
        .route("/v1/complexity", routing::post(evaluate_complexity))
        .route("/v1/capabilities", routing::get(capabilities))
        .route("/v1/metrics", routing::get(metrics_snapshot))
        .with_state(state)
}

/// Handle `POST /v1/query`
async fn process_query(
    State(state): State<GatewayState>,
    Json(request): Json<QueryRequest>,
) -> Response {
    match state.inner.dispatcher.dispatch(request).await {
        Ok(response) => Json(response).into_response(),
        Err(error) => error_response(&error),
    }
}

/// Handle `POST /v1/complexity`
///
/// Runs the same validation as a full dispatch so empty or unsafe
/// queries are rejected before evaluation.
async fn evaluate_complexity(
    State(_state): State<GatewayState>,
    Json(request): Json<ComplexityRequest>,
) -> Response {
    let probe = QueryRequest {
        request_id: None,
        query: request.query.clone(),
        metadata: None,
    };
    if let Err(error) = validate_and_normalize(probe) {
        return error_response(&error);
    }

    let features = request.features.unwrap_or_default();
    match complexity::evaluate_with_features(&request.query, &features) {
        Ok(report) => Json(ComplexityResponse {
            complexity_score: report.score,
            complexity_factors: report
                .factors
                .iter()
                .map(|factor| factor.as_str().to_string())
                .collect(),
        })
        .into_response(),
        Err(error) => {
            error_response(&GatewayError::ComplexityEvaluationFailed(error.to_string()))
        }
    }
}

/// Handle `GET /v1/capabilities`
async fn capabilities(State(state): State<GatewayState>) -> Response {
    let online: Vec<_> = state
        .inner
        .dispatcher
        .registry()
        .list()
        .into_iter()
        .filter(|descriptor| descriptor.status == ProviderStatus::Online)
        .collect();

    let union: BTreeSet<String> = online
        .iter()
        .flat_map(|descriptor| descriptor.capabilities.iter().cloned())
        .collect();

    let providers = online
        .iter()
        .map(|descriptor| ProviderCapabilities {
            provider_name: descriptor.name.clone(),
            capabilities: descriptor.capabilities.clone(),
        })
        .collect();

    Json(CapabilitiesResponse {
        capabilities: union.into_iter().collect(),
        providers,
    })
    .into_response()
}

/// Handle `GET /v1/metrics`
async fn metrics_snapshot(State(state): State<GatewayState>) -> Response {
    Json(state.inner.metrics.snapshot()).into_response()
}

/// Convert a gateway error to its wire representation
fn error_response(error: &GatewayError) -> Response {
    let status = error.status_code();
    let body = serde_json::json!({
        "error": {
            "code": error.code().wire(),
            "kind": error.code().kind(),
            "message": error.client_message(),
        }
    });

    (status, Json(body)).into_response()
}
