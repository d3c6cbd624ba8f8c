//! Wire types for the gateway's RPC surface

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::adapter::TokenUsage;

/// Body of `POST /v1/query`
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    /// Caller-supplied id; generated when absent
    #[serde(default)]
    pub request_id: Option<String>,
    pub query: String,
    /// Routing hints; unknown keys are ignored but preserved
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

/// Successful reply to `POST /v1/query`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub request_id: String,
    pub response: String,
    pub complexity_score: f64,
    pub model_used: String,
    pub cost: f64,
    pub token_usage: TokenUsage,
    pub processing_time_ms: u64,
}

/// Body of `POST /v1/complexity`
#[derive(Debug, Clone, Deserialize)]
pub struct ComplexityRequest {
    pub query: String,
    /// Optional feature selector; empty means the default feature set
    #[serde(default)]
    pub features: Option<Vec<String>>,
}

/// Reply to `POST /v1/complexity`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexityResponse {
    pub complexity_score: f64,
    pub complexity_factors: Vec<String>,
}

/// Reply to `GET /v1/capabilities`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitiesResponse {
    /// Union of capability tags over online providers
    pub capabilities: Vec<String>,
    pub providers: Vec<ProviderCapabilities>,
}

/// One provider's advertised capabilities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    pub provider_name: String,
    pub capabilities: Vec<String>,
}
