//! Request validation and normalization
//!
//! Every query passes through here before any provider work happens.
//! Normalization assigns a request id when absent and injects the
//! derived metadata fields downstream components read.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use axon_core::GatewayError;

use crate::types::QueryRequest;

/// Inclusive bounds on query length in code points
const MIN_QUERY_CODE_POINTS: usize = 1;
const MAX_QUERY_CODE_POINTS: usize = 10_000;

/// Shell-injection style tokens rejected outright (matched
/// case-insensitively as substrings)
const UNSAFE_TOKENS: &[&str] = &[
    "exec(",
    "eval(",
    "system(",
    "popen(",
    "subprocess.",
    "rm -rf",
    "$(",
    "`",
];

/// A request that passed validation
#[derive(Debug, Clone)]
pub struct NormalizedRequest {
    pub request_id: String,
    pub query: String,
    /// Caller metadata plus the derived `timestamp`, `queryLength`, and
    /// `wordCount` fields
    pub metadata: HashMap<String, String>,
}

/// Validate a raw request and produce its normalized form
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] when the query is empty,
/// over the length bound, or matches an unsafe pattern.
pub fn validate_and_normalize(raw: QueryRequest) -> Result<NormalizedRequest, GatewayError> {
    let query_len = raw.query.chars().count();

    if query_len < MIN_QUERY_CODE_POINTS {
        return Err(GatewayError::InvalidRequest(
            "query must not be empty".to_string(),
        ));
    }
    if query_len > MAX_QUERY_CODE_POINTS {
        return Err(GatewayError::InvalidRequest(format!(
            "query length {query_len} exceeds the limit of {MAX_QUERY_CODE_POINTS} code points"
        )));
    }

    let lowered = raw.query.to_lowercase();
    if let Some(token) = UNSAFE_TOKENS
        .iter()
        .copied()
        .find(|token| lowered.contains(token))
    {
        tracing::warn!(pattern = token, "rejecting query with unsafe content");
        return Err(GatewayError::InvalidRequest(
            "query contains potentially unsafe content".to_string(),
        ));
    }

    let request_id = match raw.request_id {
        Some(id) if !id.is_empty() => id,
        _ => fresh_request_id(),
    };

    let mut metadata = raw.metadata.unwrap_or_default();
    metadata.insert("timestamp".to_string(), now_millis().to_string());
    metadata.insert("queryLength".to_string(), query_len.to_string());
    metadata.insert(
        "wordCount".to_string(),
        raw.query.split_whitespace().count().to_string(),
    );

    Ok(NormalizedRequest {
        request_id,
        query: raw.query,
        metadata,
    })
}

/// Generate a process-unique request id
fn fresh_request_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("req_{:x}{count:04x}", now_millis())
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
