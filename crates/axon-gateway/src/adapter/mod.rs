//! Adapter capability and implementations for provider backends
//!
//! Every backend implements the single `call` contract; shared behavior
//! (transient-fault retry, HTTP status classification) lives in free
//! functions reused by each implementation.

pub mod anthropic;
pub mod echo;
pub mod local;
pub mod openai;
mod retry;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axon_config::{AdapterKind, ProviderConfig};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use retry::{RetryPolicy, with_retry};

/// One turn of prior conversation forwarded to chat-style backends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// Query payload handed to an adapter
#[derive(Debug, Clone)]
pub struct AdapterQuery {
    pub text: String,
    pub context: Vec<ChatTurn>,
    /// Complexity score the router decided on
    pub score: f64,
}

/// Recognized per-call options
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub system_message: Option<String>,
    pub stop_sequences: Vec<String>,
    pub budget: Option<f64>,
    /// Per-call deadline override
    pub timeout: Option<Duration>,
}

/// Token counts reported by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

impl TokenUsage {
    /// Rough usage estimate for backends that report none
    ///
    /// Four code points per token on each side.
    pub fn estimate(input: &str, output: &str) -> Self {
        let input = (input.chars().count() as u64).div_ceil(4);
        let output = (output.chars().count() as u64).div_ceil(4);
        Self {
            input,
            output,
            total: input + output,
        }
    }
}

/// Successful adapter call result
#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub text: String,
    /// Token usage when the backend reports it
    pub token_usage: Option<TokenUsage>,
    /// Actual cost when the backend reports it (USD)
    pub cost: Option<f64>,
    /// Model that actually served the call
    pub model: String,
    pub processing_time: Duration,
}

/// Failure surfaced by an adapter after its own retry budget is spent
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("upstream provider error: {0}")]
    Upstream(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("rate limited by provider")]
    RateLimited,

    #[error("authentication rejected by provider")]
    Auth,

    #[error("provider quota exhausted")]
    QuotaExhausted,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl AdapterError {
    /// Whether retrying the same provider may succeed
    ///
    /// Authentication and quota failures never are.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Upstream(_) | Self::Timeout(_) | Self::RateLimited | Self::Transport(_)
        )
    }
}

/// Capability implemented by every provider backend
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Provider name this adapter serves
    fn name(&self) -> &str;

    /// Configured model identifier
    fn model(&self) -> &str;

    /// Execute one query against the backend
    ///
    /// Implementations retry transient transport failures internally and
    /// surface a typed failure only once their retry budget is spent.
    async fn call(
        &self,
        model: &str,
        query: &AdapterQuery,
        options: &CallOptions,
    ) -> Result<CallOutcome, AdapterError>;
}

/// Construct the adapter for a provider from its configuration
///
/// # Errors
///
/// Returns an error when the adapter kind requires configuration the
/// provider does not carry (currently none do; defaults cover gaps).
pub fn build_adapter(name: &str, config: &ProviderConfig) -> anyhow::Result<Arc<dyn Adapter>> {
    let adapter: Arc<dyn Adapter> = match config.adapter {
        AdapterKind::Local => Arc::new(local::LocalAdapter::new(name, config)),
        AdapterKind::Openai => Arc::new(openai::OpenAiAdapter::new(name, config)),
        AdapterKind::Anthropic => Arc::new(anthropic::AnthropicAdapter::new(name, config)),
        AdapterKind::Echo => Arc::new(echo::EchoAdapter::new(name, config)),
    };
    Ok(adapter)
}

/// Map an HTTP error status to an adapter failure
pub(crate) fn classify_status(status: StatusCode, body: &str) -> AdapterError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        AdapterError::Auth
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        // Rate limits back off and retry; exhausted quotas do not.
        if body.contains("quota") {
            AdapterError::QuotaExhausted
        } else {
            AdapterError::RateLimited
        }
    } else if status.is_server_error() {
        AdapterError::Upstream(format!("provider returned {status}: {body}"))
    } else {
        AdapterError::Malformed(format!("provider returned {status}: {body}"))
    }
}

/// Map a reqwest transport failure to an adapter failure
pub(crate) fn classify_transport(error: &reqwest::Error, deadline: Duration) -> AdapterError {
    if error.is_timeout() {
        AdapterError::Timeout(deadline)
    } else {
        AdapterError::Transport(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_estimate_rounds_up() {
        let usage = TokenUsage::estimate("abcde", "xy");
        assert_eq!(usage.input, 2);
        assert_eq!(usage.output, 1);
        assert_eq!(usage.total, 3);
    }

    #[test]
    fn auth_and_quota_are_terminal() {
        assert!(!AdapterError::Auth.is_retryable());
        assert!(!AdapterError::QuotaExhausted.is_retryable());
        assert!(!AdapterError::Malformed("bad json".into()).is_retryable());
        assert!(AdapterError::RateLimited.is_retryable());
        assert!(AdapterError::Upstream("500".into()).is_retryable());
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, ""),
            AdapterError::Auth
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            AdapterError::RateLimited
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "insufficient_quota"),
            AdapterError::QuotaExhausted
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, ""),
            AdapterError::Upstream(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::UNPROCESSABLE_ENTITY, ""),
            AdapterError::Malformed(_)
        ));
    }
}
