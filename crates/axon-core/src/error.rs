use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Wire-level error codes shared by every RPC method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Ok,
    InvalidRequest,
    ModelUnavailable,
    ComplexityEvaluationFailed,
    CostLimitExceeded,
    /// Generic internal error, outside the request-level taxonomy
    Internal,
}

impl ErrorCode {
    /// Numeric code carried on the wire
    pub const fn wire(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::InvalidRequest => 1,
            Self::ModelUnavailable => 2,
            Self::ComplexityEvaluationFailed => 3,
            Self::CostLimitExceeded => 4,
            Self::Internal => 5,
        }
    }

    /// Machine-readable name of this code
    pub const fn kind(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::ModelUnavailable => "MODEL_UNAVAILABLE",
            Self::ComplexityEvaluationFailed => "COMPLEXITY_EVALUATION_FAILED",
            Self::CostLimitExceeded => "COST_LIMIT_EXCEEDED",
            Self::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

/// Errors surfaced to callers of the gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Request failed validation (schema, length, safety pattern)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No provider can take the request right now
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// Complexity evaluation produced no usable score
    #[error("complexity evaluation failed: {0}")]
    ComplexityEvaluationFailed(String),

    /// Cost-control strategy exhausted the downgrade chain
    #[error("cost limit exceeded: {0}")]
    CostLimitExceeded(String),

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GatewayError {
    /// Wire code for this error
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Self::ModelUnavailable(_) => ErrorCode::ModelUnavailable,
            Self::ComplexityEvaluationFailed(_) => ErrorCode::ComplexityEvaluationFailed,
            Self::CostLimitExceeded(_) => ErrorCode::CostLimitExceeded,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }
}

/// Trait for domain errors that can be converted to HTTP responses
///
/// The server layer converts these into actual HTTP responses, keeping
/// domain errors decoupled from axum.
pub trait HttpError: std::error::Error {
    /// HTTP status code for this error
    fn status_code(&self) -> StatusCode;

    /// Machine-readable error type
    fn error_type(&self) -> &str;

    /// Message safe to expose to API consumers
    fn client_message(&self) -> String;
}

impl HttpError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::CostLimitExceeded(_) => StatusCode::PAYMENT_REQUIRED,
            Self::ComplexityEvaluationFailed(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_type(&self) -> &str {
        self.code().kind()
    }

    fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "an internal error occurred".to_string(),
            other => other.to_string(),
        }
    }
}
