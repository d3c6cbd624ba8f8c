//! Routing-specific error types

use axon_config::ModelType;
use thiserror::Error;

/// Errors that can occur during provider selection and admission
#[derive(Debug, Error)]
pub enum RoutingError {
    /// No provider can currently serve the requested model type
    #[error("no provider available for model type: {model_type}")]
    NoCandidates { model_type: ModelType },

    /// Admission refused because the provider is at its concurrency cap
    #[error("provider '{provider}' is over its concurrency limit")]
    OverConcurrencyLimit { provider: String },

    /// Cost-control downgrade chain exhausted without fitting the budget
    #[error("estimated cost {estimated:.6} exceeds budget {budget:.6}")]
    CostLimitExceeded { estimated: f64, budget: f64 },

    /// Provider name not present in the registry
    #[error("unknown provider: {name}")]
    UnknownProvider { name: String },

    /// Complexity feature name not recognized
    #[error("unknown complexity feature: {name}")]
    UnknownFeature { name: String },
}
