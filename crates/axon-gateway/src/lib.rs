//! Request validation, adapters, and per-request dispatch for Axon
//!
//! The dispatcher drives each request through validate → evaluate →
//! route → call, with a single fallback to a backup provider on call
//! failure, and emits exactly one metrics record per dispatch.

#![allow(clippy::must_use_candidate, clippy::cast_precision_loss)]

pub mod adapter;
pub mod dispatch;
pub mod handlers;
pub mod types;
pub mod validate;

pub use adapter::{Adapter, AdapterError, AdapterQuery, CallOptions, CallOutcome, TokenUsage, build_adapter};
pub use dispatch::Dispatcher;
pub use handlers::{GatewayState, gateway_router};
pub use types::{QueryRequest, QueryResponse};
pub use validate::{NormalizedRequest, validate_and_normalize};
