//! Routing engine for the Axon gateway
//!
//! Maps a query's complexity score to a model type, scores the eligible
//! providers on load, cost, and observed performance, and applies budget
//! downgrades and backup selection.

#![allow(clippy::must_use_candidate, clippy::cast_precision_loss)]

pub mod complexity;
pub mod error;
pub mod registry;
pub mod router;
pub mod tracker;

pub use complexity::{ComplexityFactor, ComplexityReport, evaluate, evaluate_with_features};
pub use error::RoutingError;
pub use registry::{ProviderDescriptor, ProviderRegistry};
pub use router::{Router, RoutingDecision};
pub use tracker::{CallSample, LoadTracker, ProviderStats};
