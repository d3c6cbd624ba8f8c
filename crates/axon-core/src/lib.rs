#![allow(clippy::must_use_candidate)]

mod context;
mod error;

pub use context::DispatchContext;
pub use error::{ErrorCode, GatewayError, HttpError};
