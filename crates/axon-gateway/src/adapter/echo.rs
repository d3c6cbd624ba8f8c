//! Deterministic echo backend for smoke testing a deployment
//!
//! Serves any query by echoing it back. Useful for exercising the full
//! routing and dispatch path without a real model behind it.

use std::time::Instant;

use async_trait::async_trait;
use axon_config::ProviderConfig;

use super::{Adapter, AdapterError, AdapterQuery, CallOptions, CallOutcome, TokenUsage};

const DEFAULT_MODEL: &str = "echo";

pub struct EchoAdapter {
    name: String,
    model: String,
}

impl EchoAdapter {
    pub fn new(name: &str, config: &ProviderConfig) -> Self {
        Self {
            name: name.to_string(),
            model: config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }
}

#[async_trait]
impl Adapter for EchoAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn call(
        &self,
        model: &str,
        query: &AdapterQuery,
        _options: &CallOptions,
    ) -> Result<CallOutcome, AdapterError> {
        let started = Instant::now();
        let text = format!("echo: {}", query.text);

        Ok(CallOutcome {
            token_usage: Some(TokenUsage::estimate(&query.text, &text)),
            text,
            cost: None,
            model: model.to_string(),
            processing_time: started.elapsed(),
        })
    }
}
