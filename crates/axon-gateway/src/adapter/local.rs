//! Adapter for llama.cpp-style local completion servers

use std::time::{Duration, Instant};

use async_trait::async_trait;
use axon_config::ProviderConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{
    Adapter, AdapterError, AdapterQuery, CallOptions, CallOutcome, RetryPolicy, TokenUsage,
    classify_status, classify_transport, with_retry,
};

/// Default local completion server endpoint
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";

/// Default deadline for local calls
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_MODEL: &str = "local-completion";

/// Local completion-server adapter
pub struct LocalAdapter {
    name: String,
    model: String,
    client: Client,
    base_url: Url,
    timeout: Duration,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    n_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
}

#[derive(Deserialize)]
struct CompletionResponse {
    content: String,
    #[serde(default)]
    tokens_evaluated: Option<u64>,
    #[serde(default)]
    tokens_predicted: Option<u64>,
}

impl LocalAdapter {
    pub fn new(name: &str, config: &ProviderConfig) -> Self {
        let base_url = config
            .endpoint
            .clone()
            .unwrap_or_else(|| Url::parse(DEFAULT_BASE_URL).expect("valid default URL"));

        Self {
            name: name.to_string(),
            model: config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client: Client::new(),
            base_url,
            timeout: config.timeout_ms.map_or(DEFAULT_TIMEOUT, Duration::from_millis),
            retry: RetryPolicy::from_config(&config.retry),
        }
    }

    fn completion_url(&self) -> String {
        format!("{}/completion", self.base_url.as_str().trim_end_matches('/'))
    }

    async fn attempt(
        &self,
        query: &AdapterQuery,
        options: &CallOptions,
        deadline: Duration,
    ) -> Result<CompletionResponse, AdapterError> {
        let body = CompletionRequest {
            prompt: &query.text,
            n_predict: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
            stop: &options.stop_sequences,
        };

        let response = self
            .client
            .post(self.completion_url())
            .timeout(deadline)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(&e, deadline))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }

        response
            .json()
            .await
            .map_err(|e| AdapterError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl Adapter for LocalAdapter {
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
        options: &CallOptions,
    ) -> Result<CallOutcome, AdapterError> {
        let deadline = options.timeout.unwrap_or(self.timeout);
        let started = Instant::now();

        let completion = with_retry(self.retry, &self.name, || {
            self.attempt(query, options, deadline)
        })
        .await?;

        let token_usage = match (completion.tokens_evaluated, completion.tokens_predicted) {
            (Some(input), Some(output)) => Some(TokenUsage {
                input,
                output,
                total: input + output,
            }),
            _ => None,
        };

        Ok(CallOutcome {
            text: completion.content,
            token_usage,
            // Local inference carries no metered cost; the dispatcher
            // falls back to the router's estimate.
            cost: None,
            model: model.to_string(),
            processing_time: started.elapsed(),
        })
    }
}
