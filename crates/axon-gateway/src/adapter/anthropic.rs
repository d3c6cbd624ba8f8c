//! Adapter for the Anthropic Messages API

use std::time::{Duration, Instant};

use async_trait::async_trait;
use axon_config::ProviderConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{
    Adapter, AdapterError, AdapterQuery, CallOptions, CallOutcome, ChatTurn, RetryPolicy,
    TokenUsage, classify_status, classify_transport, with_retry,
};

/// Default Anthropic API base URL
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default deadline for remote calls
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";

/// The Messages API requires max_tokens; used when the caller sets none
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Anthropic Messages API adapter
pub struct AnthropicAdapter {
    name: String,
    model: String,
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
    timeout: Duration,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop_sequences: &'a [String],
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<WireUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    input_tokens: u64,
    output_tokens: u64,
}

impl AnthropicAdapter {
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
            api_key: config.api_key.clone(),
            timeout: config.timeout_ms.map_or(DEFAULT_TIMEOUT, Duration::from_millis),
            retry: RetryPolicy::from_config(&config.retry),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/messages", self.base_url.as_str().trim_end_matches('/'))
    }

    async fn attempt(
        &self,
        model: &str,
        query: &AdapterQuery,
        options: &CallOptions,
        deadline: Duration,
    ) -> Result<MessagesResponse, AdapterError> {
        let mut messages: Vec<WireMessage<'_>> = query
            .context
            .iter()
            .map(|ChatTurn { role, content }| WireMessage { role, content })
            .collect();
        messages.push(WireMessage {
            role: "user",
            content: &query.text,
        });

        let body = MessagesRequest {
            model,
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            messages,
            system: options.system_message.as_deref(),
            temperature: options.temperature,
            top_p: options.top_p,
            stop_sequences: &options.stop_sequences,
        };

        let mut builder = self
            .client
            .post(self.messages_url())
            .timeout(deadline)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);

        if let Some(key) = &self.api_key {
            builder = builder.header("x-api-key", key.expose_secret());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_transport(&e, deadline))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            tracing::warn!(provider = %self.name, %status, "upstream returned error");
            return Err(classify_status(status, &text));
        }

        response
            .json()
            .await
            .map_err(|e| AdapterError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl Adapter for AnthropicAdapter {
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

        let message = with_retry(self.retry, &self.name, || {
            self.attempt(model, query, options, deadline)
        })
        .await?;

        let text: String = message
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        if text.is_empty() {
            return Err(AdapterError::Malformed(
                "response carried no text content".to_string(),
            ));
        }

        Ok(CallOutcome {
            text,
            token_usage: message.usage.map(|usage| TokenUsage {
                input: usage.input_tokens,
                output: usage.output_tokens,
                total: usage.input_tokens + usage.output_tokens,
            }),
            cost: None,
            model: message.model.unwrap_or_else(|| model.to_string()),
            processing_time: started.elapsed(),
        })
    }
}
