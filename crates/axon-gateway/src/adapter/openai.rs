//! Adapter for OpenAI-compatible chat completion APIs

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

/// Default OpenAI API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default deadline for remote calls
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI-compatible chat completions adapter
pub struct OpenAiAdapter {
    name: String,
    model: String,
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
    timeout: Duration,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

impl OpenAiAdapter {
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

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.base_url.as_str().trim_end_matches('/')
        )
    }

    fn messages<'a>(
        query: &'a AdapterQuery,
        options: &'a CallOptions,
    ) -> Vec<WireMessage<'a>> {
        let mut messages = Vec::with_capacity(query.context.len() + 2);
        if let Some(system) = &options.system_message {
            messages.push(WireMessage {
                role: "system",
                content: system,
            });
        }
        for ChatTurn { role, content } in &query.context {
            messages.push(WireMessage { role, content });
        }
        messages.push(WireMessage {
            role: "user",
            content: &query.text,
        });
        messages
    }

    async fn attempt(
        &self,
        model: &str,
        query: &AdapterQuery,
        options: &CallOptions,
        deadline: Duration,
    ) -> Result<ChatResponse, AdapterError> {
        let body = ChatRequest {
            model,
            messages: Self::messages(query, options),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
            stop: &options.stop_sequences,
        };

        let mut builder = self
            .client
            .post(self.completions_url())
            .timeout(deadline)
            .json(&body);

        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
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
impl Adapter for OpenAiAdapter {
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

        let chat = with_retry(self.retry, &self.name, || {
            self.attempt(model, query, options, deadline)
        })
        .await?;

        let text = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AdapterError::Malformed("response carried no choices".to_string()))?;

        Ok(CallOutcome {
            text,
            token_usage: chat.usage.map(|usage| TokenUsage {
                input: usage.prompt_tokens,
                output: usage.completion_tokens,
                total: usage.total_tokens,
            }),
            cost: None,
            model: chat.model.unwrap_or_else(|| model.to_string()),
            processing_time: started.elapsed(),
        })
    }
}
