use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::rchain::chat_runtime::{RequestFailure, RetryConfig};
use crate::rchain::messages::{AIMessage, Message};
use crate::rchain::prompts::PromptValue;
use crate::rchain::provider::{self, Provider, ProviderError};
use crate::rchain::runnables::{ChainError, Runnable};
use crate::rchain::tools::ToolDefinition;
use crate::rchain::{anthropic, google, openai};

/// Sampling and transport options shared by every provider.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stop: Vec<String>,
    pub retry: RetryOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOptions {
    pub timeout_secs: Option<u64>,
    pub retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        let config = RetryConfig::default();
        Self {
            timeout_secs: config.timeout_secs,
            retries: config.retries,
            retry_delay_ms: config.retry_delay_ms,
        }
    }
}

impl From<RetryOptions> for RetryConfig {
    fn from(options: RetryOptions) -> Self {
        Self {
            timeout_secs: options.timeout_secs,
            retries: options.retries,
            retry_delay_ms: options.retry_delay_ms,
        }
    }
}

/// Everything a provider codec needs to build one request.
#[derive(Debug)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub options: &'a ChatOptions,
    pub tools: &'a [ToolDefinition],
}

/// Provider-agnostic chat model client.
#[derive(Debug, Clone)]
pub struct ChatModel {
    provider: Provider,
    model: String,
    options: ChatOptions,
    tools: Vec<ToolDefinition>,
    base_url: Option<String>,
    api_key: Option<String>,
    client: Client,
}

impl ChatModel {
    pub fn new(provider: Provider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            options: ChatOptions::default(),
            tools: Vec::new(),
            base_url: None,
            api_key: None,
            client: Client::new(),
        }
    }

    pub fn openai(model: impl Into<String>) -> Self {
        Self::new(Provider::Openai, model)
    }

    pub fn anthropic(model: impl Into<String>) -> Self {
        Self::new(Provider::Anthropic, model)
    }

    pub fn google(model: impl Into<String>) -> Self {
        Self::new(Provider::Google, model)
    }

    pub fn fireworks(model: impl Into<String>) -> Self {
        Self::new(Provider::Fireworks, model)
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn options(&self) -> &ChatOptions {
        &self.options
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.options.max_tokens = Some(max_tokens);
        self
    }

    pub fn retry(mut self, retry: RetryOptions) -> Self {
        self.options.retry = retry;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.options.retry.retries = retries;
        self
    }

    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.options.retry.timeout_secs = Some(timeout_secs);
        self
    }

    /// Overrides the provider endpoint, e.g. for a proxy.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Uses `api_key` instead of the provider's environment variable.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn resolve_api_key(&self) -> Result<String, ProviderError> {
        match &self.api_key {
            Some(key) => provider::api_key_with(self.provider, |_| Some(key.clone())),
            None => provider::api_key(self.provider),
        }
    }

    /// Returns a cloned client that stops generating at any of `stop`.
    pub fn with_stop<S: Into<String>>(&self, stop: impl IntoIterator<Item = S>) -> Self {
        let mut bound = self.clone();
        bound.options.stop = stop.into_iter().map(Into::into).collect();
        bound
    }

    /// Returns a cloned client bound to tool definitions.
    pub fn bind_tools(&self, tools: Vec<ToolDefinition>) -> Self {
        let mut bound = self.clone();
        bound.tools = tools;
        bound
    }

    pub fn bound_tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    /// Invokes the model with a string, a prompt value, or a message list.
    pub async fn invoke(&self, input: impl Into<PromptValue>) -> Result<AIMessage, ProviderError> {
        let prompt = input.into();
        self.invoke_messages(prompt.messages()).await
    }

    pub async fn invoke_messages(&self, messages: &[Message]) -> Result<AIMessage, ProviderError> {
        let api_key = self.resolve_api_key()?;
        let request = ChatRequest {
            model: &self.model,
            messages,
            options: &self.options,
            tools: &self.tools,
        };
        debug!(
            provider = %self.provider,
            model = %self.model,
            messages = messages.len(),
            tools = self.tools.len(),
            "invoking chat model"
        );
        let base_url = self.base_url.as_deref();
        match self.provider {
            Provider::Openai | Provider::Fireworks => {
                openai::chat(&self.client, self.provider, base_url, &api_key, &request).await
            }
            Provider::Anthropic => anthropic::chat(&self.client, base_url, &api_key, &request).await,
            Provider::Google => google::chat(&self.client, base_url, &api_key, &request).await,
        }
    }
}

pub(crate) fn map_failure(provider: Provider, failure: RequestFailure) -> ProviderError {
    match failure {
        RequestFailure::Request(source) => ProviderError::Request { provider, source },
        RequestFailure::Api { status, body } => ProviderError::Api {
            provider,
            status,
            body,
        },
    }
}

#[async_trait]
impl Runnable<PromptValue> for ChatModel {
    type Output = AIMessage;

    async fn invoke(&self, input: PromptValue) -> Result<AIMessage, ChainError> {
        Ok(self.invoke_messages(input.messages()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_tools_and_stop_do_not_mutate_original() {
        let model = ChatModel::openai("gpt-4o").temperature(0.0);
        let bound = model
            .with_stop(["\nObservation"])
            .bind_tools(vec![ToolDefinition::from_function(
                crate::rchain::tools::ToolFunction::new("Time", "Current time"),
            )]);

        assert!(model.options().stop.is_empty());
        assert!(model.bound_tools().is_empty());
        assert_eq!(bound.options().stop, vec!["\nObservation".to_string()]);
        assert_eq!(bound.bound_tools().len(), 1);
        assert_eq!(bound.options().temperature, Some(0.0));
    }

    #[test]
    fn builder_overrides_limits_and_endpoint() {
        let model = ChatModel::anthropic("claude-3-opus-20240229")
            .max_tokens(256)
            .retries(1)
            .timeout_secs(5)
            .base_url("http://localhost:9999");

        assert_eq!(model.options().max_tokens, Some(256));
        assert_eq!(model.options().retry.retries, 1);
        assert_eq!(model.options().retry.timeout_secs, Some(5));
        assert_eq!(model.base_url.as_deref(), Some("http://localhost:9999"));
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let err = ChatModel::anthropic("claude-3-opus-20240229")
            .api_key(" ")
            .invoke("hello")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "ANTHROPIC_API_KEY is not set in the environment");
    }
}
