use std::env;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::rchain::chat_models::RetryOptions;
use crate::rchain::chat_runtime::{Auth, RequestFailure, post_json_with_retry};

/// Texts sent per embedding request.
const BATCH_SIZE: usize = 256;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("{0} is not set in the environment")]
    MissingApiKey(&'static str),
    #[error("embedding request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("embedding API error {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("malformed embedding response: {0}")]
    Malformed(String),
}

impl From<RequestFailure> for EmbeddingError {
    fn from(failure: RequestFailure) -> Self {
        match failure {
            RequestFailure::Request(source) => Self::Request(source),
            RequestFailure::Api { status, body } => Self::Api { status, body },
        }
    }
}

#[async_trait]
pub trait Embeddings: Send + Sync {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_documents(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| EmbeddingError::Malformed("no embedding returned".to_string()))
    }
}

fn env_key(key_env: &'static str) -> Result<String, EmbeddingError> {
    env::var(key_env)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(EmbeddingError::MissingApiKey(key_env))
}

fn to_vector(value: &Value) -> Result<Vec<f32>, EmbeddingError> {
    value
        .as_array()
        .ok_or_else(|| EmbeddingError::Malformed("embedding is not an array".to_string()))?
        .iter()
        .map(|number| {
            number
                .as_f64()
                .map(|number| number as f32)
                .ok_or_else(|| EmbeddingError::Malformed("embedding contains a non-float value".to_string()))
        })
        .collect()
}

/// Client for OpenAI-compatible `/embeddings` endpoints.
#[derive(Debug, Clone)]
pub struct OpenAIEmbeddings {
    model: String,
    url: String,
    key_env: &'static str,
    retry: RetryOptions,
    client: Client,
}

impl OpenAIEmbeddings {
    pub const OPENAI_URL: &'static str = "https://api.openai.com/v1/embeddings";
    pub const FIREWORKS_URL: &'static str = "https://api.fireworks.ai/inference/v1/embeddings";

    /// OpenAI embeddings keyed by `OPENAI_API_KEY`.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            url: Self::OPENAI_URL.to_string(),
            key_env: "OPENAI_API_KEY",
            retry: RetryOptions::default(),
            client: Client::new(),
        }
    }

    /// Fireworks serves the same wire format, keyed by `FIREWORKS_API_KEY`.
    pub fn fireworks(model: impl Into<String>) -> Self {
        Self {
            url: Self::FIREWORKS_URL.to_string(),
            key_env: "FIREWORKS_API_KEY",
            ..Self::new(model)
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }
}

/// Reads `data[*].embedding`, ordered by each entry's `index`.
pub(crate) fn parse_openai_embeddings(body: &Value) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut data = body["data"]
        .as_array()
        .ok_or_else(|| EmbeddingError::Malformed("missing data".to_string()))?
        .iter()
        .collect::<Vec<_>>();
    data.sort_by_key(|entry| entry["index"].as_u64().unwrap_or(0));
    data.into_iter()
        .map(|entry| to_vector(&entry["embedding"]))
        .collect()
}

#[async_trait]
impl Embeddings for OpenAIEmbeddings {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let api_key = env_key(self.key_env)?;
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            debug!(model = %self.model, batch = batch.len(), "embedding batch");
            let payload = json!({"model": self.model, "input": batch});
            let response = post_json_with_retry(
                &self.client,
                &self.url,
                Auth::Bearer(&api_key),
                &[],
                &payload,
                self.retry.into(),
            )
            .await?;
            let body: Value = response.json().await.map_err(EmbeddingError::Request)?;
            vectors.extend(parse_openai_embeddings(&body)?);
        }
        Ok(vectors)
    }
}

/// Sentence embeddings from the hosted Hugging Face inference API.
#[derive(Debug, Clone)]
pub struct HuggingFaceEmbeddings {
    model: String,
    base_url: String,
    retry: RetryOptions,
    client: Client,
}

impl HuggingFaceEmbeddings {
    pub const DEFAULT_MODEL: &'static str = "sentence-transformers/all-mpnet-base-v2";
    const BASE_URL: &'static str = "https://router.huggingface.co/hf-inference/models";
    const KEY_ENV: &'static str = "HF_TOKEN";

    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            base_url: Self::BASE_URL.to_string(),
            retry: RetryOptions::default(),
            client: Client::new(),
        }
    }

    pub fn retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self) -> String {
        format!(
            "{}/{}/pipeline/feature-extraction",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

impl Default for HuggingFaceEmbeddings {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MODEL)
    }
}

pub(crate) fn parse_feature_extraction(body: &Value) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    body.as_array()
        .ok_or_else(|| EmbeddingError::Malformed("expected a list of embeddings".to_string()))?
        .iter()
        .map(to_vector)
        .collect()
}

#[async_trait]
impl Embeddings for HuggingFaceEmbeddings {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let api_key = env_key(Self::KEY_ENV)?;
        let url = self.url();
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            debug!(model = %self.model, batch = batch.len(), "embedding batch");
            let payload = json!({"inputs": batch, "options": {"wait_for_model": true}});
            let response = post_json_with_retry(
                &self.client,
                &url,
                Auth::Bearer(&api_key),
                &[],
                &payload,
                self.retry.into(),
            )
            .await?;
            let body: Value = response.json().await.map_err(EmbeddingError::Request)?;
            let parsed = parse_feature_extraction(&body)?;
            if parsed.len() != batch.len() {
                return Err(EmbeddingError::Malformed(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    parsed.len()
                )));
            }
            vectors.extend(parsed);
        }
        Ok(vectors)
    }
}
