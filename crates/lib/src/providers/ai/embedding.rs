//! # Embeddings Provider
//!
//! Generates vector embeddings by calling an external Gemini or OpenAI-compatible
//! embeddings API. Transient failures (network errors, 429 and 5xx responses) are
//! retried with exponential backoff before the error reaches the encoder.

use crate::{errors::PromptError, providers::ai::EmbeddingProvider};
use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

// --- OpenAI-compatible request and response structures ---

#[derive(Serialize, Debug)]
struct OpenAIEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize, Debug)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

#[derive(Deserialize, Debug)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
}

// --- Gemini-specific request and response structures ---

#[derive(Serialize, Debug)]
struct GeminiEmbeddingRequest<'a> {
    model: String,
    content: GeminiEmbeddingContent<'a>,
}

#[derive(Serialize, Debug)]
struct GeminiEmbeddingContent<'a> {
    parts: Vec<GeminiEmbeddingPart<'a>>,
}

#[derive(Serialize, Debug)]
struct GeminiEmbeddingPart<'a> {
    text: &'a str,
}

#[derive(Deserialize, Debug)]
struct GeminiEmbeddingResponse {
    embedding: GeminiEmbeddingValue,
}

#[derive(Deserialize, Debug)]
struct GeminiEmbeddingValue {
    values: Vec<f32>,
}

/// Retry policy for embedding calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(250),
        }
    }
}

/// An [`EmbeddingProvider`] backed by an HTTP embeddings endpoint.
#[derive(Clone, Debug)]
pub struct HttpEmbeddingProvider {
    client: ReqwestClient,
    api_url: String,
    model: String,
    api_key: Option<String>,
    dimensions: Option<usize>,
    retry: RetryPolicy,
}

impl HttpEmbeddingProvider {
    pub fn new(
        api_url: String,
        model: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, PromptError> {
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(PromptError::ReqwestClientBuild)?;
        Ok(Self {
            client,
            api_url,
            model,
            api_key,
            dimensions: None,
            retry: RetryPolicy::default(),
        })
    }

    /// Declares the expected vector length; mismatching vectors are rejected by the encoder.
    pub fn with_dimensions(mut self, dimensions: Option<usize>) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn is_gemini(&self) -> bool {
        self.api_url.contains("generativelanguage.googleapis.com")
    }

    async fn embed_once(&self, input: &str) -> Result<Vec<f32>, AttemptError> {
        let mut request_builder = self.client.post(&self.api_url);
        let is_gemini = self.is_gemini();

        if is_gemini {
            // Gemini requires the model name to be prefixed with "models/" in the payload.
            let gemini_model_name = if self.model.starts_with("models/") {
                self.model.clone()
            } else {
                format!("models/{}", self.model)
            };
            let request_body = GeminiEmbeddingRequest {
                model: gemini_model_name,
                content: GeminiEmbeddingContent {
                    parts: vec![GeminiEmbeddingPart { text: input }],
                },
            };
            request_builder = request_builder.json(&request_body);
            if let Some(key) = &self.api_key {
                request_builder = request_builder.header("x-goog-api-key", key);
            }
        } else {
            let request_body = OpenAIEmbeddingRequest {
                model: &self.model,
                input,
            };
            request_builder = request_builder.json(&request_body);
            if let Some(key) = &self.api_key {
                request_builder = request_builder.bearer_auth(key);
            }
        }

        let response = request_builder
            .send()
            .await
            .map_err(|e| AttemptError::Transient(PromptError::AiRequest(e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let err = PromptError::AiApi(format!("{status}: {error_text}"));
            return Err(if is_retryable(status) {
                AttemptError::Transient(err)
            } else {
                AttemptError::Permanent(err)
            });
        }

        let vector = if is_gemini {
            let body: GeminiEmbeddingResponse = response
                .json()
                .await
                .map_err(|e| AttemptError::Permanent(PromptError::AiDeserialization(e)))?;
            body.embedding.values
        } else {
            let body: OpenAIEmbeddingResponse = response
                .json()
                .await
                .map_err(|e| AttemptError::Permanent(PromptError::AiDeserialization(e)))?;
            body.data
                .into_iter()
                .next()
                .map(|d| d.embedding)
                .ok_or(AttemptError::Permanent(PromptError::EmptyResponse))?
        };
        Ok(vector)
    }
}

enum AttemptError {
    Transient(PromptError),
    Permanent(PromptError),
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, input: &str) -> Result<Vec<f32>, PromptError> {
        let mut backoff = self.retry.initial_backoff;
        let mut attempt = 0;
        loop {
            match self.embed_once(input).await {
                Ok(vector) => {
                    debug!(dimensions = vector.len(), "<-- Embedding received");
                    return Ok(vector);
                }
                Err(AttemptError::Permanent(e)) => return Err(e),
                Err(AttemptError::Transient(e)) if attempt >= self.retry.max_retries => {
                    return Err(e)
                }
                Err(AttemptError::Transient(e)) => {
                    attempt += 1;
                    warn!(
                        "Embedding request failed (attempt {attempt}); retrying in {:?}: {e}",
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }
}
