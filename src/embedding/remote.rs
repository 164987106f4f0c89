//! OpenAI-compatible HTTP embedder.
//!
//! Each call is a remote invocation against the configured `/v1/embeddings`
//! endpoint. Transient failures (network errors, 429, 5xx) are retried with
//! exponential backoff up to the configured budget; failures that signal a
//! problem with the request itself (other 4xx, malformed responses) are
//! surfaced immediately without retry.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EmbeddingConfig;
use crate::embedding::TextEmbedder;
use crate::error::{RetrievalError, RetrievalResult};
use crate::index::Dimension;

/// Embedder backed by an OpenAI-compatible embeddings endpoint.
#[derive(Debug)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    dimension: Dimension,
    max_retries: u32,
    retry_backoff: Duration,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

/// Per-attempt failure classification driving the retry loop.
enum AttemptError {
    /// Worth retrying: the condition may clear on its own
    Transient(String),
    /// Retrying would repeat the same failure
    Permanent(String),
}

impl OpenAiEmbedder {
    /// Builds an embedder from settings, reading the API key from the
    /// configured environment variable.
    ///
    /// # Errors
    /// Returns `Config` if the key variable is unset or the HTTP client
    /// cannot be constructed.
    pub fn from_config(config: &EmbeddingConfig) -> RetrievalResult<Self> {
        let api_key =
            std::env::var(&config.api_key_env).map_err(|_| RetrievalError::Config {
                reason: format!(
                    "environment variable {} is not set (embedding.api_key_env)",
                    config.api_key_env
                ),
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RetrievalError::Config {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            dimension: Dimension::new(config.dimension)?,
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    /// One request for the whole input slice, retried on transient failure.
    async fn request(&self, texts: &[String]) -> RetrievalResult<Vec<Vec<f32>>> {
        let mut backoff = self.retry_backoff;
        let mut attempt = 0u32;

        loop {
            match self.request_once(texts).await {
                Ok(rows) => return align_rows(rows, texts.len(), self.dimension),
                Err(AttemptError::Permanent(reason)) => {
                    return Err(RetrievalError::EmbeddingFailure { reason });
                }
                Err(AttemptError::Transient(reason)) => {
                    if attempt >= self.max_retries {
                        return Err(RetrievalError::EmbeddingFailure {
                            reason: format!(
                                "retries exhausted after {} attempts: {reason}",
                                attempt + 1
                            ),
                        });
                    }
                    attempt += 1;
                    warn!(
                        attempt,
                        max = self.max_retries,
                        %reason,
                        "transient embedding failure, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    async fn request_once(&self, texts: &[String]) -> Result<Vec<EmbeddingRow>, AttemptError> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        debug!(inputs = texts.len(), model = %self.model, "requesting embeddings");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AttemptError::Transient("request timed out".to_string())
                } else if e.is_connect() {
                    AttemptError::Transient(format!("connection failed: {e}"))
                } else {
                    AttemptError::Transient(format!("network error: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &detail));
        }

        let payload: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AttemptError::Permanent(format!("malformed response body: {e}")))?;
        Ok(payload.data)
    }
}

#[async_trait]
impl TextEmbedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> RetrievalResult<Vec<f32>> {
        let input = [text.to_string()];
        let mut vectors = self.request(&input).await?;
        vectors.pop().ok_or_else(|| RetrievalError::EmbeddingFailure {
            reason: "endpoint returned no embedding".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> RetrievalResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }

    fn dimension(&self) -> Dimension {
        self.dimension
    }
}

/// Maps a non-success HTTP status onto the retry policy. Rate limiting and
/// server-side errors may clear; other client errors will not.
fn classify_status(status: StatusCode, detail: &str) -> AttemptError {
    let reason = format!("endpoint returned {status}: {}", truncate(detail, 200));
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        AttemptError::Transient(reason)
    } else {
        AttemptError::Permanent(reason)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Restores request order from the response `index` field and validates the
/// batch: right count, contiguous indices, non-empty vectors, and the
/// configured dimension on every row.
fn align_rows(
    mut rows: Vec<EmbeddingRow>,
    expected: usize,
    dimension: Dimension,
) -> RetrievalResult<Vec<Vec<f32>>> {
    if rows.len() != expected {
        return Err(RetrievalError::EmbeddingFailure {
            reason: format!(
                "expected {expected} embeddings, endpoint returned {}",
                rows.len()
            ),
        });
    }

    rows.sort_unstable_by_key(|row| row.index);

    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            if row.index != i {
                return Err(RetrievalError::EmbeddingFailure {
                    reason: format!("response is missing an embedding for input {i}"),
                });
            }
            if row.embedding.is_empty() {
                return Err(RetrievalError::EmbeddingFailure {
                    reason: format!("endpoint returned an empty embedding for input {i}"),
                });
            }
            dimension.validate(&row.embedding)?;
            Ok(row.embedding)
        })
        .collect()
}
