//! Embedding encoder.
//!
//! Hosting or training an embedding model is out of scope; encoding is
//! delegated to an HTTP embeddings endpoint. The client is constructed once
//! per process and reused -- see [`LazyEncoder`] -- since establishing the
//! connection pool is the only "load" cost a remote encoder has.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::error::{LlmError, LlmResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl EmbeddingConfig {
    pub fn new(api_base: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            api_key: None,
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

/// HTTP client for a model-agnostic embeddings endpoint.
pub struct EmbeddingEncoder {
    client: reqwest::Client,
    config: EmbeddingConfig,
}

impl EmbeddingEncoder {
    pub fn new(config: EmbeddingConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, config }
    }

    pub fn with_client(client: reqwest::Client, config: EmbeddingConfig) -> Self {
        Self { client, config }
    }

    /// Encode `strings` into L2-normalized vectors, one per input, in order.
    pub async fn encode(&self, strings: &[String]) -> LlmResult<Vec<Vec<f32>>> {
        if strings.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest { model: &self.config.model, input: strings };
        let url = format!("{}/embeddings", self.config.api_base.trim_end_matches('/'));

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = tokio::time::timeout(self.config.timeout, builder.send())
            .await
            .map_err(|_| LlmError::Timeout(self.config.timeout))??;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Backend { status: status.as_u16(), message });
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| LlmError::Parse(e.to_string()))?;
        if parsed.data.len() != strings.len() {
            return Err(LlmError::Parse(format!(
                "expected {} embeddings, got {}",
                strings.len(),
                parsed.data.len()
            )));
        }

        Ok(parsed.data.into_iter().map(|d| normalize(d.embedding)).collect())
    }
}

fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

/// Process-wide lazily-initialized encoder: the first caller pays the setup
/// cost, every later call reuses the same client and connection pool.
pub struct LazyEncoder {
    config: EmbeddingConfig,
    inner: OnceCell<EmbeddingEncoder>,
}

impl LazyEncoder {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self { config, inner: OnceCell::new() }
    }

    pub async fn encode(&self, strings: &[String]) -> LlmResult<Vec<Vec<f32>>> {
        let encoder = self
            .inner
            .get_or_init(|| async { EmbeddingEncoder::new(self.config.clone()) })
            .await;
        encoder.encode(strings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_produces_unit_vector() {
        let v = normalize(vec![3.0, 4.0]);
        let norm = (v[0] * v[0] + v[1] * v[1]).sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_leaves_zero_vector_unchanged() {
        let v = normalize(vec![0.0, 0.0]);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[tokio::test]
    async fn encode_with_empty_input_returns_empty() {
        let encoder = EmbeddingEncoder::new(EmbeddingConfig::new("http://localhost:1", "test-model"));
        let result = encoder.encode(&[]).await.unwrap();
        assert!(result.is_empty());
    }
}
