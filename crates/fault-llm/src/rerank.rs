//! Cross-encoder reranker client.
//!
//! There is no native Rust cross-encoder; scoring is delegated to an HTTP
//! model server. The raw logits it returns flow into fusion's own
//! per-request calibration, which converts them to `[0,1]` the same way it
//! calibrates BM25 and cosine scores.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LlmError, LlmResult};

/// Default reranker timeout (spec §5: reranker defaults to 500ms).
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct RerankerConfig {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl RerankerConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    scores: Vec<f32>,
}

/// HTTP client for a cross-encoder reranking server.
pub struct RerankerClient {
    client: reqwest::Client,
    config: RerankerConfig,
}

impl RerankerClient {
    pub fn new(config: RerankerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, config }
    }

    pub fn with_client(client: reqwest::Client, config: RerankerConfig) -> Self {
        Self { client, config }
    }

    /// Score `query` against each of `candidate_texts`, returning one raw
    /// logit per candidate in the same order.
    ///
    /// Logits are returned unconverted: fusion calibrates `rerank_raw`
    /// against the rest of the request's union the same way it calibrates
    /// `bm25_raw` and `cosine_raw`, so this client does not pre-squash them.
    /// Deterministic for identical inputs modulo the server's own
    /// floating-point noise; this client introduces none of its own.
    pub async fn score(&self, query: &str, candidate_texts: &[String]) -> LlmResult<Vec<f32>> {
        if candidate_texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = RerankRequest { model: &self.config.model, query, documents: candidate_texts };
        let url = format!("{}/rerank", self.config.base_url.trim_end_matches('/'));

        let send = self.client.post(&url).json(&request).send();
        let response = tokio::time::timeout(self.config.timeout, send)
            .await
            .map_err(|_| LlmError::Timeout(self.config.timeout))??;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Backend { status: status.as_u16(), message });
        }

        let parsed: RerankResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        if parsed.scores.len() != candidate_texts.len() {
            return Err(LlmError::Parse(format!(
                "expected {} scores, got {}",
                candidate_texts.len(),
                parsed.scores.len()
            )));
        }

        Ok(parsed.scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn score_with_empty_candidates_returns_empty() {
        let config = RerankerConfig::new("http://localhost:1", "test-model");
        let client = RerankerClient::new(config);
        let scores = client.score("query", &[]).await.unwrap();
        assert!(scores.is_empty());
    }
}
