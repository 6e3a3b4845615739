//! Remote search adapter over an OpenSearch-compatible backend.
//!
//! Composes a multi-field weighted lexical query with optional structured
//! filters and an optional kNN clause, issues it with a bounded timeout, and
//! normalizes the response into `{total, hits[]}`.

use std::time::Duration;

use fault_fusion::Hints;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{LlmError, LlmResult};

/// Default per-source timeout (spec §5: retriever sources default 1500ms).
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1500);

/// Configuration for the remote search adapter.
#[derive(Debug, Clone)]
pub struct RemoteSearchConfig {
    /// Base URL of the search backend, e.g. `http://localhost:9200`.
    pub base_url: String,
    /// Index name to query.
    pub index: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl RemoteSearchConfig {
    pub fn new(base_url: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            index: index.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Options controlling how the search is composed.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// When set, adds a kNN clause against this query vector.
    pub query_vector: Option<Vec<f32>>,
    /// Field the kNN clause runs against.
    pub vector_field: Option<String>,
    /// Blend weight for the kNN clause relative to the lexical match, `[0,1]`.
    pub semantic_weight: f32,
    /// Number of nearest neighbors to consider for the kNN clause.
    pub vector_k: usize,
}

/// A normalized hit returned by the adapter.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteHit {
    pub id: String,
    #[serde(rename = "_source")]
    pub source: Value,
    pub score: f32,
    #[serde(default)]
    pub highlight: Option<Value>,
}

/// The adapter's normalized response shape.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteSearchResponse {
    pub total: u64,
    pub hits: Vec<RemoteHit>,
}

/// HTTP client for the remote search backend.
pub struct RemoteSearchClient {
    client: reqwest::Client,
    config: RemoteSearchConfig,
}

impl RemoteSearchClient {
    pub fn new(config: RemoteSearchConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, config }
    }

    /// Build with a caller-supplied HTTP client, e.g. for a shared connection
    /// pool across requests.
    pub fn with_client(client: reqwest::Client, config: RemoteSearchConfig) -> Self {
        Self { client, config }
    }

    /// Issue a search against the backend with a bounded timeout.
    ///
    /// `filters` supplies the structured facets (`system`, `part`,
    /// `vehicletype`, `faultcode`); any unset field is omitted from the
    /// query. Never blocks past `self.config.timeout`.
    pub async fn search(
        &self,
        query: &str,
        filters: &Hints,
        k: usize,
        options: &SearchOptions,
    ) -> LlmResult<RemoteSearchResponse> {
        let body = build_request_body(query, filters, k, options);
        let url = format!("{}/{}/_search", self.config.base_url.trim_end_matches('/'), self.config.index);

        let send = self.client.post(&url).json(&body).send();
        let response = tokio::time::timeout(self.config.timeout, send)
            .await
            .map_err(|_| LlmError::Timeout(self.config.timeout))??;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Backend { status: status.as_u16(), message });
        }

        let body: Value = response.json().await.map_err(LlmError::Transport)?;
        parse_response(&body)
    }
}

fn build_request_body(query: &str, filters: &Hints, k: usize, options: &SearchOptions) -> Value {
    let mut should = vec![json!({
        "multi_match": {
            "query": query,
            "fields": ["text^2", "system", "part", "tags"],
            "fuzziness": "AUTO",
            "minimum_should_match": "60%"
        }
    })];

    if let (Some(vector), Some(field)) = (&options.query_vector, &options.vector_field) {
        should.push(json!({
            "knn": {
                field: {
                    "vector": vector,
                    "k": options.vector_k,
                    "boost": options.semantic_weight
                }
            }
        }));
    }

    let mut filter_clauses = Vec::new();
    push_term_filter(&mut filter_clauses, "system", filters.system.as_deref());
    push_term_filter(&mut filter_clauses, "part", filters.part.as_deref());
    push_term_filter(&mut filter_clauses, "vehicletype", filters.vehicletype.as_deref());
    push_term_filter(&mut filter_clauses, "faultcode", filters.faultcode.as_deref());

    json!({
        "size": k,
        "query": {
            "bool": {
                "should": should,
                "minimum_should_match": 1,
                "filter": filter_clauses
            }
        }
    })
}

fn push_term_filter(clauses: &mut Vec<Value>, field: &str, value: Option<&str>) {
    if let Some(value) = value {
        if !value.trim().is_empty() {
            clauses.push(json!({ "term": { field: value } }));
        }
    }
}

fn parse_response(body: &Value) -> LlmResult<RemoteSearchResponse> {
    let total = body["hits"]["total"]["value"]
        .as_u64()
        .or_else(|| body["hits"]["total"].as_u64())
        .unwrap_or(0);

    let raw_hits = body["hits"]["hits"]
        .as_array()
        .ok_or_else(|| LlmError::Parse("missing hits.hits array".to_string()))?;

    let hits = raw_hits
        .iter()
        .map(|hit| {
            let id = hit["_id"]
                .as_str()
                .ok_or_else(|| LlmError::Parse("hit missing _id".to_string()))?
                .to_string();
            let score = hit["_score"].as_f64().unwrap_or(0.0) as f32;
            let source = hit["_source"].clone();
            let highlight = hit.get("highlight").cloned();
            Ok(RemoteHit { id, source, score, highlight })
        })
        .collect::<LlmResult<Vec<_>>>()?;

    Ok(RemoteSearchResponse { total, hits })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_request_body_includes_filters() {
        let hints = Hints { system: Some("制动".to_string()), ..Default::default() };
        let body = build_request_body("刹车异响", &hints, 10, &SearchOptions::default());
        assert_eq!(body["size"], 10);
        let filters = body["query"]["bool"]["filter"].as_array().unwrap();
        assert_eq!(filters.len(), 1);
    }

    #[test]
    fn build_request_body_adds_knn_clause_when_vector_present() {
        let options = SearchOptions {
            query_vector: Some(vec![0.1, 0.2]),
            vector_field: Some("embedding".to_string()),
            semantic_weight: 0.5,
            vector_k: 50,
        };
        let body = build_request_body("x", &Hints::default(), 10, &options);
        let should = body["query"]["bool"]["should"].as_array().unwrap();
        assert_eq!(should.len(), 2);
    }

    #[test]
    fn parse_response_extracts_hits() {
        let raw = json!({
            "hits": {
                "total": {"value": 2},
                "hits": [
                    {"_id": "P001", "_score": 1.5, "_source": {"text": "x"}},
                    {"_id": "P002", "_score": 1.0, "_source": {"text": "y"}}
                ]
            }
        });
        let parsed = parse_response(&raw).unwrap();
        assert_eq!(parsed.total, 2);
        assert_eq!(parsed.hits.len(), 2);
        assert_eq!(parsed.hits[0].id, "P001");
    }

    #[test]
    fn parse_response_rejects_missing_hits_array() {
        let raw = json!({ "hits": {} });
        assert!(parse_response(&raw).is_err());
    }
}
