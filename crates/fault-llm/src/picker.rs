//! Closed-set LLM picker.
//!
//! Submits a bounded, truncated candidate list to a chat-completions style
//! backend and constrains the result to either one of the supplied ids or
//! the literal string `UNKNOWN`. The backend is never trusted: any response
//! that does not name a submitted id is coerced to `UNKNOWN` rather than
//! propagated.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{LlmError, LlmResult};

/// Candidates truncate to this many characters before prompting.
pub const MAX_CANDIDATE_LEN: usize = 200;
/// The query truncates to this many characters before prompting.
pub const MAX_QUERY_LEN: usize = 200;
/// Default number of candidates submitted to the picker.
pub const DEFAULT_CANDIDATE_CAP: usize = 5;
/// Default picker timeout (spec §5: LLM defaults to 20s).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Sentinel the picker returns when it cannot, or should not, commit to a
/// candidate.
pub const UNKNOWN: &str = "UNKNOWN";

/// Configuration for the picker's backend.
#[derive(Debug, Clone)]
pub struct PickerConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
    pub candidate_cap: usize,
}

impl PickerConfig {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
            candidate_cap: DEFAULT_CANDIDATE_CAP,
        }
    }
}

/// A candidate offered to the picker.
#[derive(Debug, Clone)]
pub struct PickerCandidate {
    pub id: String,
    pub text: String,
    pub system: Option<String>,
    pub part: Option<String>,
}

/// The picker's structured decision.
#[derive(Debug, Clone, PartialEq)]
pub struct PickerDecision {
    /// One of the submitted ids, or `None` meaning [`UNKNOWN`].
    pub chosen_id: Option<String>,
    pub confidence: f32,
    pub reason: String,
}

impl PickerDecision {
    fn unknown(reason: impl Into<String>) -> Self {
        Self { chosen_id: None, confidence: 0.0, reason: reason.into() }
    }
}

#[derive(Debug, Deserialize)]
struct RawPick {
    #[serde(default)]
    chosen_id: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    reason: Option<String>,
}

/// HTTP client for the closed-set picker.
pub struct PickerClient {
    client: reqwest::Client,
    config: PickerConfig,
}

impl PickerClient {
    pub fn new(config: PickerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, config }
    }

    pub fn with_client(client: reqwest::Client, config: PickerConfig) -> Self {
        Self { client, config }
    }

    /// Ask the backend to pick one of `candidates` for `query`.
    ///
    /// Never returns an error for a malformed or out-of-set backend
    /// response: those degrade to [`PickerDecision::unknown`] per the
    /// closed-set contract. Transport failures and timeouts are still
    /// reported as [`LlmError`] so the caller can log them distinctly,
    /// but the caller is expected to degrade those to a gray decision too.
    pub async fn pick(&self, query: &str, candidates: &[PickerCandidate]) -> LlmResult<PickerDecision> {
        let truncated_query = truncate(query, MAX_QUERY_LEN);
        let capped: Vec<&PickerCandidate> = candidates.iter().take(self.config.candidate_cap).collect();
        let allowed_ids: std::collections::HashSet<&str> = capped.iter().map(|c| c.id.as_str()).collect();

        let body = build_request_body(&self.config.model, &truncated_query, &capped);
        let url = format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'));

        let send = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send();

        let response = match tokio::time::timeout(self.config.timeout, send).await {
            Ok(result) => result?,
            Err(_) => return Err(LlmError::Timeout(self.config.timeout)),
        };

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Backend { status: status.as_u16(), message });
        }

        let body: serde_json::Value = response.json().await.map_err(LlmError::Transport)?;
        Ok(parse_decision(&body, &allowed_ids))
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

fn build_request_body(model: &str, query: &str, candidates: &[&PickerCandidate]) -> serde_json::Value {
    let candidate_lines: Vec<serde_json::Value> = candidates
        .iter()
        .map(|c| {
            json!({
                "id": c.id,
                "text": truncate(&c.text, MAX_CANDIDATE_LEN),
                "system": c.system,
                "part": c.part,
            })
        })
        .collect();

    let system_prompt = "You match a fault report to exactly one candidate case, or UNKNOWN if none fit. \
         Respond with JSON: {\"chosen_id\": <one id or \"UNKNOWN\">, \"confidence\": <0..1>, \"reason\": <short string>}.";

    json!({
        "model": model,
        "response_format": { "type": "json_object" },
        "messages": [
            { "role": "system", "content": system_prompt },
            { "role": "user", "content": json!({ "query": query, "candidates": candidate_lines }).to_string() }
        ]
    })
}

fn parse_decision(body: &serde_json::Value, allowed_ids: &std::collections::HashSet<&str>) -> PickerDecision {
    let content = body["choices"][0]["message"]["content"].as_str();
    let Some(content) = content else {
        return PickerDecision::unknown("llm parse failure");
    };

    let raw: RawPick = match serde_json::from_str(content) {
        Ok(raw) => raw,
        Err(_) => return PickerDecision::unknown("llm parse failure"),
    };

    let confidence = raw.confidence.unwrap_or(0.0).clamp(0.0, 1.0);
    let reason = raw.reason.unwrap_or_default();

    match raw.chosen_id.as_deref() {
        Some(id) if id == UNKNOWN => PickerDecision { chosen_id: None, confidence: 0.0, reason },
        Some(id) if allowed_ids.contains(id) => {
            PickerDecision { chosen_id: Some(id.to_string()), confidence, reason }
        }
        _ => PickerDecision::unknown("llm parse failure"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn response_with_content(content: &str) -> serde_json::Value {
        json!({ "choices": [ { "message": { "content": content } } ] })
    }

    #[test]
    fn parses_valid_pick_from_allowed_set() {
        let allowed: HashSet<&str> = ["P001", "P002"].into_iter().collect();
        let body = response_with_content(r#"{"chosen_id":"P001","confidence":0.8,"reason":"best match"}"#);
        let decision = parse_decision(&body, &allowed);
        assert_eq!(decision.chosen_id, Some("P001".to_string()));
        assert_eq!(decision.confidence, 0.8);
    }

    #[test]
    fn coerces_unknown_literal_to_none() {
        let allowed: HashSet<&str> = ["P001"].into_iter().collect();
        let body = response_with_content(r#"{"chosen_id":"UNKNOWN","confidence":0.0,"reason":"no fit"}"#);
        let decision = parse_decision(&body, &allowed);
        assert_eq!(decision.chosen_id, None);
    }

    #[test]
    fn rejects_id_outside_allowed_set() {
        let allowed: HashSet<&str> = ["P001"].into_iter().collect();
        let body = response_with_content(r#"{"chosen_id":"P999","confidence":0.9,"reason":"x"}"#);
        let decision = parse_decision(&body, &allowed);
        assert_eq!(decision.chosen_id, None);
        assert_eq!(decision.confidence, 0.0);
        assert_eq!(decision.reason, "llm parse failure");
    }

    #[test]
    fn malformed_json_degrades_to_unknown() {
        let allowed: HashSet<&str> = ["P001"].into_iter().collect();
        let body = response_with_content("not json at all");
        let decision = parse_decision(&body, &allowed);
        assert_eq!(decision.chosen_id, None);
        assert_eq!(decision.confidence, 0.0);
        assert_eq!(decision.reason, "llm parse failure");
    }

    #[test]
    fn missing_content_degrades_to_unknown() {
        let allowed: HashSet<&str> = ["P001"].into_iter().collect();
        let body = json!({ "choices": [] });
        let decision = parse_decision(&body, &allowed);
        assert_eq!(decision.chosen_id, None);
    }

    #[test]
    fn truncate_respects_char_boundaries_not_bytes() {
        let s = "制动踏板变软，制动距离变长";
        let truncated = truncate(s, 3);
        assert_eq!(truncated.chars().count(), 3);
    }

    #[test]
    fn confidence_is_clamped_to_unit_interval() {
        let allowed: HashSet<&str> = ["P001"].into_iter().collect();
        let body = response_with_content(r#"{"chosen_id":"P001","confidence":5.0,"reason":"x"}"#);
        let decision = parse_decision(&body, &allowed);
        assert_eq!(decision.confidence, 1.0);
    }
}
