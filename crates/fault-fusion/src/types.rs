//! Candidate data model shared by retrieval, fusion and routing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A record in the fault-case knowledge base.
///
/// `id` is the stable primary key; `text` must be non-empty for any case
/// considered retrievable. `extra` preserves upstream ingestion fields the
/// core does not interpret.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaultCase {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub part: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub vehicletype: Option<String>,
    #[serde(default)]
    pub faultcode: Option<String>,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default, flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl FaultCase {
    /// A case is retrievable once it carries non-empty text.
    pub fn is_retrievable(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Structured hints supplied alongside the free-text query.
///
/// Used by the fusion engine to compute `kg_prior` and by the remote search
/// adapter to build filter clauses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hints {
    pub system: Option<String>,
    pub part: Option<String>,
    pub vehicletype: Option<String>,
    pub faultcode: Option<String>,
    pub model: Option<String>,
    pub year: Option<String>,
}

/// A source that contributed a score to a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Keyword,
    Semantic,
    Remote,
    Rerank,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Keyword => "keyword",
            Source::Semantic => "semantic",
            Source::Remote => "remote",
            Source::Rerank => "rerank",
        }
    }
}

/// An in-flight per-request candidate.
///
/// Created during fan-out with whichever fields its contributing sources
/// populate, mutated in place by the fusion engine, and consumed by the
/// router and response assembler. Never shared between requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub text: String,
    pub system: Option<String>,
    pub part: Option<String>,
    pub tags: Vec<String>,
    pub vehicletype: Option<String>,
    pub faultcode: Option<String>,
    pub popularity: f64,

    /// Raw per-source scores, present only if the source contributed.
    pub bm25_raw: Option<f32>,
    pub cosine_raw: Option<f32>,
    pub rerank_raw: Option<f32>,

    /// Normalized `[0,1]` scores. `0.0` when the source did not contribute.
    pub bm25: f32,
    pub cosine: f32,
    pub rerank: f32,

    /// Structured priors, both in `[0,1]`.
    pub kg_prior: f32,
    pub popularity_norm: f32,

    pub final_score: f32,
    pub sources: BTreeSet<Source>,
    pub why: Vec<String>,
    pub highlight: Option<serde_json::Value>,
}

impl Candidate {
    /// Start a fresh candidate for `case`, with no source contributions yet.
    pub fn from_case(case: &FaultCase) -> Self {
        Self {
            id: case.id.clone(),
            text: case.text.clone(),
            system: case.system.clone(),
            part: case.part.clone(),
            tags: case.tags.clone(),
            vehicletype: case.vehicletype.clone(),
            faultcode: case.faultcode.clone(),
            popularity: case.popularity,
            bm25_raw: None,
            cosine_raw: None,
            rerank_raw: None,
            bm25: 0.0,
            cosine: 0.0,
            rerank: 0.0,
            kg_prior: 0.0,
            popularity_norm: 0.0,
            final_score: 0.0,
            sources: BTreeSet::new(),
            why: Vec::new(),
            highlight: None,
        }
    }
}

/// Fusion weights over the weighted-sum components.
///
/// Defaults match the reference configuration: rerank dominates when
/// available, followed by semantic similarity, lexical match, structured
/// priors and popularity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub rerank: f32,
    pub cosine: f32,
    pub bm25: f32,
    pub kg_prior: f32,
    pub popularity: f32,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            rerank: 0.55,
            cosine: 0.20,
            bm25: 0.10,
            kg_prior: 0.10,
            popularity: 0.05,
        }
    }
}

impl Weights {
    /// Re-normalize so the five components sum to `1`.
    ///
    /// If every weight is zero (e.g. a misconfigured override), restores
    /// [`Weights::default`] rather than dividing by zero.
    pub fn normalized(self) -> Self {
        let sum = self.rerank.max(0.0)
            + self.cosine.max(0.0)
            + self.bm25.max(0.0)
            + self.kg_prior.max(0.0)
            + self.popularity.max(0.0);
        if sum <= f32::EPSILON {
            return Self::default();
        }
        Self {
            rerank: self.rerank.max(0.0) / sum,
            cosine: self.cosine.max(0.0) / sum,
            bm25: self.bm25.max(0.0) / sum,
            kg_prior: self.kg_prior.max(0.0) / sum,
            popularity: self.popularity.max(0.0) / sum,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        let w = Weights::default().normalized();
        let sum = w.rerank + w.cosine + w.bm25 + w.kg_prior + w.popularity;
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn all_zero_weights_fall_back_to_default() {
        let w = Weights {
            rerank: 0.0,
            cosine: 0.0,
            bm25: 0.0,
            kg_prior: 0.0,
            popularity: 0.0,
        }
        .normalized();
        assert_eq!(w, Weights::default().normalized());
    }

    #[test]
    fn negative_weight_is_clamped_not_propagated() {
        let w = Weights {
            rerank: -1.0,
            cosine: 1.0,
            bm25: 0.0,
            kg_prior: 0.0,
            popularity: 0.0,
        }
        .normalized();
        assert_eq!(w.rerank, 0.0);
        assert_eq!(w.cosine, 1.0);
    }
}
