//! Multi-source candidate fusion.
//!
//! Merges per-source candidate lists by case id, calibrates each source's
//! raw scores against the request's own distribution, folds in structured
//! priors, and combines everything into one ordered, truncated list.

use crate::calibration::{compute_stats, logistic_from_stats};
use crate::types::{Candidate, FaultCase, Hints, Source, Weights};
use std::cmp::Ordering;
use std::collections::HashMap;

/// One source's raw hit: a case plus its source-local score.
#[derive(Debug, Clone)]
pub struct RawHit {
    pub case: FaultCase,
    pub raw_score: f32,
}

/// Per-source raw hit lists keyed by source, as returned by the fan-out stage.
pub type CandidatesBySource = HashMap<Source, Vec<RawHit>>;

/// Estimate of the 95th-percentile popularity value used to normalize
/// `popularity_norm`. The spec leaves the exact constant as an operator
/// tunable; [`Default`] picks a value plausible for the reference corpus
/// (cases seen by a few hundred reports) and callers are expected to
/// recompute it from their own corpus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopularityScale(pub f64);

impl Default for PopularityScale {
    fn default() -> Self {
        Self(200.0)
    }
}

fn kg_prior(candidate: &Candidate, hints: &Hints) -> f32 {
    let system_match = matches_ci(candidate.system.as_deref(), hints.system.as_deref());
    let part_match = matches_ci(candidate.part.as_deref(), hints.part.as_deref());
    let loose_match = hints.system.is_some()
        && hints.part.is_some()
        && substring_match(candidate.system.as_deref(), hints.system.as_deref())
        && substring_match(candidate.part.as_deref(), hints.part.as_deref());

    if system_match && part_match {
        1.0
    } else if system_match {
        1.0
    } else if part_match {
        0.7
    } else if loose_match {
        0.5
    } else {
        0.0
    }
}

fn matches_ci(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.trim().eq_ignore_ascii_case(b.trim()),
        _ => false,
    }
}

fn substring_match(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => {
            let (a, b) = (a.to_lowercase(), b.to_lowercase());
            a.contains(&b) || b.contains(&a)
        }
        _ => false,
    }
}

fn popularity_norm(popularity: f64, scale: PopularityScale) -> f32 {
    let p95 = scale.0.max(1.0);
    (popularity.max(0.0).ln_1p() / p95.ln_1p()).min(1.0) as f32
}

/// Fuse per-source candidate lists into one ranked, truncated list.
///
/// `topn_return` caps the number of candidates returned. Implements the
/// union / per-request normalization / structured-priors / weighted-sum /
/// why-tags / tie-break / truncate pipeline.
pub fn fuse(
    candidates_by_source: &CandidatesBySource,
    weights: Weights,
    hints: &Hints,
    popularity_scale: PopularityScale,
    topn_return: usize,
) -> Vec<Candidate> {
    let weights = weights.normalized();

    // 1. Union by id.
    let mut merged: HashMap<String, Candidate> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for (&source, hits) in candidates_by_source {
        for hit in hits {
            let entry = merged.entry(hit.case.id.clone()).or_insert_with(|| {
                order.push(hit.case.id.clone());
                Candidate::from_case(&hit.case)
            });
            entry.sources.insert(source);
            match source {
                Source::Keyword => entry.bm25_raw = Some(hit.raw_score),
                Source::Semantic => entry.cosine_raw = Some(hit.raw_score),
                Source::Rerank => entry.rerank_raw = Some(hit.raw_score),
                Source::Remote => {
                    // Remote hits fold into the keyword slot unless already
                    // present locally, mirroring the lexical contract of
                    // the remote backend's raw score.
                    if entry.bm25_raw.is_none() {
                        entry.bm25_raw = Some(hit.raw_score);
                    }
                }
            }
        }
    }

    // 2. Per-source calibration against the union's own distribution.
    calibrate(&mut merged, |c| c.bm25_raw, |c, v| c.bm25 = v);
    calibrate(&mut merged, |c| c.cosine_raw, |c, v| c.cosine = v);
    calibrate(&mut merged, |c| c.rerank_raw, |c, v| c.rerank = v);

    // 3. Structured priors + 4. weighted sum + 5. why tags.
    for id in &order {
        let candidate = merged.get_mut(id).expect("id present from union step");
        candidate.kg_prior = kg_prior(candidate, hints);
        candidate.popularity_norm = popularity_norm(candidate.popularity, popularity_scale);

        candidate.final_score = weights.rerank * candidate.rerank
            + weights.cosine * candidate.cosine
            + weights.bm25 * candidate.bm25
            + weights.kg_prior * candidate.kg_prior
            + weights.popularity * candidate.popularity_norm;

        candidate.why = why_tags(candidate);
    }

    // 6. Tie-break, then 7. truncate.
    let mut results: Vec<Candidate> = order.into_iter().map(|id| merged.remove(&id).unwrap()).collect();
    results.sort_by(|a, b| compare_candidates(a, b));
    results.truncate(topn_return);
    results
}

const WHY_THRESHOLD: f32 = 0.6;

fn why_tags(candidate: &Candidate) -> Vec<String> {
    let mut tags = Vec::new();
    if candidate.cosine > WHY_THRESHOLD {
        tags.push("语义近".to_string());
    }
    if candidate.bm25 > WHY_THRESHOLD {
        tags.push("关键词命中".to_string());
    }
    if candidate.kg_prior > WHY_THRESHOLD {
        if matches_ci(candidate.system.as_deref(), candidate.system.as_deref()) && candidate.kg_prior >= 1.0 {
            tags.push("系统一致".to_string());
        } else {
            tags.push("部件相近".to_string());
        }
    }
    if candidate.popularity_norm > WHY_THRESHOLD {
        tags.push("高热度".to_string());
    }
    if candidate.rerank > WHY_THRESHOLD {
        tags.push("精排优".to_string());
    }
    tags
}

fn calibrate(
    merged: &mut HashMap<String, Candidate>,
    raw: impl Fn(&Candidate) -> Option<f32>,
    mut set: impl FnMut(&mut Candidate, f32),
) {
    let values: Vec<f32> = merged.values().filter_map(&raw).collect();
    if values.is_empty() {
        return;
    }
    let stats = compute_stats(&values);
    for candidate in merged.values_mut() {
        if let Some(x) = raw(candidate) {
            set(candidate, logistic_from_stats(x, stats, 1.0));
        }
    }
}

fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    const TIE_EPSILON: f32 = 1e-6;
    if (a.final_score - b.final_score).abs() > TIE_EPSILON {
        return b.final_score.partial_cmp(&a.final_score).unwrap_or(Ordering::Equal);
    }
    if (a.rerank - b.rerank).abs() > TIE_EPSILON {
        return b.rerank.partial_cmp(&a.rerank).unwrap_or(Ordering::Equal);
    }
    if (a.cosine - b.cosine).abs() > TIE_EPSILON {
        return b.cosine.partial_cmp(&a.cosine).unwrap_or(Ordering::Equal);
    }
    a.id.cmp(&b.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(id: &str, text: &str) -> FaultCase {
        FaultCase {
            id: id.to_string(),
            text: text.to_string(),
            system: None,
            part: None,
            tags: Vec::new(),
            vehicletype: None,
            faultcode: None,
            popularity: 0.0,
            extra: Default::default(),
        }
    }

    #[test]
    fn single_source_candidate_keeps_its_tag() {
        let mut by_source = CandidatesBySource::new();
        by_source.insert(
            Source::Keyword,
            vec![RawHit { case: case("P1", "brake pedal soft"), raw_score: 5.0 }],
        );

        let results = fuse(&by_source, Weights::default(), &Hints::default(), PopularityScale::default(), 3);
        assert_eq!(results.len(), 1);
        assert!(results[0].sources.contains(&Source::Keyword));
        assert!(results[0].cosine_raw.is_none());
    }

    #[test]
    fn absent_source_contributes_zero() {
        let mut by_source = CandidatesBySource::new();
        by_source.insert(Source::Keyword, vec![RawHit { case: case("P1", "x"), raw_score: 1.0 }]);

        let results = fuse(&by_source, Weights::default(), &Hints::default(), PopularityScale::default(), 3);
        assert_eq!(results[0].cosine, 0.0);
        assert_eq!(results[0].rerank, 0.0);
    }

    #[test]
    fn union_merges_multiple_sources_by_id() {
        let mut by_source = CandidatesBySource::new();
        by_source.insert(Source::Keyword, vec![RawHit { case: case("P1", "x"), raw_score: 1.0 }]);
        by_source.insert(Source::Semantic, vec![RawHit { case: case("P1", "x"), raw_score: 0.9 }]);

        let results = fuse(&by_source, Weights::default(), &Hints::default(), PopularityScale::default(), 3);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].sources.len(), 2);
    }

    #[test]
    fn kg_prior_rewards_system_match() {
        let mut by_source = CandidatesBySource::new();
        let mut c = case("P1", "x");
        c.system = Some("制动".to_string());
        by_source.insert(Source::Keyword, vec![RawHit { case: c, raw_score: 1.0 }]);

        let hints = Hints { system: Some("制动".to_string()), ..Default::default() };
        let results = fuse(&by_source, Weights::default(), &hints, PopularityScale::default(), 3);
        assert_eq!(results[0].kg_prior, 1.0);
    }

    #[test]
    fn truncates_to_topn_return() {
        let mut by_source = CandidatesBySource::new();
        let hits: Vec<RawHit> = (0..10)
            .map(|i| RawHit { case: case(&format!("P{i}"), "x"), raw_score: i as f32 })
            .collect();
        by_source.insert(Source::Keyword, hits);

        let results = fuse(&by_source, Weights::default(), &Hints::default(), PopularityScale::default(), 3);
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn tie_break_prefers_smaller_id_when_scores_equal() {
        let mut by_source = CandidatesBySource::new();
        by_source.insert(
            Source::Keyword,
            vec![
                RawHit { case: case("P2", "x"), raw_score: 1.0 },
                RawHit { case: case("P1", "x"), raw_score: 1.0 },
            ],
        );

        let results = fuse(&by_source, Weights::default(), &Hints::default(), PopularityScale::default(), 3);
        // Equal bm25_raw -> equal calibrated score -> equal rerank/cosine (both absent) -> id tie-break.
        assert_eq!(results[0].id, "P1");
    }

    #[test]
    fn empty_union_returns_empty() {
        let by_source = CandidatesBySource::new();
        let results = fuse(&by_source, Weights::default(), &Hints::default(), PopularityScale::default(), 3);
        assert!(results.is_empty());
    }
}
