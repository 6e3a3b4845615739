//! Pipeline orchestrator.
//!
//! Drives a single request end-to-end: normalize → fan out to retrieval
//! sources under a shared deadline → fuse → optionally rerank and re-fuse →
//! route → optionally invoke the LLM picker → assemble the response.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use fault_fusion::{fuse, CandidatesBySource, Candidate, Hints, PopularityScale, RawHit, Source, Weights};
use fault_llm::{PickerCandidate, PickerClient, RerankerClient};
use tokio::task::JoinSet;

use crate::normalize::normalize;
use crate::router::{decide, upgrade_with_llm, Decision, Mode};
use crate::settings::Thresholds;

/// Per-source retrieval deadline (spec §5 default).
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_millis(1500);
/// Number of top merged candidates submitted to the reranker (spec §4.11 default).
pub const DEFAULT_K_RERANK: usize = 20;
/// Number of candidates returned to the caller (spec §4.11 default).
pub const DEFAULT_TOPN_RETURN: usize = 3;
/// Number of candidates submitted to the LLM picker when it is invoked.
pub const DEFAULT_LLM_TOPN: usize = 5;

/// A boxed, independently awaitable retrieval call. `'static + Send` so it
/// can be driven inside a [`JoinSet`]; callers own whatever retriever state
/// the closure captures (an `Arc`'d index, an HTTP client, ...).
pub type SourceFuture = Pin<Box<dyn Future<Output = Result<Vec<RawHit>, String>> + Send>>;

/// One retrieval source to fan out to, paired with the [`Source`] tag its
/// hits should be recorded under.
pub struct SourceCall {
    pub source: Source,
    pub future: SourceFuture,
}

impl SourceCall {
    pub fn new(source: Source, future: SourceFuture) -> Self {
        Self { source, future }
    }
}

/// Per-request knobs, mirroring the `/match` and `/opensearch/match`
/// reference parameters (spec §6) without committing to an HTTP surface.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub topn_return: usize,
    pub k_rerank: usize,
    pub use_llm: bool,
    pub llm_topn: usize,
    pub popularity_scale: PopularityScale,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            topn_return: DEFAULT_TOPN_RETURN,
            k_rerank: DEFAULT_K_RERANK,
            use_llm: false,
            llm_topn: DEFAULT_LLM_TOPN,
            popularity_scale: PopularityScale::default(),
        }
    }
}

/// The assembled response for one request.
#[derive(Debug, Clone)]
pub struct Response {
    pub query: String,
    pub total: usize,
    pub top: Vec<Candidate>,
    pub decision: Decision,
    pub sources_used: Vec<Source>,
}

/// Drives requests through normalize → fan-out → fuse → route → (LLM).
pub struct Pipeline {
    pub thresholds: Thresholds,
    pub fusion_weights: Weights,
    pub reranker: Option<RerankerClient>,
    pub picker: Option<PickerClient>,
    pub source_timeout: Duration,
}

impl Pipeline {
    pub fn new(thresholds: Thresholds, fusion_weights: Weights) -> Self {
        Self {
            thresholds,
            fusion_weights,
            reranker: None,
            picker: None,
            source_timeout: DEFAULT_SOURCE_TIMEOUT,
        }
    }

    pub fn with_reranker(mut self, reranker: RerankerClient) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn with_picker(mut self, picker: PickerClient) -> Self {
        self.picker = Some(picker);
        self
    }

    /// Handle one request.
    ///
    /// Step 1 (empty query) and step 3 (all sources failed) both short
    /// circuit to `no_match`, per spec §4.11. Retriever, reranker and LLM
    /// failures are logged and degrade the pipeline rather than aborting it.
    pub async fn handle_request(
        &self,
        query: &str,
        hints: Hints,
        sources: Vec<SourceCall>,
        options: RequestOptions,
    ) -> Response {
        let normalized = normalize(query);
        if normalized.trim().is_empty() {
            return Response {
                query: normalized,
                total: 0,
                top: Vec::new(),
                decision: Decision {
                    mode: Mode::NoMatch,
                    chosen_id: None,
                    confidence: 0.0,
                    reason: "empty query".to_string(),
                    llm: None,
                },
                sources_used: Vec::new(),
            };
        }

        let attempted = sources.len();
        let by_source = self.fan_out(sources).await;

        if by_source.is_empty() && attempted > 0 {
            return Response {
                query: normalized,
                total: 0,
                top: Vec::new(),
                decision: Decision {
                    mode: Mode::NoMatch,
                    chosen_id: None,
                    confidence: 0.0,
                    reason: "all sources failed".to_string(),
                    llm: None,
                },
                sources_used: Vec::new(),
            };
        }

        let sources_used: Vec<Source> = by_source.keys().copied().collect();

        let mut fused = fuse(&by_source, self.fusion_weights, &hints, options.popularity_scale, usize::MAX);
        self.rerank_top(&normalized, &mut fused, &options).await;

        let reranked_union = to_candidates_by_source(&by_source, &fused);
        let mut fused = fuse(&reranked_union, self.fusion_weights, &hints, options.popularity_scale, usize::MAX);

        let total = fused.len();
        let mut decision = decide(&fused, self.thresholds);

        if decision.mode == Mode::Gray && options.use_llm {
            if let Some(picker) = &self.picker {
                let picker_candidates: Vec<PickerCandidate> = fused
                    .iter()
                    .take(options.llm_topn)
                    .map(|c| PickerCandidate {
                        id: c.id.clone(),
                        text: c.text.clone(),
                        system: c.system.clone(),
                        part: c.part.clone(),
                    })
                    .collect();

                match picker.pick(&normalized, &picker_candidates).await {
                    Ok(pick) => decision = upgrade_with_llm(decision, pick),
                    Err(e) => {
                        tracing::warn!(error = %e, "llm picker failed, keeping base gray decision");
                        decision.llm = Some(crate::router::LlmInfo {
                            chosen_id: None,
                            confidence: 0.0,
                            reason: format!("llm error: {e}"),
                        });
                    }
                }
            }
        }

        fused.truncate(options.topn_return);

        Response { query: normalized, total, top: fused, decision, sources_used }
    }

    async fn fan_out(&self, sources: Vec<SourceCall>) -> CandidatesBySource {
        let mut join_set = JoinSet::new();
        for SourceCall { source, future } in sources {
            let timeout = self.source_timeout;
            join_set.spawn(async move {
                let result = tokio::time::timeout(timeout, future)
                    .await
                    .map_err(|_| "timed out".to_string())
                    .and_then(|r| r);
                (source, result)
            });
        }

        let mut by_source = CandidatesBySource::new();
        while let Some(joined) = join_set.join_next().await {
            let (source, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(error = %e, "retrieval task panicked");
                    continue;
                }
            };
            match result {
                Ok(hits) => {
                    by_source.insert(source, hits);
                }
                Err(reason) => {
                    tracing::warn!(source = source.as_str(), reason = %reason, "retriever failed, omitting from fusion");
                }
            }
        }
        by_source
    }

    async fn rerank_top(&self, query: &str, fused: &mut [Candidate], options: &RequestOptions) {
        let Some(reranker) = &self.reranker else { return };
        let window = fused.len().min(options.k_rerank);
        if window == 0 {
            return;
        }

        let texts: Vec<String> = fused[..window].iter().map(|c| c.text.clone()).collect();
        match reranker.score(query, &texts).await {
            Ok(scores) if scores.len() == window => {
                for (candidate, score) in fused[..window].iter_mut().zip(scores) {
                    candidate.rerank_raw = Some(score);
                }
            }
            Ok(_) => {
                tracing::warn!("reranker returned a mismatched score count, skipping rerank");
            }
            Err(e) => {
                tracing::warn!(error = %e, "reranker failed, falling back to fusion without rerank");
            }
        }
    }
}

/// Rebuild a per-source union for re-fusion after reranking, folding the
/// now-populated `rerank_raw` values in as a synthetic `Source::Rerank`
/// contribution alongside the original sources' raw scores.
fn to_candidates_by_source(original: &CandidatesBySource, fused: &[Candidate]) -> CandidatesBySource {
    let mut union = original.clone();

    let rerank_hits: Vec<RawHit> = fused
        .iter()
        .filter_map(|c| {
            c.rerank_raw.map(|raw| RawHit {
                case: fault_fusion::FaultCase {
                    id: c.id.clone(),
                    text: c.text.clone(),
                    system: c.system.clone(),
                    part: c.part.clone(),
                    tags: c.tags.clone(),
                    vehicletype: c.vehicletype.clone(),
                    faultcode: c.faultcode.clone(),
                    popularity: c.popularity,
                    extra: Default::default(),
                },
                raw_score: raw,
            })
        })
        .collect();

    if !rerank_hits.is_empty() {
        union.insert(Source::Rerank, rerank_hits);
    }

    union
}

#[cfg(test)]
mod tests {
    use super::*;
    use fault_fusion::FaultCase;

    fn case(id: &str) -> FaultCase {
        FaultCase {
            id: id.to_string(),
            text: "发动机异响".to_string(),
            system: None,
            part: None,
            tags: Vec::new(),
            vehicletype: None,
            faultcode: None,
            popularity: 0.0,
            extra: Default::default(),
        }
    }

    #[tokio::test]
    async fn empty_query_short_circuits_to_no_match() {
        let pipeline = Pipeline::new(Thresholds::default(), Weights::default());
        let response = pipeline.handle_request("   ", Hints::default(), Vec::new(), RequestOptions::default()).await;
        assert_eq!(response.decision.mode, Mode::NoMatch);
        assert_eq!(response.decision.reason, "empty query");
    }

    #[tokio::test]
    async fn all_sources_failing_yields_no_match() {
        let pipeline = Pipeline::new(Thresholds::default(), Weights::default());
        let failing: SourceFuture = Box::pin(async { Err::<Vec<RawHit>, _>("boom".to_string()) });
        let sources = vec![SourceCall::new(Source::Keyword, failing)];
        let response = pipeline.handle_request("异响", Hints::default(), sources, RequestOptions::default()).await;
        assert_eq!(response.decision.mode, Mode::NoMatch);
        assert_eq!(response.decision.reason, "all sources failed");
    }

    #[tokio::test]
    async fn partial_failure_still_produces_a_response() {
        let pipeline = Pipeline::new(Thresholds::default(), Weights::default());
        let ok_hit: SourceFuture =
            Box::pin(async { Ok(vec![RawHit { case: case("P001"), raw_score: 5.0 }]) });
        let failing: SourceFuture = Box::pin(async { Err::<Vec<RawHit>, _>("timeout".to_string()) });
        let sources = vec![
            SourceCall::new(Source::Keyword, ok_hit),
            SourceCall::new(Source::Semantic, failing),
        ];
        let response = pipeline.handle_request("异响", Hints::default(), sources, RequestOptions::default()).await;
        assert_eq!(response.sources_used, vec![Source::Keyword]);
        assert!(!response.top.is_empty());
    }
}
