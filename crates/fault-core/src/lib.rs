//! Unified facade for the fault-case retrieval service's core: text
//! normalization, process-wide settings, gray-zone routing and the pipeline
//! orchestrator that ties them together with the retrieval, fusion and LLM
//! crates.
//!
//! # Architecture
//!
//! A request flows through the stages below, implemented leaves-first
//! across this workspace:
//!
//! 1. **Normalize** ([`normalize`]): canonicalize the free-text query.
//! 2. **Retrieve** (`fault-retrieve`): BM25/TF-IDF keyword search and HNSW
//!    semantic search over the local knowledge base.
//! 3. **Remote search / rerank / LLM** (`fault-llm`): optional HTTP-backed
//!    components.
//! 4. **Fuse + calibrate** (`fault-fusion`): merge candidates by id and
//!    compute a weighted final score.
//! 5. **Route** ([`router`]): convert the top score into a decision.
//! 6. **Orchestrate** ([`pipeline`]): drive steps 2-5 end-to-end per request.

pub mod normalize;
pub mod pipeline;
pub mod router;
pub mod settings;

/// Re-exports of the retrieval, fusion and LLM crates under one namespace.
pub mod retrieve {
    pub use fault_retrieve::*;
}

pub mod fusion {
    pub use fault_fusion::*;
}

pub mod llm {
    pub use fault_llm::*;
}

pub use normalize::normalize;
pub use pipeline::{Pipeline, RequestOptions, Response, SourceCall, SourceFuture};
pub use router::{decide, upgrade_with_llm, Decision, Mode};
pub use settings::{ArtifactPaths, LlmSettings, Settings, Thresholds};

pub mod prelude {
    pub use crate::fusion::{Candidate, FaultCase, Hints, Source, Weights};
    pub use crate::llm::{PickerCandidate, PickerClient, PickerConfig, RemoteSearchClient, RerankerClient};
    pub use crate::normalize::normalize;
    pub use crate::pipeline::{Pipeline, RequestOptions, Response, SourceCall};
    pub use crate::router::{decide, Decision, Mode};
    pub use crate::settings::Settings;
}
