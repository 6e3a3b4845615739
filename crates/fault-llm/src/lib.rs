//! HTTP-backed components of the fault-case retrieval service: the remote
//! search adapter, the cross-encoder reranker client, the embedding
//! encoder, and the closed-set LLM picker.
//!
//! None of these have a native Rust implementation worth shipping (a real
//! OpenSearch cluster, cross-encoder model server, embeddings endpoint, or
//! chat-completions backend is expected to be reachable over HTTP); the
//! crate's job is issuing those requests with bounded timeouts and
//! degrading safely when they fail.

pub mod embed;
pub mod error;
pub mod picker;
pub mod remote;
pub mod rerank;

pub use embed::{EmbeddingConfig, EmbeddingEncoder, LazyEncoder};
pub use error::{LlmError, LlmResult};
pub use picker::{PickerCandidate, PickerClient, PickerConfig, PickerDecision};
pub use remote::{RemoteHit, RemoteSearchClient, RemoteSearchConfig, RemoteSearchResponse, SearchOptions};
pub use rerank::{RerankerClient, RerankerConfig};

/// Re-exports for glob-importing the crate's common surface.
pub mod prelude {
    pub use crate::embed::{EmbeddingConfig, EmbeddingEncoder, LazyEncoder};
    pub use crate::error::{LlmError, LlmResult};
    pub use crate::picker::{PickerCandidate, PickerClient, PickerConfig, PickerDecision};
    pub use crate::remote::{RemoteHit, RemoteSearchClient, RemoteSearchConfig, RemoteSearchResponse, SearchOptions};
    pub use crate::rerank::{RerankerClient, RerankerConfig};
}
