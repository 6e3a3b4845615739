//! Errors from remote search, reranking and LLM adjudication.

use thiserror::Error;

/// Errors surfaced by the crate's HTTP-backed components.
///
/// Per the service's failure semantics, none of these are meant to abort a
/// request outright: callers degrade a [`LlmError`] to a base gray decision,
/// a reranker error to fusion without rerank, and a remote-search error to
/// an omitted source, exactly as a retriever failure is handled.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The call did not complete before its deadline.
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Network-level failure (connection refused, DNS, TLS, etc).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend returned a non-success HTTP status.
    #[error("backend returned status {status}: {message}")]
    Backend { status: u16, message: String },

    /// The response body could not be parsed into the expected shape.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Invalid configuration (missing API key, empty base URL, ...).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type used across the crate.
pub type LlmResult<T> = Result<T, LlmError>;
