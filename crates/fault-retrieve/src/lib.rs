//! Retrieval primitives for the fault-case knowledge base.
//!
//! This crate implements the two candidate-generation paths that feed the
//! fusion and routing stages of the retrieval service:
//!
//! - **Keyword retrieval** ([`bm25`], [`tfidf`]): an inverted index over
//!   normalized fault-case text, scored with Okapi BM25 (and its BM25L/BM25+
//!   variants) or classic TF-IDF.
//! - **Semantic retrieval** ([`dense`]): cosine-similarity search over dense
//!   case embeddings, either brute-force ([`dense::DenseRetriever`], for
//!   small knowledge bases and tests) or via the HNSW approximate index
//!   ([`dense::hnsw::HNSWIndex`]) for production-sized corpora.
//!
//! [`persistence`] covers loading and saving both index types to disk in a
//! versioned, crash-safe format.
//!
//! # Design
//!
//! This crate focuses on **retrieval** (finding candidates from a single
//! source), not cross-source fusion or calibration -- that lives in the
//! fusion crate. All retrieval functions return `Vec<(u32, f32)>`: case ID
//! paired with a source-local relevance score, sorted descending.
//!
//! # Quick Start
//!
//! ```rust
//! use fault_retrieve::prelude::*;
//!
//! let mut index = InvertedIndex::new();
//! index.add_document(0, &["abs".to_string(), "pump".to_string(), "fault".to_string()]);
//!
//! let query = vec!["abs".to_string(), "pump".to_string()];
//! let results = retrieve_bm25(&index, &query, 10, Bm25Params::default()).unwrap();
//! assert!(!results.is_empty());
//! ```

/// BM25 keyword retrieval: inverted index and Okapi BM25 (plus BM25L/BM25+) scoring.
///
/// Available when the `bm25` feature is enabled.
pub mod bm25;

/// TF-IDF keyword retrieval, reusing the [`bm25::InvertedIndex`] postings.
///
/// Available when the `bm25` feature is enabled.
pub mod tfidf;

/// Dense (embedding) retrieval: brute-force cosine similarity and HNSW ANN search.
///
/// Available when the `dense` feature is enabled.
pub mod dense;

/// Disk persistence for the BM25/TF-IDF and HNSW indexes.
pub mod persistence;

/// SIMD-accelerated vector operations used by dense retrieval and distance computation.
pub mod simd;

/// Error types for retrieval operations.
pub mod error;

pub use error::RetrieveError;

/// Retrieve top-k case IDs using BM25 (or a configured variant) against a keyword index.
///
/// # Example
///
/// ```rust
/// use fault_retrieve::retrieve_bm25;
/// use fault_retrieve::bm25::{Bm25Params, InvertedIndex};
///
/// let mut index = InvertedIndex::new();
/// index.add_document(0, &["the".to_string(), "quick".to_string()]);
///
/// let query = vec!["quick".to_string()];
/// let results = retrieve_bm25(&index, &query, 10, Bm25Params::default()).unwrap();
/// assert!(!results.is_empty());
/// ```
#[cfg(feature = "bm25")]
pub fn retrieve_bm25(
    index: &crate::bm25::InvertedIndex,
    query: &[String],
    k: usize,
    params: crate::bm25::Bm25Params,
) -> Result<Vec<(u32, f32)>, RetrieveError> {
    index.retrieve(query, k, params)
}

/// Retrieve top-k case IDs using TF-IDF against a keyword index.
#[cfg(feature = "bm25")]
pub fn retrieve_tfidf(
    index: &crate::bm25::InvertedIndex,
    query: &[String],
    k: usize,
    params: crate::tfidf::TfIdfParams,
) -> Result<Vec<(u32, f32)>, RetrieveError> {
    crate::tfidf::retrieve_tfidf(index, query, k, params)
}

/// Retrieve top-k case IDs using brute-force dense cosine similarity.
///
/// # Example
///
/// ```rust
/// use fault_retrieve::retrieve_dense;
/// use fault_retrieve::dense::DenseRetriever;
///
/// let mut retriever = DenseRetriever::new();
/// let embedding = vec![1.0, 0.0, 0.0];
/// retriever.add_document(0, embedding);
///
/// let query = [1.0, 0.0, 0.0];
/// let results = retrieve_dense(&retriever, &query, 10).unwrap();
/// assert!(!results.is_empty());
/// ```
#[cfg(feature = "dense")]
pub fn retrieve_dense(
    retriever: &crate::dense::DenseRetriever,
    query: &[f32],
    k: usize,
) -> Result<Vec<(u32, f32)>, RetrieveError> {
    retriever.retrieve(query, k)
}

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::RetrieveError;

    #[cfg(feature = "bm25")]
    pub use crate::{retrieve_bm25, retrieve_tfidf};
    #[cfg(feature = "dense")]
    pub use crate::retrieve_dense;

    #[cfg(feature = "bm25")]
    pub use crate::bm25::{Bm25Params, Bm25Variant, InvertedIndex};
    #[cfg(feature = "bm25")]
    pub use crate::tfidf::TfIdfParams;
    #[cfg(feature = "dense")]
    pub use crate::dense::DenseRetriever;
    #[cfg(all(feature = "dense", feature = "hnsw"))]
    pub use crate::dense::hnsw::{HNSWIndex, HNSWParams};
}

#[cfg(test)]
mod tests {
    #[cfg(feature = "bm25")]
    #[test]
    fn test_bm25_retrieval() {
        use crate::bm25::*;

        let mut index = InvertedIndex::new();
        index.add_document(0, &["test".to_string(), "document".to_string()]);

        let query = vec!["test".to_string()];
        let results = index.retrieve(&query, 10, Bm25Params::default()).unwrap();

        assert!(!results.is_empty());
        assert_eq!(results[0].0, 0);
    }

    #[cfg(all(feature = "dense", feature = "hnsw"))]
    #[test]
    fn test_hnsw_retrieval() {
        use crate::dense::hnsw::HNSWIndex;

        let mut index = HNSWIndex::new(2, 4, 4).unwrap();
        index.add(0, vec![1.0, 0.0]).unwrap();
        index.add(1, vec![0.0, 1.0]).unwrap();
        index.build().unwrap();

        let results = index.search(&[1.0, 0.0], 1, 10).unwrap();
        assert_eq!(results[0].0, 0);
    }
}
