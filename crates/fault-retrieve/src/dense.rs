//! Dense approximate nearest neighbor search.
//!
//! Provides a brute-force cosine similarity retriever plus the HNSW index used
//! for large corpora. The brute-force retriever exists mainly for tests and
//! tiny knowledge bases; the semantic retriever in production is backed by
//! [`hnsw::HNSWIndex`].
//!
//! # Design
//!
//! - Indexing: add documents with their dense embeddings (expected L2-normalized).
//! - Retrieval: find nearest neighbors to a query embedding by cosine similarity.

use crate::RetrieveError;

/// Hierarchical Navigable Small World (HNSW) approximate nearest neighbor search.
///
/// Pure Rust implementation with SIMD-accelerated distance computation.
#[cfg(feature = "hnsw")]
pub mod hnsw;

/// Dense retriever using brute-force cosine similarity.
///
/// Suitable for small knowledge bases and as a reference baseline against
/// which [`hnsw::HNSWIndex`] recall can be measured. For corpora beyond a few
/// tens of thousands of cases, use the HNSW index instead.
pub struct DenseRetriever {
    /// Document ID -> embedding vector.
    documents: Vec<(u32, Vec<f32>)>,
}

impl DenseRetriever {
    /// Create a new dense retriever.
    pub fn new() -> Self {
        Self {
            documents: Vec::new(),
        }
    }

    /// Add a document with its dense embedding.
    ///
    /// `embedding` should be L2-normalized for the cosine similarity to fall
    /// within `[-1, 1]`.
    pub fn add_document(&mut self, doc_id: u32, embedding: Vec<f32>) {
        self.documents.push((doc_id, embedding));
    }

    /// Number of documents held by the retriever.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the retriever holds no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Compute cosine similarity between two vectors.
    ///
    /// Assumes vectors are L2-normalized; for normalized vectors cosine
    /// equals the dot product. Uses the SIMD-accelerated dot product when
    /// the `simd` module is compiled in.
    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }
        crate::simd::dot(a, b)
    }

    /// Score a single document against a query embedding.
    pub fn score(&self, doc_id: u32, query_embedding: &[f32]) -> Option<f32> {
        self.documents
            .iter()
            .find(|(id, _)| *id == doc_id)
            .map(|(_, doc_embedding)| Self::cosine_similarity(doc_embedding, query_embedding))
    }

    /// Retrieve the top-k documents for a query embedding, sorted by cosine
    /// similarity descending.
    ///
    /// # Errors
    ///
    /// Returns [`RetrieveError::EmptyQuery`] if `query_embedding` is empty,
    /// [`RetrieveError::EmptyIndex`] if the retriever holds no documents, and
    /// [`RetrieveError::DimensionMismatch`] if a stored embedding's dimension
    /// differs from the query's.
    pub fn retrieve(
        &self,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<(u32, f32)>, RetrieveError> {
        if query_embedding.is_empty() {
            return Err(RetrieveError::EmptyQuery);
        }
        if self.documents.is_empty() {
            return Err(RetrieveError::EmptyIndex);
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_dim = query_embedding.len();
        let mut scored: Vec<(u32, f32)> = Vec::with_capacity(self.documents.len());
        for (doc_id, doc_embedding) in &self.documents {
            if doc_embedding.len() != query_dim {
                return Err(RetrieveError::DimensionMismatch {
                    query_dim,
                    doc_dim: doc_embedding.len(),
                });
            }
            scored.push((*doc_id, Self::cosine_similarity(doc_embedding, query_embedding)));
        }

        scored.sort_unstable_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored.into_iter().take(k).collect())
    }
}

impl Default for DenseRetriever {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_retrieval() {
        let mut retriever = DenseRetriever::new();
        retriever.add_document(0, vec![1.0, 0.0]);
        retriever.add_document(1, vec![0.707, 0.707]);

        let query = vec![1.0, 0.0];
        let results = retriever.retrieve(&query, 10).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 0);
        assert!((results[0].1 - 1.0).abs() < 0.001);
        assert!((results[1].1 - 0.707).abs() < 0.01);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut retriever = DenseRetriever::new();
        retriever.add_document(0, vec![1.0, 0.0, 0.0]);
        let err = retriever.retrieve(&[1.0, 0.0], 10).unwrap_err();
        assert!(matches!(err, RetrieveError::DimensionMismatch { .. }));
    }
}
