//! Disk persistence for the knowledge base's retrieval indexes.
//!
//! Covers the two on-disk artifacts the fault retrieval service loads at
//! startup and rebuilds on demand:
//! - the BM25/TF-IDF inverted index (postings plus document-frequency tables)
//! - the HNSW dense index (SoA vector storage plus graph layers) and its
//!   sidecar mapping between case IDs and HNSW internal IDs
//!
//! # Design
//!
//! - **Format versioning**: every artifact is prefixed with a format header
//!   so an incompatible on-disk version is rejected rather than misread.
//! - **Directory layout**: a fixed layout under one base directory so the
//!   whole knowledge base snapshot can be copied or swapped atomically.

pub mod directory;
pub mod format;
pub mod error;

#[cfg(feature = "persistence")]
pub mod codec;

#[cfg(all(feature = "persistence", feature = "dense"))]
pub mod dense;

#[cfg(all(feature = "persistence", feature = "hnsw"))]
pub mod hnsw;

pub use error::PersistenceError;
