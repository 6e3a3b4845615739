//! Error types for fusion operations.

use thiserror::Error;

/// Errors the fusion engine can surface.
///
/// Per-source retrieval failures are not represented here: a source that
/// fails or times out simply contributes nothing to the union passed to
/// [`crate::fuse`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FusionError {
    /// Fusion weights summed to zero even after normalization was attempted.
    ///
    /// [`crate::Weights::normalized`] never returns this on its own (it
    /// falls back to defaults); this variant exists for callers that load
    /// weights from an external source and want to surface the fatal
    /// configuration error described in the service's error handling design.
    #[error("fusion weights sum to zero")]
    DegenerateWeights,
}
