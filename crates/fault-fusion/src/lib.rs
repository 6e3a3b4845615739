//! Candidate data model, per-request score calibration and multi-source
//! fusion for the fault-case retrieval service.
//!
//! [`fuse`] is the crate's entry point: it takes one raw hit list per
//! retrieval source, merges them by case id, calibrates each source's raw
//! scores against the request's own distribution ([`calibration`]), folds in
//! structured priors, and returns one ranked, truncated [`Candidate`] list.

pub mod calibration;
pub mod error;
pub mod fusion;
pub mod types;

pub use error::FusionError;
pub use fusion::{fuse, CandidatesBySource, PopularityScale, RawHit};
pub use types::{Candidate, FaultCase, Hints, Source, Weights};

/// Re-exports for glob-importing the crate's common surface.
pub mod prelude {
    pub use crate::calibration::{compute_stats, logistic_from_stats, normalize_weight_mapping, Stats};
    pub use crate::error::FusionError;
    pub use crate::fusion::{fuse, CandidatesBySource, PopularityScale, RawHit};
    pub use crate::types::{Candidate, FaultCase, Hints, Source, Weights};
}
