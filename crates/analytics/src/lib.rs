//! Metric extraction and reconciliation over untyped ESP responses.
//!
//! Pure, synchronous code: nothing in this crate performs I/O.

#![warn(clippy::unwrap_used)]

pub mod aliases;
pub mod deep_field;
pub mod extractor;
pub mod finalizer;
pub mod numeric;
pub mod scorer;
pub mod text;

pub use aliases::MetricField;
pub use extractor::{AnalyticsExtractor, Candidate, CandidateKind};
pub use finalizer::finalize;
pub use scorer::{reconcile, CandidateScore, Reconciliation};
