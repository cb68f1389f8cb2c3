//! bpfeq data model.
//!
//! Programs and test vector sets are inputs owned by the pipeline; verdicts
//! are what the cross-validation produces and what gets written to
//! `equivalence.json`.

mod program;
mod verdict;

pub use program::{Program, TestVectorSet, MAPPING_DIR_NAME, VECTORS_DIR_NAME};
pub use verdict::{
    CardinalityCounts, ComparisonVerdict, Direction, EquivalenceResult, Misalignment,
    MismatchPair, MismatchReason, VerdictError, RESULT_VERSION,
};
