//! bpfeq cross-validation core.
//!
//! Two programs are equivalent when, on the test vectors generated from
//! *each* of them, both produce structurally identical outputs:
//!
//! - [`diff`] compares two structured documents
//! - [`matcher`] pairs the artifacts of two output directories
//! - [`validator`] runs both programs on one vector set and compares
//! - [`orchestrator`] runs the forward and reverse directions

pub mod config;
pub mod diff;
pub mod executor;
pub mod matcher;
pub mod orchestrator;
pub mod validator;

pub use config::{Pairing, ValidationConfig, DEFAULT_MAX_DIFFERENCES, DEFAULT_VECTOR_ID_KEY};
pub use diff::{diff_documents, documents_equal, parse_document, DiffError, DiffKind, DiffReport, Difference};
pub use executor::{ExecutorCall, ExecutorError, MockExecutor, ProcessExecutor, ProgramExecutor};
pub use matcher::{match_artifacts, ArtifactPair, MatchError, MatchedArtifacts};
pub use orchestrator::{check_equivalence, Orchestrator};
pub use validator::{ValidateError, Validator};
