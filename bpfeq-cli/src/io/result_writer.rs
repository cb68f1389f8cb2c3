//! Persisting the verdict of a run as `equivalence.json`.

use std::path::Path;

use bpfeq_fs::{Filesystem, FsError};
use bpfeq_schema::{EquivalenceResult, Program};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from writing the run report.
#[derive(Debug, Error)]
pub enum ResultWriterError {
    #[error("failed to serialize run report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: std::path::PathBuf,
        #[source]
        source: FsError,
    },
}

/// Everything recorded about one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    /// Unix timestamp the run started at.
    pub started_at: u64,
    pub program_a: Program,
    pub program_b: Program,
    /// Whether the two staged objects are byte-for-byte identical.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_identical: Option<bool>,
    pub result: EquivalenceResult,
}

impl RunReport {
    pub fn new(
        run_id: impl Into<String>,
        started_at: u64,
        program_a: Program,
        program_b: Program,
        result: EquivalenceResult,
    ) -> Self {
        let bit_identical = program_a.is_bit_identical(&program_b);
        Self {
            run_id: run_id.into(),
            started_at,
            program_a,
            program_b,
            bit_identical,
            result,
        }
    }

    /// Pretty-printed JSON with trailing newline.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Atomically write `report` to `path`.
pub fn write_result<F: Filesystem>(
    fs: &F,
    path: &Path,
    report: &RunReport,
) -> Result<(), ResultWriterError> {
    let json = report.to_json()?;
    fs.write_atomic(path, json.as_bytes())
        .map_err(|source| ResultWriterError::Write {
            path: path.to_path_buf(),
            source,
        })
}
