//! Per-run scratch directory layout.
//!
//! Every run writes below `<work_dir>/<run-id>/`:
//!
//! ```text
//! bpfeq-20240101-000000Z/
//!   progA_test_cases/      generated vectors + staged object for program A
//!   progB_test_cases/
//!   validation/
//!     forward/progA_output, forward/progB_output
//!     reverse/progA_output, reverse/progB_output
//!   equivalence.json
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use bpfeq_clock::RunId;

use crate::filesystem::{Filesystem, FsError};

/// File name of the serialized verdict inside a run directory.
pub const RESULT_FILE: &str = "equivalence.json";

/// Which of the two programs under comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramSide {
    A,
    B,
}

impl ProgramSide {
    pub fn label(&self) -> &'static str {
        match self {
            ProgramSide::A => "progA",
            ProgramSide::B => "progB",
        }
    }

    /// Directory receiving this program's execution artifacts.
    pub fn output_dir_name(&self) -> String {
        format!("{}_output", self.label())
    }

    /// Directory receiving this program's generated test vectors.
    pub fn test_cases_dir_name(&self) -> String {
        format!("{}_test_cases", self.label())
    }
}

impl fmt::Display for ProgramSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Directory layout of a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    root: PathBuf,
    run_id: RunId,
}

impl RunLayout {
    pub fn new(work_dir: &Path, run_id: RunId) -> Self {
        Self {
            root: work_dir.join(run_id.as_str()),
            run_id,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn test_cases_dir(&self, side: ProgramSide) -> PathBuf {
        self.root.join(side.test_cases_dir_name())
    }

    /// Scratch root handed to the validators.
    pub fn validation_root(&self) -> PathBuf {
        self.root.join("validation")
    }

    pub fn result_path(&self) -> PathBuf {
        self.root.join(RESULT_FILE)
    }

    /// Create the run root. An existing root is cleared first.
    pub fn create<F: Filesystem>(&self, fs: &F) -> Result<(), FsError> {
        prepare_fresh_dir(fs, &self.root).map(|_| ())
    }
}

/// Make `dir` an empty, existing directory.
///
/// Returns `true` if a previous directory had to be cleared.
pub fn prepare_fresh_dir<F: Filesystem>(fs: &F, dir: &Path) -> Result<bool, FsError> {
    let cleared = if fs.exists(dir) {
        if !fs.is_dir(dir) {
            return Err(FsError::Path(format!(
                "{} exists and is not a directory",
                dir.display()
            )));
        }
        fs.remove_dir_all(dir)?;
        true
    } else {
        false
    };

    fs.create_dir_all(dir)?;
    Ok(cleared)
}
