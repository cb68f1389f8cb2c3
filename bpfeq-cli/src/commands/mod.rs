//! Command orchestration for CLI subcommands.
//!
//! Provides execute functions for:
//! - `check` - Generate, compile and cross-validate two programs
//! - `generate` - Vectors and staged object for one program
//! - `compare` - Cross-validate already staged artifacts

pub mod check;
pub mod compare;
pub mod generate;

pub use check::{execute_check, CheckOutcome};
pub use compare::{execute_compare, CompareOutcome};
pub use generate::{execute_generate, GenerateOutcome};

use std::path::Path;

use bpfeq_clock::RunId;
use bpfeq_conformance::ValidateError;
use bpfeq_fs::{Filesystem, FsError};
use bpfeq_log::Logger;
use bpfeq_schema::EquivalenceResult;
use bpfeq_toolchain::{check_tool_available, CommandRunner, CompileError, GenerateError, RunnerError};
use thiserror::Error;

use crate::cli::CliError;
use crate::io::ResultWriterError;

/// Errors from command execution.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] CliError),

    #[error("{what} is not runnable: {source}")]
    Setup {
        what: String,
        #[source]
        source: RunnerError,
    },

    #[error("filesystem error: {0}")]
    Filesystem(#[from] FsError),

    #[error("test vector generation failed: {0}")]
    Generate(#[from] GenerateError),

    #[error("compilation failed: {0}")]
    Compile(#[from] CompileError),

    #[error("validation failed: {0}")]
    Validate(#[from] ValidateError),

    #[error("output error: {0}")]
    Output(#[from] ResultWriterError),
}

/// Result of command execution.
pub type CommandResult<T> = Result<T, CommandError>;

pub(crate) fn require_dir<F: Filesystem>(fs: &F, what: &str, path: &Path) -> Result<(), CliError> {
    if fs.is_dir(path) {
        Ok(())
    } else {
        Err(CliError::NotADirectory {
            what: what.to_string(),
            path: path.to_path_buf(),
        })
    }
}

pub(crate) fn require_file<F: Filesystem>(fs: &F, what: &str, path: &Path) -> Result<(), CliError> {
    if fs.exists(path) && !fs.is_dir(path) {
        Ok(())
    } else {
        Err(CliError::NotAFile {
            what: what.to_string(),
            path: path.to_path_buf(),
        })
    }
}

/// Fail early if the equivalence executor cannot be spawned.
pub(crate) fn require_executor<R: CommandRunner>(runner: &R, binary: &str) -> CommandResult<()> {
    check_tool_available(runner, binary).map_err(|source| CommandError::Setup {
        what: format!("equivalence executor {}", binary),
        source,
    })
}

pub(crate) fn log_verdict<L: Logger>(logger: &L, run_id: &RunId, result: &EquivalenceResult) {
    logger.info(&format!("{}: {}", run_id, result.statement()));
    for (direction, vector) in result.mismatching_vectors() {
        logger.verbose(&format!("mismatch on {} vector {}", direction, vector));
    }
}
