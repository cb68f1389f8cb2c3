//! Exit codes for the bpfeq CLI.
//!
//! A completed run exits 0 whatever the verdict, unless the caller asked
//! for `--fail-on-mismatch`.

use bpfeq_schema::EquivalenceResult;

use crate::commands::CommandError;

/// Exit code constants.
pub mod codes {
    /// Run completed.
    pub const SUCCESS: i32 = 0;
    /// Setup, toolchain or execution failure.
    pub const FAILURE: i32 = 1;
    /// Run completed, programs not equivalent, `--fail-on-mismatch` given.
    pub const NOT_EQUIVALENT: i32 = 2;
}

/// Map a CommandError to an exit code.
pub fn exit_code(error: &CommandError) -> i32 {
    match error {
        CommandError::InvalidArgument(_)
        | CommandError::Setup { .. }
        | CommandError::Filesystem(_)
        | CommandError::Generate(_)
        | CommandError::Compile(_)
        | CommandError::Validate(_)
        | CommandError::Output(_) => codes::FAILURE,
    }
}

/// Exit code of a completed run.
pub fn verdict_exit_code(result: &EquivalenceResult, fail_on_mismatch: bool) -> i32 {
    if fail_on_mismatch && !result.equivalent {
        codes::NOT_EQUIVALENT
    } else {
        codes::SUCCESS
    }
}
