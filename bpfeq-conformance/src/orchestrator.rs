//! Bidirectional cross-validation.
//!
//! The forward direction runs both programs on the vectors generated from
//! program A; the reverse direction on those generated from program B. The
//! programs are equivalent only if both directions pass. A failing forward
//! direction short-circuits: the reverse vector set is never executed.

use std::path::Path;

use bpfeq_fs::Filesystem;
use bpfeq_log::Logger;
use bpfeq_schema::{Direction, EquivalenceResult, Program, TestVectorSet};

use crate::executor::ProgramExecutor;
use crate::validator::{ValidateError, Validator};

/// Runs the two directions through one shared [`Validator`].
pub struct Orchestrator<'a, E: ProgramExecutor, F: Filesystem, L: Logger> {
    validator: Validator<'a, E, F, L>,
}

impl<'a, E: ProgramExecutor, F: Filesystem, L: Logger> Orchestrator<'a, E, F, L> {
    pub fn new(validator: Validator<'a, E, F, L>) -> Self {
        Self { validator }
    }

    /// Cross-validate `(program_a, vectors_a)` against `(program_b, vectors_b)`.
    ///
    /// Scratch output lives in `scratch_root/forward` and `scratch_root/reverse`.
    pub fn check(
        &self,
        program_a: &Program,
        vectors_a: &TestVectorSet,
        program_b: &Program,
        vectors_b: &TestVectorSet,
        scratch_root: &Path,
    ) -> Result<EquivalenceResult, ValidateError> {
        let forward = self.validator.validate(
            Direction::Forward,
            program_a,
            program_b,
            vectors_a,
            &scratch_root.join(Direction::Forward.to_string()),
        )?;

        if !forward.equivalent {
            self.validator.logger().verbose(&format!(
                "forward direction failed on {}, skipping reverse direction",
                vectors_a.label
            ));
            return Ok(EquivalenceResult::from_directions(forward, None)?);
        }

        let reverse = self.validator.validate(
            Direction::Reverse,
            program_a,
            program_b,
            vectors_b,
            &scratch_root.join(Direction::Reverse.to_string()),
        )?;

        Ok(EquivalenceResult::from_directions(forward, Some(reverse))?)
    }
}

/// Convenience wrapper: build a validator and run both directions.
pub fn check_equivalence<E: ProgramExecutor, F: Filesystem, L: Logger>(
    validator: Validator<'_, E, F, L>,
    program_a: &Program,
    vectors_a: &TestVectorSet,
    program_b: &Program,
    vectors_b: &TestVectorSet,
    scratch_root: &Path,
) -> Result<EquivalenceResult, ValidateError> {
    Orchestrator::new(validator).check(program_a, vectors_a, program_b, vectors_b, scratch_root)
}
