//! Single-direction validation.
//!
//! Both programs run against one vector set, each into a freshly cleared
//! output directory; the artifacts are then paired and every pair is
//! compared. Comparison never stops at the first mismatch.

use std::path::{Path, PathBuf};

use bpfeq_fs::{prepare_fresh_dir, Filesystem, FsError, ProgramSide};
use bpfeq_log::Logger;
use bpfeq_schema::{
    ComparisonVerdict, Direction, Misalignment, MismatchPair, MismatchReason, Program,
    TestVectorSet, VerdictError,
};
use thiserror::Error;

use crate::config::ValidationConfig;
use crate::diff::{diff_documents, parse_document, DiffError};
use crate::executor::{ExecutorError, ProgramExecutor};
use crate::matcher::{match_artifacts, ArtifactPair, MatchError};

/// Fatal validation errors. Mismatches are verdicts, not errors.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("{direction} direction: executing {side} failed: {source}")]
    Executor {
        direction: Direction,
        side: ProgramSide,
        #[source]
        source: ExecutorError,
    },

    #[error("{direction} direction: cannot prepare {}: {source}", .dir.display())]
    Scratch {
        direction: Direction,
        dir: PathBuf,
        #[source]
        source: FsError,
    },

    #[error("{direction} direction: cannot read artifacts: {source}")]
    Artifacts {
        direction: Direction,
        #[source]
        source: FsError,
    },

    #[error("invalid verdict: {0}")]
    Verdict(#[from] VerdictError),
}

/// Decides whether two programs behave identically on one vector set.
pub struct Validator<'a, E: ProgramExecutor, F: Filesystem, L: Logger> {
    executor: &'a E,
    fs: &'a F,
    logger: &'a L,
    config: ValidationConfig,
}

impl<'a, E: ProgramExecutor, F: Filesystem, L: Logger> Validator<'a, E, F, L> {
    pub fn new(executor: &'a E, fs: &'a F, logger: &'a L, config: ValidationConfig) -> Self {
        Self {
            executor,
            fs,
            logger,
            config,
        }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub(crate) fn logger(&self) -> &L {
        self.logger
    }

    /// Run `program_a` and `program_b` on `vectors` below `scratch_dir` and
    /// compare their outputs.
    pub fn validate(
        &self,
        direction: Direction,
        program_a: &Program,
        program_b: &Program,
        vectors: &TestVectorSet,
        scratch_dir: &Path,
    ) -> Result<ComparisonVerdict, ValidateError> {
        let dir_a = self.execute(direction, ProgramSide::A, program_a, vectors, scratch_dir)?;
        let dir_b = self.execute(direction, ProgramSide::B, program_b, vectors, scratch_dir)?;

        let matched = match match_artifacts(self.fs, &dir_a, &dir_b, &self.config.pairing) {
            Ok(matched) => matched,
            Err(MatchError::CardinalityMismatch { left, right }) => {
                self.logger.info(&format!(
                    "{} direction: {} produced {} artifacts, {} produced {}",
                    direction, program_a.label, left, program_b.label, right
                ));
                return Ok(ComparisonVerdict::cardinality_mismatch(
                    direction,
                    &vectors.label,
                    left,
                    right,
                ));
            }
            Err(MatchError::UnmatchedVector { vector, present }) => {
                let (left, right) = if present.starts_with(&dir_a) {
                    (present, dir_b)
                } else {
                    (dir_a, present)
                };
                self.logger.debug(&format!(
                    "{} direction: vector {} has no counterpart",
                    direction, vector
                ));
                let mut verdict = ComparisonVerdict::new(direction, &vectors.label);
                verdict.record_mismatch(MismatchPair {
                    vector,
                    left,
                    right,
                    reason: MismatchReason::Unmatched {
                        detail: "artifact present on one side only".to_string(),
                    },
                });
                return Ok(verdict);
            }
            Err(MatchError::Fs(source)) => {
                return Err(ValidateError::Artifacts { direction, source })
            }
        };

        if let Some(reason) = &matched.fallback {
            self.logger.verbose(&format!(
                "{} direction: pairing by sorted name ({})",
                direction, reason
            ));
        }

        let mut verdict = ComparisonVerdict::new(direction, &vectors.label);
        for pair in &matched.pairs {
            if !pair.aligned {
                self.logger.warn(&format!(
                    "{} direction: pairing {} with {} at position {}",
                    direction,
                    pair.left_name(),
                    pair.right_name(),
                    pair.position
                ));
                verdict.record_misalignment(Misalignment {
                    position: pair.position,
                    left: pair.left_name(),
                    right: pair.right_name(),
                });
            }

            match self.compare(pair) {
                Ok(None) => verdict.record_match(),
                Ok(Some(reason)) => {
                    self.logger.debug(&format!(
                        "{} direction: {} differs from {}",
                        direction,
                        pair.left.display(),
                        pair.right.display()
                    ));
                    verdict.record_mismatch(MismatchPair {
                        vector: pair.vector.clone(),
                        left: pair.left.clone(),
                        right: pair.right.clone(),
                        reason,
                    });
                }
                Err(source) => return Err(ValidateError::Artifacts { direction, source }),
            }
        }

        self.logger.verbose(&format!(
            "{} direction: {} pairs compared, {} mismatching",
            direction,
            verdict.pairs_compared,
            verdict.mismatches.len()
        ));
        Ok(verdict)
    }

    fn execute(
        &self,
        direction: Direction,
        side: ProgramSide,
        program: &Program,
        vectors: &TestVectorSet,
        scratch_dir: &Path,
    ) -> Result<PathBuf, ValidateError> {
        let output_dir = scratch_dir.join(side.output_dir_name());
        let cleared = prepare_fresh_dir(self.fs, &output_dir).map_err(|source| {
            ValidateError::Scratch {
                direction,
                dir: output_dir.clone(),
                source,
            }
        })?;
        if cleared {
            self.logger.verbose(&format!(
                "cleared stale artifacts in {}",
                output_dir.display()
            ));
        }

        self.logger.verbose(&format!(
            "{} direction: running {} on {}",
            direction, program.label, vectors.label
        ));
        self.executor
            .execute(program, vectors, &output_dir)
            .map_err(|source| ValidateError::Executor {
                direction,
                side,
                source,
            })?;
        Ok(output_dir)
    }

    /// `None` when the pair matches, otherwise why it does not.
    fn compare(&self, pair: &ArtifactPair) -> Result<Option<MismatchReason>, FsError> {
        let left_bytes = self.fs.read_bytes(&pair.left)?;
        let right_bytes = self.fs.read_bytes(&pair.right)?;

        let parsed = parse_document(&pair.left, &left_bytes)
            .and_then(|l| parse_document(&pair.right, &right_bytes).map(|r| (l, r)));
        let (left, right) = match parsed {
            Ok(docs) => docs,
            Err(DiffError::MalformedDocument { path, detail }) => {
                return Ok(Some(MismatchReason::Malformed {
                    detail: format!("{}: {}", path.display(), detail),
                }))
            }
        };

        let report = diff_documents(&left, &right);
        if report.is_empty() {
            Ok(None)
        } else {
            Ok(Some(MismatchReason::Different {
                differences: report.summarize(self.config.max_differences),
            }))
        }
    }
}
