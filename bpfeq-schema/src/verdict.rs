//! Comparison verdicts and the combined equivalence result.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Current `equivalence.json` format version.
pub const RESULT_VERSION: u32 = 1;

/// Which vector set a verdict was computed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Vectors generated from program A, run against both programs.
    Forward,
    /// Vectors generated from program B, run against both programs.
    Reverse,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => f.write_str("forward"),
            Direction::Reverse => f.write_str("reverse"),
        }
    }
}

/// Why a pair of artifacts did not match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MismatchReason {
    /// Both documents parsed but differ; one entry per differing path.
    Different { differences: Vec<String> },
    /// At least one document could not be parsed.
    Malformed { detail: String },
    /// The vector produced an artifact on one side only.
    Unmatched { detail: String },
}

/// One pair of execution artifacts that disagreed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MismatchPair {
    /// Vector identifier (artifact file stem, or explicit id when present).
    pub vector: String,
    pub left: PathBuf,
    pub right: PathBuf,
    pub reason: MismatchReason,
}

/// Two artifacts paired by position whose file names differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Misalignment {
    pub position: usize,
    pub left: String,
    pub right: String,
}

/// Entry counts of the two output directories when they differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardinalityCounts {
    pub left: usize,
    pub right: usize,
}

/// Outcome of running both programs on one vector set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonVerdict {
    pub direction: Direction,
    pub vector_set: String,
    pub equivalent: bool,
    pub pairs_compared: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<CardinalityCounts>,
    #[serde(default)]
    pub mismatches: Vec<MismatchPair>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub misaligned: Vec<Misalignment>,
}

impl ComparisonVerdict {
    /// Empty, passing verdict to accumulate pair results into.
    pub fn new(direction: Direction, vector_set: impl Into<String>) -> Self {
        Self {
            direction,
            vector_set: vector_set.into(),
            equivalent: true,
            pairs_compared: 0,
            cardinality: None,
            mismatches: Vec::new(),
            misaligned: Vec::new(),
        }
    }

    /// Failing verdict for output directories of different sizes.
    pub fn cardinality_mismatch(
        direction: Direction,
        vector_set: impl Into<String>,
        left: usize,
        right: usize,
    ) -> Self {
        Self {
            equivalent: false,
            cardinality: Some(CardinalityCounts { left, right }),
            ..Self::new(direction, vector_set)
        }
    }

    pub fn record_match(&mut self) {
        self.pairs_compared += 1;
    }

    pub fn record_mismatch(&mut self, mismatch: MismatchPair) {
        self.pairs_compared += 1;
        self.equivalent = false;
        self.mismatches.push(mismatch);
    }

    /// Misalignment is diagnostic only; it does not decide the verdict.
    pub fn record_misalignment(&mut self, misalignment: Misalignment) {
        self.misaligned.push(misalignment);
    }

    pub fn mismatching_vectors(&self) -> Vec<&str> {
        self.mismatches.iter().map(|m| m.vector.as_str()).collect()
    }
}

/// Errors from building or decoding an [`EquivalenceResult`].
#[derive(Debug, thiserror::Error)]
pub enum VerdictError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("result version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("forward direction passed but no reverse verdict was supplied")]
    MissingReverse,

    #[error("forward direction failed, reverse direction must not be evaluated")]
    UnexpectedReverse,

    #[error("verdict direction mismatch: expected {expected}, found {found}")]
    WrongDirection { expected: Direction, found: Direction },
}

/// Combined verdict over both vector sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquivalenceResult {
    pub version: u32,
    pub equivalent: bool,
    pub forward: ComparisonVerdict,
    /// `None` when the forward direction already failed.
    pub reverse: Option<ComparisonVerdict>,
}

impl EquivalenceResult {
    /// Combine the two directions.
    ///
    /// The reverse verdict must be present exactly when the forward one
    /// passed.
    pub fn from_directions(
        forward: ComparisonVerdict,
        reverse: Option<ComparisonVerdict>,
    ) -> Result<Self, VerdictError> {
        if forward.direction != Direction::Forward {
            return Err(VerdictError::WrongDirection {
                expected: Direction::Forward,
                found: forward.direction,
            });
        }
        if let Some(r) = &reverse {
            if r.direction != Direction::Reverse {
                return Err(VerdictError::WrongDirection {
                    expected: Direction::Reverse,
                    found: r.direction,
                });
            }
        }

        let equivalent = match (&reverse, forward.equivalent) {
            (None, true) => return Err(VerdictError::MissingReverse),
            (Some(_), false) => return Err(VerdictError::UnexpectedReverse),
            (None, false) => false,
            (Some(r), true) => r.equivalent,
        };

        Ok(Self {
            version: RESULT_VERSION,
            equivalent,
            forward,
            reverse,
        })
    }

    pub fn reverse_skipped(&self) -> bool {
        self.reverse.is_none()
    }

    /// Mismatching vectors of every direction that was evaluated.
    pub fn mismatching_vectors(&self) -> Vec<(Direction, &str)> {
        std::iter::once(&self.forward)
            .chain(self.reverse.as_ref())
            .flat_map(|v| v.mismatches.iter().map(move |m| (v.direction, m.vector.as_str())))
            .collect()
    }

    /// The human-readable verdict statement.
    pub fn statement(&self) -> &'static str {
        if self.equivalent {
            "The two programs are equivalent"
        } else {
            "The two programs are not equivalent"
        }
    }

    /// Pretty-printed JSON with trailing newline.
    pub fn to_json(&self) -> Result<String, VerdictError> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    pub fn from_json(json: &str) -> Result<Self, VerdictError> {
        let result: EquivalenceResult = serde_json::from_str(json)?;
        if result.version != RESULT_VERSION {
            return Err(VerdictError::VersionMismatch {
                expected: RESULT_VERSION,
                found: result.version,
            });
        }
        Ok(result)
    }
}
