//! Program and TestVectorSet types.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Directory holding the symbolic test vectors inside a generated set.
pub const VECTORS_DIR_NAME: &str = "ktest-files";

/// Directory holding the mapping tables inside a generated set.
pub const MAPPING_DIR_NAME: &str = "map-results";

/// A compiled BPF object under comparison. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub label: String,
    pub path: PathBuf,
    /// Hex SHA-256 of the object file, when it has been staged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl Program {
    pub fn new(label: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
            sha256: None,
        }
    }

    pub fn with_sha256(mut self, digest: impl Into<String>) -> Self {
        self.sha256 = Some(digest.into());
        self
    }

    /// `Some(true)` if both objects are byte-for-byte identical, `None` when
    /// either digest is unknown.
    pub fn is_bit_identical(&self, other: &Program) -> Option<bool> {
        match (&self.sha256, &other.sha256) {
            (Some(a), Some(b)) => Some(a == b),
            _ => None,
        }
    }
}

/// Symbolic test vectors and their mapping tables, generated from one program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestVectorSet {
    pub label: String,
    pub vectors_dir: PathBuf,
    pub mapping_dir: PathBuf,
}

impl TestVectorSet {
    pub fn new(
        label: impl Into<String>,
        vectors_dir: impl Into<PathBuf>,
        mapping_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            label: label.into(),
            vectors_dir: vectors_dir.into(),
            mapping_dir: mapping_dir.into(),
        }
    }

    /// Set laid out the way the generator writes it:
    /// `<root>/ktest-files/` and `<root>/map-results/`.
    pub fn from_root(label: impl Into<String>, root: &Path) -> Self {
        Self::new(label, root.join(VECTORS_DIR_NAME), root.join(MAPPING_DIR_NAME))
    }
}
