//! Validation configuration.

use std::fmt;
use std::str::FromStr;

/// Top-level artifact field carrying an explicit vector identifier.
pub const DEFAULT_VECTOR_ID_KEY: &str = "vector_id";

/// Differences kept per mismatching pair; the rest are counted only.
pub const DEFAULT_MAX_DIFFERENCES: usize = 20;

/// How artifacts of the two output directories are paired.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Pairing {
    /// Sort both listings by file name and pair by position.
    #[default]
    SortedName,
    /// Pair by the value of a top-level identifier field, falling back to
    /// sorted names when any artifact lacks a unique one.
    VectorId { key: String },
}

impl Pairing {
    pub fn vector_id() -> Self {
        Pairing::VectorId {
            key: DEFAULT_VECTOR_ID_KEY.to_string(),
        }
    }
}

impl fmt::Display for Pairing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pairing::SortedName => f.write_str("sorted-name"),
            Pairing::VectorId { key } => write!(f, "vector-id({})", key),
        }
    }
}

impl FromStr for Pairing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sorted-name" => Ok(Pairing::SortedName),
            "vector-id" => Ok(Pairing::vector_id()),
            other => Err(format!(
                "unknown pairing '{}' (expected sorted-name or vector-id)",
                other
            )),
        }
    }
}

/// Settings for a single-direction validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationConfig {
    pub pairing: Pairing,
    pub max_differences: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            pairing: Pairing::SortedName,
            max_differences: DEFAULT_MAX_DIFFERENCES,
        }
    }
}

impl ValidationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pairing(mut self, pairing: Pairing) -> Self {
        self.pairing = pairing;
        self
    }

    /// Pair by vector id read from `key`.
    pub fn with_vector_id_key(mut self, key: impl Into<String>) -> Self {
        self.pairing = Pairing::VectorId { key: key.into() };
        self
    }

    pub fn with_max_differences(mut self, max: usize) -> Self {
        self.max_differences = max;
        self
    }
}
