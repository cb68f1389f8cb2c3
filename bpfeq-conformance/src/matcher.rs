//! Pairing of execution artifacts across two output directories.
//!
//! Both directories were produced from the same vector set, one per program.
//! By default both listings are sorted by file name and paired by position;
//! pairs whose names differ are kept but flagged as misaligned.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bpfeq_fs::{Filesystem, FsError};
use serde_json::Value;
use thiserror::Error;

use crate::config::Pairing;

/// Errors from pairing artifacts.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("artifact count mismatch: {left} vs {right}")]
    CardinalityMismatch { left: usize, right: usize },

    #[error("vector {vector} has an artifact in {} only", .present.display())]
    UnmatchedVector { vector: String, present: PathBuf },

    #[error("filesystem error: {0}")]
    Fs(#[from] FsError),
}

/// Two artifacts to compare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPair {
    pub position: usize,
    /// Vector identifier: the left file stem, or the explicit id.
    pub vector: String,
    pub left: PathBuf,
    pub right: PathBuf,
    /// `false` when paired by position but the file names differ.
    pub aligned: bool,
}

impl ArtifactPair {
    pub fn left_name(&self) -> String {
        file_name(&self.left)
    }

    pub fn right_name(&self) -> String {
        file_name(&self.right)
    }
}

/// Outcome of pairing two directories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchedArtifacts {
    pub pairs: Vec<ArtifactPair>,
    /// Why vector-id pairing fell back to sorted names, if it did.
    pub fallback: Option<String>,
}

impl MatchedArtifacts {
    pub fn misaligned(&self) -> impl Iterator<Item = &ArtifactPair> {
        self.pairs.iter().filter(|p| !p.aligned)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}

fn sorted_listing<F: Filesystem>(fs: &F, dir: &Path) -> Result<Vec<String>, FsError> {
    let mut names = fs.list_dir(dir)?;
    names.sort();
    Ok(names)
}

/// Pair the artifacts of `left_dir` and `right_dir`.
///
/// Fails with [`MatchError::CardinalityMismatch`] when the directories hold
/// different numbers of entries. Pairing never looks at content except to
/// read vector ids in [`Pairing::VectorId`] mode.
pub fn match_artifacts<F: Filesystem>(
    fs: &F,
    left_dir: &Path,
    right_dir: &Path,
    pairing: &Pairing,
) -> Result<MatchedArtifacts, MatchError> {
    let left = sorted_listing(fs, left_dir)?;
    let right = sorted_listing(fs, right_dir)?;

    if left.len() != right.len() {
        return Err(MatchError::CardinalityMismatch {
            left: left.len(),
            right: right.len(),
        });
    }

    match pairing {
        Pairing::SortedName => Ok(MatchedArtifacts {
            pairs: pair_by_position(left_dir, &left, right_dir, &right),
            fallback: None,
        }),
        Pairing::VectorId { key } => {
            let ids = read_ids(fs, left_dir, &left, key)
                .and_then(|l| read_ids(fs, right_dir, &right, key).map(|r| (l, r)));
            match ids {
                Ok((left_ids, right_ids)) => pair_by_id(left_dir, left_ids, right_dir, right_ids),
                Err(reason) => Ok(MatchedArtifacts {
                    pairs: pair_by_position(left_dir, &left, right_dir, &right),
                    fallback: Some(reason),
                }),
            }
        }
    }
}

fn pair_by_position(
    left_dir: &Path,
    left: &[String],
    right_dir: &Path,
    right: &[String],
) -> Vec<ArtifactPair> {
    left.iter()
        .zip(right)
        .enumerate()
        .map(|(position, (l, r))| ArtifactPair {
            position,
            vector: file_stem(l),
            left: left_dir.join(l),
            right: right_dir.join(r),
            aligned: l == r,
        })
        .collect()
}

/// Vector id -> file name, or the reason ids cannot be used.
fn read_ids<F: Filesystem>(
    fs: &F,
    dir: &Path,
    names: &[String],
    key: &str,
) -> Result<BTreeMap<String, String>, String> {
    let mut ids = BTreeMap::new();
    for name in names {
        let path = dir.join(name);
        let text = fs
            .read_file(&path)
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
        let doc: Value = serde_json::from_str(&text)
            .map_err(|_| format!("{} is not valid JSON", path.display()))?;

        let id = match doc.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(format!("{} has no '{}' field", path.display(), key)),
        };
        if ids.insert(id.clone(), name.clone()).is_some() {
            return Err(format!("duplicate vector id '{}' in {}", id, dir.display()));
        }
    }
    Ok(ids)
}

fn pair_by_id(
    left_dir: &Path,
    left_ids: BTreeMap<String, String>,
    right_dir: &Path,
    mut right_ids: BTreeMap<String, String>,
) -> Result<MatchedArtifacts, MatchError> {
    let mut pairs = Vec::with_capacity(left_ids.len());
    for (vector, left_name) in left_ids {
        let Some(right_name) = right_ids.remove(&vector) else {
            return Err(MatchError::UnmatchedVector {
                present: left_dir.join(left_name),
                vector,
            });
        };
        pairs.push(ArtifactPair {
            position: pairs.len(),
            vector,
            left: left_dir.join(left_name),
            right: right_dir.join(right_name),
            aligned: true,
        });
    }

    // Equal counts and unique ids: nothing can remain on the right.
    if let Some((vector, right_name)) = right_ids.into_iter().next() {
        return Err(MatchError::UnmatchedVector {
            present: right_dir.join(right_name),
            vector,
        });
    }

    Ok(MatchedArtifacts {
        pairs,
        fallback: None,
    })
}
