//! Filesystem trait with real and in-memory implementations.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use thiserror::Error;

/// Errors from filesystem operations.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("path error: {0}")]
    Path(String),
}

impl FsError {
    fn io(path: &Path, source: io::Error) -> Self {
        FsError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    /// True if the underlying cause is a missing file or directory.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// Trait for filesystem operations.
/// Abstracted for testing with mock implementations.
pub trait Filesystem: Send + Sync {
    /// Names of all entries (files and directories) directly inside `dir`,
    /// in no particular order.
    fn list_dir(&self, dir: &Path) -> Result<Vec<String>, FsError>;

    /// Read file contents as a string.
    fn read_file(&self, path: &Path) -> Result<String, FsError>;

    /// Read raw file contents.
    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, FsError>;

    /// Write data atomically to a path (write to temp, then rename).
    fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<(), FsError>;

    /// Copy a file, returning the number of bytes copied.
    fn copy_file(&self, from: &Path, to: &Path) -> Result<u64, FsError>;

    /// Remove a directory and everything below it.
    fn remove_dir_all(&self, path: &Path) -> Result<(), FsError>;

    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// Create directory and parents if needed.
    fn create_dir_all(&self, path: &Path) -> Result<(), FsError>;
}

/// Real filesystem implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFilesystem;

impl Filesystem for RealFilesystem {
    fn list_dir(&self, dir: &Path) -> Result<Vec<String>, FsError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| FsError::io(dir, e))? {
            let entry = entry.map_err(|e| FsError::io(dir, e))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    fn read_file(&self, path: &Path) -> Result<String, FsError> {
        fs::read_to_string(path).map_err(|e| FsError::io(path, e))
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, FsError> {
        fs::read(path).map_err(|e| FsError::io(path, e))
    }

    fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<(), FsError> {
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, data).map_err(|e| FsError::io(&temp_path, e))?;
        fs::rename(&temp_path, path).map_err(|e| FsError::io(path, e))
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<u64, FsError> {
        fs::copy(from, to).map_err(|e| FsError::io(from, e))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<(), FsError> {
        fs::remove_dir_all(path).map_err(|e| FsError::io(path, e))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), FsError> {
        fs::create_dir_all(path).map_err(|e| FsError::io(path, e))
    }
}

/// In-memory filesystem for testing.
/// Cloning creates a new handle to the same underlying data.
#[derive(Debug, Clone, Default)]
pub struct MockFilesystem {
    files: Arc<RwLock<HashMap<PathBuf, Vec<u8>>>>,
    dirs: Arc<RwLock<HashSet<PathBuf>>>,
}

impl MockFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file directly (for test setup). Parent directories are created.
    pub fn add_file(&self, path: impl Into<PathBuf>, data: impl Into<Vec<u8>>) {
        let path = path.into();
        self.register_ancestors(&path);
        if let Ok(mut files) = self.files.write() {
            files.insert(path, data.into());
        }
    }

    /// Add an empty directory (for test setup).
    pub fn add_dir(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.register_ancestors(&path);
        if let Ok(mut dirs) = self.dirs.write() {
            dirs.insert(path);
        }
    }

    pub fn get_file(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.read().ok()?.get(path).cloned()
    }

    fn register_ancestors(&self, path: &Path) {
        if let Ok(mut dirs) = self.dirs.write() {
            for ancestor in path.ancestors().skip(1) {
                if ancestor.as_os_str().is_empty() {
                    break;
                }
                dirs.insert(ancestor.to_path_buf());
            }
        }
    }

    fn poisoned() -> FsError {
        FsError::Path("mock filesystem lock poisoned".to_string())
    }

    fn not_found(path: &Path) -> FsError {
        FsError::io(
            path,
            io::Error::new(io::ErrorKind::NotFound, format!("not found: {}", path.display())),
        )
    }
}

impl Filesystem for MockFilesystem {
    fn list_dir(&self, dir: &Path) -> Result<Vec<String>, FsError> {
        if !self.is_dir(dir) {
            return Err(Self::not_found(dir));
        }

        let files = self.files.read().map_err(|_| Self::poisoned())?;
        let dirs = self.dirs.read().map_err(|_| Self::poisoned())?;

        let names = files
            .keys()
            .chain(dirs.iter())
            .filter(|p| p.parent() == Some(dir))
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        Ok(names)
    }

    fn read_file(&self, path: &Path) -> Result<String, FsError> {
        let bytes = self.read_bytes(path)?;
        String::from_utf8(bytes).map_err(|e| FsError::Path(format!("invalid utf8: {}", e)))
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, FsError> {
        self.files
            .read()
            .map_err(|_| Self::poisoned())?
            .get(path)
            .cloned()
            .ok_or_else(|| Self::not_found(path))
    }

    fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<(), FsError> {
        self.add_file(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<u64, FsError> {
        let data = self.read_bytes(from)?;
        let len = data.len() as u64;
        self.add_file(to.to_path_buf(), data);
        Ok(len)
    }

    fn remove_dir_all(&self, path: &Path) -> Result<(), FsError> {
        if !self.is_dir(path) {
            return Err(Self::not_found(path));
        }
        self.files
            .write()
            .map_err(|_| Self::poisoned())?
            .retain(|p, _| !p.starts_with(path));
        self.dirs
            .write()
            .map_err(|_| Self::poisoned())?
            .retain(|p| !p.starts_with(path));
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.is_dir(path)
            || self
                .files
                .read()
                .map(|files| files.contains_key(path))
                .unwrap_or(false)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.dirs
            .read()
            .map(|dirs| dirs.contains(path))
            .unwrap_or(false)
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), FsError> {
        self.add_dir(path.to_path_buf());
        Ok(())
    }
}
