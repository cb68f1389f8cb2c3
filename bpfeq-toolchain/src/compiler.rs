//! Building a program directory and staging its compiled object.

use std::path::{Path, PathBuf};

use bpfeq_fs::{Filesystem, FsError};
use bpfeq_schema::Program;
use glob::Pattern;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::ToolchainConfig;
use crate::elf::{inspect_object, ObjectError, ObjectSummary};
use crate::runner::{CommandRunner, CommandSpec, RunnerError};

/// Errors from compiling and staging a program.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to run make in {dir}: {source}")]
    Runner {
        dir: PathBuf,
        #[source]
        source: RunnerError,
    },

    #[error("make {target} failed in {dir} (exit {code}): {stderr}")]
    BuildFailed {
        dir: PathBuf,
        target: String,
        code: String,
        stderr: String,
    },

    #[error("no file matching {pattern} found in {dir}")]
    ObjectNotFound { dir: PathBuf, pattern: String },

    #[error("invalid object pattern: {0}")]
    InvalidPattern(String),

    #[error("invalid object {path}: {source}")]
    InvalidObject {
        path: PathBuf,
        #[source]
        source: ObjectError,
    },

    #[error("filesystem error: {0}")]
    Fs(#[from] FsError),
}

/// Hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// First entry of `dir` (in sorted order) whose name matches `pattern`.
pub fn find_object<F: Filesystem>(fs: &F, dir: &Path, pattern: &str) -> Result<PathBuf, CompileError> {
    let matcher =
        Pattern::new(pattern).map_err(|_| CompileError::InvalidPattern(pattern.to_string()))?;

    let mut names: Vec<String> = fs
        .list_dir(dir)?
        .into_iter()
        .filter(|name| matcher.matches(name))
        .collect();
    names.sort();

    names
        .into_iter()
        .map(|name| dir.join(name))
        .find(|path| !fs.is_dir(path))
        .ok_or_else(|| CompileError::ObjectNotFound {
            dir: dir.to_path_buf(),
            pattern: pattern.to_string(),
        })
}

/// Verify `object` is a BPF object and copy it into `dest_dir`.
///
/// The returned [`Program`] points at the staged copy and carries its digest.
pub fn stage_object<F: Filesystem>(
    fs: &F,
    label: &str,
    object: &Path,
    dest_dir: &Path,
) -> Result<(Program, ObjectSummary), CompileError> {
    let bytes = fs.read_bytes(object)?;
    let summary = inspect_object(&bytes).map_err(|source| CompileError::InvalidObject {
        path: object.to_path_buf(),
        source,
    })?;

    let file_name = object
        .file_name()
        .ok_or_else(|| FsError::Path(format!("{} has no file name", object.display())))?;
    let staged = dest_dir.join(file_name);

    fs.create_dir_all(dest_dir)?;
    fs.copy_file(object, &staged)?;

    let program = Program::new(label, staged).with_sha256(sha256_hex(&bytes));
    Ok((program, summary))
}

/// Runs the program's build and stages the resulting object.
pub struct Compiler<'a, R: CommandRunner, F: Filesystem> {
    runner: &'a R,
    fs: &'a F,
    config: &'a ToolchainConfig,
}

impl<'a, R: CommandRunner, F: Filesystem> Compiler<'a, R, F> {
    pub fn new(runner: &'a R, fs: &'a F, config: &'a ToolchainConfig) -> Self {
        Self { runner, fs, config }
    }

    /// `make <target>` inside `source_dir`.
    pub fn build(&self, source_dir: &Path) -> Result<(), CompileError> {
        let spec = CommandSpec::new(&self.config.make_bin)
            .arg(&self.config.make_target)
            .current_dir(source_dir);

        let output = self.runner.run(&spec).map_err(|source| CompileError::Runner {
            dir: source_dir.to_path_buf(),
            source,
        })?;

        if !output.success() {
            return Err(CompileError::BuildFailed {
                dir: source_dir.to_path_buf(),
                target: self.config.make_target.clone(),
                code: output.code_display(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(())
    }

    /// Build `source_dir`, locate its object and stage it into `dest_dir`.
    pub fn compile(
        &self,
        label: &str,
        source_dir: &Path,
        dest_dir: &Path,
    ) -> Result<(Program, ObjectSummary), CompileError> {
        self.build(source_dir)?;
        let object = find_object(self.fs, source_dir, &self.config.object_pattern)?;
        stage_object(self.fs, label, &object, dest_dir)
    }
}
