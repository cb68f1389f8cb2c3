//! Symbolic test vector generation inside a throwaway container.
//!
//! The generator image ships the symbolic execution toolchain under `/pix`.
//! A program directory is copied to `/pix/ebpf-nfs/<name>`, the generation
//! script writes `/pix/<out>`, and that directory is copied back to the host
//! as `<output_dir>` holding `ktest-files/` and `map-results/`.

use std::path::{Component, Path, PathBuf};

use bpfeq_fs::{Filesystem, FsError};
use bpfeq_schema::{TestVectorSet, MAPPING_DIR_NAME, VECTORS_DIR_NAME};
use thiserror::Error;

use crate::config::ToolchainConfig;
use crate::runner::{CommandOutput, CommandRunner, CommandSpec, RunnerError};

/// Program sources inside the container.
const CONTAINER_SOURCE_ROOT: &str = "/pix/ebpf-nfs";

/// Working directory of the generation script inside the container.
const CONTAINER_SCRIPTS_DIR: &str = "/pix/scripts";

/// Errors from vector generation and container checks.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("container runtime failed during {step}: {source}")]
    Runner {
        step: &'static str,
        #[source]
        source: RunnerError,
    },

    #[error("{step} failed (exit {code}): {stderr}")]
    CommandFailed {
        step: &'static str,
        code: String,
        stderr: String,
    },

    #[error("container runtime is not available: {0}")]
    RuntimeUnavailable(String),

    #[error("path has no usable file name: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error(
        "output directory {} overlaps program directory {}",
        .output.display(),
        .program_dir.display()
    )]
    OutputOverlapsSource { output: PathBuf, program_dir: PathBuf },

    #[error("refusing to replace {}: not empty and holds no test vectors", .0.display())]
    OutputNotEmpty(PathBuf),

    #[error("incomplete test vector archive in {}: {detail}", .dir.display())]
    IncompleteArchive { dir: PathBuf, detail: String },

    #[error("filesystem error: {0}")]
    Fs(#[from] FsError),
}

/// Produces the test vector set of one program.
pub trait VectorGenerator {
    fn generate(
        &self,
        label: &str,
        source_dir: &Path,
        output_dir: &Path,
    ) -> Result<TestVectorSet, GenerateError>;
}

fn file_name_of(path: &Path) -> Result<String, GenerateError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| GenerateError::InvalidPath(path.to_path_buf()))
}

/// `path` with `.` dropped and `..` folded into the preceding name.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir
                if matches!(out.components().next_back(), Some(Component::Normal(_))) =>
            {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

fn run_step<R: CommandRunner>(
    runner: &R,
    step: &'static str,
    spec: &CommandSpec,
) -> Result<CommandOutput, GenerateError> {
    let output = runner
        .run(spec)
        .map_err(|source| GenerateError::Runner { step, source })?;
    if !output.success() {
        return Err(GenerateError::CommandFailed {
            step,
            code: output.code_display(),
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(output)
}

/// Check that the container runtime can start the generator image.
///
/// Runs `echo hello world` in a disposable container and expects that
/// exact line back.
pub fn check_container_runtime<R: CommandRunner>(
    runner: &R,
    config: &ToolchainConfig,
) -> Result<(), GenerateError> {
    let spec = CommandSpec::new(&config.docker_bin)
        .args(["run", "--rm", config.docker_image.as_str()])
        .args(["echo", "hello world"]);

    let output = runner
        .run(&spec)
        .map_err(|e| GenerateError::RuntimeUnavailable(e.to_string()))?;

    if !output.success() {
        return Err(GenerateError::RuntimeUnavailable(format!(
            "exit {}: {}",
            output.code_display(),
            output.stderr.trim()
        )));
    }
    if output.stdout.trim_end() != "hello world" {
        return Err(GenerateError::RuntimeUnavailable(format!(
            "unexpected output {:?}",
            output.stdout
        )));
    }
    Ok(())
}

/// Removes the container when dropped, whatever happened in between.
struct ContainerGuard<'a, R: CommandRunner> {
    runner: &'a R,
    docker_bin: &'a str,
    id: String,
}

impl<R: CommandRunner> Drop for ContainerGuard<'_, R> {
    fn drop(&mut self) {
        let spec = CommandSpec::new(self.docker_bin).args(["rm", "-f", self.id.as_str()]);
        let _ = self.runner.run(&spec);
    }
}

/// Generates vectors with the container runtime CLI.
pub struct DockerGenerator<'a, R: CommandRunner, F: Filesystem> {
    runner: &'a R,
    fs: &'a F,
    config: &'a ToolchainConfig,
}

impl<'a, R: CommandRunner, F: Filesystem> DockerGenerator<'a, R, F> {
    pub fn new(runner: &'a R, fs: &'a F, config: &'a ToolchainConfig) -> Self {
        Self { runner, fs, config }
    }

    fn docker(&self) -> CommandSpec {
        CommandSpec::new(&self.config.docker_bin)
    }

    /// The output directory is about to be removed: it must be disjoint
    /// from the program sources and either empty or a previous archive.
    fn check_output_dir(&self, source_dir: &Path, output_dir: &Path) -> Result<(), GenerateError> {
        let (source, output) = (normalize(source_dir), normalize(output_dir));
        if source.starts_with(&output) || output.starts_with(&source) {
            return Err(GenerateError::OutputOverlapsSource {
                output: output_dir.to_path_buf(),
                program_dir: source_dir.to_path_buf(),
            });
        }

        if !self.fs.exists(output_dir) {
            return Ok(());
        }
        let entries = self.fs.list_dir(output_dir)?;
        let previous_archive = entries
            .iter()
            .any(|name| name == VECTORS_DIR_NAME || name == MAPPING_DIR_NAME);
        if entries.is_empty() || previous_archive {
            Ok(())
        } else {
            Err(GenerateError::OutputNotEmpty(output_dir.to_path_buf()))
        }
    }

    fn start_container(&self) -> Result<ContainerGuard<'a, R>, GenerateError> {
        let spec = self
            .docker()
            .args(["run", "-d", self.config.docker_image.as_str()])
            .args(["tail", "-f", "/dev/null"]);
        let output = run_step(self.runner, "container start", &spec)?;

        let id = output.stdout.trim().to_string();
        if id.is_empty() {
            return Err(GenerateError::CommandFailed {
                step: "container start",
                code: output.code_display(),
                stderr: "no container id returned".to_string(),
            });
        }

        Ok(ContainerGuard {
            runner: self.runner,
            docker_bin: &self.config.docker_bin,
            id,
        })
    }

    /// Check the retrieved directory holds vectors and mapping tables.
    fn verify(&self, label: &str, output_dir: &Path) -> Result<TestVectorSet, GenerateError> {
        let set = TestVectorSet::from_root(label, output_dir);

        for dir in [&set.vectors_dir, &set.mapping_dir] {
            if !self.fs.is_dir(dir) {
                return Err(GenerateError::IncompleteArchive {
                    dir: output_dir.to_path_buf(),
                    detail: format!("missing {}", dir.display()),
                });
            }
        }

        if self.fs.list_dir(&set.vectors_dir)?.is_empty() {
            return Err(GenerateError::IncompleteArchive {
                dir: output_dir.to_path_buf(),
                detail: format!("no test vectors in {}", set.vectors_dir.display()),
            });
        }

        Ok(set)
    }
}

impl<R: CommandRunner, F: Filesystem> VectorGenerator for DockerGenerator<'_, R, F> {
    fn generate(
        &self,
        label: &str,
        source_dir: &Path,
        output_dir: &Path,
    ) -> Result<TestVectorSet, GenerateError> {
        let program_name = file_name_of(source_dir)?;
        let out_name = file_name_of(output_dir)?;
        let container_source = format!("{}/{}", CONTAINER_SOURCE_ROOT, program_name);
        let container_out = format!("/pix/{}", out_name);

        self.check_output_dir(source_dir, output_dir)?;
        // `docker cp` only creates the destination itself when it is absent.
        if self.fs.exists(output_dir) {
            self.fs.remove_dir_all(output_dir)?;
        }
        if let Some(parent) = output_dir.parent() {
            self.fs.create_dir_all(parent)?;
        }

        let container = self.start_container()?;
        let id = container.id.as_str();

        let copy_in = self.docker().args([
            "cp".to_string(),
            source_dir.display().to_string(),
            format!("{}:{}", id, container_source),
        ]);
        run_step(self.runner, "copy program into container", &copy_in)?;

        let script = format!(
            "cd {} && {} -d {} -o {}",
            CONTAINER_SCRIPTS_DIR, self.config.generate_script, container_source, container_out
        );
        let exec = self.docker().args(["exec", id, "sh", "-c"]).arg(script);
        run_step(self.runner, "test vector generation", &exec)?;

        let copy_out = self.docker().args([
            "cp".to_string(),
            format!("{}:{}", id, container_out),
            output_dir.display().to_string(),
        ]);
        run_step(self.runner, "copy test vectors from container", &copy_out)?;

        drop(container);
        self.verify(label, output_dir)
    }
}
