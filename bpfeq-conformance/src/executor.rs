//! Running a compiled program against a vector set.
//!
//! The executor writes one structured-output file per successfully executed
//! vector into the output directory. Any failure is fatal for the run and
//! is never retried.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bpfeq_fs::{Filesystem, FsError, MockFilesystem};
use bpfeq_schema::{Program, TestVectorSet};
use bpfeq_toolchain::{CommandRunner, CommandSpec, RunnerError};
use thiserror::Error;

/// Errors from executing a program.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("failed to run executor for {program}: {source}")]
    Runner {
        program: String,
        #[source]
        source: RunnerError,
    },

    #[error("executor failed for {program} on {vector_set} (exit {code}): {stderr}")]
    Failed {
        program: String,
        vector_set: String,
        code: String,
        stderr: String,
    },
}

/// Runs one program against one vector set.
pub trait ProgramExecutor {
    fn execute(
        &self,
        program: &Program,
        vectors: &TestVectorSet,
        output_dir: &Path,
    ) -> Result<(), ExecutorError>;
}

impl<E: ProgramExecutor + ?Sized> ProgramExecutor for &E {
    fn execute(
        &self,
        program: &Program,
        vectors: &TestVectorSet,
        output_dir: &Path,
    ) -> Result<(), ExecutorError> {
        (**self).execute(program, vectors, output_dir)
    }
}

fn with_trailing_slash(path: &Path) -> String {
    let mut s = path.display().to_string();
    if !s.ends_with('/') {
        s.push('/');
    }
    s
}

/// Invokes the external equivalence executor binary:
/// `<bin> -b <object> -i <vectors>/ -m <mapping>/ -d <output>`.
pub struct ProcessExecutor<R: CommandRunner> {
    runner: R,
    binary: String,
}

impl<R: CommandRunner> ProcessExecutor<R> {
    pub fn new(runner: R, binary: impl Into<String>) -> Self {
        Self {
            runner,
            binary: binary.into(),
        }
    }

    pub fn command(&self, program: &Program, vectors: &TestVectorSet, output_dir: &Path) -> CommandSpec {
        CommandSpec::new(&self.binary).args([
            "-b".to_string(),
            program.path.display().to_string(),
            "-i".to_string(),
            with_trailing_slash(&vectors.vectors_dir),
            "-m".to_string(),
            with_trailing_slash(&vectors.mapping_dir),
            "-d".to_string(),
            output_dir.display().to_string(),
        ])
    }
}

impl<R: CommandRunner> ProgramExecutor for ProcessExecutor<R> {
    fn execute(
        &self,
        program: &Program,
        vectors: &TestVectorSet,
        output_dir: &Path,
    ) -> Result<(), ExecutorError> {
        let spec = self.command(program, vectors, output_dir);
        let output = self.runner.run(&spec).map_err(|source| ExecutorError::Runner {
            program: program.label.clone(),
            source,
        })?;

        if !output.success() {
            return Err(ExecutorError::Failed {
                program: program.label.clone(),
                vector_set: vectors.label.clone(),
                code: output.code_display(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}

/// One recorded [`MockExecutor`] invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorCall {
    pub program: String,
    pub vector_set: String,
    pub output_dir: PathBuf,
}

/// Maps a vector set to the artifacts a program writes for it:
/// `(file name, contents)` pairs.
type Behaviour = Box<dyn Fn(&TestVectorSet) -> Vec<(String, String)> + Send + Sync>;

/// In-memory executor for tests.
///
/// Each program (by label) has a behaviour producing its artifacts, which
/// are written into the shared [`MockFilesystem`]. Programs without a
/// behaviour, or explicitly failing ones, return [`ExecutorError::Failed`].
pub struct MockExecutor {
    fs: MockFilesystem,
    behaviours: HashMap<String, Behaviour>,
    failing: Vec<String>,
    calls: Arc<Mutex<Vec<ExecutorCall>>>,
}

impl MockExecutor {
    pub fn new(fs: MockFilesystem) -> Self {
        Self {
            fs,
            behaviours: HashMap::new(),
            failing: Vec::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register how the program labelled `program` behaves.
    pub fn with_program<B>(mut self, program: &str, behaviour: B) -> Self
    where
        B: Fn(&TestVectorSet) -> Vec<(String, String)> + Send + Sync + 'static,
    {
        self.behaviours
            .insert(program.to_string(), Box::new(behaviour));
        self
    }

    /// Make every execution of `program` fail.
    pub fn failing(mut self, program: &str) -> Self {
        self.failing.push(program.to_string());
        self
    }

    pub fn calls(&self) -> Vec<ExecutorCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of executions against the vector set labelled `vector_set`.
    pub fn invocations_for(&self, vector_set: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.vector_set == vector_set)
            .count()
    }
}

impl ProgramExecutor for MockExecutor {
    fn execute(
        &self,
        program: &Program,
        vectors: &TestVectorSet,
        output_dir: &Path,
    ) -> Result<(), ExecutorError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(ExecutorCall {
                program: program.label.clone(),
                vector_set: vectors.label.clone(),
                output_dir: output_dir.to_path_buf(),
            });
        }

        let behaviour = match self.behaviours.get(&program.label) {
            Some(b) if !self.failing.contains(&program.label) => b,
            _ => {
                return Err(ExecutorError::Failed {
                    program: program.label.clone(),
                    vector_set: vectors.label.clone(),
                    code: "1".to_string(),
                    stderr: "mock executor failure".to_string(),
                })
            }
        };

        for (name, contents) in behaviour(vectors) {
            self.fs
                .write_atomic(&output_dir.join(name), contents.as_bytes())
                .map_err(|e| write_failure(program, vectors, e))?;
        }
        Ok(())
    }
}

fn write_failure(program: &Program, vectors: &TestVectorSet, e: FsError) -> ExecutorError {
    ExecutorError::Failed {
        program: program.label.clone(),
        vector_set: vectors.label.clone(),
        code: "1".to_string(),
        stderr: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpfeq_toolchain::{CommandOutput, MockRunner};

    fn vectors() -> TestVectorSet {
        TestVectorSet::from_root("vectors_a", Path::new("/run/progA_test_cases"))
    }

    #[test]
    fn test_process_executor_command_line() {
        let runner = MockRunner::new();
        let executor = ProcessExecutor::new(&runner, "equivalence_check");
        let program = Program::new("progA", "/run/progA_test_cases/xdp.bpf.o");

        executor
            .execute(&program, &vectors(), Path::new("/run/validation/forward/progA_output"))
            .unwrap();

        assert_eq!(
            runner.command_lines(),
            vec![concat!(
                "equivalence_check -b /run/progA_test_cases/xdp.bpf.o ",
                "-i /run/progA_test_cases/ktest-files/ ",
                "-m /run/progA_test_cases/map-results/ ",
                "-d /run/validation/forward/progA_output"
            )
            .to_string()]
        );
    }

    #[test]
    fn test_process_executor_nonzero_exit_is_fatal() {
        let runner = MockRunner::new().on("equivalence_check", CommandOutput::failed(4, "bad map\n"));
        let executor = ProcessExecutor::new(&runner, "equivalence_check");
        let program = Program::new("progB", "/b.bpf.o");

        let err = executor
            .execute(&program, &vectors(), Path::new("/out"))
            .unwrap_err();

        match err {
            ExecutorError::Failed { program, vector_set, code, stderr } => {
                assert_eq!(program, "progB");
                assert_eq!(vector_set, "vectors_a");
                assert_eq!(code, "4");
                assert_eq!(stderr, "bad map");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_process_executor_timeout_is_fatal() {
        let runner = MockRunner::new().timed_out("equivalence_check", 300);
        let executor = ProcessExecutor::new(&runner, "equivalence_check");

        let err = executor
            .execute(&Program::new("progA", "/a.bpf.o"), &vectors(), Path::new("/out"))
            .unwrap_err();

        assert!(matches!(
            err,
            ExecutorError::Runner { source: RunnerError::TimedOut { .. }, .. }
        ));
    }

    #[test]
    fn test_mock_executor_writes_artifacts_and_records() {
        let fs = MockFilesystem::new();
        let executor = MockExecutor::new(fs.clone()).with_program("progA", |set| {
            vec![("v1.json".to_string(), format!(r#"{{"set":"{}"}}"#, set.label))]
        });

        executor
            .execute(&Program::new("progA", "/a.o"), &vectors(), Path::new("/out/progA_output"))
            .unwrap();

        assert_eq!(
            fs.get_file(Path::new("/out/progA_output/v1.json")),
            Some(br#"{"set":"vectors_a"}"#.to_vec())
        );
        assert_eq!(executor.invocations_for("vectors_a"), 1);
        assert_eq!(executor.calls()[0].program, "progA");
    }

    #[test]
    fn test_mock_executor_unknown_and_failing_programs() {
        let fs = MockFilesystem::new();
        let executor = MockExecutor::new(fs)
            .with_program("progA", |_| Vec::new())
            .failing("progA");

        assert!(executor
            .execute(&Program::new("progA", "/a.o"), &vectors(), Path::new("/out"))
            .is_err());
        assert!(executor
            .execute(&Program::new("progZ", "/z.o"), &vectors(), Path::new("/out"))
            .is_err());
        assert_eq!(executor.calls().len(), 2);
    }
}
