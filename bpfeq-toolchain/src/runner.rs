//! Blocking external process execution.
//!
//! Every external tool (container runtime, `make`, the equivalence executor)
//! is invoked through [`CommandRunner`]. The real [`ProcessRunner`] captures
//! stdout/stderr and kills the child once the configured timeout expires;
//! [`MockRunner`] returns scripted outputs and records every invocation.

use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::sleeper::{RealSleeper, Sleeper};

/// Interval between `try_wait` polls while a child is running.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Errors from running an external command.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("command not found: {program}")]
    NotFound { program: String },

    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {timeout_sec}s")]
    TimedOut { command: String, timeout_sec: u64 },

    #[error("failed waiting for `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// A command line to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, T>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Exit code rendered for messages (`signal` when killed).
    pub fn code_display(&self) -> String {
        self.code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string())
    }
}

/// Trait for running external commands to completion.
pub trait CommandRunner: Send + Sync {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError> {
        (**self).run(spec)
    }
}

/// Runs commands as child processes with an optional wall-clock timeout.
#[derive(Debug, Clone)]
pub struct ProcessRunner<S: Sleeper = RealSleeper> {
    timeout: Option<Duration>,
    poll_interval: Duration,
    sleeper: S,
}

impl ProcessRunner<RealSleeper> {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self::with_sleeper(timeout, RealSleeper)
    }
}

impl<S: Sleeper> ProcessRunner<S> {
    pub fn with_sleeper(timeout: Option<Duration>, sleeper: S) -> Self {
        Self {
            timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
            sleeper,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl<S: Sleeper> CommandRunner for ProcessRunner<S> {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RunnerError::NotFound {
                    program: spec.program.clone(),
                }
            } else {
                RunnerError::Spawn {
                    command: spec.to_string(),
                    source: e,
                }
            }
        })?;

        // Drain pipes concurrently so a chatty child cannot block on a full pipe.
        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if let Some(limit) = self.timeout {
                        if started.elapsed() >= limit {
                            let _ = child.kill();
                            let _ = child.wait();
                            return Err(RunnerError::TimedOut {
                                command: spec.to_string(),
                                timeout_sec: limit.as_secs(),
                            });
                        }
                    }
                    self.sleeper.sleep(self.poll_interval);
                }
                Err(e) => {
                    return Err(RunnerError::Wait {
                        command: spec.to_string(),
                        source: e,
                    })
                }
            }
        };

        Ok(CommandOutput {
            code: status.code(),
            stdout: join_reader(stdout),
            stderr: join_reader(stderr),
        })
    }
}

fn spawn_reader<R: Read + Send + 'static>(source: Option<R>) -> Option<JoinHandle<String>> {
    source.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn join_reader(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// Check that a tool can be started at all (`<program> --help`).
///
/// Only a failure to spawn is an error; the exit code of `--help` is ignored.
pub fn check_tool_available<R: CommandRunner>(runner: &R, program: &str) -> Result<(), RunnerError> {
    runner.run(&CommandSpec::new(program).arg("--help")).map(|_| ())
}

type Effect = Box<dyn Fn(&CommandSpec) + Send + Sync>;

enum Scripted {
    Output(CommandOutput),
    NotFound,
    TimedOut(u64),
}

struct Script {
    prefix: String,
    result: Scripted,
    effect: Option<Effect>,
}

/// Scripted runner for tests.
///
/// A script matches when the rendered command line starts with its prefix;
/// the first matching script wins. Unmatched commands succeed with empty
/// output.
#[derive(Default)]
pub struct MockRunner {
    scripts: Vec<Script>,
    calls: Arc<Mutex<Vec<CommandSpec>>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, script: Script) -> Self {
        self.scripts.push(script);
        self
    }

    /// Return `output` for commands starting with `prefix`.
    pub fn on(self, prefix: &str, output: CommandOutput) -> Self {
        self.push(Script {
            prefix: prefix.to_string(),
            result: Scripted::Output(output),
            effect: None,
        })
    }

    /// Like [`MockRunner::on`], also running `effect` (e.g. writing files).
    pub fn on_with<E>(self, prefix: &str, output: CommandOutput, effect: E) -> Self
    where
        E: Fn(&CommandSpec) + Send + Sync + 'static,
    {
        self.push(Script {
            prefix: prefix.to_string(),
            result: Scripted::Output(output),
            effect: Some(Box::new(effect)),
        })
    }

    /// Fail commands starting with `prefix` as if the binary did not exist.
    pub fn not_found(self, prefix: &str) -> Self {
        self.push(Script {
            prefix: prefix.to_string(),
            result: Scripted::NotFound,
            effect: None,
        })
    }

    /// Fail commands starting with `prefix` with a timeout.
    pub fn timed_out(self, prefix: &str, timeout_sec: u64) -> Self {
        self.push(Script {
            prefix: prefix.to_string(),
            result: Scripted::TimedOut(timeout_sec),
            effect: None,
        })
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Rendered command lines run so far.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.to_string()).collect()
    }

    pub fn count_matching(&self, prefix: &str) -> usize {
        self.command_lines()
            .iter()
            .filter(|line| line.starts_with(prefix))
            .count()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(spec.clone());
        }

        let line = spec.to_string();
        let Some(script) = self.scripts.iter().find(|s| line.starts_with(&s.prefix)) else {
            return Ok(CommandOutput::ok(""));
        };

        if let Some(effect) = &script.effect {
            effect(spec);
        }

        match &script.result {
            Scripted::Output(output) => Ok(output.clone()),
            Scripted::NotFound => Err(RunnerError::NotFound {
                program: spec.program.clone(),
            }),
            Scripted::TimedOut(timeout_sec) => Err(RunnerError::TimedOut {
                command: line,
                timeout_sec: *timeout_sec,
            }),
        }
    }
}
