//! bpfeq external tooling.
//!
//! This crate provides:
//! - `CommandRunner` trait for blocking external processes, with a
//!   timeout-enforcing `ProcessRunner` and a scripted `MockRunner`
//! - `DockerGenerator` producing symbolic test vectors in a throwaway container
//! - `Compiler` building a program directory and staging its `.bpf.o`
//! - BPF ELF object inspection

pub mod compiler;
pub mod config;
pub mod elf;
pub mod generator;
pub mod runner;
pub mod sleeper;

pub use compiler::{find_object, sha256_hex, stage_object, CompileError, Compiler};
pub use config::{
    ToolchainConfig, DEFAULT_DOCKER_BIN, DEFAULT_DOCKER_IMAGE, DEFAULT_GENERATE_SCRIPT,
    DEFAULT_MAKE_TARGET, DEFAULT_OBJECT_PATTERN, DEFAULT_TOOLCHAIN_TIMEOUT_SEC,
};
pub use generator::{check_container_runtime, DockerGenerator, GenerateError, VectorGenerator};
pub use elf::{inspect_object, ObjectError, ObjectSummary};
pub use runner::{
    check_tool_available, CommandOutput, CommandRunner, CommandSpec, MockRunner, ProcessRunner,
    RunnerError,
};
pub use sleeper::{MockSleeper, RealSleeper, Sleeper};
