//! bpfeq CLI.
//!
//! This crate provides the command-line interface for the BPF program
//! equivalence checker: argument parsing and validation, the command
//! pipeline, and the persisted run report.

pub mod cli;
pub mod commands;
pub mod exit;
pub mod io;

pub use cli::{
    parse_from, CheckArgs, Cli, CliError, Command, CompareArgs, GenerateArgs, ToolchainArgs,
    ValidationArgs, DEFAULT_EQUIVALENCE_BIN, DEFAULT_PAIRING, DEFAULT_WORK_DIR,
};
pub use commands::{
    execute_check, execute_compare, execute_generate, CheckOutcome, CommandError, CommandResult,
    CompareOutcome, GenerateOutcome,
};
pub use io::{write_result, ResultWriterError, RunReport};
