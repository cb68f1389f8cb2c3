//! CLI argument parsing for bpfeq.
//!
//! Three subcommands:
//! - `check` runs the whole pipeline on two program directories
//! - `generate` produces test vectors and the staged object for one program
//! - `compare` cross-validates already staged objects and vector sets

use std::path::PathBuf;
use std::time::Duration;

use bpfeq_conformance::{Pairing, ValidationConfig, DEFAULT_MAX_DIFFERENCES};
use bpfeq_toolchain::{ToolchainConfig, DEFAULT_DOCKER_IMAGE, DEFAULT_TOOLCHAIN_TIMEOUT_SEC};
use clap::{ArgAction, Args, Parser, Subcommand};
use thiserror::Error;

/// Default equivalence executor binary.
pub const DEFAULT_EQUIVALENCE_BIN: &str = "equivalence_check";

/// Default directory receiving per-run scratch directories.
pub const DEFAULT_WORK_DIR: &str = "bpfeq-runs";

/// Default artifact pairing strategy.
pub const DEFAULT_PAIRING: &str = "sorted-name";

/// Default timeout of one executor run in seconds.
pub const DEFAULT_EXEC_TIMEOUT_SEC: u64 = 300;

/// Errors from CLI argument validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    #[error("invalid path to {what}: {} is not a directory", .path.display())]
    NotADirectory { what: String, path: PathBuf },

    #[error("invalid path to {what}: {} is not a file", .path.display())]
    NotAFile { what: String, path: PathBuf },

    #[error("{0}")]
    InvalidPairing(String),

    #[error("vector-id-key must not be empty")]
    EmptyVectorIdKey,

    #[error("max-differences must be at least 1, got {0}")]
    InvalidMaxDifferences(usize),

    #[error("equivalence-bin must not be empty")]
    EmptyEquivalenceBin,

    #[error("docker-image must not be empty")]
    EmptyDockerImage,
}

/// Decide whether two compiled BPF programs behave identically.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "bpfeq")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"))]
#[command(about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v steps, -vv every mismatching pair).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Generate vectors for both programs, compile them and cross-validate.
    Check(CheckArgs),
    /// Generate vectors and the staged object for a single program.
    Generate(GenerateArgs),
    /// Cross-validate already staged objects and vector sets.
    Compare(CompareArgs),
}

/// External tooling options.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ToolchainArgs {
    /// Container image with the test vector generator.
    #[arg(long, default_value = DEFAULT_DOCKER_IMAGE)]
    pub docker_image: String,

    /// Timeout for each container or build step in seconds (0 disables).
    #[arg(long, default_value_t = DEFAULT_TOOLCHAIN_TIMEOUT_SEC)]
    pub generate_timeout_sec: u64,
}

impl Default for ToolchainArgs {
    fn default() -> Self {
        Self {
            docker_image: DEFAULT_DOCKER_IMAGE.to_string(),
            generate_timeout_sec: DEFAULT_TOOLCHAIN_TIMEOUT_SEC,
        }
    }
}

impl ToolchainArgs {
    pub fn validate(&self) -> Result<(), CliError> {
        if self.docker_image.trim().is_empty() {
            return Err(CliError::EmptyDockerImage);
        }
        Ok(())
    }

    pub fn to_config(&self) -> ToolchainConfig {
        ToolchainConfig::new()
            .with_docker_image(&self.docker_image)
            .with_timeout(self.generate_timeout_sec)
    }

    /// Timeout of container and build steps, `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        self.to_config().timeout()
    }
}

/// `None` when `secs` is zero.
fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Artifact comparison options.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ValidationArgs {
    /// How output artifacts are paired: sorted-name or vector-id.
    #[arg(long, default_value = DEFAULT_PAIRING)]
    pub pairing: String,

    /// Top-level artifact field holding the vector id (vector-id pairing).
    #[arg(long, default_value = bpfeq_conformance::DEFAULT_VECTOR_ID_KEY)]
    pub vector_id_key: String,

    /// Differences recorded per mismatching pair.
    #[arg(long, default_value_t = DEFAULT_MAX_DIFFERENCES)]
    pub max_differences: usize,
}

impl Default for ValidationArgs {
    fn default() -> Self {
        Self {
            pairing: DEFAULT_PAIRING.to_string(),
            vector_id_key: bpfeq_conformance::DEFAULT_VECTOR_ID_KEY.to_string(),
            max_differences: DEFAULT_MAX_DIFFERENCES,
        }
    }
}

impl ValidationArgs {
    /// Validate and build the comparison config.
    pub fn to_config(&self) -> Result<ValidationConfig, CliError> {
        if self.max_differences == 0 {
            return Err(CliError::InvalidMaxDifferences(self.max_differences));
        }
        let config = ValidationConfig::new().with_max_differences(self.max_differences);

        match self.pairing.parse::<Pairing>().map_err(CliError::InvalidPairing)? {
            Pairing::SortedName => Ok(config.with_pairing(Pairing::SortedName)),
            Pairing::VectorId { .. } => {
                if self.vector_id_key.trim().is_empty() {
                    return Err(CliError::EmptyVectorIdKey);
                }
                Ok(config.with_vector_id_key(&self.vector_id_key))
            }
        }
    }
}

/// Arguments for the check command.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct CheckArgs {
    /// Directory of the first BPF program.
    #[arg(value_name = "PROG_A_DIR")]
    pub prog_a: PathBuf,

    /// Directory of the second BPF program.
    #[arg(value_name = "PROG_B_DIR")]
    pub prog_b: PathBuf,

    /// Equivalence executor binary.
    #[arg(short = 'b', long, default_value = DEFAULT_EQUIVALENCE_BIN)]
    pub equivalence_bin: String,

    /// Directory receiving the per-run scratch directory.
    #[arg(long, default_value = DEFAULT_WORK_DIR)]
    pub work_dir: PathBuf,

    /// Exit with status 2 when the programs are not equivalent.
    #[arg(long)]
    pub fail_on_mismatch: bool,

    /// Timeout for every executor run in seconds (0 disables).
    #[arg(long, default_value_t = DEFAULT_EXEC_TIMEOUT_SEC)]
    pub exec_timeout_sec: u64,

    #[command(flatten)]
    pub toolchain: ToolchainArgs,

    #[command(flatten)]
    pub validation: ValidationArgs,
}

impl CheckArgs {
    /// Validate the arguments.
    pub fn validate(&self) -> Result<(), CliError> {
        if self.equivalence_bin.trim().is_empty() {
            return Err(CliError::EmptyEquivalenceBin);
        }
        self.toolchain.validate()?;
        self.validation.to_config().map(|_| ())
    }

    /// Executor timeout, `None` when disabled.
    pub fn exec_timeout(&self) -> Option<Duration> {
        timeout_from_secs(self.exec_timeout_sec)
    }
}

/// Arguments for the generate command.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct GenerateArgs {
    /// Directory of the BPF program.
    #[arg(value_name = "PROG_DIR")]
    pub prog_dir: PathBuf,

    /// Output directory for vectors, mapping tables and the staged object.
    #[arg(short, long = "out")]
    pub out_dir: PathBuf,

    #[command(flatten)]
    pub toolchain: ToolchainArgs,
}

impl GenerateArgs {
    /// Validate the arguments.
    pub fn validate(&self) -> Result<(), CliError> {
        self.toolchain.validate()
    }
}

/// Arguments for the compare command.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct CompareArgs {
    /// Staged object of the first program.
    #[arg(long)]
    pub prog_a: PathBuf,

    /// Vector set generated from the first program.
    #[arg(long)]
    pub vectors_a: PathBuf,

    /// Staged object of the second program.
    #[arg(long)]
    pub prog_b: PathBuf,

    /// Vector set generated from the second program.
    #[arg(long)]
    pub vectors_b: PathBuf,

    /// Equivalence executor binary.
    #[arg(short = 'b', long, default_value = DEFAULT_EQUIVALENCE_BIN)]
    pub equivalence_bin: String,

    /// Directory receiving the per-run scratch directory.
    #[arg(long, default_value = DEFAULT_WORK_DIR)]
    pub work_dir: PathBuf,

    /// Exit with status 2 when the programs are not equivalent.
    #[arg(long)]
    pub fail_on_mismatch: bool,

    /// Timeout for every executor run in seconds (0 disables).
    #[arg(long, default_value_t = DEFAULT_EXEC_TIMEOUT_SEC)]
    pub exec_timeout_sec: u64,

    #[command(flatten)]
    pub validation: ValidationArgs,
}

impl CompareArgs {
    /// Validate the arguments.
    pub fn validate(&self) -> Result<(), CliError> {
        if self.equivalence_bin.trim().is_empty() {
            return Err(CliError::EmptyEquivalenceBin);
        }
        self.validation.to_config().map(|_| ())
    }

    /// Executor timeout, `None` when disabled.
    pub fn exec_timeout(&self) -> Option<Duration> {
        timeout_from_secs(self.exec_timeout_sec)
    }
}

/// Parse CLI arguments from an iterator of strings.
/// Useful for testing.
pub fn parse_from<I, T>(iter: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(iter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_args(extra: &[&str]) -> CheckArgs {
        let mut argv = vec!["bpfeq", "check", "/src/a", "/src/b"];
        argv.extend_from_slice(extra);
        match parse_from(argv).expect("parse").command {
            Command::Check(args) => args,
            other => panic!("expected check, got {:?}", other),
        }
    }

    // --- check ---

    #[test]
    fn test_check_requires_both_programs() {
        assert!(parse_from(["bpfeq", "check"]).is_err());
        assert!(parse_from(["bpfeq", "check", "/src/a"]).is_err());
    }

    #[test]
    fn test_check_defaults() {
        let args = check_args(&[]);

        assert_eq!(args.prog_a, PathBuf::from("/src/a"));
        assert_eq!(args.prog_b, PathBuf::from("/src/b"));
        assert_eq!(args.equivalence_bin, "equivalence_check");
        assert_eq!(args.work_dir, PathBuf::from(DEFAULT_WORK_DIR));
        assert!(!args.fail_on_mismatch);
        assert_eq!(args.toolchain, ToolchainArgs::default());
        assert_eq!(args.validation, ValidationArgs::default());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_check_equivalence_bin_short_and_long() {
        assert_eq!(check_args(&["-b", "/opt/eq"]).equivalence_bin, "/opt/eq");
        assert_eq!(
            check_args(&["--equivalence-bin", "/opt/eq"]).equivalence_bin,
            "/opt/eq"
        );
    }

    #[test]
    fn test_check_docker_image_and_timeout() {
        let args = check_args(&["--docker-image", "local/klee", "--exec-timeout-sec", "0"]);

        assert_eq!(args.toolchain.docker_image, "local/klee");
        assert_eq!(args.exec_timeout(), None);
        assert_eq!(args.toolchain.timeout(), Some(Duration::from_secs(3600)));
        assert_eq!(args.toolchain.to_config().docker_image, "local/klee");
    }

    #[test]
    fn test_check_default_timeouts() {
        let args = check_args(&[]);
        assert_eq!(args.exec_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(args.toolchain.timeout(), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_check_generate_timeout_leaves_executor_timeout() {
        let args = check_args(&["--generate-timeout-sec", "0"]);
        assert_eq!(args.toolchain.timeout(), None);
        assert_eq!(args.exec_timeout(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_check_timeout_non_numeric() {
        let result = parse_from(["bpfeq", "check", "a", "b", "--exec-timeout-sec", "soon"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_check_empty_bin_rejected() {
        let args = check_args(&["-b", ""]);
        assert_eq!(args.validate(), Err(CliError::EmptyEquivalenceBin));
    }

    #[test]
    fn test_check_empty_docker_image_rejected() {
        let args = check_args(&["--docker-image", " "]);
        assert_eq!(args.validate(), Err(CliError::EmptyDockerImage));
    }

    // --- validation options ---

    #[test]
    fn test_pairing_vector_id_with_key() {
        let args = check_args(&["--pairing", "vector-id", "--vector-id-key", "id"]);
        let config = args.validation.to_config().unwrap();
        assert_eq!(config.pairing, Pairing::VectorId { key: "id".to_string() });
    }

    #[test]
    fn test_pairing_unknown_rejected() {
        let args = check_args(&["--pairing", "content"]);
        assert!(matches!(args.validate(), Err(CliError::InvalidPairing(_))));
    }

    #[test]
    fn test_vector_id_key_only_checked_for_vector_id() {
        let args = check_args(&["--vector-id-key", ""]);
        assert!(args.validate().is_ok());

        let args = check_args(&["--pairing", "vector-id", "--vector-id-key", ""]);
        assert_eq!(args.validate(), Err(CliError::EmptyVectorIdKey));
    }

    #[test]
    fn test_max_differences_zero_rejected() {
        let args = check_args(&["--max-differences", "0"]);
        assert_eq!(args.validate(), Err(CliError::InvalidMaxDifferences(0)));
    }

    // --- verbosity ---

    #[test]
    fn test_verbose_count_is_global() {
        let cli = parse_from(["bpfeq", "-vv", "check", "a", "b"]).unwrap();
        assert_eq!(cli.verbose, 2);

        let cli = parse_from(["bpfeq", "check", "a", "b", "-v"]).unwrap();
        assert_eq!(cli.verbose, 1);

        let cli = parse_from(["bpfeq", "check", "a", "b"]).unwrap();
        assert_eq!(cli.verbose, 0);
    }

    // --- generate ---

    #[test]
    fn test_generate_requires_out() {
        assert!(parse_from(["bpfeq", "generate", "/src/a"]).is_err());

        let cli = parse_from(["bpfeq", "generate", "/src/a", "--out", "/tmp/a"]).unwrap();
        match cli.command {
            Command::Generate(args) => {
                assert_eq!(args.prog_dir, PathBuf::from("/src/a"));
                assert_eq!(args.out_dir, PathBuf::from("/tmp/a"));
                assert!(args.validate().is_ok());
            }
            other => panic!("expected generate, got {:?}", other),
        }
    }

    // --- compare ---

    #[test]
    fn test_compare_requires_all_inputs() {
        let result = parse_from(["bpfeq", "compare", "--prog-a", "a.o", "--vectors-a", "va"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_compare_parses() {
        let cli = parse_from([
            "bpfeq", "compare", "--prog-a", "a.o", "--vectors-a", "va", "--prog-b", "b.o",
            "--vectors-b", "vb", "--fail-on-mismatch", "--exec-timeout-sec", "10",
        ])
        .unwrap();

        match cli.command {
            Command::Compare(args) => {
                assert_eq!(args.prog_b, PathBuf::from("b.o"));
                assert_eq!(args.vectors_b, PathBuf::from("vb"));
                assert!(args.fail_on_mismatch);
                assert_eq!(args.exec_timeout(), Some(Duration::from_secs(10)));
                assert!(args.validate().is_ok());
            }
            other => panic!("expected compare, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_subcommand() {
        assert!(parse_from(["bpfeq", "collect"]).is_err());
    }
}
