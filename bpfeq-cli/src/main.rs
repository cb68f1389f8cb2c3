//! bpfeq CLI binary.
//!
//! Entry point for the `bpfeq` command-line tool.

use std::path::Path;
use std::process::ExitCode;

use bpfeq_cli::exit::{codes, exit_code, verdict_exit_code};
use bpfeq_cli::{
    execute_check, execute_compare, execute_generate, CheckArgs, Cli, Command, CommandError,
    CompareArgs, GenerateArgs, RunReport,
};
use bpfeq_clock::SystemClock;
use bpfeq_fs::RealFilesystem;
use bpfeq_log::StderrLogger;
use bpfeq_toolchain::ProcessRunner;
use clap::Parser;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let logger = StderrLogger::from_count(cli.verbose);

    let result = match cli.command {
        Command::Check(args) => run_check(args, &logger),
        Command::Generate(args) => run_generate(args, &logger),
        Command::Compare(args) => run_compare(args, &logger),
    };

    match result {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(exit_code(&e) as u8)
        }
    }
}

/// Run the check command.
fn run_check(args: CheckArgs, logger: &StderrLogger) -> Result<i32, CommandError> {
    let runner = ProcessRunner::new(args.toolchain.timeout());
    let executor_runner = ProcessRunner::new(args.exec_timeout());
    let outcome = execute_check(
        &args,
        &runner,
        &executor_runner,
        &RealFilesystem,
        &SystemClock,
        logger,
    )?;

    print_verdict(&outcome.report, &outcome.result_path);
    Ok(verdict_exit_code(&outcome.report.result, args.fail_on_mismatch))
}

/// Run the generate command.
fn run_generate(args: GenerateArgs, logger: &StderrLogger) -> Result<i32, CommandError> {
    let runner = ProcessRunner::new(args.toolchain.timeout());
    let outcome = execute_generate(&args, &runner, &RealFilesystem, logger)?;

    println!("Generated test vectors:");
    println!("  Vectors: {}", outcome.vectors.vectors_dir.display());
    println!("  Mapping tables: {}", outcome.vectors.mapping_dir.display());
    println!("  Object: {}", outcome.program.path.display());
    println!("  Programs: {}", outcome.summary.program_sections.join(", "));
    if let Some(sha) = &outcome.program.sha256 {
        println!("  SHA-256: {}", sha);
    }

    Ok(codes::SUCCESS)
}

/// Run the compare command.
fn run_compare(args: CompareArgs, logger: &StderrLogger) -> Result<i32, CommandError> {
    let runner = ProcessRunner::new(args.exec_timeout());
    let outcome = execute_compare(&args, &runner, &RealFilesystem, &SystemClock, logger)?;

    print_verdict(&outcome.report, &outcome.result_path);
    Ok(verdict_exit_code(&outcome.report.result, args.fail_on_mismatch))
}

fn print_verdict(report: &RunReport, result_path: &Path) {
    println!("{}", report.result.statement());
    for (direction, vector) in report.result.mismatching_vectors() {
        println!("  {} mismatch: {}", direction, vector);
    }
    println!("Result: {}", result_path.display());
}
