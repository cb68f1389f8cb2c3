//! Check command: the full pipeline over two program directories.

use std::path::{Path, PathBuf};

use bpfeq_clock::{Clock, RunId};
use bpfeq_conformance::{check_equivalence, ProcessExecutor, Validator};
use bpfeq_fs::{Filesystem, ProgramSide, RunLayout};
use bpfeq_log::Logger;
use bpfeq_schema::{Program, TestVectorSet};
use bpfeq_toolchain::{
    check_container_runtime, CommandRunner, Compiler, DockerGenerator, VectorGenerator,
};

use super::{log_verdict, require_dir, require_executor, CommandResult};
use crate::cli::CheckArgs;
use crate::io::{write_result, RunReport};

/// Outcome of a completed check.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub run_dir: PathBuf,
    pub result_path: PathBuf,
    pub report: RunReport,
}

/// Execute the check command.
///
/// Generates vectors for both programs, compiles and stages both objects,
/// cross-validates them in both directions and writes `equivalence.json`
/// into a fresh run directory below `--work-dir`.
///
/// Container and build steps go through `runner`; the equivalence executor
/// goes through `executor_runner`, so each carries its own timeout.
pub fn execute_check<R, E, F, C, L>(
    args: &CheckArgs,
    runner: &R,
    executor_runner: &E,
    fs: &F,
    clock: &C,
    logger: &L,
) -> CommandResult<CheckOutcome>
where
    R: CommandRunner,
    E: CommandRunner,
    F: Filesystem,
    C: Clock,
    L: Logger,
{
    args.validate()?;
    let validation = args.validation.to_config()?;
    require_dir(fs, "program A", &args.prog_a)?;
    require_dir(fs, "program B", &args.prog_b)?;

    require_executor(executor_runner, &args.equivalence_bin)?;
    let toolchain = args.toolchain.to_config();
    check_container_runtime(runner, &toolchain)?;
    logger.verbose(&format!(
        "toolchain ready: {} and image {}",
        args.equivalence_bin, toolchain.docker_image
    ));

    let run_id = RunId::from_clock(clock);
    let layout = RunLayout::new(&args.work_dir, run_id.clone());
    layout.create(fs)?;
    logger.info(&format!("run directory {}", layout.root().display()));

    let generator = DockerGenerator::new(runner, fs, &toolchain);
    let vectors_a = generate_side(&generator, &layout, ProgramSide::A, &args.prog_a, logger)?;
    let vectors_b = generate_side(&generator, &layout, ProgramSide::B, &args.prog_b, logger)?;

    let compiler = Compiler::new(runner, fs, &toolchain);
    let program_a = compile_side(&compiler, &layout, ProgramSide::A, &args.prog_a, logger)?;
    let program_b = compile_side(&compiler, &layout, ProgramSide::B, &args.prog_b, logger)?;

    if program_a.is_bit_identical(&program_b) == Some(true) {
        logger.verbose("compiled objects are bit-identical");
    }

    let executor = ProcessExecutor::new(executor_runner, args.equivalence_bin.as_str());
    let validator = Validator::new(&executor, fs, logger, validation);
    let result = check_equivalence(
        validator,
        &program_a,
        &vectors_a,
        &program_b,
        &vectors_b,
        &layout.validation_root(),
    )?;
    log_verdict(logger, &run_id, &result);

    let report = RunReport::new(
        run_id.as_str(),
        run_id.started_at(),
        program_a,
        program_b,
        result,
    );
    let result_path = layout.result_path();
    write_result(fs, &result_path, &report)?;

    Ok(CheckOutcome {
        run_dir: layout.root().to_path_buf(),
        result_path,
        report,
    })
}

fn generate_side<G: VectorGenerator, L: Logger>(
    generator: &G,
    layout: &RunLayout,
    side: ProgramSide,
    source_dir: &Path,
    logger: &L,
) -> CommandResult<TestVectorSet> {
    let output_dir = layout.test_cases_dir(side);
    logger.info(&format!(
        "generating test vectors for {} from {}",
        side,
        source_dir.display()
    ));
    let vectors = generator.generate(&side.test_cases_dir_name(), source_dir, &output_dir)?;
    logger.verbose(&format!(
        "{} vectors in {}",
        side,
        vectors.vectors_dir.display()
    ));
    Ok(vectors)
}

fn compile_side<R: CommandRunner, F: Filesystem, L: Logger>(
    compiler: &Compiler<'_, R, F>,
    layout: &RunLayout,
    side: ProgramSide,
    source_dir: &Path,
    logger: &L,
) -> CommandResult<Program> {
    logger.info(&format!("compiling {} in {}", side, source_dir.display()));
    let (program, summary) = compiler.compile(side.label(), source_dir, &layout.test_cases_dir(side))?;
    logger.verbose(&format!(
        "{} staged at {} (programs: {}, maps: {})",
        side,
        program.path.display(),
        summary.program_sections.join(","),
        summary.map_sections.join(",")
    ));
    Ok(program)
}
