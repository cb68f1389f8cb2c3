//! Compare command: cross-validate staged objects and vector sets.

use std::path::{Path, PathBuf};

use bpfeq_clock::{Clock, RunId};
use bpfeq_conformance::{check_equivalence, ProcessExecutor, Validator};
use bpfeq_fs::{Filesystem, ProgramSide, RunLayout};
use bpfeq_log::Logger;
use bpfeq_schema::{Program, TestVectorSet};
use bpfeq_toolchain::{inspect_object, sha256_hex, CommandRunner, CompileError};

use super::{log_verdict, require_dir, require_executor, require_file, CommandResult};
use crate::cli::CompareArgs;
use crate::io::{write_result, RunReport};

/// Outcome of a completed comparison.
#[derive(Debug, Clone)]
pub struct CompareOutcome {
    pub run_dir: PathBuf,
    pub result_path: PathBuf,
    pub report: RunReport,
}

/// Execute the compare command.
///
/// No container is started; the vector sets must already hold
/// `ktest-files/` and `map-results/`.
pub fn execute_compare<R, F, C, L>(
    args: &CompareArgs,
    runner: &R,
    fs: &F,
    clock: &C,
    logger: &L,
) -> CommandResult<CompareOutcome>
where
    R: CommandRunner,
    F: Filesystem,
    C: Clock,
    L: Logger,
{
    args.validate()?;
    let validation = args.validation.to_config()?;

    let program_a = load_program(fs, ProgramSide::A, &args.prog_a)?;
    let program_b = load_program(fs, ProgramSide::B, &args.prog_b)?;
    let vectors_a = load_vectors(fs, ProgramSide::A, &args.vectors_a)?;
    let vectors_b = load_vectors(fs, ProgramSide::B, &args.vectors_b)?;

    require_executor(runner, &args.equivalence_bin)?;

    let run_id = RunId::from_clock(clock);
    let layout = RunLayout::new(&args.work_dir, run_id.clone());
    layout.create(fs)?;
    logger.info(&format!("run directory {}", layout.root().display()));

    let executor = ProcessExecutor::new(runner, args.equivalence_bin.as_str());
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

    Ok(CompareOutcome {
        run_dir: layout.root().to_path_buf(),
        result_path,
        report,
    })
}

/// Read and verify a staged object, recording its digest.
fn load_program<F: Filesystem>(fs: &F, side: ProgramSide, path: &Path) -> CommandResult<Program> {
    require_file(fs, &format!("program {}", side), path)?;
    let bytes = fs.read_bytes(path)?;
    inspect_object(&bytes).map_err(|source| CompileError::InvalidObject {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Program::new(side.label(), path).with_sha256(sha256_hex(&bytes)))
}

fn load_vectors<F: Filesystem>(fs: &F, side: ProgramSide, root: &Path) -> CommandResult<TestVectorSet> {
    let vectors = TestVectorSet::from_root(side.test_cases_dir_name(), root);
    require_dir(fs, &format!("{} test vectors", side), &vectors.vectors_dir)?;
    require_dir(fs, &format!("{} mapping tables", side), &vectors.mapping_dir)?;
    Ok(vectors)
}
