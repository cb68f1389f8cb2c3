//! Generate command: vectors and staged object for one program.

use bpfeq_fs::Filesystem;
use bpfeq_log::Logger;
use bpfeq_schema::{Program, TestVectorSet};
use bpfeq_toolchain::{
    check_container_runtime, CommandRunner, Compiler, DockerGenerator, ObjectSummary,
    VectorGenerator,
};

use super::{require_dir, CommandResult};
use crate::cli::GenerateArgs;

/// Label used when the program directory has no usable name.
const FALLBACK_LABEL: &str = "prog";

/// Outcome of the generate command.
#[derive(Debug, Clone)]
pub struct GenerateOutcome {
    pub program: Program,
    pub vectors: TestVectorSet,
    pub summary: ObjectSummary,
}

/// Execute the generate command.
///
/// The output directory is replaced; afterwards it holds `ktest-files/`,
/// `map-results/` and the staged object, ready for `compare`. An output
/// directory overlapping the program, or a non-empty one holding no previous
/// vectors, is refused before anything is removed.
pub fn execute_generate<R, F, L>(
    args: &GenerateArgs,
    runner: &R,
    fs: &F,
    logger: &L,
) -> CommandResult<GenerateOutcome>
where
    R: CommandRunner,
    F: Filesystem,
    L: Logger,
{
    args.validate()?;
    require_dir(fs, "program", &args.prog_dir)?;

    let toolchain = args.toolchain.to_config();
    check_container_runtime(runner, &toolchain)?;

    let label = args
        .prog_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(FALLBACK_LABEL)
        .to_string();

    logger.info(&format!(
        "generating test vectors for {} into {}",
        label,
        args.out_dir.display()
    ));
    let generator = DockerGenerator::new(runner, fs, &toolchain);
    let vectors = generator.generate(&label, &args.prog_dir, &args.out_dir)?;

    logger.info(&format!("compiling {}", label));
    let compiler = Compiler::new(runner, fs, &toolchain);
    let (program, summary) = compiler.compile(&label, &args.prog_dir, &args.out_dir)?;
    logger.verbose(&format!(
        "{} staged at {} (sha256 {})",
        label,
        program.path.display(),
        program.sha256.as_deref().unwrap_or("-")
    ));

    Ok(GenerateOutcome {
        program,
        vectors,
        summary,
    })
}
