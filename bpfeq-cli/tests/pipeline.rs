//! Command-layer tests with a scripted toolchain.
//!
//! The container runtime, `make` and the equivalence executor are replaced
//! by a `MockRunner` whose effects materialise their outputs in a
//! `MockFilesystem`. The executor effect renders one JSON artifact per
//! `.ktest` vector from a per-program behaviour.

use std::path::{Path, PathBuf};

use bpfeq_cli::exit::{codes, exit_code, verdict_exit_code};
use bpfeq_cli::{
    execute_check, execute_compare, execute_generate, parse_from, CheckArgs, Command,
    CommandError, CompareArgs, GenerateArgs, RunReport,
};
use bpfeq_clock::MockClock;
use bpfeq_conformance::ValidateError;
use bpfeq_fs::{Filesystem, MockFilesystem, RealFilesystem};
use bpfeq_log::MockLogger;
use bpfeq_schema::Direction;
use bpfeq_toolchain::{CommandOutput, CommandSpec, CompileError, GenerateError, MockRunner};
use object::write;
use object::{Architecture, BinaryFormat, Endianness, SectionKind};
use serde_json::json;

const CONTAINER_ID: &str = "c0ffee";
const START: u64 = 1704067200;
const RUN_DIR: &str = "/work/bpfeq-20240101-000000Z";

/// Maps a vector number to the program's output document.
type Behaviour = fn(u32) -> serde_json::Value;

fn pass_all(_vector: u32) -> serde_json::Value {
    json!({"action": "XDP_PASS", "maps": {"stats": [0, 1]}})
}

fn drop_three(vector: u32) -> serde_json::Value {
    if vector == 3 {
        json!({"action": "XDP_DROP", "maps": {"stats": [0, 1]}})
    } else {
        pass_all(vector)
    }
}

/// Minimal BPF object whose `xdp` section returns `action`.
fn bpf_object(action: u8) -> Vec<u8> {
    let mut obj = write::Object::new(BinaryFormat::Elf, Architecture::Bpf, Endianness::Little);
    let text = obj.add_section(Vec::new(), b"xdp".to_vec(), SectionKind::Text);
    let insns = [
        0xb7, 0x00, 0x00, 0x00, action, 0x00, 0x00, 0x00, //
        0x95, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];
    obj.append_section_data(text, &insns, 8);
    obj.write().expect("failed to write ELF")
}

fn ktest_name(vector: u32) -> String {
    format!("test{:06}.ktest", vector)
}

fn vector_number(ktest: &str) -> Option<u32> {
    ktest.strip_prefix("test")?.strip_suffix(".ktest")?.parse().ok()
}

fn arg_after<'a>(spec: &'a CommandSpec, flag: &str) -> &'a str {
    let pos = spec.args.iter().position(|a| a == flag).expect("flag present");
    &spec.args[pos + 1]
}

/// Two program source trees and the vectors the generator finds for each.
struct Pipeline {
    fs: MockFilesystem,
    logger: MockLogger,
    clock: MockClock,
}

impl Pipeline {
    fn new() -> Self {
        let fs = MockFilesystem::new();
        fs.add_file("/src/xdp_a/Makefile", "build-original:");
        fs.add_file("/src/xdp_a/xdp_a.bpf.o", bpf_object(2));
        fs.add_file("/src/xdp_b/Makefile", "build-original:");
        fs.add_file("/src/xdp_b/xdp_b.bpf.o", bpf_object(2));
        Self {
            fs,
            logger: MockLogger::new(),
            clock: MockClock::new(START),
        }
    }

    /// Runner that generates `vectors_a` / `vectors_b` and executes the two
    /// programs with behaviours `a` / `b`.
    fn runner(&self, a: Behaviour, vectors_a: &'static [u32], b: Behaviour, vectors_b: &'static [u32]) -> MockRunner {
        self.scripted(MockRunner::new(), a, vectors_a, b, vectors_b)
    }

    /// Like [`Pipeline::runner`]; scripts already on `base` take precedence.
    fn scripted(
        &self,
        base: MockRunner,
        a: Behaviour,
        vectors_a: &'static [u32],
        b: Behaviour,
        vectors_b: &'static [u32],
    ) -> MockRunner {
        let copy_fs = self.fs.clone();
        let exec_fs = self.fs.clone();

        base
            .on("docker run --rm", CommandOutput::ok("hello world\n"))
            .on("docker run -d", CommandOutput::ok(format!("{}\n", CONTAINER_ID)))
            .on_with(
                &format!("docker cp {}:", CONTAINER_ID),
                CommandOutput::ok(""),
                move |spec| {
                    let dest = PathBuf::from(&spec.args[2]);
                    let vectors = if dest.ends_with("progA_test_cases") {
                        vectors_a
                    } else {
                        vectors_b
                    };
                    for v in vectors {
                        copy_fs.add_file(dest.join("ktest-files").join(ktest_name(*v)), "ktest");
                    }
                    copy_fs.add_file(dest.join("map-results").join("maps.json"), "{}");
                },
            )
            .on_with("equivalence_check -b", CommandOutput::ok(""), move |spec| {
                let behaviour = if arg_after(spec, "-b").contains("progA") { a } else { b };
                let vectors_dir = Path::new(arg_after(spec, "-i").trim_end_matches('/'));
                let output_dir = PathBuf::from(arg_after(spec, "-d"));
                for name in exec_fs.list_dir(vectors_dir).unwrap_or_default() {
                    if let Some(v) = vector_number(&name) {
                        exec_fs.add_file(
                            output_dir.join(format!("test{:06}.json", v)),
                            behaviour(v).to_string(),
                        );
                    }
                }
            })
    }

    fn check(&self, runner: &MockRunner, args: &CheckArgs) -> Result<bpfeq_cli::CheckOutcome, CommandError> {
        execute_check(args, runner, runner, &self.fs, &self.clock, &self.logger)
    }

    fn written_report(&self) -> RunReport {
        let text = self
            .fs
            .read_file(&Path::new(RUN_DIR).join("equivalence.json"))
            .expect("equivalence.json written");
        RunReport::from_json(&text).expect("valid report")
    }
}

fn check_args(extra: &[&str]) -> CheckArgs {
    let mut argv = vec!["bpfeq", "check", "/src/xdp_a", "/src/xdp_b", "--work-dir", "/work"];
    argv.extend_from_slice(extra);
    match parse_from(argv).expect("parse").command {
        Command::Check(args) => args,
        other => panic!("expected check, got {:?}", other),
    }
}

fn executor_runs_on(runner: &MockRunner, set: &str) -> usize {
    runner
        .command_lines()
        .iter()
        .filter(|l| l.starts_with("equivalence_check -b") && l.contains(&format!("/{}/ktest-files/", set)))
        .count()
}

// --- check ---

#[test]
fn check_equivalent_programs() {
    let pipeline = Pipeline::new();
    let runner = pipeline.runner(pass_all, &[1, 2, 3, 4, 5], pass_all, &[1, 2, 3]);
    let args = check_args(&[]);

    let outcome = pipeline.check(&runner, &args).unwrap();

    assert_eq!(outcome.run_dir, PathBuf::from(RUN_DIR));
    assert_eq!(outcome.result_path, Path::new(RUN_DIR).join("equivalence.json"));
    assert!(outcome.report.result.equivalent);
    assert_eq!(outcome.report.result.forward.pairs_compared, 5);
    assert_eq!(outcome.report.result.reverse.as_ref().unwrap().pairs_compared, 3);
    assert_eq!(verdict_exit_code(&outcome.report.result, args.fail_on_mismatch), codes::SUCCESS);

    let written = pipeline.written_report();
    assert_eq!(written, outcome.report);
    assert_eq!(written.run_id, "bpfeq-20240101-000000Z");
    assert_eq!(written.started_at, START);
    assert_eq!(written.bit_identical, Some(true));
    assert!(pipeline.logger.contains("The two programs are equivalent"));
}

#[test]
fn check_runs_executor_on_its_own_runner() {
    let pipeline = Pipeline::new();
    let toolchain = pipeline.scripted(
        MockRunner::new().timed_out("equivalence_check", 300),
        pass_all,
        &[1, 2],
        pass_all,
        &[1],
    );
    let executor = pipeline.runner(pass_all, &[], pass_all, &[]);
    let args = check_args(&[]);

    let outcome = execute_check(
        &args,
        &toolchain,
        &executor,
        &pipeline.fs,
        &pipeline.clock,
        &pipeline.logger,
    )
    .unwrap();

    assert!(outcome.report.result.equivalent);
    assert_eq!(toolchain.count_matching("equivalence_check"), 0);
    assert_eq!(executor.count_matching("docker"), 0);
    assert_eq!(executor.count_matching("make"), 0);
    assert_eq!(executor.count_matching("equivalence_check -b"), 4);
}

#[test]
fn check_runs_toolchain_steps_in_order() {
    let pipeline = Pipeline::new();
    let runner = pipeline.runner(pass_all, &[1], pass_all, &[1]);

    pipeline.check(&runner, &check_args(&[])).unwrap();

    let lines = runner.command_lines();
    assert_eq!(lines[0], "equivalence_check --help");
    assert_eq!(lines[1], "docker run --rm sebymiano/pix-klee:latest echo hello world");
    assert_eq!(lines[2], "docker run -d sebymiano/pix-klee:latest tail -f /dev/null");
    assert_eq!(
        lines[3],
        format!("docker cp /src/xdp_a {}:/pix/ebpf-nfs/xdp_a", CONTAINER_ID)
    );

    let make_dirs: Vec<Option<PathBuf>> = runner
        .calls()
        .into_iter()
        .filter(|c| c.program == "make")
        .map(|c| c.current_dir)
        .collect();
    assert_eq!(
        make_dirs,
        vec![Some(PathBuf::from("/src/xdp_a")), Some(PathBuf::from("/src/xdp_b"))]
    );
    assert_eq!(runner.count_matching(&format!("docker rm -f {}", CONTAINER_ID)), 2);
}

#[test]
fn check_stages_objects_next_to_vectors() {
    let pipeline = Pipeline::new();
    let runner = pipeline.runner(pass_all, &[1], pass_all, &[1]);

    let outcome = pipeline.check(&runner, &check_args(&[])).unwrap();

    assert_eq!(
        outcome.report.program_a.path,
        Path::new(RUN_DIR).join("progA_test_cases").join("xdp_a.bpf.o")
    );
    assert!(pipeline
        .fs
        .exists(&Path::new(RUN_DIR).join("progB_test_cases").join("xdp_b.bpf.o")));
    assert!(runner
        .command_lines()
        .iter()
        .any(|l| l.starts_with(&format!("equivalence_check -b {}/progA_test_cases/xdp_a.bpf.o", RUN_DIR))));
}

#[test]
fn check_mismatch_on_vector_three_skips_reverse() {
    let pipeline = Pipeline::new();
    let runner = pipeline.runner(pass_all, &[1, 2, 3, 4, 5], drop_three, &[1, 2, 3]);
    let args = check_args(&["--fail-on-mismatch"]);

    let outcome = pipeline.check(&runner, &args).unwrap();
    let result = &outcome.report.result;

    assert!(!result.equivalent);
    assert!(result.reverse_skipped());
    assert_eq!(result.mismatching_vectors(), vec![(Direction::Forward, "test000003")]);
    assert_eq!(executor_runs_on(&runner, "progA_test_cases"), 2);
    assert_eq!(executor_runs_on(&runner, "progB_test_cases"), 0);
    assert_eq!(verdict_exit_code(result, args.fail_on_mismatch), codes::NOT_EQUIVALENT);
    assert_eq!(verdict_exit_code(result, false), codes::SUCCESS);

    assert!(!pipeline.written_report().result.equivalent);
    assert!(pipeline.logger.contains("The two programs are not equivalent"));
}

#[test]
fn check_difference_found_by_reverse_vectors() {
    let pipeline = Pipeline::new();
    let runner = pipeline.runner(pass_all, &[1, 2], drop_three, &[2, 3]);

    let outcome = pipeline.check(&runner, &check_args(&[])).unwrap();

    assert!(outcome.report.result.forward.equivalent);
    assert_eq!(
        outcome.report.result.mismatching_vectors(),
        vec![(Direction::Reverse, "test000003")]
    );
}

#[test]
fn check_missing_program_dir() {
    let pipeline = Pipeline::new();
    let runner = MockRunner::new();
    let args = match parse_from(["bpfeq", "check", "/src/xdp_a", "/src/missing"]).unwrap().command {
        Command::Check(args) => args,
        other => panic!("expected check, got {:?}", other),
    };

    let err = pipeline.check(&runner, &args).unwrap_err();

    assert!(matches!(err, CommandError::InvalidArgument(_)));
    assert_eq!(exit_code(&err), codes::FAILURE);
    assert!(runner.calls().is_empty());
}

#[test]
fn check_executor_not_runnable() {
    let pipeline = Pipeline::new();
    let runner = MockRunner::new().not_found("equivalence_check");

    let err = pipeline.check(&runner, &check_args(&[])).unwrap_err();

    assert!(matches!(err, CommandError::Setup { .. }));
    assert_eq!(exit_code(&err), codes::FAILURE);
    assert_eq!(runner.count_matching("docker"), 0);
}

#[test]
fn check_container_runtime_unavailable() {
    let pipeline = Pipeline::new();
    let runner = MockRunner::new().on(
        "docker run --rm",
        CommandOutput::failed(125, "Cannot connect to the Docker daemon"),
    );

    let err = pipeline.check(&runner, &check_args(&[])).unwrap_err();

    assert!(matches!(
        err,
        CommandError::Generate(GenerateError::RuntimeUnavailable(_))
    ));
    assert!(!pipeline.fs.exists(Path::new(RUN_DIR)));
}

#[test]
fn check_build_failure_is_fatal() {
    let pipeline = Pipeline::new();
    let runner = pipeline.scripted(
        MockRunner::new().on("make build-original", CommandOutput::failed(2, "clang: error")),
        pass_all,
        &[1],
        pass_all,
        &[1],
    );

    let err = pipeline.check(&runner, &check_args(&[])).unwrap_err();

    assert!(matches!(err, CommandError::Compile(CompileError::BuildFailed { .. })));
    assert_eq!(runner.count_matching("equivalence_check -b"), 0);
}

#[test]
fn check_executor_failure_is_fatal() {
    let pipeline = Pipeline::new();
    let runner = pipeline.scripted(
        MockRunner::new().on(
            "equivalence_check -b",
            CommandOutput::failed(1, "bpf_prog_load: Invalid argument"),
        ),
        pass_all,
        &[1, 2],
        pass_all,
        &[1],
    );

    let err = pipeline.check(&runner, &check_args(&[])).unwrap_err();

    assert!(matches!(
        err,
        CommandError::Validate(ValidateError::Executor { direction: Direction::Forward, .. })
    ));
    assert!(err.to_string().contains("bpf_prog_load: Invalid argument"));
    assert!(!pipeline.fs.exists(&Path::new(RUN_DIR).join("equivalence.json")));
}

#[test]
fn check_executor_timeout_is_fatal() {
    let pipeline = Pipeline::new();
    let runner = pipeline.scripted(
        MockRunner::new().timed_out("equivalence_check -b", 300),
        pass_all,
        &[1],
        pass_all,
        &[1],
    );

    let err = pipeline.check(&runner, &check_args(&[])).unwrap_err();

    assert!(matches!(err, CommandError::Validate(ValidateError::Executor { .. })));
    assert_eq!(exit_code(&err), codes::FAILURE);
}

#[test]
fn check_reuses_nothing_from_a_previous_run() {
    let pipeline = Pipeline::new();
    pipeline.fs.add_file(
        Path::new(RUN_DIR).join("validation/forward/progB_output/test000009.json"),
        "{}",
    );
    let runner = pipeline.runner(pass_all, &[1, 2], pass_all, &[1]);

    let outcome = pipeline.check(&runner, &check_args(&[])).unwrap();

    assert!(outcome.report.result.equivalent);
    assert!(!pipeline
        .fs
        .exists(&Path::new(RUN_DIR).join("validation/forward/progB_output/test000009.json")));
}

// --- generate ---

#[test]
fn generate_single_program() {
    let pipeline = Pipeline::new();
    let runner = pipeline.runner(pass_all, &[1, 2], pass_all, &[]);
    let args = match parse_from(["bpfeq", "generate", "/src/xdp_a", "--out", "/out/progA_test_cases"])
        .unwrap()
        .command
    {
        Command::Generate(args) => args,
        other => panic!("expected generate, got {:?}", other),
    };

    let outcome: bpfeq_cli::GenerateOutcome =
        execute_generate(&args, &runner, &pipeline.fs, &pipeline.logger).unwrap();

    assert_eq!(outcome.vectors.label, "xdp_a");
    assert_eq!(
        outcome.vectors.vectors_dir,
        PathBuf::from("/out/progA_test_cases/ktest-files")
    );
    assert_eq!(outcome.program.path, PathBuf::from("/out/progA_test_cases/xdp_a.bpf.o"));
    assert_eq!(outcome.summary.program_sections, vec!["xdp".to_string()]);
    assert!(outcome.program.sha256.is_some());
    assert_eq!(
        pipeline.fs.list_dir(Path::new("/out/progA_test_cases/ktest-files")).unwrap().len(),
        2
    );
    assert_eq!(runner.count_matching("equivalence_check"), 0);
}

#[test]
fn generate_rejects_missing_program() {
    let pipeline = Pipeline::new();
    let runner = MockRunner::new();
    let args = GenerateArgs {
        prog_dir: PathBuf::from("/src/nope"),
        out_dir: PathBuf::from("/out"),
        toolchain: Default::default(),
    };

    let err = execute_generate(&args, &runner, &pipeline.fs, &pipeline.logger).unwrap_err();
    assert!(matches!(err, CommandError::InvalidArgument(_)));
}

#[test]
fn generate_into_program_dir_keeps_sources() {
    let pipeline = Pipeline::new();
    let runner = pipeline.runner(pass_all, &[1, 2], pass_all, &[]);
    let args = GenerateArgs {
        prog_dir: PathBuf::from("/src/xdp_a"),
        out_dir: PathBuf::from("/src/xdp_a"),
        toolchain: Default::default(),
    };

    let err = execute_generate(&args, &runner, &pipeline.fs, &pipeline.logger).unwrap_err();

    assert!(matches!(
        err,
        CommandError::Generate(GenerateError::OutputOverlapsSource { .. })
    ));
    assert_eq!(exit_code(&err), codes::FAILURE);
    assert!(pipeline.fs.exists(Path::new("/src/xdp_a/Makefile")));
    assert!(pipeline.fs.exists(Path::new("/src/xdp_a/xdp_a.bpf.o")));
    assert_eq!(runner.count_matching("docker run -d"), 0);
}

#[test]
fn generate_refuses_unrelated_output_dir() {
    let pipeline = Pipeline::new();
    let runner = pipeline.runner(pass_all, &[1, 2], pass_all, &[]);
    let args = GenerateArgs {
        prog_dir: PathBuf::from("/src/xdp_a"),
        out_dir: PathBuf::from("/src/xdp_b"),
        toolchain: Default::default(),
    };

    let err = execute_generate(&args, &runner, &pipeline.fs, &pipeline.logger).unwrap_err();

    assert!(matches!(err, CommandError::Generate(GenerateError::OutputNotEmpty(_))));
    assert!(pipeline.fs.exists(Path::new("/src/xdp_b/Makefile")));
}

// --- compare ---

fn stage(fs: &MockFilesystem, root: &str, object: &[u8], vectors: &[u32]) {
    fs.add_file(format!("{}/prog.bpf.o", root), object.to_vec());
    for v in vectors {
        fs.add_file(format!("{}/ktest-files/{}", root, ktest_name(*v)), "ktest");
    }
    fs.add_file(format!("{}/map-results/maps.json", root), "{}");
}

fn compare_args(extra: &[&str]) -> CompareArgs {
    let mut argv = vec![
        "bpfeq", "compare", "--prog-a", "/staged/progA_test_cases/prog.bpf.o", "--vectors-a",
        "/staged/progA_test_cases", "--prog-b", "/staged/progB_test_cases/prog.bpf.o",
        "--vectors-b", "/staged/progB_test_cases", "--work-dir", "/work",
    ];
    argv.extend_from_slice(extra);
    match parse_from(argv).expect("parse").command {
        Command::Compare(args) => args,
        other => panic!("expected compare, got {:?}", other),
    }
}

#[test]
fn compare_staged_artifacts() {
    let pipeline = Pipeline::new();
    stage(&pipeline.fs, "/staged/progA_test_cases", &bpf_object(2), &[1, 2, 3]);
    stage(&pipeline.fs, "/staged/progB_test_cases", &bpf_object(1), &[4, 5]);
    let runner = pipeline.runner(pass_all, &[], pass_all, &[]);

    let outcome = execute_compare(
        &compare_args(&[]),
        &runner,
        &pipeline.fs,
        &pipeline.clock,
        &pipeline.logger,
    )
    .unwrap();

    assert!(outcome.report.result.equivalent);
    assert_eq!(outcome.report.bit_identical, Some(false));
    assert_eq!(executor_runs_on(&runner, "progB_test_cases"), 2);
    assert_eq!(runner.count_matching("docker"), 0);
    assert_eq!(pipeline.written_report(), outcome.report);
}

#[test]
fn compare_rejects_non_bpf_object() {
    let pipeline = Pipeline::new();
    stage(&pipeline.fs, "/staged/progA_test_cases", b"#!/bin/sh\n", &[1]);
    stage(&pipeline.fs, "/staged/progB_test_cases", &bpf_object(2), &[1]);
    let runner = MockRunner::new();

    let err = execute_compare(
        &compare_args(&[]),
        &runner,
        &pipeline.fs,
        &pipeline.clock,
        &pipeline.logger,
    )
    .unwrap_err();

    assert!(matches!(err, CommandError::Compile(CompileError::InvalidObject { .. })));
    assert!(runner.calls().is_empty());
}

#[test]
fn compare_requires_mapping_tables() {
    let pipeline = Pipeline::new();
    stage(&pipeline.fs, "/staged/progA_test_cases", &bpf_object(2), &[1]);
    pipeline
        .fs
        .add_file("/staged/progB_test_cases/prog.bpf.o", bpf_object(2));
    pipeline
        .fs
        .add_file("/staged/progB_test_cases/ktest-files/test000001.ktest", "ktest");

    let err = execute_compare(
        &compare_args(&[]),
        &MockRunner::new(),
        &pipeline.fs,
        &pipeline.clock,
        &pipeline.logger,
    )
    .unwrap_err();

    assert!(err.to_string().contains("progB mapping tables"));
}

#[test]
fn compare_on_real_filesystem() {
    let tmp = tempfile::TempDir::new().unwrap();
    let root = tmp.path();
    for side in ["progA_test_cases", "progB_test_cases"] {
        std::fs::create_dir_all(root.join(side).join("ktest-files")).unwrap();
        std::fs::create_dir_all(root.join(side).join("map-results")).unwrap();
        std::fs::write(root.join(side).join("ktest-files").join(ktest_name(1)), "ktest").unwrap();
        std::fs::write(root.join(side).join("prog.bpf.o"), bpf_object(2)).unwrap();
    }
    let runner = MockRunner::new().on_with("equivalence_check -b", CommandOutput::ok(""), |spec| {
        let out = PathBuf::from(arg_after(spec, "-d"));
        std::fs::write(out.join("test000001.json"), r#"{"action":"XDP_PASS"}"#).unwrap();
    });
    let args = CompareArgs {
        prog_a: root.join("progA_test_cases/prog.bpf.o"),
        vectors_a: root.join("progA_test_cases"),
        prog_b: root.join("progB_test_cases/prog.bpf.o"),
        vectors_b: root.join("progB_test_cases"),
        work_dir: root.join("runs"),
        ..compare_args(&[])
    };

    let outcome = execute_compare(&args, &runner, &RealFilesystem, &MockClock::new(START), &MockLogger::new()).unwrap();

    assert!(outcome.report.result.equivalent);
    let text = std::fs::read_to_string(&outcome.result_path).unwrap();
    assert_eq!(RunReport::from_json(&text).unwrap(), outcome.report);
    assert!(root
        .join("runs/bpfeq-20240101-000000Z/validation/reverse/progB_output/test000001.json")
        .exists());
}
