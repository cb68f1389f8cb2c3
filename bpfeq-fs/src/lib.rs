//! Filesystem abstraction for bpfeq.
//!
//! This crate provides:
//! - `Filesystem` trait over the handful of operations the checker needs
//!   (directory listings, reads, atomic writes, copies, clearing)
//! - `RealFilesystem` and an in-memory `MockFilesystem` for tests
//! - `RunLayout` and `prepare_fresh_dir` for per-run scratch directories

pub mod filesystem;
pub mod scratch;

pub use filesystem::{Filesystem, FsError, MockFilesystem, RealFilesystem};
pub use scratch::{prepare_fresh_dir, ProgramSide, RunLayout};
