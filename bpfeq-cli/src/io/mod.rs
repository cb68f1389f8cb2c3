//! I/O helpers for command output.

pub mod result_writer;

pub use result_writer::{write_result, ResultWriterError, RunReport};
