//! Compiled BPF object verification.
//!
//! A build that silently produced a host object (or an empty one) would make
//! every later comparison meaningless, so staged objects are parsed and must
//! target the BPF architecture and contain at least one program section.

use object::{Architecture, Object, ObjectSection, SectionKind};
use thiserror::Error;

/// Errors from object inspection.
#[derive(Debug, Error)]
pub enum ObjectError {
    #[error("ELF parsing error: {0}")]
    Parse(String),

    #[error("not a BPF object (architecture {0})")]
    NotBpf(String),

    #[error("object contains no program sections")]
    NoPrograms,
}

/// What a compiled BPF object contains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectSummary {
    /// Executable sections (`xdp`, `tc`, `.text`, ...), in file order.
    pub program_sections: Vec<String>,
    /// Map definition sections (`.maps`, legacy `maps`).
    pub map_sections: Vec<String>,
    pub symbol_count: usize,
}

fn is_map_section(name: &str) -> bool {
    name == ".maps" || name == "maps" || name.starts_with("maps/")
}

/// Parse `bytes` as an ELF object and check that it is a BPF program.
pub fn inspect_object(bytes: &[u8]) -> Result<ObjectSummary, ObjectError> {
    let file = object::File::parse(bytes).map_err(|e| ObjectError::Parse(e.to_string()))?;

    if file.architecture() != Architecture::Bpf {
        return Err(ObjectError::NotBpf(format!("{:?}", file.architecture())));
    }

    let mut summary = ObjectSummary {
        symbol_count: file.symbols().count(),
        ..ObjectSummary::default()
    };

    for section in file.sections() {
        let name = match section.name() {
            Ok(n) => n,
            Err(_) => continue,
        };

        if is_map_section(name) {
            summary.map_sections.push(name.to_string());
        } else if section.kind() == SectionKind::Text && section.size() > 0 {
            summary.program_sections.push(name.to_string());
        }
    }

    if summary.program_sections.is_empty() {
        return Err(ObjectError::NoPrograms);
    }

    Ok(summary)
}
