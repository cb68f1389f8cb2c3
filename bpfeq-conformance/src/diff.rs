//! Structural comparison of JSON documents.
//!
//! Object key order is insignificant, array order is significant, and
//! numbers compare by value (`1` equals `1.0`). Every other scalar compares
//! by type and value.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::{Number, Value};
use thiserror::Error;

/// Errors from loading a document for comparison.
#[derive(Debug, Error)]
pub enum DiffError {
    #[error("malformed document {}: {detail}", .path.display())]
    MalformedDocument { path: PathBuf, detail: String },
}

/// Kind of a single structural difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    /// Same JSON type, different value.
    ValueChanged,
    /// Different JSON types at the same path.
    TypeChanged,
    /// Key present on the right only.
    KeyAdded,
    /// Key present on the left only.
    KeyRemoved,
    /// Arrays of different lengths (common prefix is still compared).
    LengthChanged,
}

/// One difference, located by a JSON pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct Difference {
    pub path: String,
    pub kind: DiffKind,
    pub left: Option<Value>,
    pub right: Option<Value>,
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        let show = |v: &Option<Value>| v.as_ref().map(Value::to_string).unwrap_or_default();
        match self.kind {
            DiffKind::ValueChanged => {
                write!(f, "{}: {} != {}", path, show(&self.left), show(&self.right))
            }
            DiffKind::TypeChanged => write!(
                f,
                "{}: type {} != {} ({} != {})",
                path,
                self.left.as_ref().map(type_name).unwrap_or("none"),
                self.right.as_ref().map(type_name).unwrap_or("none"),
                show(&self.left),
                show(&self.right)
            ),
            DiffKind::KeyAdded => write!(f, "{}: added {}", path, show(&self.right)),
            DiffKind::KeyRemoved => write!(f, "{}: removed {}", path, show(&self.left)),
            DiffKind::LengthChanged => {
                write!(f, "{}: length {} != {}", path, show(&self.left), show(&self.right))
            }
        }
    }
}

/// All differences between two documents, in traversal order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffReport {
    pub differences: Vec<Difference>,
}

impl DiffReport {
    pub fn is_empty(&self) -> bool {
        self.differences.is_empty()
    }

    pub fn len(&self) -> usize {
        self.differences.len()
    }

    /// Rendered differences, at most `limit`, with a trailing count of the rest.
    pub fn summarize(&self, limit: usize) -> Vec<String> {
        let mut lines: Vec<String> = self
            .differences
            .iter()
            .take(limit)
            .map(Difference::to_string)
            .collect();
        if self.differences.len() > limit {
            lines.push(format!("... {} more", self.differences.len() - limit));
        }
        lines
    }
}

/// Parse the contents of `path` as a JSON document.
///
/// Bytes that are not UTF-8 are malformed, not an I/O failure.
pub fn parse_document(path: &Path, bytes: &[u8]) -> Result<Value, DiffError> {
    serde_json::from_slice(bytes).map_err(|e| DiffError::MalformedDocument {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

/// `true` iff the two documents are semantically equal.
pub fn documents_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| documents_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).map_or(false, |w| documents_equal(v, w)))
        }
        _ => left == right,
    }
}

/// Every difference between `left` and `right`.
pub fn diff_documents(left: &Value, right: &Value) -> DiffReport {
    let mut report = DiffReport::default();
    walk(String::new(), left, right, &mut report.differences);
    report
}

fn walk(path: String, left: &Value, right: &Value, out: &mut Vec<Difference>) {
    match (left, right) {
        (Value::Object(a), Value::Object(b)) => {
            let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
            for key in keys {
                let child = format!("{}/{}", path, escape_pointer(key));
                match (a.get(key), b.get(key)) {
                    (Some(x), Some(y)) => walk(child, x, y, out),
                    (Some(x), None) => out.push(Difference {
                        path: child,
                        kind: DiffKind::KeyRemoved,
                        left: Some(x.clone()),
                        right: None,
                    }),
                    (None, Some(y)) => out.push(Difference {
                        path: child,
                        kind: DiffKind::KeyAdded,
                        left: None,
                        right: Some(y.clone()),
                    }),
                    (None, None) => {}
                }
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            for (i, (x, y)) in a.iter().zip(b).enumerate() {
                walk(format!("{}/{}", path, i), x, y, out);
            }
            if a.len() != b.len() {
                out.push(Difference {
                    path,
                    kind: DiffKind::LengthChanged,
                    left: Some(Value::from(a.len())),
                    right: Some(Value::from(b.len())),
                });
            }
        }
        _ if documents_equal(left, right) => {}
        _ => {
            let kind = if type_name(left) == type_name(right) {
                DiffKind::ValueChanged
            } else {
                DiffKind::TypeChanged
            };
            out.push(Difference {
                path,
                kind,
                left: Some(left.clone()),
                right: Some(right.clone()),
            });
        }
    }
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    match (integer_value(a), integer_value(b)) {
        (Some(x), Some(y)) => x == y,
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

fn integer_value(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}
