use serde::Serialize;
use thiserror::Error;

use crate::tree::NodeId;

/// A hard failure from a single operation (analyzer load, rename request).
///
/// These never abort a whole parse: analyzer failures are caught at the
/// per-node dispatch site and downgraded to a [`Diagnostic`]; rename
/// failures are returned to the caller before any text is mutated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("line {line}: {message}")]
    MalformedBranch { line: usize, message: String },

    #[error("no options section in document")]
    MissingOptionsSection,

    #[error("no option named \"{0}\" is defined")]
    UnknownOption(String),

    #[error("symbol reference is out of range")]
    UnknownSymbol,

    #[error("invalid function declaration on line {0}")]
    InvalidFunctionDeclaration(usize),
}

/// How severe a diagnostic is. Warnings decorate the editor; errors mark
/// branches the recognizer gave up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A non-fatal finding attached to a source line (and, when known, the tree
/// node it concerns). Accumulated during a parse pass and surfaced to the
/// hosting editor as inline decorations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Machine-readable code, stable across releases.
    pub code: &'static str,
    pub message: String,
    /// 1-indexed source line.
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
}

impl Diagnostic {
    pub fn warning(code: &'static str, message: String, line: usize, node: Option<NodeId>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            code,
            message,
            line,
            node,
        }
    }

    pub fn error(code: &'static str, message: String, line: usize, node: Option<NodeId>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            code,
            message,
            line,
            node,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({})", self.line, self.message, self.code)
    }
}
