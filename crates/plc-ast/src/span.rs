//! Source positions and diagnostics shared by every later pass.

use std::fmt;
use std::path::Path;
use std::path::PathBuf;

/// A 1-based line and column pair, as used in every diagnostic.
///
/// Lines and columns are both 1-based per the external interface contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    /// The 1-based line number.
    pub line: u32,
    /// The 1-based column number.
    pub column: u32,
}

impl Span {
    /// Constructs a new span from a 1-based line and column.
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The severity of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// A fatal error; the compilation cannot continue past it.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
        }
    }
}

/// A single diagnostic message tied to a source position.
///
/// `Display` renders the external wire format other tools parse diagnostics
/// from: `path:line:column: severity: message`.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// The path of the source file the diagnostic refers to.
    pub path: PathBuf,
    /// The location within the source file.
    pub span: Span,
    /// The severity of the diagnostic.
    pub severity: Severity,
    /// The human-readable message.
    pub message: String,
}

impl Diagnostic {
    /// Constructs a new error diagnostic.
    pub fn error(path: impl AsRef<Path>, span: Span, message: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            span,
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}: {}",
            self.path.display(),
            self.span,
            self.severity,
            self.message
        )
    }
}
