//! Public error types for the ZAM API.
//!
//! Internal error representations (`RuntimeError`, `CompileError`, the
//! reporter's diagnostics) are converted to these types at API boundaries.

use core::fmt;
use core::ops::Range;

use crate::{String, Vec};

/// Byte range into the script source a node was built from.
///
/// Trees built programmatically without source text use `Span::default()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Smallest span covering both `self` and `other`.
    pub fn join(&self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Public error type for all ZAM operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Reduction or analysis reported one or more errors.
    #[error("compilation failed with {} error(s)", count_errors(.diagnostics))]
    Compilation { diagnostics: Vec<Diagnostic> },

    /// Execution of a body aborted.
    #[error("runtime error: {}", .diagnostic.message)]
    Runtime { diagnostic: Diagnostic },

    /// The body uses a construct the code generator cannot express.
    ///
    /// The function keeps running through the tree interpreter.
    #[error("not compilable: {0}")]
    Unsupported(String),
}

fn count_errors(diagnostics: &[Diagnostic]) -> usize {
    diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count()
}

/// A diagnostic message (error, warning, or info) with source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Severity level (error, warning, info).
    pub severity: Severity,

    /// Primary diagnostic message.
    pub message: String,

    /// Source location of the primary issue.
    pub span: Span,

    /// Related locations that provide additional context.
    pub related: Vec<RelatedInfo>,

    /// Help text suggesting how to fix the issue.
    pub help: Vec<String>,

    /// Optional error code for documentation lookup.
    pub code: Option<String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>, span: Span) -> Self {
        Diagnostic {
            severity,
            message: message.into(),
            span,
            related: Vec::new(),
            help: Vec::new(),
            code: None,
        }
    }

    pub fn with_related(mut self, span: Span, message: impl Into<String>) -> Self {
        self.related.push(RelatedInfo {
            span,
            message: message.into(),
        });
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }

    pub fn with_code(mut self, code: &str) -> Self {
        self.code = Some(String::from(code));
        self
    }
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Error - the function cannot be compiled.
    Error,
    /// Warning - suspicious but legal code.
    Warning,
    /// Info - informational message.
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// Related information for a diagnostic (e.g. "called from here").
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedInfo {
    /// Source location of the related information.
    pub span: Span,

    /// Message explaining the relevance.
    pub message: String,
}

impl From<crate::interp::ExecError> for Error {
    fn from(e: crate::interp::ExecError) -> Self {
        Error::Runtime {
            diagnostic: e.to_diagnostic(),
        }
    }
}
