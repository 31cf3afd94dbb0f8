//! Code generation errors.

use crate::api::{Diagnostic, Severity, Span};
use crate::{String, ToString};

/// Reasons a reduced body cannot become bytecode.
///
/// None of these is a script error: the body simply keeps running
/// through the tree interpreter.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    /// A construct the instruction set has no lowering for.
    #[error("cannot compile {what}")]
    Unsupported { what: String, span: Span },

    /// The frame would need more slots than operands can address.
    #[error("frame needs {needed} slots, more than the limit of {limit}")]
    TooManySlots { needed: usize, limit: usize },
}

impl CompileError {
    pub fn unsupported(what: impl Into<String>, span: Span) -> Self {
        CompileError::Unsupported {
            what: what.into(),
            span,
        }
    }

    /// Convert to a Diagnostic for API boundary.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let span = match self {
            CompileError::Unsupported { span, .. } => *span,
            CompileError::TooManySlots { .. } => Span::default(),
        };
        Diagnostic::new(Severity::Warning, self.to_string(), span)
            .with_help("the function runs through the tree interpreter instead")
    }
}
