//! Runtime errors shared by the tree interpreter and the bytecode engine.
//!
//! A runtime error aborts the statement being interpreted, or for compiled
//! bodies the whole invocation. Nothing is retried.

use crate::api::{Diagnostic, Severity, Span};
use crate::diagnostics::Context;
use crate::{String, ToString, Vec};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("division by zero")]
    DivisionByZero { span: Option<Span> },

    #[error("index {index} out of range (length {len})")]
    IndexOutOfRange {
        index: i64,
        len: usize,
        span: Option<Span>,
    },

    #[error("no such index")]
    NoSuchIndex { span: Option<Span> },

    #[error("field '{field}' is not set and has no default")]
    FieldNotSet { field: String, span: Option<Span> },

    #[error("value used but not set: {name}")]
    ValueNotSet { name: String, span: Option<Span> },

    #[error("type clash: expected {expected}, found {found}")]
    TypeClash {
        expected: String,
        found: String,
        span: Option<Span>,
    },

    #[error("length mismatch: {left} vs {right}")]
    LengthMismatch {
        left: usize,
        right: usize,
        span: Option<Span>,
    },

    #[error("call depth {depth} exceeds maximum of {max_depth}")]
    CallDepthExceeded {
        depth: usize,
        max_depth: usize,
        span: Option<Span>,
    },

    #[error("loop iteration limit of {limit} exceeded")]
    IterationLimit { limit: usize, span: Option<Span> },

    #[error("{message}")]
    Builtin { message: String, span: Option<Span> },
}

impl RuntimeError {
    pub fn builtin(message: impl Into<String>) -> Self {
        RuntimeError::Builtin {
            message: message.into(),
            span: None,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            RuntimeError::DivisionByZero { span }
            | RuntimeError::IndexOutOfRange { span, .. }
            | RuntimeError::NoSuchIndex { span }
            | RuntimeError::FieldNotSet { span, .. }
            | RuntimeError::ValueNotSet { span, .. }
            | RuntimeError::TypeClash { span, .. }
            | RuntimeError::LengthMismatch { span, .. }
            | RuntimeError::CallDepthExceeded { span, .. }
            | RuntimeError::IterationLimit { span, .. }
            | RuntimeError::Builtin { span, .. } => *span,
        }
    }

    /// Fill in the location if the raising site did not know it.
    pub fn at(mut self, location: Span) -> Self {
        let slot = match &mut self {
            RuntimeError::DivisionByZero { span }
            | RuntimeError::IndexOutOfRange { span, .. }
            | RuntimeError::NoSuchIndex { span }
            | RuntimeError::FieldNotSet { span, .. }
            | RuntimeError::ValueNotSet { span, .. }
            | RuntimeError::TypeClash { span, .. }
            | RuntimeError::LengthMismatch { span, .. }
            | RuntimeError::CallDepthExceeded { span, .. }
            | RuntimeError::IterationLimit { span, .. }
            | RuntimeError::Builtin { span, .. } => span,
        };
        if slot.is_none() {
            *slot = Some(location);
        }
        self
    }
}

/// A runtime error together with the script call stack active when it
/// was raised, innermost call first.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{error}")]
pub struct ExecError {
    pub error: RuntimeError,
    pub call_stack: Vec<Context>,
}

impl ExecError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diagnostic = Diagnostic::new(
            Severity::Error,
            self.error.to_string(),
            self.error.span().unwrap_or_default(),
        );
        diagnostic
            .related
            .extend(self.call_stack.iter().map(Context::to_related_info));
        diagnostic
    }
}

impl From<RuntimeError> for ExecError {
    fn from(error: RuntimeError) -> Self {
        ExecError {
            error,
            call_stack: Vec::new(),
        }
    }
}
