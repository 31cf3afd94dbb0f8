use crate::api::{RelatedInfo, Span};
use crate::{String, format};

/// Context information for error messages.
///
/// Provides additional information about where an error occurred, such as
/// the chain of script calls that led to a runtime error. Each context entry
/// converts to a `RelatedInfo` for diagnostic display.
#[derive(Debug, Clone, PartialEq)]
pub enum Context {
    /// Inside a call to a script function.
    CalledFrom { func: String, span: Span },
    /// The expression as written, before reduction rewrote it.
    OriginalExpr { text: String, span: Span },
    /// Inside an expression of the given kind.
    InExpression { kind: &'static str, span: Span },
}

impl Context {
    /// Convert to a RelatedInfo for diagnostic display
    pub fn to_related_info(&self) -> RelatedInfo {
        match self {
            Context::CalledFrom { func, span } => RelatedInfo {
                span: *span,
                message: format!("in call to '{}'", func),
            },
            Context::OriginalExpr { text, span } => RelatedInfo {
                span: *span,
                message: format!("expression: {}", text),
            },
            Context::InExpression { kind, span } => RelatedInfo {
                span: *span,
                message: format!("in {} expression", kind),
            },
        }
    }
}
