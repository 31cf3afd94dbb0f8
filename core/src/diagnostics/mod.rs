//! Collection of semantic diagnostics during reduction and analysis.
//!
//! Errors found while rewriting a tree never unwind: the offending node is
//! marked with the error type and the message lands here. Callers check
//! [`Reporter::has_errors`] once a stage completes.

mod context;

use core::cell::{Cell, RefCell};

use tracing::warn;

pub use context::Context;

use crate::api::{Diagnostic, Severity, Span};
use crate::{String, Vec};

#[derive(Debug, Default)]
pub struct Reporter {
    diagnostics: RefCell<Vec<Diagnostic>>,
    errors: Cell<usize>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&self, span: Span, message: impl Into<String>) {
        self.errors.set(self.errors.get() + 1);
        self.push(Diagnostic::new(Severity::Error, message, span));
    }

    /// Report an error along with the contexts that explain where it arose.
    pub fn error_in(&self, span: Span, message: impl Into<String>, contexts: &[Context]) {
        self.errors.set(self.errors.get() + 1);
        let mut diagnostic = Diagnostic::new(Severity::Error, message, span);
        diagnostic
            .related
            .extend(contexts.iter().map(Context::to_related_info));
        self.push(diagnostic);
    }

    pub fn warning(&self, span: Span, message: impl Into<String>) {
        let diagnostic = Diagnostic::new(Severity::Warning, message, span);
        warn!(span = %span, "{}", diagnostic.message);
        self.push(diagnostic);
    }

    pub fn push(&self, diagnostic: Diagnostic) {
        self.diagnostics.borrow_mut().push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.errors.get() > 0
    }

    pub fn error_count(&self) -> usize {
        self.errors.get()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .borrow()
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    /// Snapshot of everything reported so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }

    /// Drain the collected diagnostics, resetting the error count.
    pub fn take(&self) -> Vec<Diagnostic> {
        self.errors.set(0);
        core::mem::take(&mut *self.diagnostics.borrow_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_counted_separately_from_warnings() {
        let reporter = Reporter::new();
        reporter.warning(Span::new(0, 3), "degenerate comparison");
        assert!(!reporter.has_errors());

        reporter.error(Span::new(4, 9), "value used but not set");
        assert_eq!(reporter.error_count(), 1);
        assert_eq!(reporter.warning_count(), 1);

        let taken = reporter.take();
        assert_eq!(taken.len(), 2);
        assert!(!reporter.has_errors());
        assert!(reporter.diagnostics().is_empty());
    }

    #[test]
    fn test_error_in_attaches_contexts() {
        let reporter = Reporter::new();
        reporter.error_in(
            Span::new(10, 12),
            "division by zero",
            &[Context::CalledFrom {
                func: String::from("f"),
                span: Span::new(0, 4),
            }],
        );
        let diagnostics = reporter.diagnostics();
        assert_eq!(diagnostics[0].related.len(), 1);
        assert_eq!(diagnostics[0].related[0].message, "in call to 'f'");
    }
}
