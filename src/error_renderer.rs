//! Error rendering using ariadne
//!
//! Trees carry byte spans into the script they were built from. Given that
//! script, these functions print diagnostics with source snippets, related
//! locations (e.g. the call stack of a runtime error) and help notes.

use crate::{Diagnostic, Error, Severity};
use ariadne::{ColorGenerator, Label, Report, ReportKind, Source};
use std::io::Write;

const SOURCE_ID: &str = "<script>";

/// Render an error to stderr.
///
/// # Example
/// ```no_run
/// use zam::{Diagnostic, Error, Severity, Span, render_error};
///
/// let source = "return 1 / d;";
/// let error = Error::Runtime {
///     diagnostic: Diagnostic::new(Severity::Error, "division by zero", Span::new(7, 12)),
/// };
/// render_error(&error, source);
/// ```
pub fn render_error(error: &Error, source: &str) {
    render_error_to_writer(error, source, &mut std::io::stderr(), true).ok();
}

/// Render an error to a specific writer.
pub fn render_error_to(error: &Error, source: &str, writer: &mut dyn Write) -> std::io::Result<()> {
    render_error_to_writer(error, source, writer, true)
}

/// Render an error to a String, with color codes.
pub fn render_error_to_string(error: &Error, source: &str) -> String {
    let mut buf = Vec::new();
    render_error_to_writer(error, source, &mut buf, true).ok();
    String::from_utf8_lossy(&buf).to_string()
}

/// Render an error to a String without color codes (useful for tests).
pub fn render_error_to_string_no_color(error: &Error, source: &str) -> String {
    let mut buf = Vec::new();
    render_error_to_writer(error, source, &mut buf, false).ok();
    String::from_utf8_lossy(&buf).to_string()
}

fn render_error_to_writer(
    error: &Error,
    source: &str,
    writer: &mut dyn Write,
    use_color: bool,
) -> std::io::Result<()> {
    match error {
        Error::Compilation { diagnostics } => {
            render_diagnostics(source, diagnostics, writer, use_color)
        }
        Error::Runtime { diagnostic } => {
            render_diagnostics(source, std::slice::from_ref(diagnostic), writer, use_color)
        }
        Error::Unsupported(what) => writeln!(writer, "Not compilable: {}", what),
    }
}

fn render_diagnostics(
    source: &str,
    diagnostics: &[Diagnostic],
    writer: &mut dyn Write,
    use_color: bool,
) -> std::io::Result<()> {
    for diag in diagnostics {
        let mut colors = ColorGenerator::new();
        colors.next(); // Skip the first color.

        let kind = match diag.severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
            Severity::Info => ReportKind::Advice,
        };

        let mut report = Report::build(kind, (SOURCE_ID, diag.span.range()))
            .with_message(&diag.message)
            .with_config(ariadne::Config::default().with_color(use_color));

        if let Some(code) = &diag.code {
            report = report.with_code(code);
        }

        let color = colors.next();
        report = report.with_label(
            Label::new((SOURCE_ID, diag.span.range()))
                .with_message(&diag.message)
                .with_color(color),
        );

        // Related info as secondary labels, e.g. "called from here".
        for related in &diag.related {
            let color = colors.next();
            report = report.with_label(
                Label::new((SOURCE_ID, related.span.range()))
                    .with_message(&related.message)
                    .with_color(color),
            );
        }

        for help_msg in &diag.help {
            report = report.with_help(help_msg);
        }

        report.finish().write((SOURCE_ID, Source::from(source)), &mut *writer)?;
    }

    Ok(())
}
