//! Human-readable rendering of diagnostics using ariadne.
//!
//! The core phases only accumulate `Diagnostic` values; turning them into
//! labeled source snippets is a presentation concern that lives here and
//! in the CLI.

use ariadne::{Config, Label, Report, ReportKind, Source};
use aspen_common::diagnostics::{Diagnostic, Severity};

/// Rendering options.
#[derive(Debug, Clone)]
pub struct DiagnosticOptions {
    pub color: bool,
}

impl Default for DiagnosticOptions {
    fn default() -> Self {
        DiagnosticOptions { color: true }
    }
}

/// Render one diagnostic as an ariadne report over the source text.
pub fn render_diagnostic(
    diagnostic: &Diagnostic,
    source: &str,
    options: &DiagnosticOptions,
) -> String {
    // Clamp to the source and widen zero-width spans to one character so
    // the label has something to point at.
    let len = source.len();
    let mut start = (diagnostic.span.start as usize).min(len);
    let mut end = (diagnostic.span.end as usize).clamp(start, len);
    if start == end {
        if end < len {
            end += 1;
        } else if start > 0 {
            start -= 1;
        }
    }
    while start > 0 && !source.is_char_boundary(start) {
        start -= 1;
    }
    while end < len && !source.is_char_boundary(end) {
        end += 1;
    }
    let kind = match diagnostic.severity {
        Severity::Error => ReportKind::Error,
        Severity::Warning => ReportKind::Warning,
    };

    let mut buffer = Vec::new();
    let _ = Report::<std::ops::Range<usize>>::build(kind, start..end)
        .with_config(Config::default().with_color(options.color))
        .with_code(diagnostic.kind.code())
        .with_message(diagnostic.message())
        .with_label(Label::new(start..end).with_message(diagnostic.message()))
        .finish()
        .write(Source::from(source), &mut buffer);
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Render every diagnostic in order.
pub fn render_all(
    diagnostics: &aspen_common::diagnostics::Diagnostics,
    source: &str,
    options: &DiagnosticOptions,
) -> Vec<String> {
    diagnostics
        .iter()
        .map(|d| render_diagnostic(d, source, options))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aspen_common::diagnostics::DiagnosticKind;
    use aspen_common::span::Span;

    #[test]
    fn renders_message_and_code() {
        let source = "val x = y;\n";
        let diagnostic = Diagnostic::new(
            DiagnosticKind::UndefinedReference {
                name: "y".to_string(),
            },
            Span::new(8, 9),
        );
        let rendered = render_diagnostic(
            &diagnostic,
            source,
            &DiagnosticOptions { color: false },
        );
        assert!(rendered.contains("undefined reference to `y`"));
        assert!(rendered.contains("AS0101"));
    }
}
