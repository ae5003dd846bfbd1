use std::fmt;

use serde::Serialize;

use crate::span::Span;

/// How severe a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Warning,
    Error,
}

/// Everything the Aspen compiler can complain about.
///
/// Each variant carries its format arguments; the rendered message comes
/// from the `Display` impl and the stable code from [`DiagnosticKind::code`].
/// No diagnostic is ever fatal -- every phase accumulates and keeps going.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DiagnosticKind {
    // ── Syntax ─────────────────────────────────────────────────────────
    /// The parser hit input it could not fit into the grammar.
    UnexpectedInput { what: String },
    /// A specific token was required but absent.
    ExpectedToken { expected: String },
    /// A well-formed element appeared somewhere it is not allowed
    /// (e.g. a module inside a function body).
    IllegalElementInContext { what: String },
    /// A multi-line string line does not start with the closing
    /// delimiter's indentation.
    InsufficientIndentationInMultiLineString,
    /// The closing `"""` shares a line with string content.
    ClosingQuotesOfMultiLineStringNotOnNewLine,
    /// Content follows the opening `"""` on the same line.
    ExtraTokensInlineWithOpenQuotesOfMultiLineString,
    /// A string literal ran into a line break or end of input.
    UnterminatedStringLiteral,
    /// An escape sequence the lexer does not know.
    InvalidEscapeSequence { sequence: String },

    // ── Symbol resolution ──────────────────────────────────────────────
    /// A name that resolves to nothing in scope.
    UndefinedReference { name: String },
    /// A name that resolves to several non-overloadable symbols.
    AmbiguousReference { name: String },
    /// A symbol used in a context its kind does not permit
    /// (e.g. a bare type name in call position).
    IllegalReferenceContext { name: String },

    // ── Type checking ──────────────────────────────────────────────────
    TypeMismatch { expected: String, got: String },
    CallNonFunction { ty: String },
    AmbiguousOverload { name: String, candidates: usize },
    NoMatchingOverload { name: String },
    GenericArityMismatch { expected: usize, got: usize },
    /// A declaration with neither annotation nor initializer.
    CannotInferType { name: String },
    /// A variadic parameter whose type is not a rank-1 array.
    VariadicParameterNotArray { name: String },

    // ── Flow ───────────────────────────────────────────────────────────
    UnreachableCode,
    NotAllPathsReturn { function: String },
}

impl DiagnosticKind {
    /// Stable diagnostic code, grouped by phase.
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::UnexpectedInput { .. } => "AS0001",
            DiagnosticKind::ExpectedToken { .. } => "AS0002",
            DiagnosticKind::IllegalElementInContext { .. } => "AS0003",
            DiagnosticKind::InsufficientIndentationInMultiLineString => "AS0004",
            DiagnosticKind::ClosingQuotesOfMultiLineStringNotOnNewLine => "AS0005",
            DiagnosticKind::ExtraTokensInlineWithOpenQuotesOfMultiLineString => "AS0006",
            DiagnosticKind::UnterminatedStringLiteral => "AS0007",
            DiagnosticKind::InvalidEscapeSequence { .. } => "AS0008",
            DiagnosticKind::UndefinedReference { .. } => "AS0101",
            DiagnosticKind::AmbiguousReference { .. } => "AS0102",
            DiagnosticKind::IllegalReferenceContext { .. } => "AS0103",
            DiagnosticKind::TypeMismatch { .. } => "AS0201",
            DiagnosticKind::CallNonFunction { .. } => "AS0202",
            DiagnosticKind::AmbiguousOverload { .. } => "AS0203",
            DiagnosticKind::NoMatchingOverload { .. } => "AS0204",
            DiagnosticKind::GenericArityMismatch { .. } => "AS0205",
            DiagnosticKind::CannotInferType { .. } => "AS0206",
            DiagnosticKind::VariadicParameterNotArray { .. } => "AS0207",
            DiagnosticKind::UnreachableCode => "AS0301",
            DiagnosticKind::NotAllPathsReturn { .. } => "AS0302",
        }
    }

    /// Default severity for this kind.
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::UnreachableCode => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::UnexpectedInput { what } => {
                write!(f, "unexpected {what}")
            }
            DiagnosticKind::ExpectedToken { expected } => {
                write!(f, "expected {expected}")
            }
            DiagnosticKind::IllegalElementInContext { what } => {
                write!(f, "{what} is not allowed in this context")
            }
            DiagnosticKind::InsufficientIndentationInMultiLineString => {
                write!(
                    f,
                    "line is not indented as far as the closing quotes of the multi-line string"
                )
            }
            DiagnosticKind::ClosingQuotesOfMultiLineStringNotOnNewLine => {
                write!(f, "closing quotes of a multi-line string must be on their own line")
            }
            DiagnosticKind::ExtraTokensInlineWithOpenQuotesOfMultiLineString => {
                write!(
                    f,
                    "content is not allowed on the same line as the opening quotes of a multi-line string"
                )
            }
            DiagnosticKind::UnterminatedStringLiteral => {
                write!(f, "unterminated string literal")
            }
            DiagnosticKind::InvalidEscapeSequence { sequence } => {
                write!(f, "invalid escape sequence `{sequence}`")
            }
            DiagnosticKind::UndefinedReference { name } => {
                write!(f, "undefined reference to `{name}`")
            }
            DiagnosticKind::AmbiguousReference { name } => {
                write!(f, "reference to `{name}` is ambiguous")
            }
            DiagnosticKind::IllegalReferenceContext { name } => {
                write!(f, "`{name}` cannot be referenced in this context")
            }
            DiagnosticKind::TypeMismatch { expected, got } => {
                write!(f, "type mismatch: expected `{expected}`, found `{got}`")
            }
            DiagnosticKind::CallNonFunction { ty } => {
                write!(f, "value of type `{ty}` is not callable")
            }
            DiagnosticKind::AmbiguousOverload { name, candidates } => {
                write!(
                    f,
                    "call to `{name}` is ambiguous: {candidates} overloads match equally well"
                )
            }
            DiagnosticKind::NoMatchingOverload { name } => {
                write!(f, "no overload of `{name}` matches the given arguments")
            }
            DiagnosticKind::GenericArityMismatch { expected, got } => {
                write!(
                    f,
                    "wrong number of type arguments: expected {expected}, found {got}"
                )
            }
            DiagnosticKind::CannotInferType { name } => {
                write!(
                    f,
                    "cannot infer a type for `{name}`: add a type annotation or an initializer"
                )
            }
            DiagnosticKind::VariadicParameterNotArray { name } => {
                write!(
                    f,
                    "variadic parameter `{name}` must be typed as a rank-1 array"
                )
            }
            DiagnosticKind::UnreachableCode => write!(f, "unreachable code"),
            DiagnosticKind::NotAllPathsReturn { function } => {
                write!(f, "not all paths of `{function}` return a value")
            }
        }
    }
}

/// A single diagnostic: what went wrong, how bad it is, and where.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub span: Span,
}

impl Diagnostic {
    /// Create a diagnostic with the kind's default severity.
    pub fn new(kind: DiagnosticKind, span: Span) -> Self {
        let severity = kind.severity();
        Self {
            kind,
            severity,
            span,
        }
    }

    /// Rendered message text.
    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

/// Append-only collection of diagnostics shared by every compiler phase.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic with the kind's default severity.
    pub fn report(&mut self, kind: DiagnosticKind, span: Span) {
        self.items.push(Diagnostic::new(kind, span));
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether any diagnostic has `Error` severity.
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_severity_comes_from_kind() {
        let err = Diagnostic::new(
            DiagnosticKind::UndefinedReference {
                name: "x".to_string(),
            },
            Span::new(0, 1),
        );
        assert_eq!(err.severity, Severity::Error);

        let warn = Diagnostic::new(DiagnosticKind::UnreachableCode, Span::new(0, 1));
        assert_eq!(warn.severity, Severity::Warning);
    }

    #[test]
    fn bag_tracks_errors() {
        let mut bag = Diagnostics::new();
        assert!(!bag.has_errors());

        bag.report(DiagnosticKind::UnreachableCode, Span::new(0, 1));
        assert!(!bag.has_errors(), "warnings are not errors");

        bag.report(
            DiagnosticKind::ExpectedToken {
                expected: "`;`".to_string(),
            },
            Span::new(1, 1),
        );
        assert!(bag.has_errors());
        assert_eq!(bag.len(), 2);
    }

    #[test]
    fn messages_render_arguments() {
        let d = Diagnostic::new(
            DiagnosticKind::TypeMismatch {
                expected: "int32".to_string(),
                got: "string".to_string(),
            },
            Span::new(0, 5),
        );
        assert_eq!(d.message(), "type mismatch: expected `int32`, found `string`");
        assert_eq!(d.kind.code(), "AS0201");
    }
}
