//! Post-parse validation of multi-line string layout.
//!
//! Runs over the finished tree rather than during parsing: the checks need
//! to see a whole string expression at once, including the trivia attached
//! to its delimiters.
//!
//! Rules:
//! - nothing but the line break may follow the opening `"""`;
//! - the closing `"""` must be alone on its line;
//! - the whitespace before the closing `"""` is the required indentation
//!   prefix, and every content line must start with it. Lines that begin
//!   with an interpolation are ignored; empty lines are exempt.

use aspen_common::diagnostics::{DiagnosticKind, Diagnostics};
use aspen_common::span::Span;
use rowan::TextRange;

use crate::cst::{SyntaxElement, SyntaxNode};
use crate::syntax_kind::SyntaxKind;

fn span_of(range: TextRange) -> Span {
    Span::new(range.start().into(), range.end().into())
}

/// Validate every multi-line string in the tree.
pub(crate) fn validate(root: &SyntaxNode, diagnostics: &mut Diagnostics) {
    for node in root.descendants() {
        if node.kind() != SyntaxKind::STRING_EXPR {
            continue;
        }
        let is_multi_line = node
            .children_with_tokens()
            .filter_map(|el| el.into_token())
            .any(|t| t.kind() == SyntaxKind::MULTI_LINE_STRING_START);
        if is_multi_line {
            check_multi_line_string(&node, diagnostics);
        }
    }
}

fn is_line_break(kind: SyntaxKind) -> bool {
    matches!(kind, SyntaxKind::NEWLINE | SyntaxKind::STRING_NEWLINE)
}

fn check_multi_line_string(node: &SyntaxNode, diagnostics: &mut Diagnostics) {
    let elements: Vec<SyntaxElement> = node.children_with_tokens().collect();

    // Content before the first line break sits inline with the open quotes.
    for el in &elements {
        match el.kind() {
            SyntaxKind::MULTI_LINE_STRING_START => {}
            kind if is_line_break(kind) => break,
            SyntaxKind::STRING_CONTENT | SyntaxKind::INTERPOLATION => {
                diagnostics.report(
                    DiagnosticKind::ExtraTokensInlineWithOpenQuotesOfMultiLineString,
                    span_of(el.text_range()),
                );
                break;
            }
            SyntaxKind::MULTI_LINE_STRING_END => break,
            _ => {}
        }
    }

    // Locate the closing delimiter; an unterminated string has none worth
    // checking.
    let Some(end_idx) = elements
        .iter()
        .position(|el| el.kind() == SyntaxKind::MULTI_LINE_STRING_END)
    else {
        return;
    };

    // The closing quotes must be first on their line: walking back over
    // whitespace has to land on a line break (or the opening quotes of an
    // empty string).
    let mut prefix = String::new();
    let mut before = end_idx;
    while before > 0 && elements[before - 1].kind() == SyntaxKind::WHITESPACE {
        before -= 1;
        if let Some(token) = elements[before].as_token() {
            prefix.insert_str(0, token.text());
        }
    }
    let on_own_line = before == 0
        || is_line_break(elements[before - 1].kind())
        || elements[before - 1].kind() == SyntaxKind::MULTI_LINE_STRING_START;
    if !on_own_line {
        diagnostics.report(
            DiagnosticKind::ClosingQuotesOfMultiLineStringNotOnNewLine,
            span_of(elements[end_idx].text_range()),
        );
        return;
    }

    // Check every line's indentation against the closing prefix. A line is
    // identified by its first element after a line break; lines that start
    // with an interpolation are ignored and empty lines have no content
    // element to check.
    let mut at_line_start = false;
    for el in elements.iter().take(end_idx) {
        let kind = el.kind();
        if is_line_break(kind) {
            at_line_start = true;
            continue;
        }
        if !at_line_start {
            continue;
        }
        at_line_start = false;
        if kind != SyntaxKind::STRING_CONTENT {
            continue;
        }
        let Some(token) = el.as_token() else { continue };
        let text = token.text();
        if !text.starts_with(&prefix) {
            let indent_len = text
                .chars()
                .take_while(|&c| c == ' ' || c == '\t')
                .map(|c| c.len_utf8() as u32)
                .sum::<u32>();
            let start: u32 = token.text_range().start().into();
            diagnostics.report(
                DiagnosticKind::InsufficientIndentationInMultiLineString,
                Span::new(start, start + indent_len),
            );
        }
    }
}
