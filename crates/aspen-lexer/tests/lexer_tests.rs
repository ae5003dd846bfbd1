//! Integration tests for the Aspen lexer.
//!
//! The central property: the lexer is lossless. Concatenating every token's
//! leading trivia, text, and trailing trivia reconstructs the source
//! byte-for-byte, for any input.

use aspen_common::token::TokenKind;
use aspen_lexer::Lexer;

/// Reassemble the source from the token stream's trivia and text spans.
fn reassemble(source: &str) -> String {
    let result = Lexer::tokenize(source);
    let mut out = String::new();
    for token in &result.tokens {
        for t in &token.leading {
            out.push_str(&source[t.span.start as usize..t.span.end as usize]);
        }
        out.push_str(&source[token.span.start as usize..token.span.end as usize]);
        for t in &token.trailing {
            out.push_str(&source[t.span.start as usize..t.span.end as usize]);
        }
    }
    out
}

#[test]
fn round_trips_plain_code() {
    let source = "func main() {\n    var x: int32 = 1 + 2 * 3;\n}\n";
    assert_eq!(reassemble(source), source);
}

#[test]
fn round_trips_comments_and_blank_lines() {
    let source = "// header\n\n/// doc\nfunc f() {}\n\n";
    assert_eq!(reassemble(source), source);
}

#[test]
fn round_trips_strings_and_interpolation() {
    let source = "val s = \"x = \\{x}, y = \\{y}\";\n";
    assert_eq!(reassemble(source), source);
}

#[test]
fn round_trips_multi_line_strings() {
    let source = "val s = \"\"\"\n    foo\n    bar\n    \"\"\";\n";
    assert_eq!(reassemble(source), source);
}

#[test]
fn round_trips_raw_strings() {
    let source = "val s = ##\"no \"escape\"# here\\n\"##;\n";
    assert_eq!(reassemble(source), source);
}

#[test]
fn round_trips_invalid_input() {
    let source = "va$l @ x \u{1F600} ;\n";
    assert_eq!(reassemble(source), source);
}

#[test]
fn round_trips_carriage_returns() {
    let source = "var a = 1;\r\nvar b = 2;\rvar c = 3;\n";
    assert_eq!(reassemble(source), source);
}

#[test]
fn every_stream_ends_with_end_of_input() {
    for source in ["", "x", "\"unterminated", "\"\"\"\nopen", "\\"] {
        let result = Lexer::tokenize(source);
        assert_eq!(
            result.tokens.last().map(|t| t.kind),
            Some(TokenKind::EndOfInput),
            "source {source:?}"
        );
        assert_eq!(reassemble(source), *source, "source {source:?}");
    }
}
