//! Pratt expression parser for Aspen.
//!
//! Implements operator precedence parsing using binding power tables, with
//! three Aspen-specific wrinkles on top of the standard loop:
//!
//! - assignment operators are right-associative (left power above right);
//! - relational operators chain into a single `RELATIONAL_EXPR` node with
//!   one `COMPARISON` child per `(operator, operand)` link, instead of
//!   nesting binary nodes;
//! - `<` after a name or member access may open a generic argument list.
//!   A non-consuming lookahead scan decides which reading wins (see
//!   [`generic_args_follow`]).
//!
//! `return` and `goto` sit below assignment and are handled by the [`expr`]
//! entry point; they cannot appear nested inside operator expressions.

use super::{items, MarkClosed, Parser};
use crate::syntax_kind::SyntaxKind;
use aspen_common::diagnostics::DiagnosticKind;
use aspen_common::span::Span;

// ── Binding power tables ───────────────────────────────────────────────

/// Returns (left_bp, right_bp) for infix operators, plus the node kind the
/// operator closes with. Left < right is left-associative; assignment has
/// left > right for right associativity.
fn infix_binding_power(op: SyntaxKind) -> Option<(u8, u8, SyntaxKind)> {
    match op {
        SyntaxKind::ASSIGN
        | SyntaxKind::PLUS_ASSIGN
        | SyntaxKind::MINUS_ASSIGN
        | SyntaxKind::STAR_ASSIGN
        | SyntaxKind::SLASH_ASSIGN => Some((2, 1, SyntaxKind::ASSIGN_EXPR)),

        SyntaxKind::OR_KW => Some((3, 4, SyntaxKind::BINARY_EXPR)),

        SyntaxKind::AND_KW => Some((5, 6, SyntaxKind::BINARY_EXPR)),

        // Relational operators are not in this table: they chain (see
        // expr_bp) instead of closing one binary node per operator.
        SyntaxKind::PLUS | SyntaxKind::MINUS => Some((11, 12, SyntaxKind::BINARY_EXPR)),

        SyntaxKind::STAR | SyntaxKind::SLASH | SyntaxKind::MOD_KW | SyntaxKind::REM_KW => {
            Some((13, 14, SyntaxKind::BINARY_EXPR))
        }

        _ => None,
    }
}

/// Relational operators: all six comparisons chain.
fn is_relational(op: SyntaxKind) -> bool {
    matches!(
        op,
        SyntaxKind::LT
            | SyntaxKind::GT
            | SyntaxKind::LT_EQ
            | SyntaxKind::GT_EQ
            | SyntaxKind::EQ_EQ
            | SyntaxKind::NOT_EQ
    )
}

/// Left binding power of the relational level; operands parse one notch
/// tighter so additive expressions bind into them.
const RELATIONAL_BP: u8 = 9;
const RELATIONAL_OPERAND_BP: u8 = 10;

/// Right binding power of `not`. Looser than relational, so `not a < b`
/// negates the whole comparison.
const NOT_BP: u8 = 7;

/// Right binding power of prefix `+`/`-`. Tighter than multiplicative,
/// looser than postfix.
const SIGN_BP: u8 = 15;

/// Postfix operations (call, index, member access, generic instantiation)
/// bind tighter than all prefix and infix operators.
const POSTFIX_BP: u8 = 17;

/// Whether a token can begin an expression. Used by statement dispatch, the
/// optional `return` operand, and the `<` disambiguation scan.
pub(crate) fn is_expr_starter(kind: SyntaxKind) -> bool {
    matches!(
        kind,
        SyntaxKind::INT_LITERAL
            | SyntaxKind::FLOAT_LITERAL
            | SyntaxKind::CHAR_LITERAL
            | SyntaxKind::TRUE_KW
            | SyntaxKind::FALSE_KW
            | SyntaxKind::IDENT
            | SyntaxKind::LINE_STRING_START
            | SyntaxKind::MULTI_LINE_STRING_START
            | SyntaxKind::L_PAREN
            | SyntaxKind::L_BRACE
            | SyntaxKind::IF_KW
            | SyntaxKind::WHILE_KW
            | SyntaxKind::NOT_KW
            | SyntaxKind::PLUS
            | SyntaxKind::MINUS
            | SyntaxKind::RETURN_KW
            | SyntaxKind::GOTO_KW
    )
}

// ── Entry points ───────────────────────────────────────────────────────

/// Parse an expression, including the lowest level (`return`, `goto`).
/// Returns `None` without consuming anything if the current token cannot
/// begin an expression.
pub(crate) fn expr(p: &mut Parser) -> Option<MarkClosed> {
    match p.current() {
        SyntaxKind::RETURN_KW => {
            let m = p.open();
            p.advance();
            if is_expr_starter(p.current()) && p.current() != SyntaxKind::RETURN_KW {
                expr_bp(p, 1);
            }
            Some(p.close(m, SyntaxKind::RETURN_EXPR))
        }
        SyntaxKind::GOTO_KW => {
            let m = p.open();
            p.advance();
            p.expect(SyntaxKind::IDENT);
            Some(p.close(m, SyntaxKind::GOTO_EXPR))
        }
        _ => expr_bp(p, 0),
    }
}

/// Parse an expression, reporting a missing-expression diagnostic if the
/// current token cannot begin one. For positions where an operand is
/// mandatory (conditions, initializers, groupings).
pub(crate) fn expr_or_missing(p: &mut Parser) {
    if expr(p).is_none() {
        p.diagnostics.report(
            DiagnosticKind::ExpectedToken {
                expected: "expression".to_string(),
            },
            Span::empty_at(p.current_span().start),
        );
    }
}

/// The core Pratt loop: parse an atom or prefix expression, then consume
/// postfix and infix operators while their binding power beats `min_bp`.
fn expr_bp(p: &mut Parser, min_bp: u8) -> Option<MarkClosed> {
    let mut lhs = lhs(p)?;

    loop {
        let current = p.current();

        if POSTFIX_BP >= min_bp {
            // ── Postfix: call ──
            if current == SyntaxKind::L_PAREN {
                let m = p.open_before(lhs);
                parse_arg_list(p);
                lhs = p.close(m, SyntaxKind::CALL_EXPR);
                continue;
            }

            // ── Postfix: index ──
            if current == SyntaxKind::L_BRACKET {
                let m = p.open_before(lhs);
                p.advance(); // [
                expr_or_missing(p);
                p.expect(SyntaxKind::R_BRACKET);
                lhs = p.close(m, SyntaxKind::INDEX_EXPR);
                continue;
            }

            // ── Postfix: member access ──
            if current == SyntaxKind::DOT {
                let m = p.open_before(lhs);
                p.advance(); // .
                p.expect(SyntaxKind::IDENT);
                lhs = p.close(m, SyntaxKind::MEMBER_EXPR);
                continue;
            }

            // ── Postfix: generic instantiation ──
            // Only a name or member access can take generic arguments, and
            // only when the lookahead scan votes for the generic reading.
            if current == SyntaxKind::LT
                && matches!(lhs.kind, SyntaxKind::NAME_EXPR | SyntaxKind::MEMBER_EXPR)
                && generic_args_follow(p)
            {
                let m = p.open_before(lhs);
                items::parse_generic_arg_list(p);
                lhs = p.close(m, SyntaxKind::GENERIC_EXPR);
                continue;
            }
        }

        // ── Relational chain ──
        if is_relational(current) && RELATIONAL_BP >= min_bp {
            let m = p.open_before(lhs);
            while is_relational(p.current()) {
                let cm = p.open();
                p.advance(); // operator
                if expr_bp(p, RELATIONAL_OPERAND_BP).is_none() {
                    p.diagnostics.report(
                        DiagnosticKind::ExpectedToken {
                            expected: "expression".to_string(),
                        },
                        Span::empty_at(p.current_span().start),
                    );
                }
                p.close(cm, SyntaxKind::COMPARISON);
            }
            lhs = p.close(m, SyntaxKind::RELATIONAL_EXPR);
            continue;
        }

        // ── Other infix operators ──
        if let Some((l_bp, r_bp, kind)) = infix_binding_power(current) {
            if l_bp < min_bp {
                break;
            }
            let m = p.open_before(lhs);
            p.advance(); // operator
            if expr_bp(p, r_bp).is_none() {
                p.diagnostics.report(
                    DiagnosticKind::ExpectedToken {
                        expected: "expression".to_string(),
                    },
                    Span::empty_at(p.current_span().start),
                );
            }
            lhs = p.close(m, kind);
            continue;
        }

        break;
    }

    Some(lhs)
}

// ── `<` disambiguation ─────────────────────────────────────────────────

/// Decide whether a `<` after a name or member access opens a generic
/// argument list or is the less-than operator.
///
/// Scans ahead (without consuming) over the tokens a generic argument list
/// may contain: identifiers, `,`, `.`, and nested `<...>` pairs. Any other
/// token inside the region means operator. If the scan reaches the closing
/// `>`, the token after it decides: `(` means generics, any expression
/// starter means operator, anything else defaults to generics.
fn generic_args_follow(p: &Parser) -> bool {
    debug_assert!(p.at(SyntaxKind::LT));
    let mut offset = 1;
    let mut depth = 1u32;
    loop {
        match p.nth(offset) {
            SyntaxKind::IDENT | SyntaxKind::COMMA | SyntaxKind::DOT => offset += 1,
            SyntaxKind::LT => {
                depth += 1;
                offset += 1;
            }
            SyntaxKind::GT => {
                depth -= 1;
                offset += 1;
                if depth == 0 {
                    break;
                }
            }
            _ => return false,
        }
    }
    match p.nth(offset) {
        SyntaxKind::L_PAREN => true,
        kind if is_expr_starter(kind) => false,
        _ => true,
    }
}

// ── Atom / prefix parsing (LHS) ────────────────────────────────────────

/// Parse the left-hand side of an expression: an atom or a prefix operator.
/// Returns `None` without consuming or reporting if nothing here can begin
/// an expression -- callers decide how to diagnose.
fn lhs(p: &mut Parser) -> Option<MarkClosed> {
    match p.current() {
        SyntaxKind::NOT_KW => {
            let m = p.open();
            p.advance();
            expr_bp(p, NOT_BP);
            Some(p.close(m, SyntaxKind::UNARY_EXPR))
        }

        SyntaxKind::PLUS | SyntaxKind::MINUS => {
            let m = p.open();
            p.advance();
            expr_bp(p, SIGN_BP);
            Some(p.close(m, SyntaxKind::UNARY_EXPR))
        }

        SyntaxKind::INT_LITERAL
        | SyntaxKind::FLOAT_LITERAL
        | SyntaxKind::CHAR_LITERAL
        | SyntaxKind::TRUE_KW
        | SyntaxKind::FALSE_KW => {
            let m = p.open();
            p.advance();
            Some(p.close(m, SyntaxKind::LITERAL_EXPR))
        }

        SyntaxKind::IDENT => {
            let m = p.open();
            p.advance();
            Some(p.close(m, SyntaxKind::NAME_EXPR))
        }

        SyntaxKind::LINE_STRING_START | SyntaxKind::MULTI_LINE_STRING_START => {
            Some(parse_string_expr(p))
        }

        SyntaxKind::L_PAREN => {
            let m = p.open();
            p.advance(); // (
            expr_or_missing(p);
            p.expect(SyntaxKind::R_PAREN);
            Some(p.close(m, SyntaxKind::GROUPING_EXPR))
        }

        SyntaxKind::L_BRACE | SyntaxKind::IF_KW | SyntaxKind::WHILE_KW => Some(control_expr(p)),

        _ => None,
    }
}

// ── Control flow expressions ───────────────────────────────────────────

/// Parse a control-flow expression: a block, an `if`, or a `while`. The
/// caller guarantees the current token is one of those three starters.
pub(crate) fn control_expr(p: &mut Parser) -> MarkClosed {
    match p.current() {
        SyntaxKind::L_BRACE => block_expr(p),

        SyntaxKind::IF_KW => {
            let m = p.open();
            p.advance(); // if
            p.expect(SyntaxKind::L_PAREN);
            expr_or_missing(p);
            p.expect(SyntaxKind::R_PAREN);
            expr_or_missing(p); // then branch
            if p.at(SyntaxKind::ELSE_KW) {
                let e = p.open();
                p.advance();
                expr_or_missing(p);
                p.close(e, SyntaxKind::ELSE_CLAUSE);
            }
            p.close(m, SyntaxKind::IF_EXPR)
        }

        SyntaxKind::WHILE_KW => {
            let m = p.open();
            p.advance(); // while
            p.expect(SyntaxKind::L_PAREN);
            expr_or_missing(p);
            p.expect(SyntaxKind::R_PAREN);
            expr_or_missing(p); // body
            p.close(m, SyntaxKind::WHILE_EXPR)
        }

        _ => unreachable!("control_expr called on a non-control token"),
    }
}

/// Parse a block: `{ stmt* }`. The last statement, when it is an
/// expression statement without a semicolon, is the block's value.
pub(crate) fn block_expr(p: &mut Parser) -> MarkClosed {
    let m = p.open();
    p.expect(SyntaxKind::L_BRACE);
    while !p.at(SyntaxKind::R_BRACE) && !p.at(SyntaxKind::EOF) {
        let before = p.pos();
        items::parse_stmt(p);
        if p.pos() == before {
            p.advance_with_error();
        }
    }
    p.expect(SyntaxKind::R_BRACE);
    p.close(m, SyntaxKind::BLOCK_EXPR)
}

// ── Argument lists ─────────────────────────────────────────────────────

/// Parse a call argument list: `(expr, expr, ...)`.
fn parse_arg_list(p: &mut Parser) {
    let m = p.open();
    p.advance(); // (
    while !p.at(SyntaxKind::R_PAREN) && !p.at(SyntaxKind::EOF) {
        if expr(p).is_none() {
            p.diagnostics.report(
                DiagnosticKind::ExpectedToken {
                    expected: "expression".to_string(),
                },
                Span::empty_at(p.current_span().start),
            );
        }
        if !p.eat(SyntaxKind::COMMA) {
            break;
        }
    }
    p.expect(SyntaxKind::R_PAREN);
    p.close(m, SyntaxKind::ARG_LIST);
}

// ── String expressions ─────────────────────────────────────────────────

/// Parse a string expression, which may contain interpolation segments.
///
/// Token shape from the lexer:
///   Start  (Content | Newline | InterpolationStart expr InterpolationEnd)*  End
fn parse_string_expr(p: &mut Parser) -> MarkClosed {
    let m = p.open();
    p.advance(); // LINE_STRING_START or MULTI_LINE_STRING_START

    loop {
        match p.current() {
            SyntaxKind::STRING_CONTENT | SyntaxKind::STRING_NEWLINE => {
                p.advance();
            }
            SyntaxKind::INTERPOLATION_START => {
                let interp = p.open();
                p.advance();
                expr_or_missing(p);
                p.expect(SyntaxKind::INTERPOLATION_END);
                p.close(interp, SyntaxKind::INTERPOLATION);
            }
            SyntaxKind::LINE_STRING_END | SyntaxKind::MULTI_LINE_STRING_END => {
                p.advance();
                break;
            }
            SyntaxKind::EOF => {
                // The lexer has already reported the unterminated string.
                break;
            }
            _ => {
                p.advance_with_error();
            }
        }
    }

    p.close(m, SyntaxKind::STRING_EXPR)
}
