//! Declaration, statement, and type parsing for Aspen.
//!
//! Top level of a source file (and of a module body) is a sequence of
//! declarations. Statements appear only inside blocks; a declaration used as
//! a statement is wrapped in `DECL_STMT`.

use super::{expressions, Parser};
use crate::syntax_kind::SyntaxKind;
use aspen_common::diagnostics::DiagnosticKind;
use aspen_common::span::Span;

/// Tokens that can begin a declaration (before the optional label form).
pub(crate) const DECL_FIRST: &[SyntaxKind] = &[
    SyntaxKind::INTERNAL_KW,
    SyntaxKind::PUBLIC_KW,
    SyntaxKind::IMPORT_KW,
    SyntaxKind::FUNC_KW,
    SyntaxKind::MODULE_KW,
    SyntaxKind::VAR_KW,
    SyntaxKind::VAL_KW,
];

/// Synchronization set for top-level recovery: declaration starters plus
/// closing braces.
const DECL_RECOVERY: &[SyntaxKind] = &[
    SyntaxKind::INTERNAL_KW,
    SyntaxKind::PUBLIC_KW,
    SyntaxKind::IMPORT_KW,
    SyntaxKind::FUNC_KW,
    SyntaxKind::MODULE_KW,
    SyntaxKind::VAR_KW,
    SyntaxKind::VAL_KW,
    SyntaxKind::R_BRACE,
    SyntaxKind::SEMICOLON,
];

/// Whether the surrounding context is declarative (file or module body) or
/// local (function body, block). Some declarations are only legal in one of
/// the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeclContext {
    Global,
    Local,
}

// ── Top level ──────────────────────────────────────────────────────────

/// Parse a complete source file: declarations until end of input.
pub(crate) fn parse_source_file(p: &mut Parser) {
    let root = p.open();
    while !p.at(SyntaxKind::EOF) {
        let before = p.pos();
        parse_decl(p, DeclContext::Global);
        if p.pos() == before {
            p.advance_with_error();
        }
    }
    p.advance(); // EndOfInput carries any trailing trivia
    p.close(root, SyntaxKind::SOURCE_FILE);
}

// ── Declarations ───────────────────────────────────────────────────────

/// Parse one declaration. Dispatches on an optional visibility modifier
/// followed by the declaration keyword, or on `identifier :` for labels.
pub(crate) fn parse_decl(p: &mut Parser, ctx: DeclContext) {
    if p.at(SyntaxKind::IDENT) && p.nth(1) == SyntaxKind::COLON {
        parse_label_decl(p, ctx);
        return;
    }
    if !p.at_any(DECL_FIRST) {
        p.recover_until(DECL_RECOVERY);
        return;
    }

    let m = p.open();
    if p.at_any(&[SyntaxKind::INTERNAL_KW, SyntaxKind::PUBLIC_KW]) {
        let v = p.open();
        p.advance();
        p.close(v, SyntaxKind::VISIBILITY);
    }

    match p.current() {
        SyntaxKind::IMPORT_KW => parse_import_rest(p, m),
        SyntaxKind::FUNC_KW => parse_func_rest(p, m),
        SyntaxKind::MODULE_KW => parse_module_rest(p, m, ctx),
        SyntaxKind::VAR_KW | SyntaxKind::VAL_KW => parse_variable_rest(p, m),
        _ => {
            // A lone visibility modifier with nothing it could modify.
            p.report_unexpected();
            p.close(m, SyntaxKind::ERROR_NODE);
        }
    }
}

/// `name:` -- a label. Outside local contexts labels are wrapped in an
/// error node with an `IllegalElementInContext` diagnostic.
fn parse_label_decl(p: &mut Parser, ctx: DeclContext) {
    if ctx == DeclContext::Global {
        let span = p.current_span();
        p.diagnostics.report(
            DiagnosticKind::IllegalElementInContext {
                what: "label declaration".to_string(),
            },
            span,
        );
    }
    let m = p.open();
    p.advance(); // identifier
    p.advance(); // colon
    let closed = p.close(m, SyntaxKind::LABEL_DECL);
    if ctx == DeclContext::Global {
        let wrapper = p.open_before(closed);
        p.close(wrapper, SyntaxKind::ERROR_NODE);
    }
}

/// `import a.b.c;` -- the keyword has been dispatched on but not consumed.
fn parse_import_rest(p: &mut Parser, m: super::MarkOpened) {
    p.advance(); // import
    let path = p.open();
    p.expect(SyntaxKind::IDENT);
    while p.eat(SyntaxKind::DOT) {
        p.expect(SyntaxKind::IDENT);
    }
    p.close(path, SyntaxKind::IMPORT_PATH);
    p.expect(SyntaxKind::SEMICOLON);
    p.close(m, SyntaxKind::IMPORT_DECL);
}

/// `func name<T>(params): Ret { ... }` or `func name(params) = expr;`
fn parse_func_rest(p: &mut Parser, m: super::MarkOpened) {
    p.advance(); // func
    p.expect(SyntaxKind::IDENT);
    if p.at(SyntaxKind::LT) {
        parse_type_param_list(p);
    }
    parse_param_list(p);
    if p.at(SyntaxKind::COLON) {
        let a = p.open();
        p.advance();
        parse_type(p);
        p.close(a, SyntaxKind::TYPE_ANNOTATION);
    }

    if p.at(SyntaxKind::L_BRACE) {
        expressions::block_expr(p);
    } else if p.at(SyntaxKind::ASSIGN) {
        let b = p.open();
        p.advance();
        expressions::expr(p);
        p.expect(SyntaxKind::SEMICOLON);
        p.close(b, SyntaxKind::INLINE_BODY);
    } else {
        p.diagnostics.report(
            DiagnosticKind::ExpectedToken {
                expected: "function body".to_string(),
            },
            Span::empty_at(p.current_span().start),
        );
    }
    p.close(m, SyntaxKind::FUNC_DECL);
}

/// `module name { decls }`. Inside a local context the whole declaration is
/// wrapped in an error node.
fn parse_module_rest(p: &mut Parser, m: super::MarkOpened, ctx: DeclContext) {
    if ctx == DeclContext::Local {
        let span = p.current_span();
        p.diagnostics.report(
            DiagnosticKind::IllegalElementInContext {
                what: "module declaration".to_string(),
            },
            span,
        );
    }
    p.advance(); // module
    p.expect(SyntaxKind::IDENT);
    p.expect(SyntaxKind::L_BRACE);
    while !p.at(SyntaxKind::R_BRACE) && !p.at(SyntaxKind::EOF) {
        let before = p.pos();
        parse_decl(p, DeclContext::Global);
        if p.pos() == before {
            p.advance_with_error();
        }
    }
    p.expect(SyntaxKind::R_BRACE);
    let closed = p.close(m, SyntaxKind::MODULE_DECL);
    if ctx == DeclContext::Local {
        let wrapper = p.open_before(closed);
        p.close(wrapper, SyntaxKind::ERROR_NODE);
    }
}

/// `var x: T = init;` / `val x = init;` -- annotation and initializer are
/// each optional syntactically; the binder requires at least one.
fn parse_variable_rest(p: &mut Parser, m: super::MarkOpened) {
    p.advance(); // var / val
    p.expect(SyntaxKind::IDENT);
    if p.at(SyntaxKind::COLON) {
        let a = p.open();
        p.advance();
        parse_type(p);
        p.close(a, SyntaxKind::TYPE_ANNOTATION);
    }
    if p.eat(SyntaxKind::ASSIGN) {
        expressions::expr(p);
    }
    p.expect(SyntaxKind::SEMICOLON);
    p.close(m, SyntaxKind::VARIABLE_DECL);
}

/// `<T, U>` in declaration position.
fn parse_type_param_list(p: &mut Parser) {
    let m = p.open();
    p.advance(); // <
    while !p.at(SyntaxKind::GT) && !p.at(SyntaxKind::EOF) {
        let tp = p.open();
        p.expect(SyntaxKind::IDENT);
        p.close(tp, SyntaxKind::TYPE_PARAM);
        if !p.eat(SyntaxKind::COMMA) {
            break;
        }
    }
    p.expect(SyntaxKind::GT);
    p.close(m, SyntaxKind::TYPE_PARAM_LIST);
}

/// `(a: T, b: U, ...rest: Array<V>)` including the parentheses.
fn parse_param_list(p: &mut Parser) {
    let m = p.open();
    p.expect(SyntaxKind::L_PAREN);
    while !p.at(SyntaxKind::R_PAREN) && !p.at(SyntaxKind::EOF) {
        let before = p.pos();
        parse_param(p);
        if p.pos() == before {
            p.recover_until(&[
                SyntaxKind::COMMA,
                SyntaxKind::R_PAREN,
                SyntaxKind::L_BRACE,
                SyntaxKind::SEMICOLON,
            ]);
        }
        if !p.eat(SyntaxKind::COMMA) {
            break;
        }
    }
    p.expect(SyntaxKind::R_PAREN);
    p.close(m, SyntaxKind::PARAM_LIST);
}

fn parse_param(p: &mut Parser) {
    let m = p.open();
    p.eat(SyntaxKind::ELLIPSIS);
    p.expect(SyntaxKind::IDENT);
    if p.at(SyntaxKind::COLON) {
        let a = p.open();
        p.advance();
        parse_type(p);
        p.close(a, SyntaxKind::TYPE_ANNOTATION);
    } else {
        p.diagnostics.report(
            DiagnosticKind::ExpectedToken {
                expected: "`:`".to_string(),
            },
            Span::empty_at(p.current_span().start),
        );
    }
    p.close(m, SyntaxKind::PARAM);
}

// ── Types ──────────────────────────────────────────────────────────────

/// Parse a type: a name, optionally qualified with `.` and instantiated
/// with `<...>`. In type position `<` is never ambiguous.
pub(crate) fn parse_type(p: &mut Parser) {
    let m = p.open();
    if !p.at(SyntaxKind::IDENT) {
        p.expect(SyntaxKind::IDENT);
        p.close(m, SyntaxKind::NAME_TYPE);
        return;
    }
    p.advance();
    let mut lhs = p.close(m, SyntaxKind::NAME_TYPE);
    loop {
        match p.current() {
            SyntaxKind::DOT => {
                let m = p.open_before(lhs);
                p.advance();
                p.expect(SyntaxKind::IDENT);
                lhs = p.close(m, SyntaxKind::MEMBER_TYPE);
            }
            SyntaxKind::LT => {
                let m = p.open_before(lhs);
                parse_generic_arg_list(p);
                lhs = p.close(m, SyntaxKind::GENERIC_TYPE);
            }
            _ => break,
        }
    }
}

/// `<T, U, V>` -- the argument list of a generic type or generic
/// expression. The caller has already decided this is a generic.
pub(crate) fn parse_generic_arg_list(p: &mut Parser) {
    let m = p.open();
    p.advance(); // <
    while !p.at(SyntaxKind::GT) && !p.at(SyntaxKind::EOF) {
        let before = p.pos();
        parse_type(p);
        if p.pos() == before {
            break;
        }
        if !p.eat(SyntaxKind::COMMA) {
            break;
        }
    }
    p.expect(SyntaxKind::GT);
    p.close(m, SyntaxKind::GENERIC_ARG_LIST);
}

// ── Statements ─────────────────────────────────────────────────────────

/// Parse one statement inside a block.
pub(crate) fn parse_stmt(p: &mut Parser) {
    match p.current() {
        SyntaxKind::SEMICOLON => {
            let m = p.open();
            p.advance();
            p.close(m, SyntaxKind::NO_OP_STMT);
        }

        SyntaxKind::VAR_KW
        | SyntaxKind::VAL_KW
        | SyntaxKind::FUNC_KW
        | SyntaxKind::IMPORT_KW
        | SyntaxKind::MODULE_KW
        | SyntaxKind::INTERNAL_KW
        | SyntaxKind::PUBLIC_KW => {
            let m = p.open();
            parse_decl(p, DeclContext::Local);
            p.close(m, SyntaxKind::DECL_STMT);
        }

        SyntaxKind::IDENT if p.nth(1) == SyntaxKind::COLON => {
            let m = p.open();
            parse_decl(p, DeclContext::Local);
            p.close(m, SyntaxKind::DECL_STMT);
        }

        // Control flow as a statement: the trailing semicolon is optional.
        SyntaxKind::L_BRACE | SyntaxKind::IF_KW | SyntaxKind::WHILE_KW => {
            let closed = expressions::control_expr(p);
            let m = p.open_before(closed);
            p.eat(SyntaxKind::SEMICOLON);
            p.close(m, SyntaxKind::EXPR_STMT);
        }

        _ => match expressions::expr(p) {
            Some(closed) => {
                let m = p.open_before(closed);
                if !p.eat(SyntaxKind::SEMICOLON) && !p.at(SyntaxKind::R_BRACE) {
                    p.diagnostics.report(
                        DiagnosticKind::ExpectedToken {
                            expected: "`;`".to_string(),
                        },
                        Span::empty_at(p.current_span().start),
                    );
                }
                p.close(m, SyntaxKind::EXPR_STMT);
            }
            None => {
                // Nothing expression-shaped here; consume one token so the
                // enclosing block makes progress.
                p.advance_with_error();
            }
        },
    }
}
