//! Integration tests for the Aspen parser.
//!
//! These parse full source files and assert on tree shape, the round-trip
//! property, `<` disambiguation, and error recovery.

use aspen_common::diagnostics::DiagnosticKind;
use aspen_parser::ast::expr::{BlockExpr, Expr};
use aspen_parser::ast::item::{Decl, Stmt};
use aspen_parser::ast::AstNode;
use aspen_parser::{parse, SyntaxKind, SyntaxNode};

/// Find the first node of the given kind, depth-first.
fn find_node(root: &SyntaxNode, kind: SyntaxKind) -> Option<SyntaxNode> {
    root.descendants().find(|n| n.kind() == kind)
}

fn body_of_first_func(parse: &aspen_parser::Parse) -> BlockExpr {
    let file = parse.tree();
    for decl in file.decls() {
        if let Decl::Func(f) = decl {
            if let Some(block) = f.body_block() {
                return block;
            }
        }
    }
    panic!("no function with a block body");
}

// ── Round-trip ─────────────────────────────────────────────────────────

#[test]
fn tree_text_round_trips_source() {
    let sources = [
        "func main() {\n    var x: int32 = 1 + 2 * 3;\n}\n",
        "// comment\nimport system.io;\n\npublic func f<T>(x: T): T = x;\n",
        "func broken( { var = ; } $\n",
        "val s = \"\"\"\n  foo\n     bar\n  \"\"\";\n",
        "module m { internal val x = 1; }\n",
        "",
    ];
    for source in sources {
        let parse = parse(source);
        assert_eq!(
            parse.syntax().text().to_string(),
            source,
            "round-trip failed for {source:?}"
        );
    }
}

#[test]
fn red_tree_positions_are_consistent() {
    let source = "func main() { val x = 1 + 2; }\n";
    let parse = parse(source);
    let root = parse.syntax();
    for node in root.descendants() {
        if let Some(parent) = node.parent() {
            assert!(parent.text_range().contains_range(node.text_range()));
        }
        // A node's range is exactly covered by its children in order.
        let mut offset = node.text_range().start();
        for child in node.children_with_tokens() {
            assert_eq!(child.text_range().start(), offset);
            offset = child.text_range().end();
        }
        if node.children_with_tokens().next().is_some() {
            assert_eq!(offset, node.text_range().end());
        }
    }
}

// ── Expressions ────────────────────────────────────────────────────────

#[test]
fn precedence_multiplication_binds_tighter() {
    let parse = parse("func main() { var x: int32 = 1 + 2 * 3; }");
    assert!(parse.ok(), "diagnostics: {:?}", parse.diagnostics());
    let root = parse.syntax();

    // The initializer is `+` at the top with `*` nested on the right.
    let add = find_node(&root, SyntaxKind::BINARY_EXPR).unwrap();
    let add_expr = match Expr::cast(add).unwrap() {
        Expr::Binary(b) => b,
        _ => unreachable!(),
    };
    assert_eq!(add_expr.op().unwrap().text(), "+");
    let rhs = add_expr.rhs().unwrap();
    match rhs {
        Expr::Binary(mul) => assert_eq!(mul.op().unwrap().text(), "*"),
        other => panic!("expected nested multiplication, got {other:?}"),
    }
}

#[test]
fn assignment_is_right_associative() {
    let parse = parse("func main() { a = b = c; }");
    let root = parse.syntax();
    let outer = find_node(&root, SyntaxKind::ASSIGN_EXPR).unwrap();
    let outer = match Expr::cast(outer).unwrap() {
        Expr::Assign(a) => a,
        _ => unreachable!(),
    };
    // lhs is `a`, rhs is the nested `b = c`.
    assert!(matches!(outer.lvalue(), Some(Expr::Name(_))));
    assert!(matches!(outer.rvalue(), Some(Expr::Assign(_))));
}

#[test]
fn relational_operators_chain_into_one_node() {
    let parse = parse("func main() { 1 < 2 > 3; }");
    assert!(parse.ok(), "diagnostics: {:?}", parse.diagnostics());
    let root = parse.syntax();

    // No generic parse anywhere; one relational node with two comparisons.
    assert!(find_node(&root, SyntaxKind::GENERIC_EXPR).is_none());
    let rel = find_node(&root, SyntaxKind::RELATIONAL_EXPR).unwrap();
    let rel = match Expr::cast(rel).unwrap() {
        Expr::Relational(r) => r,
        _ => unreachable!(),
    };
    let comparisons: Vec<_> = rel.comparisons().collect();
    assert_eq!(comparisons.len(), 2);
    assert_eq!(comparisons[0].op().unwrap().text(), "<");
    assert_eq!(comparisons[1].op().unwrap().text(), ">");
}

#[test]
fn not_binds_looser_than_comparison() {
    let parse = parse("func main() { not 1 < 2; }");
    let root = parse.syntax();
    let unary = find_node(&root, SyntaxKind::UNARY_EXPR).unwrap();
    let unary = match Expr::cast(unary).unwrap() {
        Expr::Unary(u) => u,
        _ => unreachable!(),
    };
    assert!(matches!(unary.operand(), Some(Expr::Relational(_))));
}

// ── `<` disambiguation ─────────────────────────────────────────────────

#[test]
fn generic_call_disambiguates_to_generics() {
    let parse = parse("func f<T>(x: T): T = x; func main() { f<int32>(5); }");
    assert!(parse.ok(), "diagnostics: {:?}", parse.diagnostics());
    let root = parse.syntax();

    let generic = find_node(&root, SyntaxKind::GENERIC_EXPR).expect("generic expr");
    // The generic instantiation is the callee of a call.
    assert_eq!(generic.parent().unwrap().kind(), SyntaxKind::CALL_EXPR);
    assert!(find_node(&root, SyntaxKind::RELATIONAL_EXPR).is_none());
}

#[test]
fn lone_comparison_stays_an_operator() {
    let parse = parse("func main() { a < b; }");
    let root = parse.syntax();
    assert!(find_node(&root, SyntaxKind::GENERIC_EXPR).is_none());
    assert!(find_node(&root, SyntaxKind::RELATIONAL_EXPR).is_some());
}

#[test]
fn expression_starter_after_angle_selects_operator() {
    // `-` can start an expression, so `a<b>-c` reads as a relational chain.
    let parse = parse("func main() { a<b>-c; }");
    let root = parse.syntax();
    assert!(find_node(&root, SyntaxKind::GENERIC_EXPR).is_none());
    let rel = find_node(&root, SyntaxKind::RELATIONAL_EXPR).unwrap();
    let rel = match Expr::cast(rel).unwrap() {
        Expr::Relational(r) => r,
        _ => unreachable!(),
    };
    assert_eq!(rel.comparisons().count(), 2);
}

#[test]
fn non_starter_after_angle_defaults_to_generics() {
    let parse = parse("func main() { a<b>; }");
    let root = parse.syntax();
    assert!(find_node(&root, SyntaxKind::GENERIC_EXPR).is_some());
}

#[test]
fn nested_generics_scan_balances_angles() {
    let parse = parse("func main() { f<Array<int32>>(xs); }");
    assert!(parse.ok(), "diagnostics: {:?}", parse.diagnostics());
    let root = parse.syntax();
    let generic = find_node(&root, SyntaxKind::GENERIC_EXPR).unwrap();
    assert!(find_node(&generic, SyntaxKind::GENERIC_TYPE).is_some());
}

// ── Multi-line strings ─────────────────────────────────────────────────

#[test]
fn well_indented_multi_line_string_is_clean() {
    let source = "val s = \"\"\"\n  foo\n     bar\n  \"\"\";\n";
    let parse = parse(source);
    assert!(parse.ok(), "diagnostics: {:?}", parse.diagnostics());
}

#[test]
fn under_indented_line_is_reported_at_its_indentation() {
    let source = "val s = \"\"\"\n  foo\n bar\n  \"\"\";\n";
    let parse = parse(source);
    let diag = parse
        .diagnostics()
        .iter()
        .find(|d| d.kind == DiagnosticKind::InsufficientIndentationInMultiLineString)
        .expect("indentation diagnostic");
    // The offending line is ` bar` starting at offset 17; the span covers
    // its one-space indentation.
    let line_start = source.find(" bar\n").unwrap() as u32;
    assert_eq!(diag.span.start, line_start);
    assert_eq!(diag.span.len(), 1);
}

#[test]
fn closing_quotes_must_be_alone_on_their_line() {
    let source = "val s = \"\"\"\n  foo\"\"\";\n";
    let parse = parse(source);
    assert!(parse
        .diagnostics()
        .iter()
        .any(|d| d.kind == DiagnosticKind::ClosingQuotesOfMultiLineStringNotOnNewLine));
}

#[test]
fn content_on_opening_line_is_reported() {
    let source = "val s = \"\"\"oops\n  \"\"\";\n";
    let parse = parse(source);
    assert!(parse
        .diagnostics()
        .iter()
        .any(|d| d.kind == DiagnosticKind::ExtraTokensInlineWithOpenQuotesOfMultiLineString));
}

#[test]
fn interpolation_lines_are_exempt_from_indentation() {
    let source = "val s = \"\"\"\n  a\n\\{x}\n  \"\"\";\n";
    let parse = parse(source);
    assert!(!parse
        .diagnostics()
        .iter()
        .any(|d| d.kind == DiagnosticKind::InsufficientIndentationInMultiLineString));
}

// ── Declarations and statements ────────────────────────────────────────

#[test]
fn function_with_inline_body() {
    let parse = parse("func id<T>(x: T): T = x;");
    assert!(parse.ok(), "diagnostics: {:?}", parse.diagnostics());
    let file = parse.tree();
    let Some(Decl::Func(f)) = file.decls().next() else {
        panic!("expected a function");
    };
    assert_eq!(f.name().unwrap().text(), "id");
    assert!(f.inline_body().is_some());
    assert!(f.body_block().is_none());
    let type_params: Vec<_> = f.type_params().unwrap().params().collect();
    assert_eq!(type_params.len(), 1);
}

#[test]
fn variadic_parameter_is_flagged() {
    let parse = parse("func f(...rest: Array<int32>) {}");
    let file = parse.tree();
    let Some(Decl::Func(f)) = file.decls().next() else {
        panic!("expected a function");
    };
    let params: Vec<_> = f.param_list().unwrap().params().collect();
    assert_eq!(params.len(), 1);
    assert!(params[0].is_variadic());
}

#[test]
fn block_tail_expression_is_its_value() {
    let parse1 = parse("func main() { val x = 1; x }");
    let block = body_of_first_func(&parse1);
    assert!(block.tail_expr().is_some());

    let parse2 = parse("func main() { val x = 1; x; }");
    let block = body_of_first_func(&parse2);
    assert!(block.tail_expr().is_none());
}

#[test]
fn labels_parse_in_blocks() {
    let parse = parse("func main() { again: goto again; }");
    assert!(parse.ok(), "diagnostics: {:?}", parse.diagnostics());
    let block = body_of_first_func(&parse);
    let stmts: Vec<_> = block.statements().collect();
    assert_eq!(stmts.len(), 2);
    assert!(matches!(&stmts[0], Stmt::Decl(d) if matches!(d.decl(), Some(Decl::Label(_)))));
}

#[test]
fn module_in_function_body_is_wrapped_as_error() {
    let parse = parse("func main() { module m { } }");
    assert!(parse
        .diagnostics()
        .iter()
        .any(|d| matches!(&d.kind, DiagnosticKind::IllegalElementInContext { what } if what.contains("module"))));
    let root = parse.syntax();
    let module = find_node(&root, SyntaxKind::MODULE_DECL).unwrap();
    assert_eq!(module.parent().unwrap().kind(), SyntaxKind::ERROR_NODE);
}

#[test]
fn label_at_top_level_is_wrapped_as_error() {
    let parse = parse("top: func main() {}");
    assert!(parse
        .diagnostics()
        .iter()
        .any(|d| matches!(&d.kind, DiagnosticKind::IllegalElementInContext { what } if what.contains("label"))));
    let root = parse.syntax();
    let label = find_node(&root, SyntaxKind::LABEL_DECL).unwrap();
    assert_eq!(label.parent().unwrap().kind(), SyntaxKind::ERROR_NODE);
}

// ── Recovery ───────────────────────────────────────────────────────────

#[test]
fn missing_variable_name_recovers() {
    let parse = parse("func main() { var = 1; }");
    // Exactly one diagnostic: the missing identifier, zero-width.
    let diags: Vec<_> = parse.diagnostics().iter().collect();
    assert_eq!(diags.len(), 1, "diagnostics: {diags:?}");
    assert!(
        matches!(&diags[0].kind, DiagnosticKind::ExpectedToken { expected } if expected == "identifier")
    );
    assert!(diags[0].span.is_empty());

    // The declaration still parsed with its initializer, and the block
    // reached its closing brace.
    let root = parse.syntax();
    let var = find_node(&root, SyntaxKind::VARIABLE_DECL).unwrap();
    assert!(find_node(&var, SyntaxKind::LITERAL_EXPR).is_some());
    assert_eq!(parse.syntax().text().to_string(), "func main() { var = 1; }");
}

#[test]
fn garbage_between_declarations_is_one_error_node() {
    let parse = parse("func a() {} 1 2 3 func b() {}");
    let file = parse.tree();
    let funcs: Vec<_> = file
        .decls()
        .filter(|d| matches!(d, Decl::Func(_)))
        .collect();
    assert_eq!(funcs.len(), 2, "both functions survive the garbage");
    assert!(parse
        .diagnostics()
        .iter()
        .any(|d| matches!(&d.kind, DiagnosticKind::UnexpectedInput { .. })));
}

#[test]
fn unclosed_block_terminates() {
    let parse = parse("func main() { val x = 1;");
    assert!(!parse.ok());
    assert_eq!(parse.syntax().text().to_string(), "func main() { val x = 1;");
}

#[test]
fn parsing_is_deterministic() {
    let source = "func main() { var x = 1 + ; } @";
    let a = parse(source);
    let b = parse(source);
    assert_eq!(a.syntax().text().to_string(), b.syntax().text().to_string());
    assert_eq!(a.diagnostics().len(), b.diagnostics().len());
}
