//! Integration tests for the Aspen binder and constraint solver.
//!
//! These parse full programs, run `aspen_typeck::check()`, and assert on
//! resolved types, chosen overloads, and diagnostics. Failure containment
//! gets particular attention: one root cause, one diagnostic.

use aspen_common::cancel::CancelToken;
use aspen_common::diagnostics::DiagnosticKind;
use aspen_typeck::provider::{
    Assembly, MemberDescriptor, MemberKind, StaticProvider, TypeDescriptor,
};
use aspen_typeck::symbol::{SymbolKind, Visibility};
use aspen_typeck::ty::Ty;
use aspen_typeck::TypeckResult;

// ── Helpers ────────────────────────────────────────────────────────────

fn check_source(src: &str) -> TypeckResult {
    let parse = aspen_parser::parse(src);
    assert!(
        parse.ok(),
        "parse errors in test source: {:?}",
        parse.diagnostics()
    );
    aspen_typeck::check(&parse)
}

fn assert_clean(result: &TypeckResult) {
    assert!(
        result.diagnostics.is_empty(),
        "expected no diagnostics, got: {:?}",
        result.diagnostics
    );
}

fn assert_single_error(result: &TypeckResult, pred: impl Fn(&DiagnosticKind) -> bool, desc: &str) {
    let all: Vec<_> = result.diagnostics.iter().collect();
    assert_eq!(all.len(), 1, "expected exactly one diagnostic ({desc}), got: {all:?}");
    assert!(pred(&all[0].kind), "expected {desc}, got: {:?}", all[0].kind);
}

/// The resolved type of the local named `name`.
fn local_type(result: &TypeckResult, name: &str) -> Ty {
    for i in 0..result.symbols.len() {
        let id = aspen_typeck::symbol::SymbolId(i as u32);
        let data = result.symbols.get(id);
        if data.name.as_deref() == Some(name) {
            if let SymbolKind::Local { ty, .. } = &data.kind {
                return ty.clone();
            }
        }
    }
    panic!("no local named {name}");
}

// ── Clean programs ─────────────────────────────────────────────────────

#[test]
fn arithmetic_resolves_to_int32() {
    let result = check_source("func main() { var x: int32 = 1 + 2 * 3; }");
    assert_clean(&result);
    assert_eq!(local_type(&result, "x"), Ty::int32());
}

#[test]
fn float_arithmetic_resolves_to_float64() {
    let result = check_source("func main() { val x = 1.5 + 2.5; }");
    assert_clean(&result);
    assert_eq!(local_type(&result, "x"), Ty::float64());
}

#[test]
fn string_concatenation_overloads_plus() {
    let result = check_source("func main() { val s = \"a\" + \"b\"; }");
    assert_clean(&result);
    assert_eq!(local_type(&result, "s"), Ty::string());
}

#[test]
fn explicit_generic_call_instantiates() {
    let result = check_source("func f<T>(x: T): T = x; func main() { val y = f<int32>(5); }");
    assert_clean(&result);
    assert_eq!(local_type(&result, "y"), Ty::int32());
}

#[test]
fn implicit_generic_call_infers_arguments() {
    let result = check_source("func id<T>(x: T): T = x; func main() { var y: int32 = id(5); }");
    assert_clean(&result);
    assert_eq!(local_type(&result, "y"), Ty::int32());
}

#[test]
fn relational_chain_is_bool() {
    let result = check_source("func main() { val b = 1 < 2; val c = not b; }");
    assert_clean(&result);
    assert_eq!(local_type(&result, "b"), Ty::bool());
    assert_eq!(local_type(&result, "c"), Ty::bool());
}

#[test]
fn if_else_branches_unify() {
    let result = check_source("func main() { val x = if (true) 1 else 2; }");
    assert_clean(&result);
    assert_eq!(local_type(&result, "x"), Ty::int32());
}

#[test]
fn block_tail_is_function_result() {
    let result = check_source("func three(): int32 { 1 + 2 }");
    assert_clean(&result);
}

#[test]
fn return_type_checks_against_signature() {
    let result = check_source("func f(): int32 { return 42; }");
    assert_clean(&result);
}

#[test]
fn while_loop_with_assignment() {
    let result = check_source(
        "func main() { var i: int32 = 0; while (i < 10) { i += 1; } }",
    );
    assert_clean(&result);
}

#[test]
fn variadic_call_packs_arguments() {
    let result = check_source(
        "func sum(...xs: Array<int32>): int32 = 0; func main() { val t = sum(1, 2, 3); }",
    );
    assert_clean(&result);
    assert_eq!(local_type(&result, "t"), Ty::int32());
}

#[test]
fn array_length_member_resolves() {
    let result = check_source(
        "func first(...xs: Array<int32>): int32 { return xs.length; }",
    );
    assert_clean(&result);
}

#[test]
fn interpolation_pieces_are_unconstrained() {
    let result = check_source("func main() { val s = \"x = \\{1 + 2}\"; }");
    assert_clean(&result);
    assert_eq!(local_type(&result, "s"), Ty::string());
}

#[test]
fn module_members_resolve_by_path() {
    let result = check_source(
        "module math { public func double(x: int32): int32 = x + x; }\n\
         func main() { val y = math.double(21); }",
    );
    assert_clean(&result);
    assert_eq!(local_type(&result, "y"), Ty::int32());
}

#[test]
fn labels_and_goto_resolve() {
    let result = check_source("func main() { top: goto top; }");
    assert_clean(&result);
}

// ── Diagnostics ────────────────────────────────────────────────────────

#[test]
fn mixed_operand_addition_has_no_overload() {
    // One root cause: the `+` has no viable candidate. The function's
    // declared return type must not produce a second diagnostic.
    let result = check_source("func main() { return 1 + \"x\"; }");
    assert_single_error(
        &result,
        |k| matches!(k, DiagnosticKind::NoMatchingOverload { name } if name == "+"),
        "NoMatchingOverload for +",
    );
}

#[test]
fn poisoned_result_does_not_cascade() {
    let result = check_source(
        "func main() { val bad = 1 + \"x\"; val worse = bad + 1; }",
    );
    assert_single_error(
        &result,
        |k| matches!(k, DiagnosticKind::NoMatchingOverload { .. }),
        "a single NoMatchingOverload",
    );
    assert_eq!(local_type(&result, "bad"), Ty::Error);
}

#[test]
fn annotation_mismatch_is_reported() {
    let result = check_source("func main() { var x: int32 = \"s\"; }");
    assert_single_error(
        &result,
        |k| {
            matches!(k, DiagnosticKind::TypeMismatch { expected, got }
                if expected == "int32" && got == "string")
        },
        "TypeMismatch int32/string",
    );
}

#[test]
fn equal_scoring_overloads_are_ambiguous() {
    let result = check_source(
        "func f(x: int32): int32 = x; func f(y: int32): int32 = y;\n\
         func main() { f(1); }",
    );
    assert_single_error(
        &result,
        |k| matches!(k, DiagnosticKind::AmbiguousOverload { name, candidates }
            if name == "f" && *candidates == 2),
        "AmbiguousOverload",
    );
}

#[test]
fn undefined_name_is_reported_once() {
    let result = check_source("func main() { val x = nope; }");
    assert_single_error(
        &result,
        |k| matches!(k, DiagnosticKind::UndefinedReference { name } if name == "nope"),
        "UndefinedReference",
    );
    assert_eq!(local_type(&result, "x"), Ty::Error);
}

#[test]
fn calling_a_non_function_value() {
    let result = check_source("func main() { val x = 1; x(2); }");
    assert_single_error(
        &result,
        |k| matches!(k, DiagnosticKind::CallNonFunction { ty } if ty == "int32"),
        "CallNonFunction",
    );
}

#[test]
fn type_name_in_call_position_is_illegal() {
    let result = check_source("func main() { int32(1); }");
    assert_single_error(
        &result,
        |k| matches!(k, DiagnosticKind::IllegalReferenceContext { name } if name == "int32"),
        "IllegalReferenceContext",
    );
}

#[test]
fn variadic_parameter_must_be_an_array() {
    let result = check_source("func f(...xs: int32) {}");
    assert_single_error(
        &result,
        |k| matches!(k, DiagnosticKind::VariadicParameterNotArray { name } if name == "xs"),
        "VariadicParameterNotArray",
    );
}

#[test]
fn generic_arity_mismatch_on_explicit_arguments() {
    let result = check_source(
        "func f<T>(x: T): T = x; func main() { f<int32, int64>(5); }",
    );
    assert_single_error(
        &result,
        |k| matches!(k, DiagnosticKind::GenericArityMismatch { expected: 1, got: 2 }),
        "GenericArityMismatch",
    );
}

#[test]
fn declaration_without_annotation_or_initializer() {
    let result = check_source("func main() { var x; }");
    assert_single_error(
        &result,
        |k| matches!(k, DiagnosticKind::CannotInferType { name } if name == "x"),
        "CannotInferType",
    );
}

#[test]
fn goto_to_unknown_label() {
    let result = check_source("func main() { goto nowhere; }");
    assert_single_error(
        &result,
        |k| matches!(k, DiagnosticKind::UndefinedReference { name } if name == "nowhere"),
        "UndefinedReference for the label",
    );
}

#[test]
fn condition_must_be_bool() {
    let result = check_source("func main() { if (1) {} }");
    assert_single_error(
        &result,
        |k| matches!(k, DiagnosticKind::TypeMismatch { expected, got }
            if expected == "bool" && got == "int32"),
        "TypeMismatch bool/int32",
    );
}

// ── Determinism and cancellation ───────────────────────────────────────

#[test]
fn checking_is_deterministic() {
    let src = "func f(x: int32): int32 = x; func f(y: int32): int32 = y;\n\
               func main() { f(1); val z = 1 + \"s\"; }";
    let parse = aspen_parser::parse(src);
    let a = aspen_typeck::check(&parse);
    let b = aspen_typeck::check(&parse);
    let msgs_a: Vec<_> = a.diagnostics.iter().map(|d| d.message()).collect();
    let msgs_b: Vec<_> = b.diagnostics.iter().map(|d| d.message()).collect();
    assert_eq!(msgs_a, msgs_b);
}

#[test]
fn cancellation_returns_without_panicking() {
    let parse = aspen_parser::parse("func main() { val x = 1 + 2; }");
    let cancel = CancelToken::new();
    cancel.cancel();
    let result = aspen_typeck::check_with(&parse, &aspen_typeck::provider::NullProvider, &cancel);
    // Binding ran; the solver observed cancellation and left early. All
    // state remains valid, if incomplete.
    assert_eq!(result.bound.functions.len(), 1);
}

// ── External symbols ───────────────────────────────────────────────────

#[test]
fn external_types_come_from_the_provider() {
    let mut assembly = Assembly::new("system");
    assembly.add_type(
        "",
        TypeDescriptor {
            name: "console".to_string(),
            is_value_type: false,
            visibility: Visibility::Public,
            generic_params: Vec::new(),
            members: vec![MemberDescriptor {
                name: "write".to_string(),
                kind: MemberKind::Function {
                    params: vec![Ty::string()],
                    ret: Ty::unit(),
                },
            }],
        },
    );
    let mut provider = StaticProvider::new();
    provider.add_assembly(assembly);

    let parse = aspen_parser::parse(
        "import system.console;\nfunc main() { console.write(\"hi\"); }",
    );
    assert!(parse.ok());
    let result = aspen_typeck::check_with(&parse, &provider, &CancelToken::new());
    assert!(
        result.diagnostics.is_empty(),
        "diagnostics: {:?}",
        result.diagnostics
    );
}
