//! Integration tests for IR lowering.
//!
//! These compile full programs to IR and assert on instruction selection
//! (including the arithmetic rewrites), basic block structure, and the
//! flow diagnostics.

use aspen_common::diagnostics::{DiagnosticKind, Severity};
use aspen_ir::lower::{lower, LowerResult};
use aspen_ir::{Instruction, Module, Operand, Procedure};
use aspen_typeck::untyped::ConstValue;

fn compile(src: &str) -> LowerResult {
    let parse = aspen_parser::parse(src);
    assert!(parse.ok(), "parse errors: {:?}", parse.diagnostics());
    let typeck = aspen_typeck::check(&parse);
    assert!(
        !typeck.diagnostics.has_errors(),
        "type errors: {:?}",
        typeck.diagnostics
    );
    lower(&typeck)
}

fn proc_named<'a>(module: &'a Module, name: &str) -> &'a Procedure {
    module
        .procedures
        .iter()
        .find(|p| p.name == name)
        .unwrap_or_else(|| panic!("no procedure named {name}"))
}

fn instructions(procedure: &Procedure) -> Vec<&Instruction> {
    procedure
        .blocks
        .iter()
        .flat_map(|b| b.instructions.iter())
        .collect()
}

/// Every block ends in exactly one branch; no branch sits mid-block.
fn assert_block_invariants(module: &Module) {
    for procedure in &module.procedures {
        for block in &procedure.blocks {
            assert!(
                block.terminator().is_some(),
                "block {} of {} does not end in a branch:\n{procedure}",
                block.id,
                procedure.name
            );
            let branch_count = block
                .instructions
                .iter()
                .filter(|i| i.is_branch())
                .count();
            assert_eq!(
                branch_count, 1,
                "block {} of {} has {branch_count} branches",
                block.id, procedure.name
            );
        }
    }
}

// ── Instruction selection ──────────────────────────────────────────────

#[test]
fn multiplication_is_emitted_before_addition() {
    let result = compile("func main() { var x: int32 = 1 + 2 * 3; }");
    assert!(result.diagnostics.is_empty());
    let main = proc_named(&result.module, "main");
    let all = instructions(main);

    let mul = all
        .iter()
        .position(|i| matches!(i, Instruction::Mul { .. }))
        .expect("a mul instruction");
    let add = all
        .iter()
        .position(|i| matches!(i, Instruction::Add { .. }))
        .expect("an add instruction");
    assert!(mul < add, "operands are computed before the outer operator");

    // The result lands in the local for `x`.
    assert!(all
        .iter()
        .any(|i| matches!(i, Instruction::Store { target: Operand::Local(_), .. })));
    assert_block_invariants(&result.module);
}

#[test]
fn modulo_lowering_uses_wrapped_remainder() {
    // a mod b  ==>  (a rem b + b) rem b
    let result = compile("func f(a: int32, b: int32): int32 = a mod b;");
    let f = proc_named(&result.module, "f");
    let all = instructions(f);

    let rems: Vec<usize> = all
        .iter()
        .enumerate()
        .filter(|(_, i)| matches!(i, Instruction::Rem { .. }))
        .map(|(idx, _)| idx)
        .collect();
    let adds: Vec<usize> = all
        .iter()
        .enumerate()
        .filter(|(_, i)| matches!(i, Instruction::Add { .. }))
        .map(|(idx, _)| idx)
        .collect();
    assert_eq!(rems.len(), 2, "two remainders:\n{f}");
    assert_eq!(adds.len(), 1, "one addition:\n{f}");
    assert!(rems[0] < adds[0] && adds[0] < rems[1], "rem, add, rem order");

    // The second rem adds the divisor back before reducing again, and its
    // result is what the function returns.
    let Instruction::Rem { target, .. } = all[rems[1]] else {
        unreachable!()
    };
    assert!(all.iter().any(
        |i| matches!(i, Instruction::Ret { value: Operand::Register(r) } if r == target)
    ));
}

#[test]
fn greater_equal_is_negated_less() {
    let result = compile("func f(a: int32, b: int32): bool = a >= b;");
    let f = proc_named(&result.module, "f");
    let all = instructions(f);

    let less = all
        .iter()
        .position(|i| matches!(i, Instruction::Less { .. }))
        .expect("a less instruction");
    let negation = all.iter().position(|i| {
        matches!(
            i,
            Instruction::Equal {
                rhs: Operand::Const(ConstValue::Bool(false)),
                ..
            }
        )
    });
    assert!(negation.is_some_and(|n| less < n), "less, then == false:\n{f}");
}

#[test]
fn not_equal_is_negated_equal() {
    let result = compile("func f(a: int32, b: int32): bool = a != b;");
    let f = proc_named(&result.module, "f");
    let all = instructions(f);
    let equals: Vec<&&Instruction> = all
        .iter()
        .filter(|i| matches!(i, Instruction::Equal { .. }))
        .collect();
    // One comparison plus one negation against `false`.
    assert_eq!(equals.len(), 2, "{f}");
}

#[test]
fn unary_minus_multiplies_by_negative_one() {
    let result = compile("func f(a: int32): int32 = -a;");
    let f = proc_named(&result.module, "f");
    assert!(instructions(f).iter().any(|i| matches!(
        i,
        Instruction::Mul {
            rhs: Operand::Const(ConstValue::Int(-1)),
            ..
        }
    )));
}

#[test]
fn boolean_not_compares_with_false() {
    let result = compile("func f(a: bool): bool = not a;");
    let f = proc_named(&result.module, "f");
    assert!(instructions(f).iter().any(|i| matches!(
        i,
        Instruction::Equal {
            rhs: Operand::Const(ConstValue::Bool(false)),
            ..
        }
    )));
}

// ── Control flow ───────────────────────────────────────────────────────

#[test]
fn while_loop_has_a_back_edge() {
    let result = compile(
        "func main() { var i: int32 = 0; while (i < 10) { i += 1; } }",
    );
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    let main = proc_named(&result.module, "main");
    assert_block_invariants(&result.module);

    // Some block jumps backward to the loop header.
    let has_back_edge = main.blocks.iter().any(|b| {
        matches!(b.terminator(), Some(Instruction::Jump { target }) if target.0 < b.id.0)
    });
    assert!(has_back_edge, "{main}");
}

#[test]
fn goto_jumps_to_its_label_block() {
    let result = compile(
        "func main() { var i: int32 = 0; again: i += 1; if (i < 3) goto again; }",
    );
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert_block_invariants(&result.module);
    let main = proc_named(&result.module, "main");
    assert!(main.blocks.len() >= 3, "label and branch blocks:\n{main}");
}

#[test]
fn conditional_produces_a_diamond() {
    let result = compile("func pick(c: bool): int32 = if (c) 1 else 2;");
    let pick = proc_named(&result.module, "pick");
    assert_block_invariants(&result.module);
    let branches = pick
        .blocks
        .iter()
        .filter(|b| matches!(b.terminator(), Some(Instruction::Branch { .. })))
        .count();
    assert_eq!(branches, 1, "{pick}");
}

#[test]
fn logical_and_short_circuits() {
    let result = compile("func f(a: bool, b: bool): bool = a and b;");
    let f = proc_named(&result.module, "f");
    assert_block_invariants(&result.module);
    // A diamond: the rhs block is only reached when the lhs is true.
    assert!(f.blocks.len() >= 4, "{f}");
    assert!(instructions(f)
        .iter()
        .any(|i| matches!(i, Instruction::Branch { .. })));
}

// ── Flow diagnostics ───────────────────────────────────────────────────

#[test]
fn code_after_return_is_unreachable_once() {
    let result = compile("func main() { return; 1 + 2; 3 + 4; }");
    let warnings: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::UnreachableCode)
        .collect();
    assert_eq!(warnings.len(), 1, "one warning per dead region");
    assert_eq!(warnings[0].severity, Severity::Warning);
    assert_block_invariants(&result.module);
}

#[test]
fn missing_return_on_a_path_is_reported() {
    let result = compile("func f(c: bool): int32 { if (c) { return 1; } }");
    assert!(result
        .diagnostics
        .iter()
        .any(|d| matches!(&d.kind, DiagnosticKind::NotAllPathsReturn { function } if function == "f")));
    assert_block_invariants(&result.module);
}

#[test]
fn unit_functions_fall_through_cleanly() {
    let result = compile("func main() { val x = 1; }");
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    let main = proc_named(&result.module, "main");
    assert!(matches!(
        main.blocks[main.entry.0 as usize].terminator(),
        Some(Instruction::Ret { .. })
    ));
}

// ── Calls ──────────────────────────────────────────────────────────────

#[test]
fn variadic_arguments_pack_into_an_array() {
    let result = compile(
        "func sum(...xs: Array<int32>): int32 = 0; func main() { sum(1, 2, 3); }",
    );
    let main = proc_named(&result.module, "main");
    let all = instructions(main);
    assert!(all.iter().any(|i| matches!(
        i,
        Instruction::NewArray {
            length: Operand::Const(ConstValue::Int(3)),
            ..
        }
    )));
    let stores = all
        .iter()
        .filter(|i| matches!(i, Instruction::StoreElement { .. }))
        .count();
    assert_eq!(stores, 3);
    assert!(all
        .iter()
        .any(|i| matches!(i, Instruction::Call { callee: Operand::Symbol(s), .. } if s == "sum")));
}

#[test]
fn procedures_compile_at_most_once() {
    let result = compile(
        "func fact(n: int32): int32 { if (n < 1) { return 1; } return n * fact(n - 1); }\n\
         func main() { fact(3); fact(4); }",
    );
    assert_eq!(result.module.procedures.len(), 2);
    assert_block_invariants(&result.module);
}

#[test]
fn interpolation_lowers_to_string_helpers() {
    let result = compile("func main() { val s = \"v=\\{1 + 2}\"; }");
    let main = proc_named(&result.module, "main");
    let all = instructions(main);
    assert!(all
        .iter()
        .any(|i| matches!(i, Instruction::Call { callee: Operand::Symbol(s), .. } if s == "to_string")));
    assert!(all
        .iter()
        .any(|i| matches!(i, Instruction::Call { callee: Operand::Symbol(s), .. } if s == "concat")));
}

#[test]
fn array_length_uses_the_dedicated_instruction() {
    let result = compile("func len(...xs: Array<int32>): int32 = xs.length;");
    let len = proc_named(&result.module, "len");
    assert!(instructions(len)
        .iter()
        .any(|i| matches!(i, Instruction::ArrayLength { .. })));
}

// ── Structure ──────────────────────────────────────────────────────────

#[test]
fn scopes_and_sequence_points_are_emitted() {
    let result = compile("func main() { val x = 1; val y = 2; }");
    let main = proc_named(&result.module, "main");
    let all = instructions(main);
    assert!(all.iter().any(|i| matches!(i, Instruction::StartScope { .. })));
    assert!(all.iter().any(|i| matches!(i, Instruction::EndScope)));
    let sequence_points = all
        .iter()
        .filter(|i| matches!(i, Instruction::SequencePoint { .. }))
        .count();
    assert_eq!(sequence_points, 2, "one per statement:\n{main}");
}

#[test]
fn module_prints_its_procedures() {
    let result = compile("func main() { val x = 1 + 2; }");
    let printed = result.module.to_string();
    assert!(printed.contains("proc @main()"));
    assert!(printed.contains(":= add"));
    assert!(printed.contains("ret unit"));
    assert!(printed.contains("bb0:"));
}

#[test]
fn globals_are_lowered_with_storage() {
    let result = compile("var counter: int32 = 0; func main() { counter += 1; }");
    assert_eq!(result.module.globals.len(), 1);
    assert_eq!(result.module.globals[0].name, "counter");
    let main = proc_named(&result.module, "main");
    assert!(instructions(main)
        .iter()
        .any(|i| matches!(i, Instruction::Store { target: Operand::Global(_), .. })));
}
