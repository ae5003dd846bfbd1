//! Register-based three-address IR for the Aspen compiler.
//!
//! A [`Module`] owns procedures and globals; a [`Procedure`] owns an
//! ordered list of basic blocks plus its locals, parameters, and typed
//! registers; a [`BasicBlock`] is a linear instruction sequence ending in
//! exactly one branch (`jump`, `branch`, or `ret`). Instructions are
//! `Clone` so optimization passes can duplicate them freely.
//!
//! The printable surface is one instruction per line:
//! `rN := op operands`, `ret <operand>`, `jump bbN`,
//! `branch <cond> bbT bbF`; operands are `rN`, `locN`, `globN`, `paramN`,
//! literal constants, and `@qualified.name` symbol references.

pub mod lower;

use std::fmt;

use aspen_common::span::Span;
use aspen_typeck::ty::Ty;
use aspen_typeck::untyped::ConstValue;

// ── Identifiers ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

macro_rules! impl_display_id {
    ($ty:ident, $prefix:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

impl_display_id!(RegId, "r");
impl_display_id!(LocalId, "loc");
impl_display_id!(GlobalId, "glob");
impl_display_id!(ParamId, "param");

// ── Module structure ───────────────────────────────────────────────────

/// One compiled module: procedures plus global storage.
#[derive(Debug, Default, Clone)]
pub struct Module {
    pub procedures: Vec<Procedure>,
    pub globals: Vec<Global>,
}

#[derive(Debug, Clone)]
pub struct Global {
    pub id: GlobalId,
    pub name: String,
    pub ty: Ty,
    /// Constant initial value, when the initializer folds to one.
    pub init: Option<ConstValue>,
}

#[derive(Debug, Clone)]
pub struct Procedure {
    /// Qualified name, used for symbolic references.
    pub name: String,
    pub params: Vec<(String, Ty)>,
    pub locals: Vec<(String, Ty)>,
    /// Register types, indexed by register id; typed at definition.
    pub registers: Vec<Ty>,
    pub blocks: Vec<BasicBlock>,
    pub entry: BlockId,
}

/// A linear instruction sequence ending in exactly one branch.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    /// The terminating branch, when the block is complete.
    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|i| i.is_branch())
    }
}

// ── Operands ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Register(RegId),
    Local(LocalId),
    Global(GlobalId),
    Param(ParamId),
    Const(ConstValue),
    /// A symbolic reference by qualified name.
    Symbol(String),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Register(r) => write!(f, "{r}"),
            Operand::Local(l) => write!(f, "{l}"),
            Operand::Global(g) => write!(f, "{g}"),
            Operand::Param(p) => write!(f, "{p}"),
            Operand::Const(c) => match c {
                ConstValue::Unit => write!(f, "unit"),
                ConstValue::Int(v) => write!(f, "{v}"),
                ConstValue::Float(v) => write!(f, "{v}"),
                ConstValue::Bool(v) => write!(f, "{v}"),
                ConstValue::Char(v) => write!(f, "{v:?}"),
                ConstValue::String(v) => write!(f, "{v:?}"),
            },
            Operand::Symbol(name) => write!(f, "@{name}"),
        }
    }
}

// ── Instructions ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    // Arithmetic
    Add { target: RegId, lhs: Operand, rhs: Operand },
    Sub { target: RegId, lhs: Operand, rhs: Operand },
    Mul { target: RegId, lhs: Operand, rhs: Operand },
    Div { target: RegId, lhs: Operand, rhs: Operand },
    Rem { target: RegId, lhs: Operand, rhs: Operand },

    // Comparison
    Less { target: RegId, lhs: Operand, rhs: Operand },
    Equal { target: RegId, lhs: Operand, rhs: Operand },

    // Memory
    Load { target: RegId, source: Operand },
    Store { target: Operand, source: Operand },
    LoadField { target: RegId, receiver: Operand, field: String },
    StoreField { receiver: Operand, field: String, source: Operand },
    LoadElement { target: RegId, array: Operand, index: Operand },
    StoreElement { array: Operand, index: Operand, source: Operand },

    // Calls and allocation
    Call { target: RegId, callee: Operand, args: Vec<Operand> },
    MemberCall { target: RegId, receiver: Operand, member: String, args: Vec<Operand> },
    NewObject { target: RegId, type_name: String, args: Vec<Operand> },
    NewArray { target: RegId, elem: Ty, length: Operand },
    ArrayLength { target: RegId, array: Operand },

    // Branches
    Jump { target: BlockId },
    Branch { condition: Operand, then_block: BlockId, else_block: BlockId },
    Ret { value: Operand },

    // Pseudo
    SequencePoint { span: Span },
    StartScope { locals: Vec<LocalId> },
    EndScope,
    Nop,
}

impl Instruction {
    /// Whether this instruction terminates a basic block.
    pub fn is_branch(&self) -> bool {
        matches!(
            self,
            Instruction::Jump { .. } | Instruction::Branch { .. } | Instruction::Ret { .. }
        )
    }

    /// Whether this instruction may appear in unreachable positions
    /// without an unreachable-code diagnostic (scope bookkeeping and
    /// debugging anchors).
    pub fn is_valid_in_unreachable(&self) -> bool {
        matches!(
            self,
            Instruction::SequencePoint { .. }
                | Instruction::StartScope { .. }
                | Instruction::EndScope
                | Instruction::Nop
        )
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Operand]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{arg}")?;
    }
    Ok(())
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Add { target, lhs, rhs } => write!(f, "{target} := add {lhs}, {rhs}"),
            Instruction::Sub { target, lhs, rhs } => write!(f, "{target} := sub {lhs}, {rhs}"),
            Instruction::Mul { target, lhs, rhs } => write!(f, "{target} := mul {lhs}, {rhs}"),
            Instruction::Div { target, lhs, rhs } => write!(f, "{target} := div {lhs}, {rhs}"),
            Instruction::Rem { target, lhs, rhs } => write!(f, "{target} := rem {lhs}, {rhs}"),
            Instruction::Less { target, lhs, rhs } => write!(f, "{target} := less {lhs}, {rhs}"),
            Instruction::Equal { target, lhs, rhs } => {
                write!(f, "{target} := equal {lhs}, {rhs}")
            }
            Instruction::Load { target, source } => write!(f, "{target} := load {source}"),
            Instruction::Store { target, source } => write!(f, "store {target}, {source}"),
            Instruction::LoadField {
                target,
                receiver,
                field,
            } => write!(f, "{target} := load_field {receiver}, {field}"),
            Instruction::StoreField {
                receiver,
                field,
                source,
            } => write!(f, "store_field {receiver}, {field}, {source}"),
            Instruction::LoadElement {
                target,
                array,
                index,
            } => write!(f, "{target} := load_element {array}, {index}"),
            Instruction::StoreElement {
                array,
                index,
                source,
            } => write!(f, "store_element {array}, {index}, {source}"),
            Instruction::Call {
                target,
                callee,
                args,
            } => {
                write!(f, "{target} := call {callee}")?;
                if !args.is_empty() {
                    write!(f, ", ")?;
                    write_args(f, args)?;
                }
                Ok(())
            }
            Instruction::MemberCall {
                target,
                receiver,
                member,
                args,
            } => {
                write!(f, "{target} := member_call {receiver}, {member}")?;
                if !args.is_empty() {
                    write!(f, ", ")?;
                    write_args(f, args)?;
                }
                Ok(())
            }
            Instruction::NewObject {
                target,
                type_name,
                args,
            } => {
                write!(f, "{target} := new_object @{type_name}")?;
                if !args.is_empty() {
                    write!(f, ", ")?;
                    write_args(f, args)?;
                }
                Ok(())
            }
            Instruction::NewArray {
                target,
                elem,
                length,
            } => write!(f, "{target} := new_array {elem}, {length}"),
            Instruction::ArrayLength { target, array } => {
                write!(f, "{target} := array_length {array}")
            }
            Instruction::Jump { target } => write!(f, "jump {target}"),
            Instruction::Branch {
                condition,
                then_block,
                else_block,
            } => write!(f, "branch {condition} {then_block} {else_block}"),
            Instruction::Ret { value } => write!(f, "ret {value}"),
            Instruction::SequencePoint { span } => {
                write!(f, "sequence_point {}..{}", span.start, span.end)
            }
            Instruction::StartScope { locals } => {
                write!(f, "start_scope")?;
                for (i, local) in locals.iter().enumerate() {
                    write!(f, "{}{local}", if i == 0 { " " } else { ", " })?;
                }
                Ok(())
            }
            Instruction::EndScope => write!(f, "end_scope"),
            Instruction::Nop => write!(f, "nop"),
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proc @{}(", self.name)?;
        for (i, (name, ty)) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {ty}")?;
        }
        writeln!(f, ") {{")?;
        for block in &self.blocks {
            writeln!(f, "{}:", block.id)?;
            for instruction in &block.instructions {
                writeln!(f, "  {instruction}")?;
            }
        }
        write!(f, "}}")
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for global in &self.globals {
            write!(f, "global {} @{}: {}", global.id, global.name, global.ty)?;
            match &global.init {
                Some(init) => writeln!(f, " = {}", Operand::Const(init.clone()))?,
                None => writeln!(f)?,
            }
        }
        for (i, procedure) in self.procedures.iter().enumerate() {
            if i > 0 || !self.globals.is_empty() {
                writeln!(f)?;
            }
            writeln!(f, "{procedure}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_surface_forms() {
        let add = Instruction::Add {
            target: RegId(2),
            lhs: Operand::Register(RegId(0)),
            rhs: Operand::Register(RegId(1)),
        };
        assert_eq!(add.to_string(), "r2 := add r0, r1");

        let branch = Instruction::Branch {
            condition: Operand::Register(RegId(0)),
            then_block: BlockId(1),
            else_block: BlockId(2),
        };
        assert_eq!(branch.to_string(), "branch r0 bb1 bb2");

        let ret = Instruction::Ret {
            value: Operand::Const(ConstValue::Int(3)),
        };
        assert_eq!(ret.to_string(), "ret 3");

        let jump = Instruction::Jump { target: BlockId(4) };
        assert_eq!(jump.to_string(), "jump bb4");

        let call = Instruction::Call {
            target: RegId(1),
            callee: Operand::Symbol("math.double".to_string()),
            args: vec![Operand::Param(ParamId(0))],
        };
        assert_eq!(call.to_string(), "r1 := call @math.double, param0");
    }

    #[test]
    fn branch_classification() {
        assert!(Instruction::Jump { target: BlockId(0) }.is_branch());
        assert!(Instruction::Ret {
            value: Operand::Const(ConstValue::Unit)
        }
        .is_branch());
        assert!(!Instruction::Nop.is_branch());

        assert!(Instruction::EndScope.is_valid_in_unreachable());
        assert!(Instruction::SequencePoint {
            span: Span::new(0, 1)
        }
        .is_valid_in_unreachable());
        assert!(!Instruction::Store {
            target: Operand::Local(LocalId(0)),
            source: Operand::Const(ConstValue::Int(1)),
        }
        .is_valid_in_unreachable());
    }
}
