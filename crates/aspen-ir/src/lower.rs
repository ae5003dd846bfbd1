//! Lowering from the bound tree to IR procedures.
//!
//! A depth-first walk emits instructions into the current basic block.
//! Label statements start new blocks (the previous block jumps in);
//! `return` and `goto` terminate and detach the current block, after which
//! instructions are dropped -- with one `UnreachableCode` warning per dead
//! region -- until a label reattaches. Blocks are wrapped in
//! `StartScope`/`EndScope`, statements are anchored with sequence points,
//! and assignments evaluate their right-hand side first, then the lvalue
//! as a load/store template pair so compound assignment never re-evaluates
//! the receiver.
//!
//! Operator applications map to instructions through the resolved operator
//! symbol, with the arithmetic rewrites: `a mod b` becomes
//! `(a rem b + b) rem b`, `>=`/`<=` become negated `less`, `!=` becomes
//! negated `equal`, unary minus becomes `* -1`, and `not x` becomes
//! `x == false`. Procedures compile on first reference through a
//! per-module cache keyed by symbol, at most once each.

use aspen_common::diagnostics::{DiagnosticKind, Diagnostics};
use aspen_common::span::Span;
use aspen_typeck::bound::{
    BoundCallee, BoundExpr, BoundFunction, BoundLValue, BoundStmt, BoundStringPart,
};
use aspen_typeck::symbol::{Intrinsic, SymbolId, SymbolKind};
use aspen_typeck::ty::{PrimTy, Ty};
use aspen_typeck::untyped::{ConstValue, LogicalOp};
use aspen_typeck::TypeckResult;
use rustc_hash::FxHashMap;

use crate::{
    BasicBlock, BlockId, Global, GlobalId, Instruction, LocalId, Module, Operand, ParamId,
    Procedure, RegId,
};

/// The lowered module plus flow diagnostics (`UnreachableCode`,
/// `NotAllPathsReturn`).
#[derive(Debug)]
pub struct LowerResult {
    pub module: Module,
    pub diagnostics: Diagnostics,
}

/// Lower every procedure and global of a checked program.
pub fn lower(typeck: &TypeckResult) -> LowerResult {
    let mut lowerer = Lowerer {
        typeck,
        module: Module::default(),
        diagnostics: Diagnostics::new(),
        proc_cache: FxHashMap::default(),
        globals: FxHashMap::default(),
    };

    for (i, global) in typeck.bound.globals.iter().enumerate() {
        let id = GlobalId(i as u32);
        lowerer.globals.insert(global.symbol, id);
        let init = match &global.init {
            Some(BoundExpr::Literal { value, .. }) => Some(value.clone()),
            _ => None,
        };
        lowerer.module.globals.push(Global {
            id,
            name: typeck.symbols.qualified_name(global.symbol),
            ty: typeck.symbols.value_ty(global.symbol),
            init,
        });
    }

    for function in &typeck.bound.functions {
        lowerer.ensure_procedure(function.symbol);
    }

    LowerResult {
        module: lowerer.module,
        diagnostics: lowerer.diagnostics,
    }
}

struct Lowerer<'a> {
    typeck: &'a TypeckResult,
    module: Module,
    diagnostics: Diagnostics,
    /// Symbol -> index in `module.procedures`; reserves the slot before
    /// compiling the body so recursive references terminate.
    proc_cache: FxHashMap<SymbolId, usize>,
    globals: FxHashMap<SymbolId, GlobalId>,
}

impl Lowerer<'_> {
    /// Compile a procedure on first reference; later references reuse the
    /// cache.
    fn ensure_procedure(&mut self, symbol: SymbolId) {
        if self.proc_cache.contains_key(&symbol) {
            return;
        }
        let Some(function) = self
            .typeck
            .bound
            .functions
            .iter()
            .find(|f| f.symbol == symbol)
        else {
            return;
        };
        let index = self.module.procedures.len();
        self.module.procedures.push(Procedure {
            name: self.typeck.symbols.qualified_name(symbol),
            params: Vec::new(),
            locals: Vec::new(),
            registers: Vec::new(),
            blocks: Vec::new(),
            entry: BlockId(0),
        });
        self.proc_cache.insert(symbol, index);
        let procedure = self.compile_function(function);
        self.module.procedures[index] = procedure;
    }

    fn compile_function(&mut self, function: &BoundFunction) -> Procedure {
        let name = self.typeck.symbols.qualified_name(function.symbol);
        let (param_symbols, return_ty) = match self.typeck.symbols.function(function.symbol) {
            Some(f) => (f.params.clone(), f.return_ty.clone()),
            None => (Vec::new(), Ty::unit()),
        };

        let mut fx = FnCtx {
            lx: self,
            params: Vec::new(),
            locals: Vec::new(),
            registers: Vec::new(),
            blocks: Vec::new(),
            current: None,
            local_ids: FxHashMap::default(),
            param_ids: FxHashMap::default(),
            label_blocks: FxHashMap::default(),
            warned_unreachable: false,
        };

        for (i, &param) in param_symbols.iter().enumerate() {
            let data = fx.lx.typeck.symbols.get(param);
            fx.params.push((
                data.name.clone().unwrap_or_default(),
                fx.lx.typeck.symbols.param_ty(param),
            ));
            fx.param_ids.insert(param, ParamId(i as u32));
        }

        let entry = fx.new_block();
        fx.current = Some(entry);
        fx.precreate_label_blocks(&function.body);

        let value = fx.lower_expr(&function.body);

        if fx.current.is_some() {
            let has_value = !matches!(&function.body, BoundExpr::Block { value: None, .. });
            if has_value {
                fx.terminate(Instruction::Ret { value });
            } else if matches!(return_ty, Ty::Prim(PrimTy::Unit) | Ty::Error) {
                fx.terminate(Instruction::Ret {
                    value: Operand::Const(ConstValue::Unit),
                });
            } else {
                fx.lx.diagnostics.report(
                    DiagnosticKind::NotAllPathsReturn {
                        function: name.clone(),
                    },
                    function.span,
                );
                fx.terminate(Instruction::Ret {
                    value: Operand::Const(ConstValue::Unit),
                });
            }
        }

        let FnCtx {
            params,
            locals,
            registers,
            blocks,
            ..
        } = fx;
        Procedure {
            name,
            params,
            locals,
            registers,
            blocks,
            entry,
        }
    }
}

struct FnCtx<'a, 'b> {
    lx: &'a mut Lowerer<'b>,
    params: Vec<(String, Ty)>,
    locals: Vec<(String, Ty)>,
    registers: Vec<Ty>,
    blocks: Vec<BasicBlock>,
    /// The block instructions flow into; `None` while detached.
    current: Option<BlockId>,
    local_ids: FxHashMap<SymbolId, LocalId>,
    param_ids: FxHashMap<SymbolId, ParamId>,
    label_blocks: FxHashMap<SymbolId, BlockId>,
    warned_unreachable: bool,
}

impl FnCtx<'_, '_> {
    // ── Block and register plumbing ────────────────────────────────────

    fn new_reg(&mut self, ty: Ty) -> RegId {
        let id = RegId(self.registers.len() as u32);
        self.registers.push(ty);
        id
    }

    fn new_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlock {
            id,
            instructions: Vec::new(),
        });
        id
    }

    fn new_local(&mut self, name: &str, ty: Ty) -> LocalId {
        let id = LocalId(self.locals.len() as u32);
        self.locals.push((name.to_string(), ty));
        id
    }

    /// Append to the current block; detached instructions are dropped.
    fn emit(&mut self, instruction: Instruction) {
        if let Some(block) = self.current {
            self.blocks[block.0 as usize].instructions.push(instruction);
        }
    }

    /// Emit a branch and detach.
    fn terminate(&mut self, instruction: Instruction) {
        debug_assert!(instruction.is_branch());
        self.emit(instruction);
        self.current = None;
    }

    /// Continue in `block` without a fallthrough edge (the predecessor
    /// already branched there).
    fn enter(&mut self, block: BlockId) {
        self.current = Some(block);
        self.warned_unreachable = false;
    }

    /// Continue in `block`, jumping there first when the current block is
    /// still open (label fallthrough).
    fn start_block(&mut self, block: BlockId) {
        if self.current.is_some() {
            self.emit(Instruction::Jump { target: block });
        }
        self.enter(block);
    }

    /// Pre-create a block per label so `goto` can target labels lexically
    /// ahead of it.
    fn precreate_label_blocks(&mut self, e: &BoundExpr) {
        walk_statements(e, &mut |stmt| {
            if let BoundStmt::Label { symbol, .. } = stmt {
                let block = self.new_block();
                self.label_blocks.insert(*symbol, block);
            }
        });
    }

    /// The storage operand of a value symbol, if it has storage here.
    fn place_of(&self, symbol: SymbolId) -> Option<Operand> {
        if let Some(&local) = self.local_ids.get(&symbol) {
            return Some(Operand::Local(local));
        }
        if let Some(&param) = self.param_ids.get(&symbol) {
            return Some(Operand::Param(param));
        }
        if let Some(&global) = self.lx.globals.get(&symbol) {
            return Some(Operand::Global(global));
        }
        None
    }

    /// The callable operand of a function symbol; user procedures compile
    /// on first reference.
    fn function_operand(&mut self, symbol: SymbolId) -> Operand {
        self.lx.ensure_procedure(symbol);
        Operand::Symbol(self.lx.typeck.symbols.qualified_name(symbol))
    }

    // ── Expressions ────────────────────────────────────────────────────

    fn lower_expr(&mut self, e: &BoundExpr) -> Operand {
        match e {
            BoundExpr::Error | BoundExpr::Unit => Operand::Const(ConstValue::Unit),

            BoundExpr::Literal { value, .. } => Operand::Const(value.clone()),

            BoundExpr::String { parts, .. } => self.lower_string(parts),

            BoundExpr::VarRef { symbol, ty, .. } => match self.place_of(*symbol) {
                Some(place) => {
                    let target = self.new_reg(ty.clone());
                    self.emit(Instruction::Load {
                        target,
                        source: place,
                    });
                    Operand::Register(target)
                }
                None => Operand::Symbol(self.lx.typeck.symbols.qualified_name(*symbol)),
            },

            BoundExpr::FunctionRef { symbol, .. } => self.function_operand(*symbol),

            BoundExpr::Call {
                callee, args, ty, ..
            } => self.lower_call(callee, args, ty),

            BoundExpr::OperatorCall {
                function,
                operands,
                ty,
                ..
            } => {
                let ops: Vec<Operand> = operands.iter().map(|o| self.lower_expr(o)).collect();
                match function {
                    Some(f) => self.apply_operator(*f, ops, ty.clone()),
                    None => {
                        self.emit(Instruction::Nop);
                        Operand::Const(ConstValue::Unit)
                    }
                }
            }

            BoundExpr::Not { operand, .. } => {
                let value = self.lower_expr(operand);
                let target = self.new_reg(Ty::bool());
                self.emit(Instruction::Equal {
                    target,
                    lhs: value,
                    rhs: Operand::Const(ConstValue::Bool(false)),
                });
                Operand::Register(target)
            }

            BoundExpr::Logical { op, lhs, rhs, .. } => self.lower_logical(*op, lhs, rhs),

            BoundExpr::Relational {
                first, comparisons, ..
            } => self.lower_relational(first, comparisons),

            BoundExpr::Index {
                receiver,
                index,
                ty,
                ..
            } => {
                let array = self.lower_expr(receiver);
                let index = self.lower_expr(index);
                let target = self.new_reg(ty.clone());
                self.emit(Instruction::LoadElement {
                    target,
                    array,
                    index,
                });
                Operand::Register(target)
            }

            BoundExpr::Member {
                receiver,
                member,
                ty,
                ..
            } => {
                let receiver_op = self.lower_expr(receiver);
                let Some(member) = member else {
                    return Operand::Const(ConstValue::Unit);
                };
                let data = self.lx.typeck.symbols.get(*member);
                match &data.kind {
                    SymbolKind::Property {
                        intrinsic: Some(Intrinsic::ArrayLength),
                        ..
                    } => {
                        let target = self.new_reg(ty.clone());
                        self.emit(Instruction::ArrayLength {
                            target,
                            array: receiver_op,
                        });
                        Operand::Register(target)
                    }
                    SymbolKind::Field { .. } | SymbolKind::Property { .. } => {
                        let target = self.new_reg(ty.clone());
                        self.emit(Instruction::LoadField {
                            target,
                            receiver: receiver_op,
                            field: data.name.clone().unwrap_or_default(),
                        });
                        Operand::Register(target)
                    }
                    _ => Operand::Symbol(self.lx.typeck.symbols.qualified_name(*member)),
                }
            }

            BoundExpr::Assign {
                target, op, value, ..
            } => {
                self.lower_assign(target, op, value);
                Operand::Const(ConstValue::Unit)
            }

            BoundExpr::If {
                condition,
                then_branch,
                else_branch,
                ty,
                ..
            } => self.lower_if(condition, then_branch, else_branch.as_deref(), ty),

            BoundExpr::While {
                condition, body, ..
            } => {
                let cond_block = self.new_block();
                self.start_block(cond_block);
                let cond = self.lower_expr(condition);
                let body_block = self.new_block();
                let end_block = self.new_block();
                self.terminate(Instruction::Branch {
                    condition: cond,
                    then_block: body_block,
                    else_block: end_block,
                });
                self.enter(body_block);
                self.lower_expr(body);
                self.terminate(Instruction::Jump { target: cond_block });
                self.enter(end_block);
                Operand::Const(ConstValue::Unit)
            }

            BoundExpr::Block {
                statements, value, ..
            } => self.lower_block(statements, value.as_deref()),

            BoundExpr::Return { value, .. } => {
                let value = match value {
                    Some(v) => self.lower_expr(v),
                    None => Operand::Const(ConstValue::Unit),
                };
                self.terminate(Instruction::Ret { value });
                Operand::Const(ConstValue::Unit)
            }

            BoundExpr::Goto { label, .. } => {
                match label.and_then(|l| self.label_blocks.get(&l).copied()) {
                    Some(block) => self.terminate(Instruction::Jump { target: block }),
                    None => self.emit(Instruction::Nop),
                }
                Operand::Const(ConstValue::Unit)
            }
        }
    }

    fn lower_call(&mut self, callee: &BoundCallee, args: &[BoundExpr], ty: &Ty) -> Operand {
        match callee {
            BoundCallee::Function(symbol) => {
                let is_variadic = self
                    .lx
                    .typeck
                    .symbols
                    .function(*symbol)
                    .is_some_and(|f| f.is_variadic);
                let arg_ops = if is_variadic {
                    self.pack_variadic_args(*symbol, args)
                } else {
                    args.iter().map(|a| self.lower_expr(a)).collect()
                };
                let callee_op = self.function_operand(*symbol);
                let target = self.new_reg(ty.clone());
                self.emit(Instruction::Call {
                    target,
                    callee: callee_op,
                    args: arg_ops,
                });
                Operand::Register(target)
            }
            BoundCallee::Value(callee_expr) => {
                // A call through a member access becomes a member call so
                // back-ends can dispatch on the receiver.
                if let BoundExpr::Member {
                    receiver, member, ..
                } = callee_expr.as_ref()
                {
                    if let Some(member) = member {
                        let receiver_op = self.lower_expr(receiver);
                        let arg_ops: Vec<Operand> =
                            args.iter().map(|a| self.lower_expr(a)).collect();
                        let member_name = self
                            .lx
                            .typeck
                            .symbols
                            .get(*member)
                            .name
                            .clone()
                            .unwrap_or_default();
                        let target = self.new_reg(ty.clone());
                        self.emit(Instruction::MemberCall {
                            target,
                            receiver: receiver_op,
                            member: member_name,
                            args: arg_ops,
                        });
                        return Operand::Register(target);
                    }
                }
                let callee_op = self.lower_expr(callee_expr);
                let arg_ops: Vec<Operand> = args.iter().map(|a| self.lower_expr(a)).collect();
                let target = self.new_reg(ty.clone());
                self.emit(Instruction::Call {
                    target,
                    callee: callee_op,
                    args: arg_ops,
                });
                Operand::Register(target)
            }
            BoundCallee::Error => Operand::Const(ConstValue::Unit),
        }
    }

    /// Lower a variadic call site: fixed arguments pass through, the tail
    /// packs into a fresh array.
    fn pack_variadic_args(&mut self, symbol: SymbolId, args: &[BoundExpr]) -> Vec<Operand> {
        let (fixed, elem_ty) = match self.lx.typeck.symbols.function(symbol) {
            Some(f) => {
                let fixed = f.params.len().saturating_sub(1);
                let elem = f
                    .params
                    .last()
                    .map(|&p| match self.lx.typeck.symbols.param_ty(p) {
                        Ty::Array { elem, rank: 1 } => *elem,
                        _ => Ty::Error,
                    })
                    .unwrap_or(Ty::Error);
                (fixed, elem)
            }
            None => (args.len(), Ty::Error),
        };

        let mut ops: Vec<Operand> = Vec::new();
        for arg in &args[..fixed.min(args.len())] {
            let op = self.lower_expr(arg);
            ops.push(op);
        }
        let rest = &args[fixed.min(args.len())..];
        let array = self.new_reg(Ty::array(elem_ty.clone()));
        self.emit(Instruction::NewArray {
            target: array,
            elem: elem_ty,
            length: Operand::Const(ConstValue::Int(rest.len() as i64)),
        });
        for (i, arg) in rest.iter().enumerate() {
            let op = self.lower_expr(arg);
            self.emit(Instruction::StoreElement {
                array: Operand::Register(array),
                index: Operand::Const(ConstValue::Int(i as i64)),
                source: op,
            });
        }
        ops.push(Operand::Register(array));
        ops
    }

    /// Map a resolved operator symbol onto instructions, applying the
    /// arithmetic rewrites.
    fn apply_operator(&mut self, function: SymbolId, ops: Vec<Operand>, ty: Ty) -> Operand {
        let intrinsic = self
            .lx
            .typeck
            .symbols
            .function(function)
            .and_then(|f| f.intrinsic);

        let bin = |fx: &mut Self, make: fn(RegId, Operand, Operand) -> Instruction,
                   ops: &[Operand],
                   ty: Ty| {
            let target = fx.new_reg(ty);
            fx.emit(make(target, ops[0].clone(), ops[1].clone()));
            Operand::Register(target)
        };

        match intrinsic {
            Some(Intrinsic::Add) => bin(
                self,
                |target, lhs, rhs| Instruction::Add { target, lhs, rhs },
                &ops,
                ty,
            ),
            Some(Intrinsic::Sub) => bin(
                self,
                |target, lhs, rhs| Instruction::Sub { target, lhs, rhs },
                &ops,
                ty,
            ),
            Some(Intrinsic::Mul) => bin(
                self,
                |target, lhs, rhs| Instruction::Mul { target, lhs, rhs },
                &ops,
                ty,
            ),
            Some(Intrinsic::Div) => bin(
                self,
                |target, lhs, rhs| Instruction::Div { target, lhs, rhs },
                &ops,
                ty,
            ),
            Some(Intrinsic::Rem) => bin(
                self,
                |target, lhs, rhs| Instruction::Rem { target, lhs, rhs },
                &ops,
                ty,
            ),

            // Mathematical modulus: (a rem b + b) rem b.
            Some(Intrinsic::Mod) => {
                let r1 = self.new_reg(ty.clone());
                self.emit(Instruction::Rem {
                    target: r1,
                    lhs: ops[0].clone(),
                    rhs: ops[1].clone(),
                });
                let r2 = self.new_reg(ty.clone());
                self.emit(Instruction::Add {
                    target: r2,
                    lhs: Operand::Register(r1),
                    rhs: ops[1].clone(),
                });
                let r3 = self.new_reg(ty);
                self.emit(Instruction::Rem {
                    target: r3,
                    lhs: Operand::Register(r2),
                    rhs: ops[1].clone(),
                });
                Operand::Register(r3)
            }

            Some(Intrinsic::Less) => bin(
                self,
                |target, lhs, rhs| Instruction::Less { target, lhs, rhs },
                &ops,
                ty,
            ),
            // a > b  ==>  b < a
            Some(Intrinsic::Greater) => {
                let target = self.new_reg(ty);
                self.emit(Instruction::Less {
                    target,
                    lhs: ops[1].clone(),
                    rhs: ops[0].clone(),
                });
                Operand::Register(target)
            }
            // a <= b  ==>  not (b < a)
            Some(Intrinsic::LessEq) => {
                let less = self.new_reg(Ty::bool());
                self.emit(Instruction::Less {
                    target: less,
                    lhs: ops[1].clone(),
                    rhs: ops[0].clone(),
                });
                self.negate(less)
            }
            // a >= b  ==>  not (a < b)
            Some(Intrinsic::GreaterEq) => {
                let less = self.new_reg(Ty::bool());
                self.emit(Instruction::Less {
                    target: less,
                    lhs: ops[0].clone(),
                    rhs: ops[1].clone(),
                });
                self.negate(less)
            }

            Some(Intrinsic::Equal) => bin(
                self,
                |target, lhs, rhs| Instruction::Equal { target, lhs, rhs },
                &ops,
                ty,
            ),
            // a != b  ==>  not (a == b)
            Some(Intrinsic::NotEqual) => {
                let equal = self.new_reg(Ty::bool());
                self.emit(Instruction::Equal {
                    target: equal,
                    lhs: ops[0].clone(),
                    rhs: ops[1].clone(),
                });
                self.negate(equal)
            }

            // -x  ==>  x * -1
            Some(Intrinsic::Neg) => {
                let minus_one = if ty == Ty::float64() {
                    ConstValue::Float(-1.0)
                } else {
                    ConstValue::Int(-1)
                };
                let target = self.new_reg(ty);
                self.emit(Instruction::Mul {
                    target,
                    lhs: ops[0].clone(),
                    rhs: Operand::Const(minus_one),
                });
                Operand::Register(target)
            }
            Some(Intrinsic::Identity) => ops.into_iter().next().unwrap_or(Operand::Const(
                ConstValue::Unit,
            )),

            // Concat, ToString, and plain (non-operator) functions lower
            // to calls.
            _ => {
                let callee = self.function_operand(function);
                let target = self.new_reg(ty);
                self.emit(Instruction::Call {
                    target,
                    callee,
                    args: ops,
                });
                Operand::Register(target)
            }
        }
    }

    /// `value == false`, the lowering of boolean negation.
    fn negate(&mut self, value: RegId) -> Operand {
        let target = self.new_reg(Ty::bool());
        self.emit(Instruction::Equal {
            target,
            lhs: Operand::Register(value),
            rhs: Operand::Const(ConstValue::Bool(false)),
        });
        Operand::Register(target)
    }

    /// Short-circuit `and`/`or` using a temporary slot and a diamond.
    fn lower_logical(&mut self, op: LogicalOp, lhs: &BoundExpr, rhs: &BoundExpr) -> Operand {
        let slot = self.new_local("$logic", Ty::bool());
        let lhs_op = self.lower_expr(lhs);

        let rhs_block = self.new_block();
        let short_block = self.new_block();
        let end_block = self.new_block();
        match op {
            // and: false short-circuits.
            LogicalOp::And => self.terminate(Instruction::Branch {
                condition: lhs_op,
                then_block: rhs_block,
                else_block: short_block,
            }),
            // or: true short-circuits.
            LogicalOp::Or => self.terminate(Instruction::Branch {
                condition: lhs_op,
                then_block: short_block,
                else_block: rhs_block,
            }),
        }

        self.enter(rhs_block);
        let rhs_op = self.lower_expr(rhs);
        self.emit(Instruction::Store {
            target: Operand::Local(slot),
            source: rhs_op,
        });
        self.terminate(Instruction::Jump { target: end_block });

        self.enter(short_block);
        let short_value = ConstValue::Bool(matches!(op, LogicalOp::Or));
        self.emit(Instruction::Store {
            target: Operand::Local(slot),
            source: Operand::Const(short_value),
        });
        self.terminate(Instruction::Jump { target: end_block });

        self.enter(end_block);
        let result = self.new_reg(Ty::bool());
        self.emit(Instruction::Load {
            target: result,
            source: Operand::Local(slot),
        });
        Operand::Register(result)
    }

    /// A relational chain: each link evaluates its right operand only if
    /// the previous links held.
    fn lower_relational(
        &mut self,
        first: &BoundExpr,
        comparisons: &[aspen_typeck::bound::BoundComparison],
    ) -> Operand {
        if comparisons.is_empty() {
            return self.lower_expr(first);
        }
        let slot = self.new_local("$rel", Ty::bool());
        let false_block = self.new_block();
        let end_block = self.new_block();

        let mut prev = self.lower_expr(first);
        for (i, comparison) in comparisons.iter().enumerate() {
            let right = self.lower_expr(&comparison.right);
            let ty = Ty::bool();
            let link = match comparison.function {
                Some(f) => self.apply_operator(f, vec![prev.clone(), right.clone()], ty),
                None => Operand::Const(ConstValue::Bool(false)),
            };
            if i + 1 == comparisons.len() {
                self.emit(Instruction::Store {
                    target: Operand::Local(slot),
                    source: link,
                });
                self.terminate(Instruction::Jump { target: end_block });
            } else {
                let next_block = self.new_block();
                self.terminate(Instruction::Branch {
                    condition: link,
                    then_block: next_block,
                    else_block: false_block,
                });
                self.enter(next_block);
            }
            prev = right;
        }

        self.enter(false_block);
        self.emit(Instruction::Store {
            target: Operand::Local(slot),
            source: Operand::Const(ConstValue::Bool(false)),
        });
        self.terminate(Instruction::Jump { target: end_block });

        self.enter(end_block);
        let result = self.new_reg(Ty::bool());
        self.emit(Instruction::Load {
            target: result,
            source: Operand::Local(slot),
        });
        Operand::Register(result)
    }

    /// Interpolated strings fold into `to_string`/`concat` calls.
    fn lower_string(&mut self, parts: &[BoundStringPart]) -> Operand {
        let mut acc: Option<Operand> = None;
        for part in parts {
            let piece = match part {
                BoundStringPart::Content(text) => Operand::Const(ConstValue::String(text.clone())),
                BoundStringPart::Interpolation(e) => {
                    let value = self.lower_expr(e);
                    if e.ty() == Ty::string() {
                        value
                    } else {
                        let callee = self.function_operand(self.lx.typeck.intrinsics.to_string);
                        let target = self.new_reg(Ty::string());
                        self.emit(Instruction::Call {
                            target,
                            callee,
                            args: vec![value],
                        });
                        Operand::Register(target)
                    }
                }
            };
            acc = Some(match acc {
                None => piece,
                Some(prev) => {
                    let callee = self.function_operand(self.lx.typeck.intrinsics.concat);
                    let target = self.new_reg(Ty::string());
                    self.emit(Instruction::Call {
                        target,
                        callee,
                        args: vec![prev, piece],
                    });
                    Operand::Register(target)
                }
            });
        }
        acc.unwrap_or(Operand::Const(ConstValue::String(String::new())))
    }

    /// Assignment: right-hand side first, then the lvalue as a
    /// load/store template pair. Compound assignment loads through the
    /// template once, operates, and stores through the same template, so
    /// receiver side effects are not repeated.
    fn lower_assign(&mut self, target: &BoundLValue, op: &Option<SymbolId>, value: &BoundExpr) {
        let value_op = self.lower_expr(value);
        match target {
            BoundLValue::Var { symbol, ty, .. } => {
                let Some(place) = self.place_of(*symbol) else {
                    return;
                };
                let source = match op {
                    None => value_op,
                    Some(operator) => {
                        let current = self.new_reg(ty.clone());
                        self.emit(Instruction::Load {
                            target: current,
                            source: place.clone(),
                        });
                        self.apply_operator(
                            *operator,
                            vec![Operand::Register(current), value_op],
                            ty.clone(),
                        )
                    }
                };
                self.emit(Instruction::Store {
                    target: place,
                    source,
                });
            }
            BoundLValue::Index {
                receiver,
                index,
                ty,
                ..
            } => {
                let array = self.lower_expr(receiver);
                let index = self.lower_expr(index);
                let source = match op {
                    None => value_op,
                    Some(operator) => {
                        let current = self.new_reg(ty.clone());
                        self.emit(Instruction::LoadElement {
                            target: current,
                            array: array.clone(),
                            index: index.clone(),
                        });
                        self.apply_operator(
                            *operator,
                            vec![Operand::Register(current), value_op],
                            ty.clone(),
                        )
                    }
                };
                self.emit(Instruction::StoreElement {
                    array,
                    index,
                    source,
                });
            }
            BoundLValue::Member {
                receiver,
                member,
                ty,
                ..
            } => {
                let receiver_op = self.lower_expr(receiver);
                let field = member
                    .and_then(|m| self.lx.typeck.symbols.get(m).name.clone())
                    .unwrap_or_default();
                let source = match op {
                    None => value_op,
                    Some(operator) => {
                        let current = self.new_reg(ty.clone());
                        self.emit(Instruction::LoadField {
                            target: current,
                            receiver: receiver_op.clone(),
                            field: field.clone(),
                        });
                        self.apply_operator(
                            *operator,
                            vec![Operand::Register(current), value_op],
                            ty.clone(),
                        )
                    }
                };
                self.emit(Instruction::StoreField {
                    receiver: receiver_op,
                    field,
                    source,
                });
            }
            BoundLValue::Error => {}
        }
    }

    fn lower_if(
        &mut self,
        condition: &BoundExpr,
        then_branch: &BoundExpr,
        else_branch: Option<&BoundExpr>,
        ty: &Ty,
    ) -> Operand {
        let cond = self.lower_expr(condition);

        let Some(else_branch) = else_branch else {
            let then_block = self.new_block();
            let end_block = self.new_block();
            self.terminate(Instruction::Branch {
                condition: cond,
                then_block,
                else_block: end_block,
            });
            self.enter(then_block);
            self.lower_expr(then_branch);
            if self.current.is_some() {
                self.terminate(Instruction::Jump { target: end_block });
            }
            self.enter(end_block);
            return Operand::Const(ConstValue::Unit);
        };

        let produces_value = !matches!(ty, Ty::Prim(PrimTy::Unit) | Ty::Never | Ty::Error);
        let slot = produces_value.then(|| self.new_local("$if", ty.clone()));

        let then_block = self.new_block();
        let else_block = self.new_block();
        let end_block = self.new_block();
        self.terminate(Instruction::Branch {
            condition: cond,
            then_block,
            else_block,
        });

        self.enter(then_block);
        let then_value = self.lower_expr(then_branch);
        if let (Some(slot), true) = (slot, self.current.is_some()) {
            self.emit(Instruction::Store {
                target: Operand::Local(slot),
                source: then_value,
            });
        }
        if self.current.is_some() {
            self.terminate(Instruction::Jump { target: end_block });
        }

        self.enter(else_block);
        let else_value = self.lower_expr(else_branch);
        if let (Some(slot), true) = (slot, self.current.is_some()) {
            self.emit(Instruction::Store {
                target: Operand::Local(slot),
                source: else_value,
            });
        }
        if self.current.is_some() {
            self.terminate(Instruction::Jump { target: end_block });
        }

        self.enter(end_block);
        match slot {
            Some(slot) => {
                let result = self.new_reg(ty.clone());
                self.emit(Instruction::Load {
                    target: result,
                    source: Operand::Local(slot),
                });
                Operand::Register(result)
            }
            None => Operand::Const(ConstValue::Unit),
        }
    }

    fn lower_block(
        &mut self,
        statements: &[BoundStmt],
        value: Option<&BoundExpr>,
    ) -> Operand {
        // Allocate this block's locals up front so the scope marker can
        // name them.
        let mut scope_locals = Vec::new();
        for stmt in statements {
            if let BoundStmt::Local { symbol, .. } = stmt {
                let data = self.lx.typeck.symbols.get(*symbol);
                let name = data.name.clone().unwrap_or_default();
                let ty = self.lx.typeck.symbols.value_ty(*symbol);
                let id = self.new_local(&name, ty);
                self.local_ids.insert(*symbol, id);
                scope_locals.push(id);
            }
        }
        self.emit(Instruction::StartScope {
            locals: scope_locals,
        });

        for stmt in statements {
            // After a detach, anything but a label is dead; one warning
            // per region, and the instructions themselves are dropped
            // (sequence points and scope markers excepted).
            if self.current.is_none()
                && !matches!(stmt, BoundStmt::Label { .. })
                && !self.warned_unreachable
            {
                self.warned_unreachable = true;
                self.lx
                    .diagnostics
                    .report(DiagnosticKind::UnreachableCode, stmt_span(stmt));
            }
            match stmt {
                BoundStmt::Label { symbol, .. } => {
                    if let Some(&block) = self.label_blocks.get(symbol) {
                        self.start_block(block);
                    }
                }
                BoundStmt::Local { symbol, init, span } => {
                    self.emit(Instruction::SequencePoint { span: *span });
                    if let Some(init) = init {
                        let value = self.lower_expr(init);
                        if let Some(&local) = self.local_ids.get(symbol) {
                            self.emit(Instruction::Store {
                                target: Operand::Local(local),
                                source: value,
                            });
                        }
                    }
                }
                BoundStmt::Expr(e) => {
                    if let Some(span) = e.span() {
                        self.emit(Instruction::SequencePoint { span });
                    }
                    self.lower_expr(e);
                }
            }
        }

        let out = match value {
            Some(v) => self.lower_expr(v),
            None => Operand::Const(ConstValue::Unit),
        };
        self.emit(Instruction::EndScope);
        out
    }
}

fn stmt_span(stmt: &BoundStmt) -> Span {
    match stmt {
        BoundStmt::Local { span, .. } | BoundStmt::Label { span, .. } => *span,
        BoundStmt::Expr(e) => e.span().unwrap_or(Span::empty_at(0)),
    }
}

/// Invoke `f` on every statement in the tree, depth-first.
fn walk_statements(e: &BoundExpr, f: &mut impl FnMut(&BoundStmt)) {
    match e {
        BoundExpr::Block {
            statements, value, ..
        } => {
            for stmt in statements {
                f(stmt);
                match stmt {
                    BoundStmt::Local {
                        init: Some(init), ..
                    } => walk_statements(init, f),
                    BoundStmt::Expr(inner) => walk_statements(inner, f),
                    _ => {}
                }
            }
            if let Some(value) = value {
                walk_statements(value, f);
            }
        }
        BoundExpr::String { parts, .. } => {
            for part in parts {
                if let BoundStringPart::Interpolation(inner) = part {
                    walk_statements(inner, f);
                }
            }
        }
        BoundExpr::Call { callee, args, .. } => {
            if let BoundCallee::Value(inner) = callee {
                walk_statements(inner, f);
            }
            for arg in args {
                walk_statements(arg, f);
            }
        }
        BoundExpr::OperatorCall { operands, .. } => {
            for operand in operands {
                walk_statements(operand, f);
            }
        }
        BoundExpr::Not { operand, .. } => walk_statements(operand, f),
        BoundExpr::Logical { lhs, rhs, .. } => {
            walk_statements(lhs, f);
            walk_statements(rhs, f);
        }
        BoundExpr::Relational {
            first, comparisons, ..
        } => {
            walk_statements(first, f);
            for comparison in comparisons {
                walk_statements(&comparison.right, f);
            }
        }
        BoundExpr::Index {
            receiver, index, ..
        } => {
            walk_statements(receiver, f);
            walk_statements(index, f);
        }
        BoundExpr::Member { receiver, .. } => walk_statements(receiver, f),
        BoundExpr::Assign { target, value, .. } => {
            match target {
                BoundLValue::Index {
                    receiver, index, ..
                } => {
                    walk_statements(receiver, f);
                    walk_statements(index, f);
                }
                BoundLValue::Member { receiver, .. } => walk_statements(receiver, f),
                _ => {}
            }
            walk_statements(value, f);
        }
        BoundExpr::If {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            walk_statements(condition, f);
            walk_statements(then_branch, f);
            if let Some(else_branch) = else_branch {
                walk_statements(else_branch, f);
            }
        }
        BoundExpr::While {
            condition, body, ..
        } => {
            walk_statements(condition, f);
            walk_statements(body, f);
        }
        BoundExpr::Return {
            value: Some(value), ..
        } => walk_statements(value, f),
        _ => {}
    }
}
