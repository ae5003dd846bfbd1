//! The bound tree: the untyped tree with every promise resolved to a
//! single symbol and every expression carrying a concrete type.
//!
//! Produced by [`finalize`] after the solver reaches its fixpoint.
//! Wherever resolution failed, types are `Ty::Error` and symbols are
//! `None`; the causes are already in the diagnostic bag and downstream
//! phases (IR lowering) skip the affected pieces without complaint.

use aspen_common::span::Span;

use crate::solve::PromiseStore;
use crate::symbol::{SymbolId, SymbolKind, SymbolTable};
use crate::ty::Ty;
use crate::unify::InferCtx;
use crate::untyped::{
    ConstValue, LogicalOp, UntypedCallee, UntypedExpr, UntypedLValue, UntypedProgram, UntypedStmt,
    UntypedStringPart,
};

#[derive(Debug, Default)]
pub struct BoundProgram {
    pub functions: Vec<BoundFunction>,
    pub globals: Vec<BoundGlobal>,
}

#[derive(Debug)]
pub struct BoundFunction {
    pub symbol: SymbolId,
    pub body: BoundExpr,
    pub span: Span,
}

#[derive(Debug)]
pub struct BoundGlobal {
    pub symbol: SymbolId,
    pub init: Option<BoundExpr>,
    pub span: Span,
}

#[derive(Debug)]
pub enum BoundExpr {
    Error,
    Unit,
    Literal {
        value: ConstValue,
        ty: Ty,
        span: Span,
    },
    String {
        parts: Vec<BoundStringPart>,
        span: Span,
    },
    VarRef {
        symbol: SymbolId,
        ty: Ty,
        span: Span,
    },
    FunctionRef {
        symbol: SymbolId,
        ty: Ty,
        span: Span,
    },
    Call {
        callee: BoundCallee,
        args: Vec<BoundExpr>,
        ty: Ty,
        span: Span,
    },
    /// An operator application resolved to a concrete operator function.
    /// `function` is `None` when overload resolution failed.
    OperatorCall {
        function: Option<SymbolId>,
        operands: Vec<BoundExpr>,
        ty: Ty,
        span: Span,
    },
    Not {
        operand: Box<BoundExpr>,
        span: Span,
    },
    Logical {
        op: LogicalOp,
        lhs: Box<BoundExpr>,
        rhs: Box<BoundExpr>,
        span: Span,
    },
    Relational {
        first: Box<BoundExpr>,
        comparisons: Vec<BoundComparison>,
        span: Span,
    },
    Index {
        receiver: Box<BoundExpr>,
        index: Box<BoundExpr>,
        ty: Ty,
        span: Span,
    },
    Member {
        receiver: Box<BoundExpr>,
        member: Option<SymbolId>,
        ty: Ty,
        span: Span,
    },
    Assign {
        target: BoundLValue,
        op: Option<SymbolId>,
        value: Box<BoundExpr>,
        span: Span,
    },
    If {
        condition: Box<BoundExpr>,
        then_branch: Box<BoundExpr>,
        else_branch: Option<Box<BoundExpr>>,
        ty: Ty,
        span: Span,
    },
    While {
        condition: Box<BoundExpr>,
        body: Box<BoundExpr>,
        span: Span,
    },
    Block {
        statements: Vec<BoundStmt>,
        value: Option<Box<BoundExpr>>,
        ty: Ty,
        span: Span,
    },
    Return {
        value: Option<Box<BoundExpr>>,
        span: Span,
    },
    Goto {
        label: Option<SymbolId>,
        span: Span,
    },
}

#[derive(Debug)]
pub enum BoundStringPart {
    Content(String),
    Interpolation(BoundExpr),
}

#[derive(Debug)]
pub struct BoundComparison {
    pub function: Option<SymbolId>,
    pub right: BoundExpr,
}

#[derive(Debug)]
pub enum BoundCallee {
    Function(SymbolId),
    Value(Box<BoundExpr>),
    Error,
}

#[derive(Debug)]
pub enum BoundLValue {
    Var {
        symbol: SymbolId,
        ty: Ty,
        span: Span,
    },
    Index {
        receiver: Box<BoundExpr>,
        index: Box<BoundExpr>,
        ty: Ty,
        span: Span,
    },
    Member {
        receiver: Box<BoundExpr>,
        member: Option<SymbolId>,
        ty: Ty,
        span: Span,
    },
    Error,
}

impl BoundLValue {
    pub fn ty(&self) -> Ty {
        match self {
            BoundLValue::Var { ty, .. }
            | BoundLValue::Index { ty, .. }
            | BoundLValue::Member { ty, .. } => ty.clone(),
            BoundLValue::Error => Ty::Error,
        }
    }
}

#[derive(Debug)]
pub enum BoundStmt {
    Local {
        symbol: SymbolId,
        init: Option<BoundExpr>,
        span: Span,
    },
    Label {
        symbol: SymbolId,
        span: Span,
    },
    Expr(BoundExpr),
}

impl BoundExpr {
    /// The concrete type of this expression.
    pub fn ty(&self) -> Ty {
        match self {
            BoundExpr::Error => Ty::Error,
            BoundExpr::Unit => Ty::unit(),
            BoundExpr::Literal { ty, .. } => ty.clone(),
            BoundExpr::String { .. } => Ty::string(),
            BoundExpr::VarRef { ty, .. } => ty.clone(),
            BoundExpr::FunctionRef { ty, .. } => ty.clone(),
            BoundExpr::Call { ty, .. } => ty.clone(),
            BoundExpr::OperatorCall { ty, .. } => ty.clone(),
            BoundExpr::Not { .. } => Ty::bool(),
            BoundExpr::Logical { .. } => Ty::bool(),
            BoundExpr::Relational { .. } => Ty::bool(),
            BoundExpr::Index { ty, .. } => ty.clone(),
            BoundExpr::Member { ty, .. } => ty.clone(),
            BoundExpr::Assign { .. } => Ty::unit(),
            BoundExpr::If { ty, .. } => ty.clone(),
            BoundExpr::While { .. } => Ty::unit(),
            BoundExpr::Block { ty, .. } => ty.clone(),
            BoundExpr::Return { .. } => Ty::Never,
            BoundExpr::Goto { .. } => Ty::Never,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            BoundExpr::Error | BoundExpr::Unit => None,
            BoundExpr::Literal { span, .. }
            | BoundExpr::String { span, .. }
            | BoundExpr::VarRef { span, .. }
            | BoundExpr::FunctionRef { span, .. }
            | BoundExpr::Call { span, .. }
            | BoundExpr::OperatorCall { span, .. }
            | BoundExpr::Not { span, .. }
            | BoundExpr::Logical { span, .. }
            | BoundExpr::Relational { span, .. }
            | BoundExpr::Index { span, .. }
            | BoundExpr::Member { span, .. }
            | BoundExpr::Assign { span, .. }
            | BoundExpr::If { span, .. }
            | BoundExpr::While { span, .. }
            | BoundExpr::Block { span, .. }
            | BoundExpr::Return { span, .. }
            | BoundExpr::Goto { span, .. } => Some(*span),
        }
    }
}

// ── Finalization ───────────────────────────────────────────────────────

/// Resolve a type fully; inference variables that never got bound become
/// `Error` (their causes were reported by the failing constraints).
fn finalize_ty(ctx: &mut InferCtx, ty: &Ty) -> Ty {
    fn strip_vars(ty: Ty) -> Ty {
        match ty {
            Ty::Var(_) => Ty::Error,
            Ty::Array { elem, rank } => Ty::Array {
                elem: Box::new(strip_vars(*elem)),
                rank,
            },
            Ty::Fun { params, ret } => Ty::Fun {
                params: params.into_iter().map(strip_vars).collect(),
                ret: Box::new(strip_vars(*ret)),
            },
            other => other,
        }
    }
    strip_vars(ctx.resolve(ty))
}

/// Turn the untyped program into the bound program, resolving every type
/// slot and promise. Also writes the final types back into the symbol
/// table so later phases see concrete local/global/parameter types.
pub fn finalize(
    program: &UntypedProgram,
    ctx: &mut InferCtx,
    promises: &PromiseStore,
    symbols: &mut SymbolTable,
) -> BoundProgram {
    finalize_symbols(ctx, symbols);

    let mut f = Finalizer { ctx, promises };
    BoundProgram {
        functions: program
            .functions
            .iter()
            .map(|func| BoundFunction {
                symbol: func.symbol,
                body: f.expr(&func.body),
                span: func.span,
            })
            .collect(),
        globals: program
            .globals
            .iter()
            .map(|global| BoundGlobal {
                symbol: global.symbol,
                init: global.init.as_ref().map(|e| f.expr(e)),
                span: global.span,
            })
            .collect(),
    }
}

/// Resolve the types stored on value symbols in place.
fn finalize_symbols(ctx: &mut InferCtx, symbols: &mut SymbolTable) {
    for i in 0..symbols.len() {
        let id = SymbolId(i as u32);
        let resolved = match &symbols.get(id).kind {
            SymbolKind::Local { ty, .. }
            | SymbolKind::Global { ty, .. }
            | SymbolKind::Parameter { ty, .. } => Some(finalize_ty(ctx, &ty.clone())),
            _ => None,
        };
        if let Some(new_ty) = resolved {
            match &mut symbols.get_mut(id).kind {
                SymbolKind::Local { ty, .. }
                | SymbolKind::Global { ty, .. }
                | SymbolKind::Parameter { ty, .. } => *ty = new_ty,
                _ => {}
            }
        }
    }
}

struct Finalizer<'a> {
    ctx: &'a mut InferCtx,
    promises: &'a PromiseStore,
}

impl Finalizer<'_> {
    fn ty(&mut self, ty: &Ty) -> Ty {
        finalize_ty(self.ctx, ty)
    }

    fn expr(&mut self, e: &UntypedExpr) -> BoundExpr {
        match e {
            UntypedExpr::Error => BoundExpr::Error,
            UntypedExpr::Unit => BoundExpr::Unit,
            UntypedExpr::Literal { value, ty, span } => BoundExpr::Literal {
                value: value.clone(),
                ty: self.ty(ty),
                span: *span,
            },
            UntypedExpr::String { parts, span } => BoundExpr::String {
                parts: parts
                    .iter()
                    .map(|p| match p {
                        UntypedStringPart::Content(s) => BoundStringPart::Content(s.clone()),
                        UntypedStringPart::Interpolation(e) => {
                            BoundStringPart::Interpolation(self.expr(e))
                        }
                    })
                    .collect(),
                span: *span,
            },
            UntypedExpr::VarRef { symbol, ty, span } => BoundExpr::VarRef {
                symbol: *symbol,
                ty: self.ty(ty),
                span: *span,
            },
            UntypedExpr::FunctionRef { symbol, ty, span } => BoundExpr::FunctionRef {
                symbol: *symbol,
                ty: self.ty(ty),
                span: *span,
            },
            UntypedExpr::Call {
                callee,
                args,
                ret,
                span,
            } => BoundExpr::Call {
                callee: match callee {
                    UntypedCallee::Group { promise, .. } => match self.promises.result(*promise) {
                        Some(symbol) => BoundCallee::Function(symbol),
                        None => BoundCallee::Error,
                    },
                    UntypedCallee::Expr(e) => BoundCallee::Value(Box::new(self.expr(e))),
                    UntypedCallee::Error => BoundCallee::Error,
                },
                args: args.iter().map(|a| self.expr(a)).collect(),
                ty: self.ty(ret),
                span: *span,
            },
            UntypedExpr::OperatorCall {
                promise,
                operands,
                ret,
                span,
                ..
            } => BoundExpr::OperatorCall {
                function: self.promises.result(*promise),
                operands: operands.iter().map(|o| self.expr(o)).collect(),
                ty: self.ty(ret),
                span: *span,
            },
            UntypedExpr::Not { operand, span } => BoundExpr::Not {
                operand: Box::new(self.expr(operand)),
                span: *span,
            },
            UntypedExpr::Logical { op, lhs, rhs, span } => BoundExpr::Logical {
                op: *op,
                lhs: Box::new(self.expr(lhs)),
                rhs: Box::new(self.expr(rhs)),
                span: *span,
            },
            UntypedExpr::Relational {
                first,
                comparisons,
                span,
            } => BoundExpr::Relational {
                first: Box::new(self.expr(first)),
                comparisons: comparisons
                    .iter()
                    .map(|c| BoundComparison {
                        function: self.promises.result(c.promise),
                        right: self.expr(&c.right),
                    })
                    .collect(),
                span: *span,
            },
            UntypedExpr::Index {
                receiver,
                index,
                elem,
                span,
            } => BoundExpr::Index {
                receiver: Box::new(self.expr(receiver)),
                index: Box::new(self.expr(index)),
                ty: self.ty(elem),
                span: *span,
            },
            UntypedExpr::Member {
                receiver,
                promise,
                ty,
                span,
                ..
            } => BoundExpr::Member {
                receiver: Box::new(self.expr(receiver)),
                member: self.promises.result(*promise),
                ty: self.ty(ty),
                span: *span,
            },
            UntypedExpr::Assign {
                target,
                op,
                value,
                span,
            } => BoundExpr::Assign {
                target: self.lvalue(target),
                op: op
                    .as_ref()
                    .and_then(|(_, promise)| self.promises.result(*promise)),
                value: Box::new(self.expr(value)),
                span: *span,
            },
            UntypedExpr::If {
                condition,
                then_branch,
                else_branch,
                ty,
                span,
            } => BoundExpr::If {
                condition: Box::new(self.expr(condition)),
                then_branch: Box::new(self.expr(then_branch)),
                else_branch: else_branch.as_ref().map(|e| Box::new(self.expr(e))),
                ty: self.ty(ty),
                span: *span,
            },
            UntypedExpr::While {
                condition,
                body,
                span,
            } => BoundExpr::While {
                condition: Box::new(self.expr(condition)),
                body: Box::new(self.expr(body)),
                span: *span,
            },
            UntypedExpr::Block {
                statements,
                value,
                ty,
                span,
            } => BoundExpr::Block {
                statements: statements.iter().map(|s| self.stmt(s)).collect(),
                value: value.as_ref().map(|v| Box::new(self.expr(v))),
                ty: self.ty(ty),
                span: *span,
            },
            UntypedExpr::Return { value, span } => BoundExpr::Return {
                value: value.as_ref().map(|v| Box::new(self.expr(v))),
                span: *span,
            },
            UntypedExpr::Goto { label, span } => BoundExpr::Goto {
                label: *label,
                span: *span,
            },
        }
    }

    fn lvalue(&mut self, target: &UntypedLValue) -> BoundLValue {
        match target {
            UntypedLValue::Var { symbol, ty, span } => BoundLValue::Var {
                symbol: *symbol,
                ty: self.ty(ty),
                span: *span,
            },
            UntypedLValue::Index {
                receiver,
                index,
                elem,
                span,
            } => BoundLValue::Index {
                receiver: Box::new(self.expr(receiver)),
                index: Box::new(self.expr(index)),
                ty: self.ty(elem),
                span: *span,
            },
            UntypedLValue::Member {
                receiver,
                promise,
                ty,
                span,
                ..
            } => BoundLValue::Member {
                receiver: Box::new(self.expr(receiver)),
                member: self.promises.result(*promise),
                ty: self.ty(ty),
                span: *span,
            },
            UntypedLValue::Error => BoundLValue::Error,
        }
    }

    fn stmt(&mut self, s: &UntypedStmt) -> BoundStmt {
        match s {
            UntypedStmt::Local { symbol, init, span } => BoundStmt::Local {
                symbol: *symbol,
                init: init.as_ref().map(|e| self.expr(e)),
                span: *span,
            },
            UntypedStmt::Label { symbol, span } => BoundStmt::Label {
                symbol: *symbol,
                span: *span,
            },
            UntypedStmt::Expr(e) => BoundStmt::Expr(self.expr(e)),
        }
    }
}
