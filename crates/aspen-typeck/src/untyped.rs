//! The untyped tree: the binder's output.
//!
//! Mirrors the syntax tree but with names resolved to symbols, expressions
//! carrying type slots (mostly fresh inference variables), and every
//! deferred choice -- overloaded calls, member lookups, operator
//! applications -- represented as a promise that the constraint solver
//! resolves. The finalize pass in [`crate::bound`] turns this into the
//! bound tree once solving is done.

use aspen_common::span::Span;

use crate::symbol::SymbolId;
use crate::ty::Ty;

/// Handle of a deferred resolution, filled in by the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PromiseId(pub u32);

/// A compile-time constant value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Unit,
    Int(i64),
    Float(f64),
    Bool(bool),
    Char(char),
    String(String),
}

/// The whole untyped program: every function (including nested ones,
/// lifted) and every global, in declaration order.
#[derive(Debug, Default)]
pub struct UntypedProgram {
    pub functions: Vec<UntypedFunction>,
    pub globals: Vec<UntypedGlobal>,
}

#[derive(Debug)]
pub struct UntypedFunction {
    pub symbol: SymbolId,
    /// The body expression: a block for `{ ... }` bodies, the bare
    /// expression for `= expr;` bodies.
    pub body: UntypedExpr,
    pub span: Span,
}

#[derive(Debug)]
pub struct UntypedGlobal {
    pub symbol: SymbolId,
    pub init: Option<UntypedExpr>,
    pub span: Span,
}

/// Short-circuiting logical operators, which are not overloadable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug)]
pub enum UntypedExpr {
    /// Placeholder where binding failed; the cause is already reported.
    Error,
    Unit,
    Literal {
        value: ConstValue,
        ty: Ty,
        span: Span,
    },
    String {
        parts: Vec<UntypedStringPart>,
        span: Span,
    },
    /// Reference to a parameter, local, or global.
    VarRef {
        symbol: SymbolId,
        ty: Ty,
        span: Span,
    },
    /// Reference to a single resolved function (signature instantiated).
    FunctionRef {
        symbol: SymbolId,
        ty: Ty,
        span: Span,
    },
    Call {
        callee: UntypedCallee,
        args: Vec<UntypedExpr>,
        ret: Ty,
        span: Span,
    },
    /// An overloaded operator application; the promise resolves to the
    /// chosen operator function symbol.
    OperatorCall {
        op: String,
        promise: PromiseId,
        operands: Vec<UntypedExpr>,
        ret: Ty,
        span: Span,
    },
    Not {
        operand: Box<UntypedExpr>,
        span: Span,
    },
    Logical {
        op: LogicalOp,
        lhs: Box<UntypedExpr>,
        rhs: Box<UntypedExpr>,
        span: Span,
    },
    /// A chained relational expression: `first (op next)+`.
    Relational {
        first: Box<UntypedExpr>,
        comparisons: Vec<UntypedComparison>,
        span: Span,
    },
    Index {
        receiver: Box<UntypedExpr>,
        index: Box<UntypedExpr>,
        elem: Ty,
        span: Span,
    },
    /// A member access on a value; resolved by a `Member` constraint.
    Member {
        receiver: Box<UntypedExpr>,
        name: String,
        promise: PromiseId,
        ty: Ty,
        span: Span,
    },
    Assign {
        target: UntypedLValue,
        /// For compound assignment: operator name and its promise.
        op: Option<(String, PromiseId)>,
        value: Box<UntypedExpr>,
        span: Span,
    },
    If {
        condition: Box<UntypedExpr>,
        then_branch: Box<UntypedExpr>,
        else_branch: Option<Box<UntypedExpr>>,
        ty: Ty,
        span: Span,
    },
    While {
        condition: Box<UntypedExpr>,
        body: Box<UntypedExpr>,
        span: Span,
    },
    Block {
        statements: Vec<UntypedStmt>,
        value: Option<Box<UntypedExpr>>,
        ty: Ty,
        span: Span,
    },
    Return {
        value: Option<Box<UntypedExpr>>,
        span: Span,
    },
    Goto {
        /// `None` when the label did not resolve.
        label: Option<SymbolId>,
        span: Span,
    },
}

#[derive(Debug)]
pub enum UntypedStringPart {
    Content(String),
    Interpolation(UntypedExpr),
}

#[derive(Debug)]
pub struct UntypedComparison {
    pub op: String,
    pub promise: PromiseId,
    pub right: UntypedExpr,
}

#[derive(Debug)]
pub enum UntypedCallee {
    /// An overload set; the promise resolves to one function.
    Group { name: String, promise: PromiseId },
    /// An arbitrary callable value (indirect call).
    Expr(Box<UntypedExpr>),
    /// Binding the callee failed; the cause is already reported.
    Error,
}

#[derive(Debug)]
pub enum UntypedLValue {
    Var {
        symbol: SymbolId,
        ty: Ty,
        span: Span,
    },
    Index {
        receiver: Box<UntypedExpr>,
        index: Box<UntypedExpr>,
        elem: Ty,
        span: Span,
    },
    Member {
        receiver: Box<UntypedExpr>,
        name: String,
        promise: PromiseId,
        ty: Ty,
        span: Span,
    },
    Error,
}

impl UntypedLValue {
    pub fn ty(&self) -> Ty {
        match self {
            UntypedLValue::Var { ty, .. }
            | UntypedLValue::Index { elem: ty, .. }
            | UntypedLValue::Member { ty, .. } => ty.clone(),
            UntypedLValue::Error => Ty::Error,
        }
    }
}

#[derive(Debug)]
pub enum UntypedStmt {
    Local {
        symbol: SymbolId,
        init: Option<UntypedExpr>,
        span: Span,
    },
    Label {
        symbol: SymbolId,
        span: Span,
    },
    Expr(UntypedExpr),
}

impl UntypedExpr {
    /// The (possibly still variable) type of this expression.
    pub fn ty(&self) -> Ty {
        match self {
            UntypedExpr::Error => Ty::Error,
            UntypedExpr::Unit => Ty::unit(),
            UntypedExpr::Literal { ty, .. } => ty.clone(),
            UntypedExpr::String { .. } => Ty::string(),
            UntypedExpr::VarRef { ty, .. } => ty.clone(),
            UntypedExpr::FunctionRef { ty, .. } => ty.clone(),
            UntypedExpr::Call { ret, .. } => ret.clone(),
            UntypedExpr::OperatorCall { ret, .. } => ret.clone(),
            UntypedExpr::Not { .. } => Ty::bool(),
            UntypedExpr::Logical { .. } => Ty::bool(),
            UntypedExpr::Relational { .. } => Ty::bool(),
            UntypedExpr::Index { elem, .. } => elem.clone(),
            UntypedExpr::Member { ty, .. } => ty.clone(),
            UntypedExpr::Assign { .. } => Ty::unit(),
            UntypedExpr::If { ty, .. } => ty.clone(),
            UntypedExpr::While { .. } => Ty::unit(),
            UntypedExpr::Block { ty, .. } => ty.clone(),
            UntypedExpr::Return { .. } => Ty::Never,
            UntypedExpr::Goto { .. } => Ty::Never,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            UntypedExpr::Error | UntypedExpr::Unit => None,
            UntypedExpr::Literal { span, .. }
            | UntypedExpr::String { span, .. }
            | UntypedExpr::VarRef { span, .. }
            | UntypedExpr::FunctionRef { span, .. }
            | UntypedExpr::Call { span, .. }
            | UntypedExpr::OperatorCall { span, .. }
            | UntypedExpr::Not { span, .. }
            | UntypedExpr::Logical { span, .. }
            | UntypedExpr::Relational { span, .. }
            | UntypedExpr::Index { span, .. }
            | UntypedExpr::Member { span, .. }
            | UntypedExpr::Assign { span, .. }
            | UntypedExpr::If { span, .. }
            | UntypedExpr::While { span, .. }
            | UntypedExpr::Block { span, .. }
            | UntypedExpr::Return { span, .. }
            | UntypedExpr::Goto { span, .. } => Some(*span),
        }
    }
}
