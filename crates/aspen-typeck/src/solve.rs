//! The constraint solver: a fixpoint engine over constraints and type
//! variables.
//!
//! Every constraint returns a [`SolveState`] per tick: `Stale` (awaiting
//! more information), `AdvancedContinue` (made progress, run another
//! pass), or `Solved`. The driver loops until everything is solved or a
//! full pass makes no progress; residual constraints then fail with their
//! configured diagnostic. Candidate iteration follows declaration order,
//! so ties are reported rather than silently resolved by order.
//!
//! Failure containment: a constraint that fails definitively poisons its
//! output type with `Error` and fails its promise, which suppresses the
//! diagnostics of everything downstream -- only the root cause is
//! reported.

use aspen_common::cancel::CancelToken;
use aspen_common::diagnostics::{DiagnosticKind, Diagnostics};
use aspen_common::span::Span;
use rustc_hash::FxHashMap;

use crate::builtins::Intrinsics;
use crate::symbol::{SymbolId, SymbolKind, SymbolTable};
use crate::ty::Ty;
use crate::unify::InferCtx;
use crate::untyped::PromiseId;

/// What one solver tick of a constraint achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveState {
    /// Waiting for other constraints to bind more variables.
    Stale,
    /// Made progress (e.g. eliminated candidates); worth another pass.
    AdvancedContinue,
    /// Done; the constraint is dropped.
    Solved,
}

// ── Promises ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromiseState {
    Pending,
    Resolved(SymbolId),
    Failed,
}

/// Deferred resolutions, filled in as constraints solve.
#[derive(Debug, Default)]
pub struct PromiseStore {
    states: Vec<PromiseState>,
}

impl PromiseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self) -> PromiseId {
        let id = PromiseId(self.states.len() as u32);
        self.states.push(PromiseState::Pending);
        id
    }

    pub fn resolve(&mut self, id: PromiseId, symbol: SymbolId) {
        self.states[id.0 as usize] = PromiseState::Resolved(symbol);
    }

    /// Mark a promise as definitively failed. Dependents see the failure
    /// through the poisoned `Error` type and stay silent.
    pub fn fail(&mut self, id: PromiseId) {
        self.states[id.0 as usize] = PromiseState::Failed;
    }

    pub fn result(&self, id: PromiseId) -> Option<SymbolId> {
        match self.states[id.0 as usize] {
            PromiseState::Resolved(symbol) => Some(symbol),
            _ => None,
        }
    }
}

// ── Constraints ────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum Constraint {
    /// `source` must be usable where `target` is expected. With identity
    /// conversions this is plain unification.
    Assignable { target: Ty, source: Ty, span: Span },
    /// An indirect call through a value of (eventually) function type.
    Call {
        callee: Ty,
        args: Vec<Ty>,
        ret: Ty,
        span: Span,
    },
    /// Pick one function out of an overload set.
    Overload(OverloadConstraint),
    /// Look up a member once the receiver's type is known.
    Member(MemberConstraint),
}

#[derive(Debug)]
pub struct OverloadConstraint {
    pub name: String,
    /// Remaining viable candidates, in declaration order.
    pub candidates: Vec<SymbolId>,
    /// Explicit generic arguments, when the call site spelled them.
    pub type_args: Option<Vec<Ty>>,
    pub args: Vec<Ty>,
    pub ret: Ty,
    pub promise: PromiseId,
    pub span: Span,
}

#[derive(Debug)]
pub struct MemberConstraint {
    pub receiver: Ty,
    pub name: String,
    pub result: Ty,
    pub promise: PromiseId,
    pub span: Span,
}

// ── Scoring ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArgScore {
    /// The argument's type is not yet known; contributes nothing and
    /// defers selection.
    Unknown,
    /// Exactly the parameter type.
    Exact,
    /// Assignable via generic unification (or bottom/poison).
    Compat,
    /// Can never match; the candidate is eliminated.
    Incompatible,
}

fn contains_var(ty: &Ty) -> bool {
    match ty {
        Ty::Var(_) => true,
        Ty::Array { elem, .. } => contains_var(elem),
        Ty::Fun { params, ret } => params.iter().any(contains_var) || contains_var(ret),
        _ => false,
    }
}

/// Whether `arg` could unify with `param` if every type parameter in
/// `param` were free.
fn could_match(arg: &Ty, param: &Ty) -> bool {
    if matches!(arg, Ty::Never) {
        return true;
    }
    match param {
        Ty::Param(_) | Ty::Error => true,
        Ty::Array { elem: pe, rank: pr } => match arg {
            Ty::Array { elem: ae, rank: ar } => pr == ar && could_match(ae, pe),
            _ => false,
        },
        Ty::Fun {
            params: pp,
            ret: pr,
        } => match arg {
            Ty::Fun {
                params: ap,
                ret: ar,
            } => {
                pp.len() == ap.len()
                    && pp.iter().zip(ap).all(|(p, a)| could_match(a, p))
                    && could_match(ar, pr)
            }
            _ => false,
        },
        _ => param == arg,
    }
}

fn contains_param(ty: &Ty) -> bool {
    match ty {
        Ty::Param(_) => true,
        Ty::Array { elem, .. } => contains_param(elem),
        Ty::Fun { params, ret } => params.iter().any(contains_param) || contains_param(ret),
        _ => false,
    }
}

fn score_one(arg: &Ty, param: &Ty) -> ArgScore {
    if contains_var(arg) {
        return ArgScore::Unknown;
    }
    if arg == param && !contains_param(param) {
        return ArgScore::Exact;
    }
    if could_match(arg, param) {
        return ArgScore::Compat;
    }
    ArgScore::Incompatible
}

// ── The solver ─────────────────────────────────────────────────────────

pub(crate) struct Solver {
    slots: Vec<Option<Constraint>>,
}

impl Solver {
    pub(crate) fn new(constraints: Vec<Constraint>) -> Self {
        Solver {
            slots: constraints.into_iter().map(Some).collect(),
        }
    }

    /// Run constraints to fixpoint, then fail whatever is left.
    pub(crate) fn solve(
        &mut self,
        ctx: &mut InferCtx,
        symbols: &SymbolTable,
        intrinsics: &Intrinsics,
        promises: &mut PromiseStore,
        diagnostics: &mut Diagnostics,
        cancel: &CancelToken,
    ) {
        loop {
            if cancel.is_cancelled() {
                return;
            }
            let mut progressed = false;
            let mut remaining = 0usize;
            for i in 0..self.slots.len() {
                let Some(mut constraint) = self.slots[i].take() else {
                    continue;
                };
                match tick(&mut constraint, ctx, symbols, intrinsics, promises, diagnostics) {
                    SolveState::Solved => progressed = true,
                    SolveState::AdvancedContinue => {
                        progressed = true;
                        remaining += 1;
                        self.slots[i] = Some(constraint);
                    }
                    SolveState::Stale => {
                        remaining += 1;
                        self.slots[i] = Some(constraint);
                    }
                }
            }
            if remaining == 0 {
                return;
            }
            if !progressed {
                break;
            }
        }

        // No full pass can advance: residual constraints fail with their
        // configured diagnostic.
        for slot in &mut self.slots {
            if let Some(constraint) = slot.take() {
                fail_residual(constraint, ctx, promises, diagnostics);
            }
        }
    }
}

/// Poison a type so dependents stay silent, ignoring the impossible
/// failure of unifying with `Error`.
fn poison(ctx: &mut InferCtx, ty: &Ty) {
    let _ = ctx.unify(ty, &Ty::Error);
}

fn report_mismatch(
    ctx: &mut InferCtx,
    diagnostics: &mut Diagnostics,
    expected: &Ty,
    got: &Ty,
    span: Span,
) {
    // A mismatch involving poison is a follow-on failure; the root cause
    // is already reported.
    if !expected.contains_error() && !got.contains_error() {
        diagnostics.report(
            DiagnosticKind::TypeMismatch {
                expected: expected.to_string(),
                got: got.to_string(),
            },
            span,
        );
    }
    poison(ctx, expected);
    poison(ctx, got);
}

fn tick(
    constraint: &mut Constraint,
    ctx: &mut InferCtx,
    symbols: &SymbolTable,
    intrinsics: &Intrinsics,
    promises: &mut PromiseStore,
    diagnostics: &mut Diagnostics,
) -> SolveState {
    match constraint {
        Constraint::Assignable {
            target,
            source,
            span,
        } => {
            if let Err(mismatch) = ctx.unify(target, source) {
                report_mismatch(ctx, diagnostics, &mismatch.expected, &mismatch.got, *span);
            }
            SolveState::Solved
        }

        Constraint::Call {
            callee,
            args,
            ret,
            span,
        } => {
            let resolved = ctx.shallow_resolve(callee);
            match resolved {
                Ty::Var(_) => SolveState::Stale,
                Ty::Error => {
                    poison(ctx, ret);
                    SolveState::Solved
                }
                Ty::Fun { .. } => {
                    let expected = Ty::Fun {
                        params: args.clone(),
                        ret: Box::new(ret.clone()),
                    };
                    if let Err(mismatch) = ctx.unify(callee, &expected) {
                        report_mismatch(
                            ctx,
                            diagnostics,
                            &mismatch.expected,
                            &mismatch.got,
                            *span,
                        );
                        poison(ctx, ret);
                    }
                    SolveState::Solved
                }
                other => {
                    diagnostics.report(
                        DiagnosticKind::CallNonFunction {
                            ty: ctx.resolve(&other).to_string(),
                        },
                        *span,
                    );
                    poison(ctx, ret);
                    SolveState::Solved
                }
            }
        }

        Constraint::Overload(o) => tick_overload(o, ctx, symbols, promises, diagnostics),

        Constraint::Member(m) => {
            let receiver = ctx.shallow_resolve(&m.receiver);
            match receiver {
                Ty::Var(_) => SolveState::Stale,
                Ty::Error => {
                    promises.fail(m.promise);
                    poison(ctx, &m.result);
                    SolveState::Solved
                }
                Ty::Array { .. } if m.name == "length" => {
                    if let Err(mismatch) = ctx.unify(&m.result, &Ty::int32()) {
                        report_mismatch(
                            ctx,
                            diagnostics,
                            &mismatch.expected,
                            &mismatch.got,
                            m.span,
                        );
                    }
                    promises.resolve(m.promise, intrinsics.array_length);
                    SolveState::Solved
                }
                _ => {
                    diagnostics.report(
                        DiagnosticKind::UndefinedReference {
                            name: m.name.clone(),
                        },
                        m.span,
                    );
                    promises.fail(m.promise);
                    poison(ctx, &m.result);
                    SolveState::Solved
                }
            }
        }
    }
}

fn tick_overload(
    o: &mut OverloadConstraint,
    ctx: &mut InferCtx,
    symbols: &SymbolTable,
    promises: &mut PromiseStore,
    diagnostics: &mut Diagnostics,
) -> SolveState {
    // Failure containment: a poisoned argument means a reported failure
    // upstream; fail silently instead of piling on.
    if o.args.iter().any(|a| ctx.resolve(a).contains_error()) {
        promises.fail(o.promise);
        poison(ctx, &o.ret);
        return SolveState::Solved;
    }

    let before = o.candidates.len();
    let mut scored: Vec<(SymbolId, i32, bool)> = Vec::new();
    for &candidate in &o.candidates {
        if let Some((score, deferred)) =
            score_candidate(ctx, symbols, candidate, &o.args, o.type_args.as_deref())
        {
            scored.push((candidate, score, deferred));
        }
    }

    if scored.is_empty() {
        diagnostics.report(
            DiagnosticKind::NoMatchingOverload {
                name: o.name.clone(),
            },
            o.span,
        );
        promises.fail(o.promise);
        poison(ctx, &o.ret);
        return SolveState::Solved;
    }

    o.candidates = scored.iter().map(|&(c, _, _)| c).collect();
    let any_deferred = scored.iter().any(|&(_, _, d)| d);
    let max = scored.iter().map(|&(_, s, _)| s).max().unwrap();
    let top: Vec<SymbolId> = scored
        .iter()
        .filter(|&&(_, s, _)| s == max)
        .map(|&(c, _, _)| c)
        .collect();

    // Commit when scoring is decisive, or when only one candidate is
    // viable at all (unknown arguments then gain their types from it).
    if (top.len() == 1 && !any_deferred) || scored.len() == 1 {
        resolve_overload(o, top[0], ctx, symbols, promises, diagnostics);
        return SolveState::Solved;
    }

    if any_deferred {
        return if o.candidates.len() < before {
            SolveState::AdvancedContinue
        } else {
            SolveState::Stale
        };
    }

    // Everything known and still tied: report, never pick by order.
    diagnostics.report(
        DiagnosticKind::AmbiguousOverload {
            name: o.name.clone(),
            candidates: top.len(),
        },
        o.span,
    );
    promises.fail(o.promise);
    poison(ctx, &o.ret);
    SolveState::Solved
}

fn score_candidate(
    ctx: &mut InferCtx,
    symbols: &SymbolTable,
    candidate: SymbolId,
    args: &[Ty],
    type_args: Option<&[Ty]>,
) -> Option<(i32, bool)> {
    let f = symbols.function(candidate)?;

    let fixed = if f.is_variadic {
        f.params.len().saturating_sub(1)
    } else {
        f.params.len()
    };
    if f.is_variadic {
        if args.len() < fixed {
            return None;
        }
    } else if args.len() != f.params.len() {
        return None;
    }

    // With explicit type arguments, score against the substituted
    // signature; otherwise type parameters score as wildcards.
    let subst = explicit_substitution(symbols, f, type_args);

    let variadic_elem = if f.is_variadic {
        match symbols.param_ty(*f.params.last()?) {
            Ty::Array { elem, rank: 1 } => Some(*elem),
            _ => Some(Ty::Error),
        }
    } else {
        None
    };

    let mut score = 0i32;
    let mut deferred = false;
    for (i, arg) in args.iter().enumerate() {
        let param_ty = if i < fixed {
            symbols.param_ty(f.params[i])
        } else {
            variadic_elem.clone().unwrap_or(Ty::Error)
        };
        let param_ty = match &subst {
            Some(map) => ctx.substitute(&param_ty, map),
            None => param_ty,
        };
        let arg = ctx.resolve(arg);
        match score_one(&arg, &param_ty) {
            ArgScore::Unknown => deferred = true,
            ArgScore::Exact => score += 2,
            ArgScore::Compat => score += 1,
            ArgScore::Incompatible => return None,
        }
    }
    Some((score, deferred))
}

fn explicit_substitution(
    symbols: &SymbolTable,
    f: &crate::symbol::FunctionSymbol,
    type_args: Option<&[Ty]>,
) -> Option<FxHashMap<u32, Ty>> {
    let type_args = type_args?;
    if type_args.len() != f.type_params.len() {
        return None;
    }
    let mut map = FxHashMap::default();
    for (&tp, ty) in f.type_params.iter().zip(type_args) {
        if let SymbolKind::TypeParam { param_id } = &symbols.get(tp).kind {
            map.insert(*param_id, ty.clone());
        }
    }
    Some(map)
}

/// Commit to `chosen`: instantiate its signature (explicit type arguments
/// or fresh variables), unify parameters with arguments and the return
/// type with the constraint's, and resolve the promise.
fn resolve_overload(
    o: &OverloadConstraint,
    chosen: SymbolId,
    ctx: &mut InferCtx,
    symbols: &SymbolTable,
    promises: &mut PromiseStore,
    diagnostics: &mut Diagnostics,
) {
    let Some(f) = symbols.function(chosen) else {
        promises.fail(o.promise);
        poison(ctx, &o.ret);
        return;
    };

    let subst = match explicit_substitution(symbols, f, o.type_args.as_deref()) {
        Some(map) => map,
        None => {
            let mut map = FxHashMap::default();
            for &tp in &f.type_params {
                if let SymbolKind::TypeParam { param_id } = &symbols.get(tp).kind {
                    let fresh = ctx.fresh_var();
                    map.insert(*param_id, fresh);
                }
            }
            map
        }
    };

    let fixed = if f.is_variadic {
        f.params.len().saturating_sub(1)
    } else {
        f.params.len()
    };
    let variadic_elem = f.is_variadic.then(|| {
        match symbols.param_ty(*f.params.last().expect("variadic functions have parameters")) {
            Ty::Array { elem, rank: 1 } => *elem,
            _ => Ty::Error,
        }
    });

    for (i, arg) in o.args.iter().enumerate() {
        let param_ty = if i < fixed {
            symbols.param_ty(f.params[i])
        } else {
            variadic_elem.clone().unwrap_or(Ty::Error)
        };
        let param_ty = ctx.substitute(&param_ty, &subst);
        if let Err(mismatch) = ctx.unify(&param_ty, arg) {
            report_mismatch(ctx, diagnostics, &mismatch.expected, &mismatch.got, o.span);
        }
    }

    let ret_ty = ctx.substitute(&f.return_ty, &subst);
    if let Err(mismatch) = ctx.unify(&o.ret, &ret_ty) {
        report_mismatch(ctx, diagnostics, &mismatch.expected, &mismatch.got, o.span);
    }
    promises.resolve(o.promise, chosen);
}

/// A constraint the fixpoint could not move: report its configured
/// diagnostic and poison its output.
fn fail_residual(
    constraint: Constraint,
    ctx: &mut InferCtx,
    promises: &mut PromiseStore,
    diagnostics: &mut Diagnostics,
) {
    match constraint {
        Constraint::Assignable { .. } => {
            // Assignable solves on its first tick; it is never residual.
        }
        Constraint::Call { callee, ret, span, .. } => {
            let ty = ctx.resolve(&callee);
            if !ty.contains_error() {
                diagnostics.report(DiagnosticKind::CallNonFunction { ty: ty.to_string() }, span);
            }
            poison(ctx, &ret);
        }
        Constraint::Overload(o) => {
            diagnostics.report(DiagnosticKind::NoMatchingOverload { name: o.name }, o.span);
            promises.fail(o.promise);
            poison(ctx, &o.ret);
        }
        Constraint::Member(m) => {
            diagnostics.report(DiagnosticKind::UndefinedReference { name: m.name }, m.span);
            promises.fail(m.promise);
            poison(ctx, &m.result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;

    fn setup() -> (SymbolTable, Intrinsics, InferCtx, PromiseStore, Diagnostics) {
        let mut symbols = SymbolTable::new();
        let intrinsics = builtins::install(&mut symbols);
        (
            symbols,
            intrinsics,
            InferCtx::new(),
            PromiseStore::new(),
            Diagnostics::new(),
        )
    }

    fn run(
        constraints: Vec<Constraint>,
        symbols: &SymbolTable,
        intrinsics: &Intrinsics,
        ctx: &mut InferCtx,
        promises: &mut PromiseStore,
        diagnostics: &mut Diagnostics,
    ) {
        Solver::new(constraints).solve(
            ctx,
            symbols,
            intrinsics,
            promises,
            diagnostics,
            &CancelToken::new(),
        );
    }

    #[test]
    fn addition_overload_picks_exact_candidate() {
        let (symbols, intrinsics, mut ctx, mut promises, mut diagnostics) = setup();
        let ret = ctx.fresh_var();
        let promise = promises.alloc();
        let constraint = Constraint::Overload(OverloadConstraint {
            name: "+".to_string(),
            candidates: intrinsics.operators["+"].clone(),
            type_args: None,
            args: vec![Ty::int32(), Ty::int32()],
            ret: ret.clone(),
            promise,
            span: Span::new(0, 1),
        });
        run(
            vec![constraint],
            &symbols,
            &intrinsics,
            &mut ctx,
            &mut promises,
            &mut diagnostics,
        );
        assert!(diagnostics.is_empty(), "diagnostics: {diagnostics:?}");
        assert_eq!(ctx.resolve(&ret), Ty::int32());
        let chosen = promises.result(promise).expect("resolved");
        assert_eq!(symbols.function(chosen).unwrap().intrinsic, Some(crate::symbol::Intrinsic::Add));
    }

    #[test]
    fn no_matching_overload_reports_once_and_poisons() {
        let (symbols, intrinsics, mut ctx, mut promises, mut diagnostics) = setup();
        let ret = ctx.fresh_var();
        let promise = promises.alloc();
        let overload = Constraint::Overload(OverloadConstraint {
            name: "+".to_string(),
            candidates: intrinsics.operators["+"].clone(),
            type_args: None,
            args: vec![Ty::int32(), Ty::string()],
            ret: ret.clone(),
            promise,
            span: Span::new(0, 1),
        });
        // A dependent constraint consuming the poisoned result.
        let dependent = Constraint::Assignable {
            target: Ty::int32(),
            source: ret.clone(),
            span: Span::new(2, 3),
        };
        run(
            vec![overload, dependent],
            &symbols,
            &intrinsics,
            &mut ctx,
            &mut promises,
            &mut diagnostics,
        );
        assert_eq!(diagnostics.len(), 1, "only the root cause is reported");
        assert!(matches!(
            &diagnostics.iter().next().unwrap().kind,
            DiagnosticKind::NoMatchingOverload { name } if name == "+"
        ));
        assert_eq!(ctx.resolve(&ret), Ty::Error);
        assert_eq!(promises.result(promise), None);
    }

    #[test]
    fn unknown_argument_defers_then_resolves() {
        let (symbols, intrinsics, mut ctx, mut promises, mut diagnostics) = setup();
        let arg = ctx.fresh_var();
        let ret = ctx.fresh_var();
        let promise = promises.alloc();
        let overload = Constraint::Overload(OverloadConstraint {
            name: "+".to_string(),
            candidates: intrinsics.operators["+"].clone(),
            type_args: None,
            args: vec![arg.clone(), Ty::float64()],
            ret: ret.clone(),
            promise,
            span: Span::new(0, 1),
        });
        // Another constraint eventually pins the unknown argument.
        let pin = Constraint::Assignable {
            target: arg.clone(),
            source: Ty::float64(),
            span: Span::new(2, 3),
        };
        run(
            vec![overload, pin],
            &symbols,
            &intrinsics,
            &mut ctx,
            &mut promises,
            &mut diagnostics,
        );
        assert!(diagnostics.is_empty(), "diagnostics: {diagnostics:?}");
        assert_eq!(ctx.resolve(&ret), Ty::float64());
        assert!(promises.result(promise).is_some());
    }

    #[test]
    fn call_on_non_function_reports() {
        let (symbols, intrinsics, mut ctx, mut promises, mut diagnostics) = setup();
        let ret = ctx.fresh_var();
        let call = Constraint::Call {
            callee: Ty::int32(),
            args: vec![],
            ret: ret.clone(),
            span: Span::new(0, 1),
        };
        run(
            vec![call],
            &symbols,
            &intrinsics,
            &mut ctx,
            &mut promises,
            &mut diagnostics,
        );
        assert!(matches!(
            &diagnostics.iter().next().unwrap().kind,
            DiagnosticKind::CallNonFunction { .. }
        ));
        assert_eq!(ctx.resolve(&ret), Ty::Error);
    }

    #[test]
    fn member_constraint_waits_for_receiver() {
        let (symbols, intrinsics, mut ctx, mut promises, mut diagnostics) = setup();
        let receiver = ctx.fresh_var();
        let result = ctx.fresh_var();
        let promise = promises.alloc();
        let member = Constraint::Member(MemberConstraint {
            receiver: receiver.clone(),
            name: "length".to_string(),
            result: result.clone(),
            promise,
            span: Span::new(0, 1),
        });
        let pin = Constraint::Assignable {
            target: receiver,
            source: Ty::array(Ty::int32()),
            span: Span::new(2, 3),
        };
        run(
            vec![member, pin],
            &symbols,
            &intrinsics,
            &mut ctx,
            &mut promises,
            &mut diagnostics,
        );
        assert!(diagnostics.is_empty(), "diagnostics: {diagnostics:?}");
        assert_eq!(ctx.resolve(&result), Ty::int32());
        assert_eq!(promises.result(promise), Some(intrinsics.array_length));
    }
}
