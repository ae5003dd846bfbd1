//! Aspen binder and type checker.
//!
//! Turns a parse tree into symbols, an untyped tree, and -- after the
//! constraint solver reaches its fixpoint -- a bound tree where every
//! expression has a concrete type and every overload is resolved to one
//! symbol.
//!
//! # Architecture
//!
//! - [`symbol`]: arena symbol table (modules, functions, locals, ...)
//! - [`scope`]: lexical scope stack with overload sets
//! - [`ty`] / [`unify`]: type representation and the ena-backed
//!   unification engine (`Error` poison, `Never` bottom)
//! - [`bind`]: syntax -> untyped tree + constraints
//! - [`solve`]: the `Stale`/`AdvancedContinue`/`Solved` fixpoint driver
//!   with overload scoring and failure containment
//! - [`bound`]: promise/type resolution into the bound tree
//! - [`provider`]: the abstract source of externally defined symbols
//! - [`builtins`]: intrinsic types and operator groups (no process-wide
//!   state; everything hangs off the per-compilation context)
//!
//! Diagnostics never abort: a compilation with errors still produces both
//! trees, with `Error` types where resolution failed.

pub mod bound;
pub mod builtins;
pub mod diagnostics;
pub mod provider;
pub mod scope;
pub mod solve;
pub mod symbol;
pub mod ty;
pub mod unify;
pub mod untyped;

mod bind;

use aspen_common::cancel::CancelToken;
use aspen_common::diagnostics::Diagnostics;

use crate::bound::BoundProgram;
use crate::builtins::Intrinsics;
use crate::provider::{NullProvider, SymbolProvider};
use crate::solve::PromiseStore;
use crate::symbol::SymbolTable;
use crate::unify::InferCtx;
use crate::untyped::UntypedProgram;

/// Everything the type checker produces for one compilation.
pub struct TypeckResult {
    /// All symbols created during the compilation.
    pub symbols: SymbolTable,
    /// The binder's output, promises unresolved.
    pub untyped: UntypedProgram,
    /// The solved program: concrete types, resolved overloads.
    pub bound: BoundProgram,
    /// Diagnostics from binding and solving.
    pub diagnostics: Diagnostics,
    /// Handles to the built-in symbols, for downstream phases.
    pub intrinsics: Intrinsics,
}

/// Type-check a parsed program with no external symbols.
pub fn check(parse: &aspen_parser::Parse) -> TypeckResult {
    check_with(parse, &NullProvider, &CancelToken::new())
}

/// Type-check a parsed program against an external symbol provider, with
/// cooperative cancellation between phases and solver iterations.
pub fn check_with(
    parse: &aspen_parser::Parse,
    provider: &dyn SymbolProvider,
    cancel: &CancelToken,
) -> TypeckResult {
    let mut symbols = SymbolTable::new();
    let intrinsics = builtins::install(&mut symbols);
    let mut ctx = InferCtx::new();
    let mut promises = PromiseStore::new();
    let mut diagnostics = Diagnostics::new();

    let file = parse.tree();
    let (untyped, constraints) = bind::Binder::bind(
        &file,
        &mut symbols,
        &mut ctx,
        &mut promises,
        &mut diagnostics,
        &intrinsics,
        provider,
    );

    if !cancel.is_cancelled() {
        solve::Solver::new(constraints).solve(
            &mut ctx,
            &symbols,
            &intrinsics,
            &mut promises,
            &mut diagnostics,
            cancel,
        );
    }

    let bound = bound::finalize(&untyped, &mut ctx, &promises, &mut symbols);

    TypeckResult {
        symbols,
        untyped,
        bound,
        diagnostics,
        intrinsics,
    }
}
