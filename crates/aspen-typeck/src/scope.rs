//! Lexical scope stack for the binder.
//!
//! Each scope maps names to the symbols declared under that name; multiple
//! symbols under one name form an overload set (legal only for functions,
//! which the binder checks at declaration time). Lookup walks outward and
//! returns the innermost scope that knows the name, so inner declarations
//! shadow outer ones wholesale.

use rustc_hash::FxHashMap;

use crate::symbol::SymbolId;

/// What kind of construct opened a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    CompilationUnit,
    Module,
    Function,
    FunctionBody,
    Block,
    While,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    names: FxHashMap<String, Vec<SymbolId>>,
}

/// The binder's stack of lexical scopes.
#[derive(Debug, Default)]
pub(crate) struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope {
            kind,
            names: FxHashMap::default(),
        });
    }

    pub(crate) fn pop(&mut self) {
        self.scopes.pop();
    }

    /// Declare a symbol in the innermost scope. Repeated declarations of
    /// one name accumulate into an overload set.
    pub(crate) fn declare(&mut self, name: &str, symbol: SymbolId) {
        let scope = self.scopes.last_mut().expect("scope stack is never empty");
        scope.names.entry(name.to_string()).or_default().push(symbol);
    }

    /// All symbols already declared under `name` in the innermost scope.
    pub(crate) fn declared_in_current(&self, name: &str) -> &[SymbolId] {
        self.scopes
            .last()
            .and_then(|s| s.names.get(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Resolve a name: the symbol set of the innermost scope that declares
    /// it, or an empty slice.
    pub(crate) fn lookup(&self, name: &str) -> &[SymbolId] {
        for scope in self.scopes.iter().rev() {
            if let Some(symbols) = scope.names.get(name) {
                return symbols;
            }
        }
        &[]
    }

    /// Whether any enclosing scope is a function body (i.e. we are in a
    /// local context).
    pub(crate) fn in_local_context(&self) -> bool {
        self.scopes
            .iter()
            .any(|s| matches!(s.kind, ScopeKind::FunctionBody))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_scopes_shadow_outer() {
        let mut scopes = ScopeStack::new();
        scopes.push(ScopeKind::CompilationUnit);
        scopes.declare("x", SymbolId(0));
        scopes.push(ScopeKind::Block);
        scopes.declare("x", SymbolId(1));
        assert_eq!(scopes.lookup("x"), &[SymbolId(1)]);
        scopes.pop();
        assert_eq!(scopes.lookup("x"), &[SymbolId(0)]);
    }

    #[test]
    fn same_scope_accumulates_overloads() {
        let mut scopes = ScopeStack::new();
        scopes.push(ScopeKind::CompilationUnit);
        scopes.declare("f", SymbolId(0));
        scopes.declare("f", SymbolId(1));
        assert_eq!(scopes.lookup("f"), &[SymbolId(0), SymbolId(1)]);
    }

    #[test]
    fn unknown_names_resolve_to_nothing() {
        let mut scopes = ScopeStack::new();
        scopes.push(ScopeKind::CompilationUnit);
        assert!(scopes.lookup("nope").is_empty());
    }
}
