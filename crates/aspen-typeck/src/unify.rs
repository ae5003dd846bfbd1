//! Unification engine for the constraint solver.
//!
//! Wraps `ena`'s union-find table. Each type variable has a single
//! substitution slot; reading a variable follows its transitive
//! substitution with path compression. `Error` absorbs both sides of any
//! unification so one root cause never cascades, and `Never` (the bottom
//! type) unifies with everything.
//!
//! `unify` does not report diagnostics itself: it returns the resolved
//! mismatch and the constraint that asked decides whether to report or
//! suppress it.

use ena::unify::InPlaceUnificationTable;
use rustc_hash::FxHashMap;

use crate::ty::{Ty, TyVar};

/// A failed unification: the two resolved types that would not line up.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub expected: Ty,
    pub got: Ty,
}

/// The inference context: owns the unification table.
pub struct InferCtx {
    table: InPlaceUnificationTable<TyVar>,
}

impl InferCtx {
    pub fn new() -> Self {
        InferCtx {
            table: InPlaceUnificationTable::new(),
        }
    }

    // ── Type variable creation ─────────────────────────────────────────

    /// Create a fresh, unbound type variable.
    pub fn fresh_var(&mut self) -> Ty {
        Ty::Var(self.table.new_key(None))
    }

    // ── Resolution ─────────────────────────────────────────────────────

    /// Resolve a type by following union-find indirection.
    ///
    /// Unbound variables normalize to their root key so that variables in
    /// the same equivalence class resolve to the same representative.
    pub fn resolve(&mut self, ty: &Ty) -> Ty {
        match ty {
            Ty::Var(v) => match self.table.probe_value(*v) {
                Some(inner) => self.resolve(&inner),
                None => Ty::Var(self.table.find(*v)),
            },
            Ty::Array { elem, rank } => Ty::Array {
                elem: Box::new(self.resolve(elem)),
                rank: *rank,
            },
            Ty::Fun { params, ret } => {
                let params = params.iter().map(|p| self.resolve(p)).collect();
                let ret = Box::new(self.resolve(ret));
                Ty::Fun { params, ret }
            }
            other => other.clone(),
        }
    }

    /// Resolve only the outermost layer: enough to know the shape.
    pub fn shallow_resolve(&mut self, ty: &Ty) -> Ty {
        match ty {
            Ty::Var(v) => match self.table.probe_value(*v) {
                Some(inner) => self.shallow_resolve(&inner),
                None => Ty::Var(self.table.find(*v)),
            },
            other => other.clone(),
        }
    }

    // ── Occurs check ───────────────────────────────────────────────────

    /// Whether `var` occurs anywhere within `ty`. Prevents infinite types.
    pub fn occurs_in(&mut self, var: TyVar, ty: &Ty) -> bool {
        match ty {
            Ty::Var(v) => {
                if self.table.find(*v) == self.table.find(var) {
                    return true;
                }
                match self.table.probe_value(*v) {
                    Some(inner) => self.occurs_in(var, &inner),
                    None => false,
                }
            }
            Ty::Array { elem, .. } => self.occurs_in(var, elem),
            Ty::Fun { params, ret } => {
                params.iter().any(|p| self.occurs_in(var, p)) || self.occurs_in(var, ret)
            }
            Ty::Prim(_) | Ty::Param(_) | Ty::Never | Ty::Error => false,
        }
    }

    // ── Unification ────────────────────────────────────────────────────

    /// Unify two types, making them equal.
    ///
    /// Variables substitute; two variables union; concrete types compare
    /// structurally. On mismatch the error carries both resolved types and
    /// nothing is bound -- the caller decides what to poison.
    pub fn unify(&mut self, a: &Ty, b: &Ty) -> Result<(), Mismatch> {
        let a = self.shallow_resolve(a);
        let b = self.shallow_resolve(b);

        match (a, b) {
            // Error is the poison sink: it absorbs anything, including
            // binding variables so dependent constraints see the poison.
            (Ty::Error, other) | (other, Ty::Error) => {
                if let Ty::Var(v) = other {
                    self.table
                        .unify_var_value(v, Some(Ty::Error))
                        .expect("binding an unbound var cannot fail");
                }
                Ok(())
            }

            (Ty::Var(v1), Ty::Var(v2)) => {
                self.table
                    .unify_var_var(v1, v2)
                    .expect("unifying two unbound vars cannot fail");
                Ok(())
            }

            (Ty::Var(v), ty) | (ty, Ty::Var(v)) => {
                if self.occurs_in(v, &ty) {
                    return Err(Mismatch {
                        expected: Ty::Var(v),
                        got: self.resolve(&ty),
                    });
                }
                self.table
                    .unify_var_value(v, Some(ty))
                    .expect("binding an unbound var after occurs check cannot fail");
                Ok(())
            }

            // Never is the bottom type: an expression that never produces
            // a value fits anywhere.
            (Ty::Never, _) | (_, Ty::Never) => Ok(()),

            (Ty::Prim(p1), Ty::Prim(p2)) if p1 == p2 => Ok(()),

            (Ty::Param(p1), Ty::Param(p2)) if p1.id == p2.id => Ok(()),

            (
                Ty::Array {
                    elem: e1,
                    rank: r1,
                },
                Ty::Array {
                    elem: e2,
                    rank: r2,
                },
            ) if r1 == r2 => self.unify(&e1, &e2),

            (
                Ty::Fun {
                    params: p1,
                    ret: r1,
                },
                Ty::Fun {
                    params: p2,
                    ret: r2,
                },
            ) if p1.len() == p2.len() => {
                for (x, y) in p1.iter().zip(p2.iter()) {
                    self.unify(x, y)?;
                }
                self.unify(&r1, &r2)
            }

            (a, b) => Err(Mismatch {
                expected: self.resolve(&a),
                got: self.resolve(&b),
            }),
        }
    }

    // ── Instantiation ──────────────────────────────────────────────────

    /// Replace the given type parameters throughout `ty` with their
    /// substitutions (fresh variables or explicit type arguments).
    pub fn substitute(&mut self, ty: &Ty, subst: &FxHashMap<u32, Ty>) -> Ty {
        match ty {
            Ty::Param(p) => subst.get(&p.id).cloned().unwrap_or_else(|| ty.clone()),
            Ty::Array { elem, rank } => Ty::Array {
                elem: Box::new(self.substitute(elem, subst)),
                rank: *rank,
            },
            Ty::Fun { params, ret } => Ty::Fun {
                params: params.iter().map(|p| self.substitute(p, subst)).collect(),
                ret: Box::new(self.substitute(ret, subst)),
            },
            other => other.clone(),
        }
    }
}

impl Default for InferCtx {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::TypeParam;

    #[test]
    fn unify_two_fresh_vars() {
        let mut ctx = InferCtx::new();
        let a = ctx.fresh_var();
        let b = ctx.fresh_var();

        assert!(ctx.unify(&a, &b).is_ok());
        assert!(ctx.unify(&a, &Ty::int32()).is_ok());
        assert_eq!(ctx.resolve(&a), Ty::int32());
        assert_eq!(ctx.resolve(&b), Ty::int32());
    }

    #[test]
    fn unification_is_symmetric() {
        let mut ctx = InferCtx::new();
        let a = ctx.fresh_var();
        assert!(ctx.unify(&Ty::string(), &a).is_ok());
        assert_eq!(ctx.resolve(&a), Ty::string());
    }

    #[test]
    fn unification_is_transitive() {
        let mut ctx = InferCtx::new();
        let a = ctx.fresh_var();
        let b = ctx.fresh_var();
        let c = ctx.fresh_var();
        assert!(ctx.unify(&a, &b).is_ok());
        assert!(ctx.unify(&b, &c).is_ok());
        assert!(ctx.unify(&c, &Ty::bool()).is_ok());
        assert_eq!(ctx.resolve(&a), Ty::bool());
    }

    #[test]
    fn mismatch_reports_both_types() {
        let mut ctx = InferCtx::new();
        let err = ctx.unify(&Ty::int32(), &Ty::string()).unwrap_err();
        assert_eq!(err.expected, Ty::int32());
        assert_eq!(err.got, Ty::string());
    }

    #[test]
    fn error_absorbs_everything() {
        let mut ctx = InferCtx::new();
        assert!(ctx.unify(&Ty::Error, &Ty::int32()).is_ok());
        assert!(ctx.unify(&Ty::string(), &Ty::Error).is_ok());

        // Error binds variables so dependents see the poison.
        let v = ctx.fresh_var();
        assert!(ctx.unify(&v, &Ty::Error).is_ok());
        assert_eq!(ctx.resolve(&v), Ty::Error);
        assert!(ctx.unify(&v, &Ty::int32()).is_ok(), "poisoned var absorbs");
    }

    #[test]
    fn never_unifies_with_anything() {
        let mut ctx = InferCtx::new();
        assert!(ctx.unify(&Ty::Never, &Ty::int32()).is_ok());
        assert!(ctx.unify(&Ty::unit(), &Ty::Never).is_ok());
    }

    #[test]
    fn occurs_check_rejects_infinite_types() {
        let mut ctx = InferCtx::new();
        let a = ctx.fresh_var();
        let fun = Ty::fun(vec![a.clone()], Ty::int32());
        assert!(ctx.unify(&a, &fun).is_err());
    }

    #[test]
    fn function_types_unify_structurally() {
        let mut ctx = InferCtx::new();
        let r = ctx.fresh_var();
        let f1 = Ty::fun(vec![Ty::int32()], r.clone());
        let f2 = Ty::fun(vec![Ty::int32()], Ty::bool());
        assert!(ctx.unify(&f1, &f2).is_ok());
        assert_eq!(ctx.resolve(&r), Ty::bool());

        let f3 = Ty::fun(vec![Ty::int32(), Ty::int32()], Ty::bool());
        assert!(ctx.unify(&f2, &f3).is_err(), "arity mismatch");
    }

    #[test]
    fn rigid_params_do_not_unify_with_concrete_types() {
        let mut ctx = InferCtx::new();
        let t = Ty::Param(TypeParam {
            id: 0,
            name: "T".to_string(),
        });
        assert!(ctx.unify(&t, &t.clone()).is_ok());
        assert!(ctx.unify(&t, &Ty::int32()).is_err());
    }

    #[test]
    fn substitute_replaces_params() {
        let mut ctx = InferCtx::new();
        let t = TypeParam {
            id: 7,
            name: "T".to_string(),
        };
        let sig = Ty::fun(vec![Ty::Param(t.clone())], Ty::Param(t));
        let mut subst = FxHashMap::default();
        subst.insert(7, Ty::int32());
        let inst = ctx.substitute(&sig, &subst);
        assert_eq!(inst, Ty::fun(vec![Ty::int32()], Ty::int32()));
    }
}
