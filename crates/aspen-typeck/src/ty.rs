//! Type representation for the Aspen type system.
//!
//! Defines the core `Ty` enum and type variables (`TyVar`). Two types play
//! special roles: `Never` is the bottom type inhabiting expressions that do
//! not produce a value (`return`, `goto`), and `Error` is the poison
//! absorber -- it unifies with everything so a single root cause does not
//! cascade into follow-on diagnostics.

use std::fmt;

/// A type variable, identified by a `u32` index into the unification table.
///
/// Type variables carry a single substitution slot managed by `ena`'s
/// union-find table; reading a variable returns its transitive
/// substitution.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TyVar(pub u32);

/// The built-in primitive types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PrimTy {
    Unit,
    Bool,
    Char,
    Int32,
    Int64,
    Float64,
    String,
}

impl PrimTy {
    pub fn name(self) -> &'static str {
        match self {
            PrimTy::Unit => "unit",
            PrimTy::Bool => "bool",
            PrimTy::Char => "char",
            PrimTy::Int32 => "int32",
            PrimTy::Int64 => "int64",
            PrimTy::Float64 => "float64",
            PrimTy::String => "string",
        }
    }
}

impl fmt::Display for PrimTy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A rigid generic type parameter, as declared by `func f<T>(...)`.
///
/// Unlike a type variable, a parameter never unifies with a concrete type;
/// instantiation replaces it with a fresh variable first.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeParam {
    pub id: u32,
    pub name: String,
}

/// An Aspen type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    /// An inference variable (resolved by unification).
    Var(TyVar),
    /// A primitive type.
    Prim(PrimTy),
    /// An array of the given rank.
    Array { elem: Box<Ty>, rank: u8 },
    /// A function type: `(params) -> ret`.
    Fun { params: Vec<Ty>, ret: Box<Ty> },
    /// A rigid generic type parameter.
    Param(TypeParam),
    /// The bottom type: expressions that never produce a value.
    Never,
    /// The poison type absorbed by unification.
    Error,
}

impl Ty {
    pub fn unit() -> Ty {
        Ty::Prim(PrimTy::Unit)
    }

    pub fn bool() -> Ty {
        Ty::Prim(PrimTy::Bool)
    }

    pub fn char() -> Ty {
        Ty::Prim(PrimTy::Char)
    }

    pub fn int32() -> Ty {
        Ty::Prim(PrimTy::Int32)
    }

    pub fn int64() -> Ty {
        Ty::Prim(PrimTy::Int64)
    }

    pub fn float64() -> Ty {
        Ty::Prim(PrimTy::Float64)
    }

    pub fn string() -> Ty {
        Ty::Prim(PrimTy::String)
    }

    pub fn array(elem: Ty) -> Ty {
        Ty::Array {
            elem: Box::new(elem),
            rank: 1,
        }
    }

    pub fn fun(params: Vec<Ty>, ret: Ty) -> Ty {
        Ty::Fun {
            params,
            ret: Box::new(ret),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Ty::Error)
    }

    /// Whether the type mentions `Error` anywhere.
    pub fn contains_error(&self) -> bool {
        match self {
            Ty::Error => true,
            Ty::Array { elem, .. } => elem.contains_error(),
            Ty::Fun { params, ret } => {
                params.iter().any(Ty::contains_error) || ret.contains_error()
            }
            _ => false,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Var(v) => write!(f, "?{}", v.0),
            Ty::Prim(p) => write!(f, "{p}"),
            Ty::Array { elem, rank: 1 } => write!(f, "Array<{elem}>"),
            Ty::Array { elem, rank } => write!(f, "Array{rank}<{elem}>"),
            Ty::Fun { params, ret } => {
                write!(f, "func(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, "): {ret}")
            }
            Ty::Param(p) => write!(f, "{}", p.name),
            Ty::Never => write!(f, "never"),
            Ty::Error => write!(f, "<error>"),
        }
    }
}

/// Structural equality where every type parameter matches every other.
///
/// Used to compare overload signatures: `func f<T>(x: T)` and
/// `func f<U>(x: U)` declare the same signature.
pub fn signature_match(a: &Ty, b: &Ty) -> bool {
    match (a, b) {
        (Ty::Param(_), Ty::Param(_)) => true,
        (Ty::Array { elem: e1, rank: r1 }, Ty::Array { elem: e2, rank: r2 }) => {
            r1 == r2 && signature_match(e1, e2)
        }
        (
            Ty::Fun {
                params: p1,
                ret: r1,
            },
            Ty::Fun {
                params: p2,
                ret: r2,
            },
        ) => {
            p1.len() == p2.len()
                && p1.iter().zip(p2).all(|(x, y)| signature_match(x, y))
                && signature_match(r1, r2)
        }
        _ => a == b,
    }
}

// ── ena trait implementations ──────────────────────────────────────────

impl ena::unify::UnifyKey for TyVar {
    type Value = Option<Ty>;

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        TyVar(u)
    }

    fn tag() -> &'static str {
        "TyVar"
    }
}

impl ena::unify::EqUnifyValue for Ty {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        assert_eq!(Ty::int32().to_string(), "int32");
        assert_eq!(Ty::array(Ty::int32()).to_string(), "Array<int32>");
        assert_eq!(
            Ty::fun(vec![Ty::int32(), Ty::string()], Ty::bool()).to_string(),
            "func(int32, string): bool"
        );
        assert_eq!(Ty::Never.to_string(), "never");
        assert_eq!(Ty::Error.to_string(), "<error>");
    }

    #[test]
    fn signature_match_ignores_parameter_names() {
        let t = Ty::Param(TypeParam {
            id: 0,
            name: "T".to_string(),
        });
        let u = Ty::Param(TypeParam {
            id: 1,
            name: "U".to_string(),
        });
        let f1 = Ty::fun(vec![t.clone()], t.clone());
        let f2 = Ty::fun(vec![u.clone()], u);
        assert!(signature_match(&f1, &f2));
        assert!(!signature_match(&f1, &Ty::fun(vec![Ty::int32()], t)));
    }

    #[test]
    fn contains_error_looks_inside() {
        assert!(Ty::fun(vec![Ty::Error], Ty::unit()).contains_error());
        assert!(!Ty::array(Ty::int32()).contains_error());
    }
}
