//! Intrinsic symbols: primitive types, built-in operators, and the helper
//! functions string lowering relies on.
//!
//! Nothing here is process-wide state; `install` populates a fresh symbol
//! table per compilation and hands back the handles in an [`Intrinsics`]
//! value that is threaded through binder, solver, and lowering.

use rustc_hash::FxHashMap;

use crate::symbol::{
    FunctionSymbol, Intrinsic, SymbolData, SymbolId, SymbolKind, SymbolTable, Visibility,
};
use crate::ty::{Ty, TypeParam};

/// Handles to everything built in.
#[derive(Debug)]
pub struct Intrinsics {
    /// The compilation's root module.
    pub root_module: SymbolId,
    /// Primitive type names as they appear in source.
    pub types: Vec<(&'static str, SymbolId)>,
    /// Operator overload sets, keyed by operator spelling (`"+"`,
    /// `"unary-"`, ...). Candidate order is declaration order, which keeps
    /// overload scoring deterministic.
    pub operators: FxHashMap<&'static str, Vec<SymbolId>>,
    /// `func to_string<T>(value: T): string`, used by interpolation.
    pub to_string: SymbolId,
    /// `func concat(left: string, right: string): string`.
    pub concat: SymbolId,
    /// The `length` property of arrays.
    pub array_length: SymbolId,
    /// First generic parameter id free for user declarations.
    pub next_type_param_id: u32,
}

/// Create the intrinsic symbols in `symbols`.
pub fn install(symbols: &mut SymbolTable) -> Intrinsics {
    let root_module = symbols.alloc(SymbolData {
        name: None,
        parent: None,
        visibility: Visibility::Public,
        kind: SymbolKind::Module {
            members: Vec::new(),
        },
    });

    let mut types = Vec::new();
    for (name, ty) in [
        ("unit", Ty::unit()),
        ("bool", Ty::bool()),
        ("char", Ty::char()),
        ("int32", Ty::int32()),
        ("int64", Ty::int64()),
        ("float64", Ty::float64()),
        ("string", Ty::string()),
    ] {
        let id = symbols.alloc(SymbolData {
            name: Some(name.to_string()),
            parent: None,
            visibility: Visibility::Public,
            kind: SymbolKind::Type {
                ty,
                members: Vec::new(),
            },
        });
        types.push((name, id));
    }

    let mut operators: FxHashMap<&'static str, Vec<SymbolId>> = FxHashMap::default();
    let numeric = [Ty::int32(), Ty::int64(), Ty::float64()];
    let equatable = [
        Ty::int32(),
        Ty::int64(),
        Ty::float64(),
        Ty::bool(),
        Ty::char(),
        Ty::string(),
    ];

    for (name, intrinsic) in [
        ("+", Intrinsic::Add),
        ("-", Intrinsic::Sub),
        ("*", Intrinsic::Mul),
        ("/", Intrinsic::Div),
        ("rem", Intrinsic::Rem),
        ("mod", Intrinsic::Mod),
    ] {
        let group = operators.entry(name).or_default();
        for ty in &numeric {
            group.push(operator(symbols, name, &[ty.clone(), ty.clone()], ty.clone(), intrinsic));
        }
    }
    operators.get_mut("+").unwrap().push(operator(
        symbols,
        "+",
        &[Ty::string(), Ty::string()],
        Ty::string(),
        Intrinsic::Concat,
    ));

    for (name, intrinsic) in [
        ("<", Intrinsic::Less),
        ("<=", Intrinsic::LessEq),
        (">", Intrinsic::Greater),
        (">=", Intrinsic::GreaterEq),
    ] {
        let group = operators.entry(name).or_default();
        for ty in &numeric {
            group.push(operator(symbols, name, &[ty.clone(), ty.clone()], Ty::bool(), intrinsic));
        }
    }

    for (name, intrinsic) in [("==", Intrinsic::Equal), ("!=", Intrinsic::NotEqual)] {
        let group = operators.entry(name).or_default();
        for ty in &equatable {
            group.push(operator(symbols, name, &[ty.clone(), ty.clone()], Ty::bool(), intrinsic));
        }
    }

    for (name, intrinsic) in [("unary-", Intrinsic::Neg), ("unary+", Intrinsic::Identity)] {
        let group = operators.entry(name).or_default();
        for ty in &numeric {
            group.push(operator(symbols, name, &[ty.clone()], ty.clone(), intrinsic));
        }
    }

    // func to_string<T>(value: T): string
    let t_param_sym = symbols.alloc(SymbolData {
        name: Some("T".to_string()),
        parent: None,
        visibility: Visibility::Public,
        kind: SymbolKind::TypeParam { param_id: 0 },
    });
    let t = Ty::Param(TypeParam {
        id: 0,
        name: "T".to_string(),
    });
    let value_param = symbols.alloc(SymbolData {
        name: Some("value".to_string()),
        parent: None,
        visibility: Visibility::Public,
        kind: SymbolKind::Parameter {
            ty: t,
            index: 0,
            variadic: false,
        },
    });
    let to_string = symbols.alloc(SymbolData {
        name: Some("to_string".to_string()),
        parent: None,
        visibility: Visibility::Public,
        kind: SymbolKind::Function(FunctionSymbol {
            params: vec![value_param],
            type_params: vec![t_param_sym],
            return_ty: Ty::string(),
            is_variadic: false,
            intrinsic: Some(Intrinsic::ToString),
        }),
    });

    let concat = operator(
        symbols,
        "concat",
        &[Ty::string(), Ty::string()],
        Ty::string(),
        Intrinsic::Concat,
    );

    let array_length = symbols.alloc(SymbolData {
        name: Some("length".to_string()),
        parent: None,
        visibility: Visibility::Public,
        kind: SymbolKind::Property {
            ty: Ty::int32(),
            intrinsic: Some(Intrinsic::ArrayLength),
        },
    });

    Intrinsics {
        root_module,
        types,
        operators,
        to_string,
        concat,
        array_length,
        next_type_param_id: 1,
    }
}

/// Allocate one operator function symbol.
fn operator(
    symbols: &mut SymbolTable,
    name: &str,
    params: &[Ty],
    ret: Ty,
    intrinsic: Intrinsic,
) -> SymbolId {
    let param_ids = params
        .iter()
        .enumerate()
        .map(|(index, ty)| {
            symbols.alloc(SymbolData {
                name: None,
                parent: None,
                visibility: Visibility::Public,
                kind: SymbolKind::Parameter {
                    ty: ty.clone(),
                    index,
                    variadic: false,
                },
            })
        })
        .collect();
    symbols.alloc(SymbolData {
        name: Some(name.to_string()),
        parent: None,
        visibility: Visibility::Public,
        kind: SymbolKind::Function(FunctionSymbol {
            params: param_ids,
            type_params: Vec::new(),
            return_ty: ret,
            is_variadic: false,
            intrinsic: Some(intrinsic),
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_groups_are_complete() {
        let mut symbols = SymbolTable::new();
        let intrinsics = install(&mut symbols);
        // `+` has the three numeric overloads plus string concatenation.
        assert_eq!(intrinsics.operators["+"].len(), 4);
        assert_eq!(intrinsics.operators["<"].len(), 3);
        assert_eq!(intrinsics.operators["=="].len(), 6);
        assert_eq!(intrinsics.operators["unary-"].len(), 3);
        assert_eq!(intrinsics.operators["mod"].len(), 3);
    }

    #[test]
    fn operator_signatures_are_functions() {
        let mut symbols = SymbolTable::new();
        let intrinsics = install(&mut symbols);
        let plus_i32 = intrinsics.operators["+"][0];
        assert_eq!(
            symbols.function_ty(plus_i32),
            Ty::fun(vec![Ty::int32(), Ty::int32()], Ty::int32())
        );
        let f = symbols.function(plus_i32).unwrap();
        assert_eq!(f.intrinsic, Some(Intrinsic::Add));
    }
}
