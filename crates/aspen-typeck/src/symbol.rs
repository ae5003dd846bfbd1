//! The symbol model: an arena of symbols forming a DAG rooted at the
//! compilation's root module.
//!
//! Symbols are allocated into a `Vec` and addressed by `SymbolId`; parent
//! links are plain back-references (indices), so the graph has no ownership
//! cycles. Functions with the same name in one scope form an overload set;
//! built-in operators are overload sets of intrinsic-tagged function
//! symbols that IR lowering maps onto instructions.

use std::fmt;

use crate::ty::Ty;

/// Index of a symbol in the [`SymbolTable`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

/// Symbol visibility. Declarations default to `Internal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Internal,
    Public,
}

/// The built-in operation a function symbol stands for, if any.
///
/// IR lowering keys instruction selection off the resolved operator
/// symbol's intrinsic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intrinsic {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    /// Mathematical modulus, lowered as `(a rem b + b) rem b`.
    Mod,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Equal,
    NotEqual,
    /// Unary negation, lowered as `x * -1`.
    Neg,
    /// Unary plus.
    Identity,
    /// Conversion of an interpolated value to `string`.
    ToString,
    /// String concatenation.
    Concat,
    /// The `length` property of arrays.
    ArrayLength,
}

/// Payload of a function symbol.
#[derive(Debug, Clone)]
pub struct FunctionSymbol {
    /// Parameter symbols, in order.
    pub params: Vec<SymbolId>,
    /// Declared type parameters, in order.
    pub type_params: Vec<SymbolId>,
    pub return_ty: Ty,
    /// Whether the last parameter is variadic.
    pub is_variadic: bool,
    /// Set for built-in operator functions.
    pub intrinsic: Option<Intrinsic>,
}

/// What a symbol is.
#[derive(Debug, Clone)]
pub enum SymbolKind {
    /// A module; members are added as they are declared.
    Module { members: Vec<SymbolId> },
    /// A named type (primitive or imported). `ty` is the denoted type;
    /// imported types carry their member symbols.
    Type { ty: Ty, members: Vec<SymbolId> },
    /// A generic type parameter; `param_id` keys `Ty::Param`.
    TypeParam { param_id: u32 },
    Function(FunctionSymbol),
    Parameter {
        ty: Ty,
        index: usize,
        variadic: bool,
    },
    Local { ty: Ty, mutable: bool },
    Global { ty: Ty, mutable: bool },
    /// A field of an externally provided type.
    Field { ty: Ty },
    /// A computed member, e.g. the `length` of an array.
    Property { ty: Ty, intrinsic: Option<Intrinsic> },
    Label,
}

/// One symbol: name, containment back-reference, visibility, payload.
#[derive(Debug, Clone)]
pub struct SymbolData {
    pub name: Option<String>,
    pub parent: Option<SymbolId>,
    pub visibility: Visibility,
    pub kind: SymbolKind,
}

/// Arena of all symbols created during a compilation. Symbols are created
/// on first need and retained for the compilation's lifetime.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<SymbolData>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, data: SymbolData) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(data);
        id
    }

    pub fn get(&self, id: SymbolId) -> &SymbolData {
        &self.symbols[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut SymbolData {
        &mut self.symbols[id.0 as usize]
    }

    pub fn name(&self, id: SymbolId) -> &str {
        self.get(id).name.as_deref().unwrap_or("<anonymous>")
    }

    /// Add a member to a module symbol.
    pub fn add_member(&mut self, module: SymbolId, member: SymbolId) {
        if let SymbolKind::Module { members } = &mut self.get_mut(module).kind {
            members.push(member);
        }
    }

    /// The function symbol payload, if `id` is a function.
    pub fn function(&self, id: SymbolId) -> Option<&FunctionSymbol> {
        match &self.get(id).kind {
            SymbolKind::Function(f) => Some(f),
            _ => None,
        }
    }

    /// The declared type of a parameter symbol.
    pub fn param_ty(&self, id: SymbolId) -> Ty {
        match &self.get(id).kind {
            SymbolKind::Parameter { ty, .. } => ty.clone(),
            _ => Ty::Error,
        }
    }

    /// The type of a value symbol (parameter, local, global, field,
    /// property); functions get their signature type.
    pub fn value_ty(&self, id: SymbolId) -> Ty {
        match &self.get(id).kind {
            SymbolKind::Parameter { ty, .. }
            | SymbolKind::Local { ty, .. }
            | SymbolKind::Global { ty, .. }
            | SymbolKind::Field { ty }
            | SymbolKind::Property { ty, .. } => ty.clone(),
            SymbolKind::Function(_) => self.function_ty(id),
            _ => Ty::Error,
        }
    }

    /// Build the `func(params): ret` signature type of a function symbol.
    pub fn function_ty(&self, id: SymbolId) -> Ty {
        match self.function(id) {
            Some(f) => {
                let params = f.params.iter().map(|&p| self.param_ty(p)).collect();
                Ty::fun(params, f.return_ty.clone())
            }
            None => Ty::Error,
        }
    }

    /// Dotted path of a symbol from the root, used for symbolic references
    /// in IR and diagnostics.
    pub fn qualified_name(&self, id: SymbolId) -> String {
        let mut parts = Vec::new();
        let mut current = Some(id);
        while let Some(c) = current {
            let data = self.get(c);
            if let Some(name) = &data.name {
                parts.push(name.clone());
            }
            current = data.parent;
        }
        parts.reverse();
        parts.join(".")
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sym{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(table: &mut SymbolTable, name: &str, parent: Option<SymbolId>) -> SymbolId {
        table.alloc(SymbolData {
            name: Some(name.to_string()),
            parent,
            visibility: Visibility::Internal,
            kind: SymbolKind::Module {
                members: Vec::new(),
            },
        })
    }

    #[test]
    fn qualified_names_walk_parents() {
        let mut table = SymbolTable::new();
        let root = table.alloc(SymbolData {
            name: None,
            parent: None,
            visibility: Visibility::Internal,
            kind: SymbolKind::Module {
                members: Vec::new(),
            },
        });
        let outer = module(&mut table, "outer", Some(root));
        let inner = module(&mut table, "inner", Some(outer));
        table.add_member(root, outer);
        table.add_member(outer, inner);
        assert_eq!(table.qualified_name(inner), "outer.inner");
    }

    #[test]
    fn function_ty_collects_param_types() {
        let mut table = SymbolTable::new();
        let p0 = table.alloc(SymbolData {
            name: Some("x".to_string()),
            parent: None,
            visibility: Visibility::Internal,
            kind: SymbolKind::Parameter {
                ty: Ty::int32(),
                index: 0,
                variadic: false,
            },
        });
        let f = table.alloc(SymbolData {
            name: Some("f".to_string()),
            parent: None,
            visibility: Visibility::Internal,
            kind: SymbolKind::Function(FunctionSymbol {
                params: vec![p0],
                type_params: Vec::new(),
                return_ty: Ty::bool(),
                is_variadic: false,
                intrinsic: None,
            }),
        });
        assert_eq!(table.function_ty(f), Ty::fun(vec![Ty::int32()], Ty::bool()));
    }
}
