//! Abstract symbol provider for externally defined symbols.
//!
//! The compiler core never parses object files or metadata formats; a host
//! hands it an implementation of [`SymbolProvider`] and the binder creates
//! symbols for external types on first reference, caching them per
//! assembly. Providers are constructed before compilation and never
//! mutated afterwards.

use crate::symbol::Visibility;
use crate::ty::Ty;

/// A named member of an external type.
#[derive(Debug, Clone)]
pub struct MemberDescriptor {
    pub name: String,
    pub kind: MemberKind,
}

#[derive(Debug, Clone)]
pub enum MemberKind {
    Field { ty: Ty },
    Property { ty: Ty },
    Function { params: Vec<Ty>, ret: Ty },
}

/// An external type as the provider describes it.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    pub name: String,
    pub is_value_type: bool,
    pub visibility: Visibility,
    pub generic_params: Vec<String>,
    pub members: Vec<MemberDescriptor>,
}

/// One external assembly: a namespace-qualified collection of types.
#[derive(Debug, Default)]
pub struct Assembly {
    pub name: String,
    types: Vec<((String, String), TypeDescriptor)>,
}

impl Assembly {
    pub fn new(name: impl Into<String>) -> Self {
        Assembly {
            name: name.into(),
            types: Vec::new(),
        }
    }

    pub fn add_type(
        &mut self,
        namespace: impl Into<String>,
        descriptor: TypeDescriptor,
    ) -> &mut Self {
        self.types
            .push(((namespace.into(), descriptor.name.clone()), descriptor));
        self
    }

    /// Look up a type by namespace path and name.
    pub fn lookup_type(&self, namespace: &str, name: &str) -> Option<&TypeDescriptor> {
        self.types
            .iter()
            .find(|((ns, n), _)| ns == namespace && n == name)
            .map(|(_, d)| d)
    }

    /// All types of the assembly, in declaration order.
    pub fn types(&self) -> impl Iterator<Item = (&str, &TypeDescriptor)> {
        self.types.iter().map(|((ns, _), d)| (ns.as_str(), d))
    }
}

/// The interface the core consumes to see the outside world.
pub trait SymbolProvider {
    /// Look up an assembly by name. Returning `None` means the assembly is
    /// unknown; the reference becomes an `UndefinedReference` diagnostic.
    fn assembly(&self, name: &str) -> Option<&Assembly>;
}

/// A provider that knows nothing. Used when compiling self-contained
/// sources.
#[derive(Debug, Default)]
pub struct NullProvider;

impl SymbolProvider for NullProvider {
    fn assembly(&self, _name: &str) -> Option<&Assembly> {
        None
    }
}

/// A provider backed by in-memory assemblies, used by hosts and tests.
#[derive(Debug, Default)]
pub struct StaticProvider {
    assemblies: Vec<Assembly>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_assembly(&mut self, assembly: Assembly) -> &mut Self {
        self.assemblies.push(assembly);
        self
    }
}

impl SymbolProvider for StaticProvider {
    fn assembly(&self, name: &str) -> Option<&Assembly> {
        self.assemblies.iter().find(|a| a.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_provider_round_trip() {
        let mut assembly = Assembly::new("runtime");
        assembly.add_type(
            "system",
            TypeDescriptor {
                name: "Console".to_string(),
                is_value_type: false,
                visibility: Visibility::Public,
                generic_params: Vec::new(),
                members: vec![MemberDescriptor {
                    name: "write".to_string(),
                    kind: MemberKind::Function {
                        params: vec![Ty::string()],
                        ret: Ty::unit(),
                    },
                }],
            },
        );
        let mut provider = StaticProvider::new();
        provider.add_assembly(assembly);

        let found = provider
            .assembly("runtime")
            .and_then(|a| a.lookup_type("system", "Console"))
            .expect("type is visible through the provider");
        assert_eq!(found.members.len(), 1);
        assert!(provider.assembly("other").is_none());
    }
}
