//! Typed wrappers for type syntax.

use super::{ast_node, child_token, AstNode};
use crate::cst::{SyntaxNode, SyntaxToken};
use crate::syntax_kind::SyntaxKind;

/// Any type expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Name(NameType),
    Member(MemberType),
    Generic(GenericType),
}

impl Type {
    pub fn cast(node: SyntaxNode) -> Option<Type> {
        match node.kind() {
            SyntaxKind::NAME_TYPE => Some(Type::Name(NameType { syntax: node })),
            SyntaxKind::MEMBER_TYPE => Some(Type::Member(MemberType { syntax: node })),
            SyntaxKind::GENERIC_TYPE => Some(Type::Generic(GenericType { syntax: node })),
            _ => None,
        }
    }

    pub fn syntax(&self) -> &SyntaxNode {
        match self {
            Type::Name(t) => t.syntax(),
            Type::Member(t) => t.syntax(),
            Type::Generic(t) => t.syntax(),
        }
    }
}

ast_node!(NameType, NAME_TYPE);

impl NameType {
    pub fn ident(&self) -> Option<SyntaxToken> {
        child_token(&self.syntax, SyntaxKind::IDENT)
    }
}

ast_node!(MemberType, MEMBER_TYPE);

impl MemberType {
    /// The qualifying type to the left of the dot.
    pub fn base(&self) -> Option<Type> {
        self.syntax.children().find_map(Type::cast)
    }

    /// The member name to the right of the dot. Direct token child only --
    /// the base type's own name is nested inside `base()`.
    pub fn name(&self) -> Option<SyntaxToken> {
        child_token(&self.syntax, SyntaxKind::IDENT)
    }
}

ast_node!(GenericType, GENERIC_TYPE);

impl GenericType {
    pub fn base(&self) -> Option<Type> {
        self.syntax.children().find_map(Type::cast)
    }

    pub fn arg_list(&self) -> Option<GenericArgList> {
        super::child_node(&self.syntax)
    }
}

ast_node!(GenericArgList, GENERIC_ARG_LIST);

impl GenericArgList {
    pub fn types(&self) -> impl Iterator<Item = Type> + '_ {
        self.syntax.children().filter_map(Type::cast)
    }
}
