//! Typed wrappers for declarations and statements.

use super::{ast_node, child_node, child_nodes, child_token, AstNode};
use crate::ast::expr::{BlockExpr, Expr};
use crate::ast::ty::Type;
use crate::cst::{SyntaxNode, SyntaxToken};
use crate::syntax_kind::SyntaxKind;

// ── Source file ────────────────────────────────────────────────────────

ast_node!(SourceFile, SOURCE_FILE);

impl SourceFile {
    /// All top-level declarations, in source order.
    pub fn decls(&self) -> impl Iterator<Item = Decl> + '_ {
        self.syntax.children().filter_map(Decl::cast)
    }
}

// ── Declarations ───────────────────────────────────────────────────────

/// Any declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decl {
    Import(ImportDecl),
    Func(FuncDecl),
    Module(ModuleDecl),
    Variable(VariableDecl),
    Label(LabelDecl),
}

impl Decl {
    pub fn cast(node: SyntaxNode) -> Option<Decl> {
        match node.kind() {
            SyntaxKind::IMPORT_DECL => ImportDecl::cast(node).map(Decl::Import),
            SyntaxKind::FUNC_DECL => FuncDecl::cast(node).map(Decl::Func),
            SyntaxKind::MODULE_DECL => ModuleDecl::cast(node).map(Decl::Module),
            SyntaxKind::VARIABLE_DECL => VariableDecl::cast(node).map(Decl::Variable),
            SyntaxKind::LABEL_DECL => LabelDecl::cast(node).map(Decl::Label),
            _ => None,
        }
    }

    pub fn syntax(&self) -> &SyntaxNode {
        match self {
            Decl::Import(d) => d.syntax(),
            Decl::Func(d) => d.syntax(),
            Decl::Module(d) => d.syntax(),
            Decl::Variable(d) => d.syntax(),
            Decl::Label(d) => d.syntax(),
        }
    }
}

ast_node!(ImportDecl, IMPORT_DECL);

impl ImportDecl {
    /// The dotted path segments of the import.
    pub fn path_segments(&self) -> Vec<SyntaxToken> {
        self.syntax
            .children()
            .find(|n| n.kind() == SyntaxKind::IMPORT_PATH)
            .map(|path| {
                path.children_with_tokens()
                    .filter_map(|el| el.into_token())
                    .filter(|t| t.kind() == SyntaxKind::IDENT)
                    .collect()
            })
            .unwrap_or_default()
    }
}

ast_node!(FuncDecl, FUNC_DECL);

impl FuncDecl {
    pub fn visibility(&self) -> Option<Visibility> {
        child_node(&self.syntax)
    }

    pub fn name(&self) -> Option<SyntaxToken> {
        child_token(&self.syntax, SyntaxKind::IDENT)
    }

    pub fn type_params(&self) -> Option<TypeParamList> {
        child_node(&self.syntax)
    }

    pub fn param_list(&self) -> Option<ParamList> {
        child_node(&self.syntax)
    }

    /// The return type annotation, if declared.
    pub fn return_annotation(&self) -> Option<TypeAnnotation> {
        child_node(&self.syntax)
    }

    /// Block-form body: `{ ... }`.
    pub fn body_block(&self) -> Option<BlockExpr> {
        child_node(&self.syntax)
    }

    /// Inline-form body: `= expr;`.
    pub fn inline_body(&self) -> Option<InlineBody> {
        child_node(&self.syntax)
    }
}

ast_node!(Visibility, VISIBILITY);

impl Visibility {
    pub fn is_public(&self) -> bool {
        child_token(&self.syntax, SyntaxKind::PUBLIC_KW).is_some()
    }
}

ast_node!(TypeParamList, TYPE_PARAM_LIST);

impl TypeParamList {
    pub fn params(&self) -> impl Iterator<Item = TypeParam> + '_ {
        child_nodes(&self.syntax)
    }
}

ast_node!(TypeParam, TYPE_PARAM);

impl TypeParam {
    pub fn name(&self) -> Option<SyntaxToken> {
        child_token(&self.syntax, SyntaxKind::IDENT)
    }
}

ast_node!(ParamList, PARAM_LIST);

impl ParamList {
    pub fn params(&self) -> impl Iterator<Item = Param> + '_ {
        child_nodes(&self.syntax)
    }
}

ast_node!(Param, PARAM);

impl Param {
    /// Whether this parameter is marked variadic with `...`.
    pub fn is_variadic(&self) -> bool {
        child_token(&self.syntax, SyntaxKind::ELLIPSIS).is_some()
    }

    pub fn name(&self) -> Option<SyntaxToken> {
        child_token(&self.syntax, SyntaxKind::IDENT)
    }

    pub fn annotation(&self) -> Option<TypeAnnotation> {
        child_node(&self.syntax)
    }
}

ast_node!(TypeAnnotation, TYPE_ANNOTATION);

impl TypeAnnotation {
    pub fn ty(&self) -> Option<Type> {
        self.syntax.children().find_map(Type::cast)
    }
}

ast_node!(InlineBody, INLINE_BODY);

impl InlineBody {
    pub fn expr(&self) -> Option<Expr> {
        self.syntax.children().find_map(Expr::cast)
    }
}

ast_node!(ModuleDecl, MODULE_DECL);

impl ModuleDecl {
    pub fn visibility(&self) -> Option<Visibility> {
        child_node(&self.syntax)
    }

    pub fn name(&self) -> Option<SyntaxToken> {
        child_token(&self.syntax, SyntaxKind::IDENT)
    }

    pub fn decls(&self) -> impl Iterator<Item = Decl> + '_ {
        self.syntax.children().filter_map(Decl::cast)
    }
}

ast_node!(VariableDecl, VARIABLE_DECL);

impl VariableDecl {
    pub fn visibility(&self) -> Option<Visibility> {
        child_node(&self.syntax)
    }

    /// `var` declarations are mutable; `val` declarations are not.
    pub fn is_mutable(&self) -> bool {
        child_token(&self.syntax, SyntaxKind::VAR_KW).is_some()
    }

    pub fn name(&self) -> Option<SyntaxToken> {
        child_token(&self.syntax, SyntaxKind::IDENT)
    }

    pub fn annotation(&self) -> Option<TypeAnnotation> {
        child_node(&self.syntax)
    }

    pub fn initializer(&self) -> Option<Expr> {
        self.syntax.children().find_map(Expr::cast)
    }
}

ast_node!(LabelDecl, LABEL_DECL);

impl LabelDecl {
    pub fn name(&self) -> Option<SyntaxToken> {
        child_token(&self.syntax, SyntaxKind::IDENT)
    }
}

// ── Statements ─────────────────────────────────────────────────────────

/// Any statement inside a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Decl(DeclStmt),
    Expr(ExprStmt),
    NoOp(NoOpStmt),
}

impl Stmt {
    pub fn cast(node: SyntaxNode) -> Option<Stmt> {
        match node.kind() {
            SyntaxKind::DECL_STMT => DeclStmt::cast(node).map(Stmt::Decl),
            SyntaxKind::EXPR_STMT => ExprStmt::cast(node).map(Stmt::Expr),
            SyntaxKind::NO_OP_STMT => NoOpStmt::cast(node).map(Stmt::NoOp),
            _ => None,
        }
    }

    pub fn syntax(&self) -> &SyntaxNode {
        match self {
            Stmt::Decl(s) => s.syntax(),
            Stmt::Expr(s) => s.syntax(),
            Stmt::NoOp(s) => s.syntax(),
        }
    }
}

ast_node!(DeclStmt, DECL_STMT);

impl DeclStmt {
    pub fn decl(&self) -> Option<Decl> {
        self.syntax.children().find_map(Decl::cast)
    }
}

ast_node!(ExprStmt, EXPR_STMT);

impl ExprStmt {
    pub fn expr(&self) -> Option<Expr> {
        self.syntax.children().find_map(Expr::cast)
    }

    /// Whether the statement ends with an explicit semicolon. The last
    /// expression statement of a block without one is the block's value.
    pub fn has_semicolon(&self) -> bool {
        child_token(&self.syntax, SyntaxKind::SEMICOLON).is_some()
    }
}

ast_node!(NoOpStmt, NO_OP_STMT);
