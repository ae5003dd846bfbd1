//! The binder: walks syntax, builds the symbol and scope structure, and
//! produces the untyped tree together with the constraints the solver
//! needs to finish the job.
//!
//! Binding is two-pass per declarative region (file, module body, block):
//! declarations are created first so forward references work, then bodies
//! are bound. Name references are classified by context -- value, type,
//! label, module -- and a reference whose classification does not fit its
//! use site gets `IllegalReferenceContext` (a call's callee in particular
//! must not be a bare type name).

use aspen_common::diagnostics::{DiagnosticKind, Diagnostics};
use aspen_common::span::Span;
use aspen_parser::ast::expr as ast_expr;
use aspen_parser::ast::item as ast_item;
use aspen_parser::ast::ty as ast_ty;
use aspen_parser::ast::AstNode;
use aspen_parser::cst::{SyntaxNode, SyntaxToken};
use aspen_parser::syntax_kind::SyntaxKind;
use rustc_hash::FxHashMap;

use crate::builtins::Intrinsics;
use crate::provider::{MemberKind, SymbolProvider};
use crate::scope::{ScopeKind, ScopeStack};
use crate::solve::{Constraint, MemberConstraint, OverloadConstraint, PromiseStore};
use crate::symbol::{
    FunctionSymbol, SymbolData, SymbolId, SymbolKind, SymbolTable, Visibility,
};
use crate::ty::{Ty, TypeParam};
use crate::unify::InferCtx;
use crate::untyped::{
    ConstValue, LogicalOp, UntypedCallee, UntypedComparison, UntypedExpr, UntypedFunction,
    UntypedGlobal, UntypedLValue, UntypedProgram, UntypedStmt, UntypedStringPart,
};

fn span_of(node: &SyntaxNode) -> Span {
    let range = node.text_range();
    Span::new(range.start().into(), range.end().into())
}

fn span_of_token(token: &SyntaxToken) -> Span {
    let range = token.text_range();
    Span::new(range.start().into(), range.end().into())
}

/// How a name or path resolves before a use site claims it.
enum Res {
    Value(UntypedExpr),
    Group {
        name: String,
        candidates: Vec<SymbolId>,
    },
    Module(SymbolId),
    Type(SymbolId),
    /// Resolution failed and the failure is already reported.
    Missing,
}

pub(crate) struct Binder<'a> {
    symbols: &'a mut SymbolTable,
    ctx: &'a mut InferCtx,
    promises: &'a mut PromiseStore,
    diagnostics: &'a mut Diagnostics,
    intrinsics: &'a Intrinsics,
    provider: &'a dyn SymbolProvider,
    scopes: ScopeStack,
    constraints: Vec<Constraint>,
    functions: Vec<UntypedFunction>,
    globals: Vec<UntypedGlobal>,
    /// Declaration node -> its symbol, filled by the declare passes.
    decl_symbols: FxHashMap<SyntaxNode, SymbolId>,
    /// Stack of enclosing function return types.
    return_types: Vec<Ty>,
    next_type_param_id: u32,
    /// External symbols created so far, keyed by dotted path.
    external_cache: FxHashMap<String, Option<SymbolId>>,
}

impl<'a> Binder<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn bind(
        file: &ast_item::SourceFile,
        symbols: &'a mut SymbolTable,
        ctx: &'a mut InferCtx,
        promises: &'a mut PromiseStore,
        diagnostics: &'a mut Diagnostics,
        intrinsics: &'a Intrinsics,
        provider: &'a dyn SymbolProvider,
    ) -> (UntypedProgram, Vec<Constraint>) {
        let next_type_param_id = intrinsics.next_type_param_id;
        let mut binder = Binder {
            symbols,
            ctx,
            promises,
            diagnostics,
            intrinsics,
            provider,
            scopes: ScopeStack::new(),
            constraints: Vec::new(),
            functions: Vec::new(),
            globals: Vec::new(),
            decl_symbols: FxHashMap::default(),
            return_types: Vec::new(),
            next_type_param_id,
            external_cache: FxHashMap::default(),
        };
        binder.bind_source_file(file);
        (
            UntypedProgram {
                functions: binder.functions,
                globals: binder.globals,
            },
            binder.constraints,
        )
    }

    fn bind_source_file(&mut self, file: &ast_item::SourceFile) {
        self.scopes.push(ScopeKind::CompilationUnit);
        for (name, symbol) in &self.intrinsics.types {
            self.scopes.declare(name, *symbol);
        }
        self.scopes.declare("to_string", self.intrinsics.to_string);

        let root = self.intrinsics.root_module;
        for decl in file.decls() {
            self.declare_decl(&decl, root);
        }
        for decl in file.decls() {
            self.bind_decl(&decl);
        }
        self.scopes.pop();
    }

    // ── Declare pass ───────────────────────────────────────────────────

    fn declare_decl(&mut self, decl: &ast_item::Decl, parent: SymbolId) {
        match decl {
            ast_item::Decl::Func(f) => {
                self.declare_function(f, parent);
            }
            ast_item::Decl::Variable(v) => {
                self.declare_global(v, parent);
            }
            ast_item::Decl::Module(m) => {
                self.declare_module(m, parent);
            }
            // Imports take effect in the bind pass; labels are declared by
            // the block that contains them.
            ast_item::Decl::Import(_) | ast_item::Decl::Label(_) => {}
        }
    }

    fn visibility_of(vis: Option<ast_item::Visibility>) -> Visibility {
        match vis {
            Some(v) if v.is_public() => Visibility::Public,
            _ => Visibility::Internal,
        }
    }

    fn declare_function(&mut self, f: &ast_item::FuncDecl, parent: SymbolId) -> SymbolId {
        let name = f.name().map(|t| t.text().to_string());

        // Type parameters come first: parameter and return types may
        // reference them, so resolve signatures inside a scope that knows
        // them.
        self.scopes.push(ScopeKind::Function);
        let mut type_params = Vec::new();
        if let Some(list) = f.type_params() {
            for tp in list.params() {
                let Some(tp_name) = tp.name() else { continue };
                let param_id = self.next_type_param_id;
                self.next_type_param_id += 1;
                let symbol = self.symbols.alloc(SymbolData {
                    name: Some(tp_name.text().to_string()),
                    parent: None,
                    visibility: Visibility::Internal,
                    kind: SymbolKind::TypeParam { param_id },
                });
                self.scopes.declare(tp_name.text(), symbol);
                type_params.push(symbol);
            }
        }

        let mut params = Vec::new();
        let mut is_variadic = false;
        if let Some(list) = f.param_list() {
            let all: Vec<_> = list.params().collect();
            let last_index = all.len().saturating_sub(1);
            for (index, param) in all.iter().enumerate() {
                let param_name = param.name().map(|t| t.text().to_string());
                let ty = match param.annotation().and_then(|a| a.ty()) {
                    Some(t) => self.resolve_type(&t),
                    None => Ty::Error,
                };
                let variadic = param.is_variadic();
                if variadic && index == last_index {
                    is_variadic = true;
                    if !matches!(ty, Ty::Array { rank: 1, .. } | Ty::Error) {
                        self.diagnostics.report(
                            DiagnosticKind::VariadicParameterNotArray {
                                name: param_name.clone().unwrap_or_default(),
                            },
                            span_of(param.syntax()),
                        );
                    }
                } else if variadic {
                    self.diagnostics.report(
                        DiagnosticKind::IllegalElementInContext {
                            what: "variadic marker on a non-final parameter".to_string(),
                        },
                        span_of(param.syntax()),
                    );
                }
                params.push(self.symbols.alloc(SymbolData {
                    name: param_name,
                    parent: None,
                    visibility: Visibility::Internal,
                    kind: SymbolKind::Parameter {
                        ty,
                        index,
                        variadic: variadic && index == last_index,
                    },
                }));
            }
        }

        let return_ty = match f.return_annotation().and_then(|a| a.ty()) {
            Some(t) => self.resolve_type(&t),
            None => Ty::unit(),
        };
        self.scopes.pop();

        let symbol = self.symbols.alloc(SymbolData {
            name: name.clone(),
            parent: Some(parent),
            visibility: Self::visibility_of(f.visibility()),
            kind: SymbolKind::Function(FunctionSymbol {
                params,
                type_params,
                return_ty,
                is_variadic,
                intrinsic: None,
            }),
        });
        self.symbols.add_member(parent, symbol);
        if let Some(name) = &name {
            self.scopes.declare(name, symbol);
        }
        self.decl_symbols.insert(f.syntax().clone(), symbol);
        symbol
    }

    fn declare_global(&mut self, v: &ast_item::VariableDecl, parent: SymbolId) -> SymbolId {
        let name = v.name().map(|t| t.text().to_string());
        let ty = self.declared_variable_ty(v, name.as_deref());
        let symbol = self.symbols.alloc(SymbolData {
            name: name.clone(),
            parent: Some(parent),
            visibility: Self::visibility_of(v.visibility()),
            kind: SymbolKind::Global {
                ty,
                mutable: v.is_mutable(),
            },
        });
        self.symbols.add_member(parent, symbol);
        if let Some(name) = &name {
            self.scopes.declare(name, symbol);
        }
        self.decl_symbols.insert(v.syntax().clone(), symbol);
        symbol
    }

    /// The declared type of a `var`/`val`: the annotation when present, a
    /// fresh variable when inference has an initializer to work with, and
    /// `Error` (with a diagnostic) when it has neither.
    fn declared_variable_ty(&mut self, v: &ast_item::VariableDecl, name: Option<&str>) -> Ty {
        if let Some(t) = v.annotation().and_then(|a| a.ty()) {
            return self.resolve_type(&t);
        }
        if v.initializer().is_some() {
            return self.ctx.fresh_var();
        }
        self.diagnostics.report(
            DiagnosticKind::CannotInferType {
                name: name.unwrap_or("<anonymous>").to_string(),
            },
            span_of(v.syntax()),
        );
        Ty::Error
    }

    fn declare_module(&mut self, m: &ast_item::ModuleDecl, parent: SymbolId) -> SymbolId {
        let name = m.name().map(|t| t.text().to_string());
        let symbol = self.symbols.alloc(SymbolData {
            name: name.clone(),
            parent: Some(parent),
            visibility: Self::visibility_of(m.visibility()),
            kind: SymbolKind::Module {
                members: Vec::new(),
            },
        });
        self.symbols.add_member(parent, symbol);
        if let Some(name) = &name {
            self.scopes.declare(name, symbol);
        }
        self.decl_symbols.insert(m.syntax().clone(), symbol);

        // Members register into a throwaway scope here; the bind pass
        // redeclares them when it opens the real module scope.
        self.scopes.push(ScopeKind::Module);
        for decl in m.decls() {
            self.declare_decl(&decl, symbol);
        }
        self.scopes.pop();
        symbol
    }

    // ── Bind pass ──────────────────────────────────────────────────────

    fn bind_decl(&mut self, decl: &ast_item::Decl) {
        match decl {
            ast_item::Decl::Func(f) => {
                if let Some(&symbol) = self.decl_symbols.get(f.syntax()) {
                    self.bind_function(f, symbol);
                }
            }
            ast_item::Decl::Variable(v) => {
                if let Some(&symbol) = self.decl_symbols.get(v.syntax()) {
                    self.bind_global(v, symbol);
                }
            }
            ast_item::Decl::Module(m) => {
                if let Some(&symbol) = self.decl_symbols.get(m.syntax()) {
                    self.bind_module(m, symbol);
                }
            }
            ast_item::Decl::Import(i) => self.bind_import(i),
            // A label declaration is only meaningful inside a block.
            ast_item::Decl::Label(_) => {}
        }
    }

    fn bind_module(&mut self, m: &ast_item::ModuleDecl, symbol: SymbolId) {
        self.scopes.push(ScopeKind::Module);
        let members: Vec<SymbolId> = match &self.symbols.get(symbol).kind {
            SymbolKind::Module { members } => members.clone(),
            _ => Vec::new(),
        };
        for member in members {
            if let Some(name) = self.symbols.get(member).name.clone() {
                self.scopes.declare(&name, member);
            }
        }
        for decl in m.decls() {
            self.bind_decl(&decl);
        }
        self.scopes.pop();
    }

    fn bind_global(&mut self, v: &ast_item::VariableDecl, symbol: SymbolId) {
        let ty = self.symbols.value_ty(symbol);
        let init = v.initializer().map(|e| {
            let bound = self.bind_expr(&e);
            self.constraints.push(Constraint::Assignable {
                target: ty.clone(),
                source: bound.ty(),
                span: span_of(e.syntax()),
            });
            bound
        });
        self.globals.push(UntypedGlobal {
            symbol,
            init,
            span: span_of(v.syntax()),
        });
    }

    fn bind_function(&mut self, f: &ast_item::FuncDecl, symbol: SymbolId) {
        let (params, type_params, return_ty) = match self.symbols.function(symbol) {
            Some(func) => (
                func.params.clone(),
                func.type_params.clone(),
                func.return_ty.clone(),
            ),
            None => return,
        };

        self.scopes.push(ScopeKind::Function);
        for tp in type_params {
            if let Some(name) = self.symbols.get(tp).name.clone() {
                self.scopes.declare(&name, tp);
            }
        }
        for param in params {
            if let Some(name) = self.symbols.get(param).name.clone() {
                self.scopes.declare(&name, param);
            }
        }
        self.return_types.push(return_ty.clone());

        let body = if let Some(block) = f.body_block() {
            let bound = self.bind_block(&block, ScopeKind::FunctionBody);
            // A trailing block value is the function's result.
            if let UntypedExpr::Block {
                value: Some(value), ..
            } = &bound
            {
                self.constraints.push(Constraint::Assignable {
                    target: return_ty.clone(),
                    source: value.ty(),
                    span: value.span().unwrap_or_else(|| span_of(block.syntax())),
                });
            }
            bound
        } else if let Some(inline) = f.inline_body() {
            match inline.expr() {
                Some(e) => {
                    let bound = self.bind_expr(&e);
                    self.constraints.push(Constraint::Assignable {
                        target: return_ty.clone(),
                        source: bound.ty(),
                        span: span_of(e.syntax()),
                    });
                    bound
                }
                None => UntypedExpr::Error,
            }
        } else {
            UntypedExpr::Error
        };

        self.return_types.pop();
        self.scopes.pop();
        self.functions.push(UntypedFunction {
            symbol,
            body,
            span: span_of(f.syntax()),
        });
    }

    fn bind_import(&mut self, import: &ast_item::ImportDecl) {
        let segments = import.path_segments();
        let Some(first) = segments.first() else {
            return;
        };

        let mut current: Option<SymbolId> = {
            let resolved = self.scopes.lookup(first.text());
            resolved
                .iter()
                .copied()
                .find(|&s| matches!(self.symbols.get(s).kind, SymbolKind::Module { .. }))
        };
        if current.is_none() {
            current = self.bind_external_import(&segments);
        }

        let Some(mut symbol) = current else {
            self.diagnostics.report(
                DiagnosticKind::UndefinedReference {
                    name: segments
                        .iter()
                        .map(|t| t.text().to_string())
                        .collect::<Vec<_>>()
                        .join("."),
                },
                span_of(import.syntax()),
            );
            return;
        };

        // Walk the remaining segments through module members when the
        // import resolved to a source module.
        if matches!(self.symbols.get(symbol).kind, SymbolKind::Module { .. }) {
            for segment in &segments[1..] {
                match self.module_member(symbol, segment.text()) {
                    Some(next) => symbol = next,
                    None => {
                        self.diagnostics.report(
                            DiagnosticKind::UndefinedReference {
                                name: segment.text().to_string(),
                            },
                            span_of_token(segment),
                        );
                        return;
                    }
                }
            }
        }

        if let Some(last) = segments.last() {
            self.scopes.declare(last.text(), symbol);
        }
    }

    /// Resolve an import path against the external symbol provider:
    /// assembly = first segment, namespace = middle, type = last. The
    /// created symbols are cached by dotted path, so repeated references
    /// reuse them.
    fn bind_external_import(&mut self, segments: &[SyntaxToken]) -> Option<SymbolId> {
        if segments.len() < 2 {
            return None;
        }
        let path: Vec<String> = segments.iter().map(|t| t.text().to_string()).collect();
        let key = path.join(".");
        if let Some(&cached) = self.external_cache.get(&key) {
            return cached;
        }

        let assembly = self.provider.assembly(&path[0]);
        let descriptor = assembly.and_then(|a| {
            let namespace = path[1..path.len() - 1].join(".");
            a.lookup_type(&namespace, &path[path.len() - 1])
        });
        let Some(descriptor) = descriptor else {
            self.external_cache.insert(key, None);
            return None;
        };
        let descriptor = descriptor.clone();

        let type_symbol = self.symbols.alloc(SymbolData {
            name: Some(descriptor.name.clone()),
            parent: None,
            visibility: descriptor.visibility,
            kind: SymbolKind::Type {
                ty: Ty::Error,
                members: Vec::new(),
            },
        });
        let mut members = Vec::new();
        for member in &descriptor.members {
            let kind = match &member.kind {
                MemberKind::Field { ty } => SymbolKind::Field { ty: ty.clone() },
                MemberKind::Property { ty } => SymbolKind::Property {
                    ty: ty.clone(),
                    intrinsic: None,
                },
                MemberKind::Function { params, ret } => {
                    let param_ids = params
                        .iter()
                        .enumerate()
                        .map(|(index, ty)| {
                            self.symbols.alloc(SymbolData {
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
                    SymbolKind::Function(FunctionSymbol {
                        params: param_ids,
                        type_params: Vec::new(),
                        return_ty: ret.clone(),
                        is_variadic: false,
                        intrinsic: None,
                    })
                }
            };
            members.push(self.symbols.alloc(SymbolData {
                name: Some(member.name.clone()),
                parent: Some(type_symbol),
                visibility: Visibility::Public,
                kind,
            }));
        }
        if let SymbolKind::Type {
            members: slot, ..
        } = &mut self.symbols.get_mut(type_symbol).kind
        {
            *slot = members;
        }

        self.external_cache.insert(key, Some(type_symbol));
        Some(type_symbol)
    }

    // ── Types ──────────────────────────────────────────────────────────

    fn resolve_type(&mut self, t: &ast_ty::Type) -> Ty {
        match t {
            ast_ty::Type::Name(name) => {
                let Some(ident) = name.ident() else {
                    return Ty::Error;
                };
                self.resolve_type_name(ident.text(), span_of_token(&ident))
            }
            ast_ty::Type::Member(member) => {
                let Some(base) = member.base() else {
                    return Ty::Error;
                };
                let Some(name) = member.name() else {
                    return Ty::Error;
                };
                self.resolve_member_type(&base, &name)
            }
            ast_ty::Type::Generic(generic) => self.resolve_generic_type(generic),
        }
    }

    fn resolve_type_name(&mut self, name: &str, span: Span) -> Ty {
        let resolved = self.scopes.lookup(name);
        match resolved {
            [] => {
                self.diagnostics
                    .report(DiagnosticKind::UndefinedReference { name: name.to_string() }, span);
                Ty::Error
            }
            [single] => match &self.symbols.get(*single).kind {
                SymbolKind::Type { ty, .. } => ty.clone(),
                SymbolKind::TypeParam { param_id } => Ty::Param(TypeParam {
                    id: *param_id,
                    name: name.to_string(),
                }),
                _ => {
                    self.diagnostics.report(
                        DiagnosticKind::IllegalReferenceContext {
                            name: name.to_string(),
                        },
                        span,
                    );
                    Ty::Error
                }
            },
            _ => {
                self.diagnostics.report(
                    DiagnosticKind::AmbiguousReference {
                        name: name.to_string(),
                    },
                    span,
                );
                Ty::Error
            }
        }
    }

    fn resolve_member_type(&mut self, base: &ast_ty::Type, name: &SyntaxToken) -> Ty {
        // Only module paths qualify types.
        let module = match base {
            ast_ty::Type::Name(n) => n.ident().and_then(|ident| {
                self.scopes
                    .lookup(ident.text())
                    .iter()
                    .copied()
                    .find(|&s| matches!(self.symbols.get(s).kind, SymbolKind::Module { .. }))
            }),
            _ => None,
        };
        let Some(module) = module else {
            self.diagnostics.report(
                DiagnosticKind::UndefinedReference {
                    name: name.text().to_string(),
                },
                span_of_token(name),
            );
            return Ty::Error;
        };
        match self.module_member(module, name.text()) {
            Some(member) => match &self.symbols.get(member).kind {
                SymbolKind::Type { ty, .. } => ty.clone(),
                _ => {
                    self.diagnostics.report(
                        DiagnosticKind::IllegalReferenceContext {
                            name: name.text().to_string(),
                        },
                        span_of_token(name),
                    );
                    Ty::Error
                }
            },
            None => {
                self.diagnostics.report(
                    DiagnosticKind::UndefinedReference {
                        name: name.text().to_string(),
                    },
                    span_of_token(name),
                );
                Ty::Error
            }
        }
    }

    fn resolve_generic_type(&mut self, generic: &ast_ty::GenericType) -> Ty {
        let args: Vec<Ty> = generic
            .arg_list()
            .map(|list| list.types().map(|t| self.resolve_type(&t)).collect())
            .unwrap_or_default();

        // `Array<T>` is the built-in generic type.
        if let Some(ast_ty::Type::Name(n)) = generic.base() {
            if n.ident().is_some_and(|t| t.text() == "Array") {
                if args.len() != 1 {
                    self.diagnostics.report(
                        DiagnosticKind::GenericArityMismatch {
                            expected: 1,
                            got: args.len(),
                        },
                        span_of(generic.syntax()),
                    );
                    return Ty::Error;
                }
                return Ty::array(args.into_iter().next().unwrap());
            }
        }

        let base = match generic.base() {
            Some(b) => self.resolve_type(&b),
            None => Ty::Error,
        };
        if base.is_error() {
            return Ty::Error;
        }
        self.diagnostics.report(
            DiagnosticKind::GenericArityMismatch {
                expected: 0,
                got: args.len(),
            },
            span_of(generic.syntax()),
        );
        Ty::Error
    }

    // ── Blocks and statements ──────────────────────────────────────────

    fn bind_block(&mut self, block: &ast_expr::BlockExpr, kind: ScopeKind) -> UntypedExpr {
        self.scopes.push(kind);

        // Labels and nested functions are visible in the whole block.
        for stmt in block.statements() {
            let ast_item::Stmt::Decl(decl_stmt) = stmt else {
                continue;
            };
            match decl_stmt.decl() {
                Some(ast_item::Decl::Label(label)) => {
                    let Some(name) = label.name() else { continue };
                    let symbol = self.symbols.alloc(SymbolData {
                        name: Some(name.text().to_string()),
                        parent: None,
                        visibility: Visibility::Internal,
                        kind: SymbolKind::Label,
                    });
                    self.scopes.declare(name.text(), symbol);
                    self.decl_symbols.insert(label.syntax().clone(), symbol);
                }
                Some(ast_item::Decl::Func(f)) => {
                    self.declare_function(&f, self.intrinsics.root_module);
                }
                _ => {}
            }
        }

        let tail = block.tail_expr();
        let mut statements = Vec::new();
        let mut value: Option<Box<UntypedExpr>> = None;

        for stmt in block.statements() {
            match stmt {
                ast_item::Stmt::NoOp(_) => {}
                ast_item::Stmt::Decl(decl_stmt) => {
                    if let Some(decl) = decl_stmt.decl() {
                        if let Some(bound) = self.bind_local_decl(&decl) {
                            statements.push(bound);
                        }
                    }
                }
                ast_item::Stmt::Expr(expr_stmt) => {
                    let Some(e) = expr_stmt.expr() else { continue };
                    let bound = self.bind_expr(&e);
                    let is_tail = tail
                        .as_ref()
                        .is_some_and(|t| t.syntax() == e.syntax());
                    if is_tail {
                        value = Some(Box::new(bound));
                    } else {
                        statements.push(UntypedStmt::Expr(bound));
                    }
                }
            }
        }

        self.scopes.pop();
        let ty = value.as_ref().map(|v| v.ty()).unwrap_or_else(Ty::unit);
        UntypedExpr::Block {
            statements,
            value,
            ty,
            span: span_of(block.syntax()),
        }
    }

    /// Bind one declaration appearing as a statement. Returns the
    /// statement to record, or `None` for declarations that only have
    /// scope effects (imports, nested functions).
    fn bind_local_decl(&mut self, decl: &ast_item::Decl) -> Option<UntypedStmt> {
        debug_assert!(
            self.scopes.in_local_context(),
            "local declarations bind inside function bodies"
        );
        match decl {
            ast_item::Decl::Variable(v) => {
                let name = v.name().map(|t| t.text().to_string());
                let ty = self.declared_variable_ty(v, name.as_deref());
                let init = v.initializer().map(|e| {
                    let bound = self.bind_expr(&e);
                    self.constraints.push(Constraint::Assignable {
                        target: ty.clone(),
                        source: bound.ty(),
                        span: span_of(e.syntax()),
                    });
                    bound
                });
                let symbol = self.symbols.alloc(SymbolData {
                    name: name.clone(),
                    parent: None,
                    visibility: Visibility::Internal,
                    kind: SymbolKind::Local {
                        ty,
                        mutable: v.is_mutable(),
                    },
                });
                // The name is visible only after its declaration.
                if let Some(name) = &name {
                    self.scopes.declare(name, symbol);
                }
                Some(UntypedStmt::Local {
                    symbol,
                    init,
                    span: span_of(v.syntax()),
                })
            }
            ast_item::Decl::Label(label) => {
                let symbol = *self.decl_symbols.get(label.syntax())?;
                Some(UntypedStmt::Label {
                    symbol,
                    span: span_of(label.syntax()),
                })
            }
            ast_item::Decl::Func(f) => {
                if let Some(&symbol) = self.decl_symbols.get(f.syntax()) {
                    self.bind_function(f, symbol);
                }
                None
            }
            ast_item::Decl::Import(i) => {
                self.bind_import(i);
                None
            }
            ast_item::Decl::Module(_) => {
                // Already rejected by the parser (wrapped in an error
                // node); nothing reaches here.
                None
            }
        }
    }

    // ── Names and paths ────────────────────────────────────────────────

    fn resolve_name(&mut self, name: &str, span: Span) -> Res {
        let resolved: Vec<SymbolId> = self.scopes.lookup(name).to_vec();
        if resolved.is_empty() {
            self.diagnostics
                .report(DiagnosticKind::UndefinedReference { name: name.to_string() }, span);
            return Res::Missing;
        }
        if resolved
            .iter()
            .all(|&s| matches!(self.symbols.get(s).kind, SymbolKind::Function(_)))
        {
            return Res::Group {
                name: name.to_string(),
                candidates: resolved,
            };
        }
        if resolved.len() > 1 {
            self.diagnostics.report(
                DiagnosticKind::AmbiguousReference {
                    name: name.to_string(),
                },
                span,
            );
            return Res::Missing;
        }
        let symbol = resolved[0];
        match &self.symbols.get(symbol).kind {
            SymbolKind::Local { ty, .. }
            | SymbolKind::Global { ty, .. }
            | SymbolKind::Parameter { ty, .. } => Res::Value(UntypedExpr::VarRef {
                symbol,
                ty: ty.clone(),
                span,
            }),
            SymbolKind::Module { .. } => Res::Module(symbol),
            SymbolKind::Type { .. } | SymbolKind::TypeParam { .. } => Res::Type(symbol),
            SymbolKind::Label => {
                self.diagnostics.report(
                    DiagnosticKind::IllegalReferenceContext {
                        name: name.to_string(),
                    },
                    span,
                );
                Res::Missing
            }
            _ => Res::Missing,
        }
    }

    fn module_member(&self, module: SymbolId, name: &str) -> Option<SymbolId> {
        let members = match &self.symbols.get(module).kind {
            SymbolKind::Module { members } => members,
            SymbolKind::Type { members, .. } => members,
            _ => return None,
        };
        members
            .iter()
            .copied()
            .find(|&m| self.symbols.get(m).name.as_deref() == Some(name))
    }

    fn module_member_group(&self, module: SymbolId, name: &str) -> Vec<SymbolId> {
        let members = match &self.symbols.get(module).kind {
            SymbolKind::Module { members } => members,
            SymbolKind::Type { members, .. } => members,
            _ => return Vec::new(),
        };
        members
            .iter()
            .copied()
            .filter(|&m| {
                self.symbols.get(m).name.as_deref() == Some(name)
                    && matches!(self.symbols.get(m).kind, SymbolKind::Function(_))
            })
            .collect()
    }

    /// Resolve an expression that may denote a path (name, member chain)
    /// rather than a value.
    fn resolve_expr_path(&mut self, e: &ast_expr::Expr) -> Res {
        match e {
            ast_expr::Expr::Name(name) => {
                let Some(ident) = name.ident() else {
                    return Res::Missing;
                };
                self.resolve_name(ident.text(), span_of_token(&ident))
            }
            ast_expr::Expr::Grouping(g) => match g.inner() {
                Some(inner) => self.resolve_expr_path(&inner),
                None => Res::Missing,
            },
            ast_expr::Expr::Member(member) => {
                let Some(receiver) = member.receiver() else {
                    return Res::Missing;
                };
                let Some(name) = member.name() else {
                    return Res::Missing;
                };
                let name_span = span_of_token(&name);
                match self.resolve_expr_path(&receiver) {
                    Res::Module(module) | Res::Type(module) => {
                        let group = self.module_member_group(module, name.text());
                        if !group.is_empty() {
                            return Res::Group {
                                name: name.text().to_string(),
                                candidates: group,
                            };
                        }
                        match self.module_member(module, name.text()) {
                            Some(symbol) => match &self.symbols.get(symbol).kind {
                                SymbolKind::Module { .. } => Res::Module(symbol),
                                SymbolKind::Type { .. } => Res::Type(symbol),
                                SymbolKind::Global { ty, .. }
                                | SymbolKind::Field { ty }
                                | SymbolKind::Property { ty, .. } => {
                                    Res::Value(UntypedExpr::VarRef {
                                        symbol,
                                        ty: ty.clone(),
                                        span: name_span,
                                    })
                                }
                                _ => Res::Missing,
                            },
                            None => {
                                self.diagnostics.report(
                                    DiagnosticKind::UndefinedReference {
                                        name: name.text().to_string(),
                                    },
                                    name_span,
                                );
                                Res::Missing
                            }
                        }
                    }
                    Res::Value(receiver_expr) => {
                        let promise = self.promises.alloc();
                        let ty = self.ctx.fresh_var();
                        self.constraints.push(Constraint::Member(MemberConstraint {
                            receiver: receiver_expr.ty(),
                            name: name.text().to_string(),
                            result: ty.clone(),
                            promise,
                            span: name_span,
                        }));
                        Res::Value(UntypedExpr::Member {
                            receiver: Box::new(receiver_expr),
                            name: name.text().to_string(),
                            promise,
                            ty,
                            span: span_of(member.syntax()),
                        })
                    }
                    Res::Group { name: group_name, .. } => {
                        // Members of a function group make no sense.
                        self.diagnostics.report(
                            DiagnosticKind::IllegalReferenceContext { name: group_name },
                            name_span,
                        );
                        Res::Missing
                    }
                    Res::Missing => Res::Missing,
                }
            }
            other => Res::Value(self.bind_expr(other)),
        }
    }

    // ── Expressions ────────────────────────────────────────────────────

    fn bind_expr(&mut self, e: &ast_expr::Expr) -> UntypedExpr {
        match e {
            ast_expr::Expr::Literal(lit) => self.bind_literal(lit),
            ast_expr::Expr::Str(s) => self.bind_string(s),
            ast_expr::Expr::Grouping(g) => match g.inner() {
                Some(inner) => self.bind_expr(&inner),
                None => UntypedExpr::Error,
            },

            ast_expr::Expr::Name(_) | ast_expr::Expr::Member(_) => {
                let span = span_of(e.syntax());
                match self.resolve_expr_path(e) {
                    Res::Value(expr) => expr,
                    Res::Group { name, candidates } => {
                        self.function_group_as_value(name, candidates, span)
                    }
                    Res::Module(symbol) | Res::Type(symbol) => {
                        self.diagnostics.report(
                            DiagnosticKind::IllegalReferenceContext {
                                name: self.symbols.name(symbol).to_string(),
                            },
                            span,
                        );
                        UntypedExpr::Error
                    }
                    Res::Missing => UntypedExpr::Error,
                }
            }

            ast_expr::Expr::Generic(generic) => {
                let span = span_of(generic.syntax());
                match self.bind_generic_callee(generic) {
                    Some((name, candidates, type_args)) => {
                        // Outside call position a generic instantiation
                        // must pin down one function.
                        if candidates.len() == 1 {
                            self.instantiated_function_ref(candidates[0], &type_args, span)
                        } else {
                            self.diagnostics.report(
                                DiagnosticKind::AmbiguousOverload {
                                    name,
                                    candidates: candidates.len(),
                                },
                                span,
                            );
                            UntypedExpr::Error
                        }
                    }
                    None => UntypedExpr::Error,
                }
            }

            ast_expr::Expr::Call(call) => self.bind_call(call),
            ast_expr::Expr::Index(index) => self.bind_index(index),
            ast_expr::Expr::Unary(unary) => self.bind_unary(unary),
            ast_expr::Expr::Binary(binary) => self.bind_binary(binary),
            ast_expr::Expr::Relational(rel) => self.bind_relational(rel),
            ast_expr::Expr::Assign(assign) => self.bind_assign(assign),
            ast_expr::Expr::If(if_expr) => self.bind_if(if_expr),
            ast_expr::Expr::While(while_expr) => self.bind_while(while_expr),
            ast_expr::Expr::Block(block) => self.bind_block(block, ScopeKind::Block),
            ast_expr::Expr::Return(ret) => self.bind_return(ret),
            ast_expr::Expr::Goto(goto) => self.bind_goto(goto),
        }
    }

    fn bind_literal(&mut self, lit: &ast_expr::LiteralExpr) -> UntypedExpr {
        let Some(token) = lit.token() else {
            return UntypedExpr::Error;
        };
        let span = span_of_token(&token);
        let text = token.text();
        let (value, ty) = match token.kind() {
            SyntaxKind::INT_LITERAL => {
                (ConstValue::Int(text.parse().unwrap_or_default()), Ty::int32())
            }
            SyntaxKind::FLOAT_LITERAL => (
                ConstValue::Float(text.parse().unwrap_or_default()),
                Ty::float64(),
            ),
            SyntaxKind::CHAR_LITERAL => {
                let inner = text.trim_start_matches('\'').trim_end_matches('\'');
                let decoded = ast_expr::decode_content(inner, 0);
                (
                    ConstValue::Char(decoded.chars().next().unwrap_or('\0')),
                    Ty::char(),
                )
            }
            SyntaxKind::TRUE_KW => (ConstValue::Bool(true), Ty::bool()),
            SyntaxKind::FALSE_KW => (ConstValue::Bool(false), Ty::bool()),
            _ => return UntypedExpr::Error,
        };
        UntypedExpr::Literal { value, ty, span }
    }

    fn bind_string(&mut self, s: &ast_expr::StringExpr) -> UntypedExpr {
        let span = span_of(s.syntax());
        let hashes = s.hash_count();
        let multi_line = s.is_multi_line();
        let prefix = if multi_line {
            s.closing_indent()
        } else {
            String::new()
        };

        enum Piece {
            Text(String),
            Newline,
            Interp(UntypedExpr),
        }
        let mut pieces = Vec::new();
        for part in s.parts() {
            match part {
                ast_expr::StringPart::Content(token) => {
                    let text = token.text();
                    let text = if multi_line {
                        text.strip_prefix(prefix.as_str()).unwrap_or(text)
                    } else {
                        text
                    };
                    pieces.push(Piece::Text(ast_expr::decode_content(text, hashes)));
                }
                ast_expr::StringPart::Newline(_) => pieces.push(Piece::Newline),
                ast_expr::StringPart::Interpolation(interp) => {
                    let bound = match interp.expr() {
                        Some(e) => self.bind_expr(&e),
                        None => UntypedExpr::Error,
                    };
                    pieces.push(Piece::Interp(bound));
                }
            }
        }
        // The line break before the closing delimiter is not content.
        if multi_line && matches!(pieces.last(), Some(Piece::Newline)) {
            pieces.pop();
        }

        let parts = pieces
            .into_iter()
            .map(|piece| match piece {
                Piece::Text(text) => UntypedStringPart::Content(text),
                Piece::Newline => UntypedStringPart::Content("\n".to_string()),
                Piece::Interp(e) => UntypedStringPart::Interpolation(e),
            })
            .collect();
        UntypedExpr::String { parts, span }
    }

    /// A function group referenced as a value: a single candidate becomes
    /// a function reference, anything else cannot be disambiguated
    /// without a call.
    fn function_group_as_value(
        &mut self,
        name: String,
        candidates: Vec<SymbolId>,
        span: Span,
    ) -> UntypedExpr {
        if candidates.len() == 1 {
            self.instantiated_function_ref(candidates[0], &[], span)
        } else {
            self.diagnostics.report(
                DiagnosticKind::AmbiguousOverload {
                    name,
                    candidates: candidates.len(),
                },
                span,
            );
            UntypedExpr::Error
        }
    }

    /// Reference one function with its signature instantiated: explicit
    /// type arguments when given, fresh variables otherwise.
    fn instantiated_function_ref(
        &mut self,
        symbol: SymbolId,
        type_args: &[Ty],
        span: Span,
    ) -> UntypedExpr {
        let Some(f) = self.symbols.function(symbol) else {
            return UntypedExpr::Error;
        };
        let type_params = f.type_params.clone();
        if !type_args.is_empty() && type_args.len() != type_params.len() {
            self.diagnostics.report(
                DiagnosticKind::GenericArityMismatch {
                    expected: type_params.len(),
                    got: type_args.len(),
                },
                span,
            );
            return UntypedExpr::Error;
        }
        let mut subst = FxHashMap::default();
        for (i, &tp) in type_params.iter().enumerate() {
            if let SymbolKind::TypeParam { param_id } = &self.symbols.get(tp).kind {
                let ty = if type_args.is_empty() {
                    self.ctx.fresh_var()
                } else {
                    type_args[i].clone()
                };
                subst.insert(*param_id, ty);
            }
        }
        let sig = self.symbols.function_ty(symbol);
        let ty = self.ctx.substitute(&sig, &subst);
        UntypedExpr::FunctionRef { symbol, ty, span }
    }

    /// Resolve the callee of a generic instantiation to a filtered
    /// overload set plus the explicit type arguments.
    fn bind_generic_callee(
        &mut self,
        generic: &ast_expr::GenericExpr,
    ) -> Option<(String, Vec<SymbolId>, Vec<Ty>)> {
        let span = span_of(generic.syntax());
        let type_args: Vec<Ty> = generic
            .arg_list()
            .map(|list| list.types().map(|t| self.resolve_type(&t)).collect())
            .unwrap_or_default();
        let Some(callee) = generic.callee() else {
            return None;
        };
        match self.resolve_expr_path(&callee) {
            Res::Group { name, candidates } => {
                let matching: Vec<SymbolId> = candidates
                    .iter()
                    .copied()
                    .filter(|&c| {
                        self.symbols
                            .function(c)
                            .is_some_and(|f| f.type_params.len() == type_args.len())
                    })
                    .collect();
                if matching.is_empty() {
                    let expected = candidates
                        .first()
                        .and_then(|&c| self.symbols.function(c))
                        .map(|f| f.type_params.len())
                        .unwrap_or(0);
                    self.diagnostics.report(
                        DiagnosticKind::GenericArityMismatch {
                            expected,
                            got: type_args.len(),
                        },
                        span,
                    );
                    return None;
                }
                Some((name, matching, type_args))
            }
            Res::Missing => None,
            Res::Module(symbol) | Res::Type(symbol) => {
                self.diagnostics.report(
                    DiagnosticKind::IllegalReferenceContext {
                        name: self.symbols.name(symbol).to_string(),
                    },
                    span,
                );
                None
            }
            Res::Value(_) => {
                self.diagnostics.report(
                    DiagnosticKind::IllegalReferenceContext {
                        name: "value".to_string(),
                    },
                    span,
                );
                None
            }
        }
    }

    fn bind_call(&mut self, call: &ast_expr::CallExpr) -> UntypedExpr {
        let span = span_of(call.syntax());
        let args: Vec<UntypedExpr> = call.args().iter().map(|a| self.bind_expr(a)).collect();
        let arg_tys: Vec<Ty> = args.iter().map(|a| a.ty()).collect();
        let ret = self.ctx.fresh_var();

        let callee = match call.callee() {
            Some(ast_expr::Expr::Generic(generic)) => {
                match self.bind_generic_callee(&generic) {
                    Some((name, candidates, type_args)) => {
                        let promise = self.promises.alloc();
                        self.constraints.push(Constraint::Overload(OverloadConstraint {
                            name: name.clone(),
                            candidates,
                            type_args: Some(type_args),
                            args: arg_tys,
                            ret: ret.clone(),
                            promise,
                            span,
                        }));
                        UntypedCallee::Group { name, promise }
                    }
                    None => {
                        let _ = self.ctx.unify(&ret, &Ty::Error);
                        UntypedCallee::Error
                    }
                }
            }
            Some(callee_ast) => match self.resolve_expr_path(&callee_ast) {
                Res::Group { name, candidates } => {
                    let promise = self.promises.alloc();
                    self.constraints.push(Constraint::Overload(OverloadConstraint {
                        name: name.clone(),
                        candidates,
                        type_args: None,
                        args: arg_tys,
                        ret: ret.clone(),
                        promise,
                        span,
                    }));
                    UntypedCallee::Group { name, promise }
                }
                Res::Value(callee_expr) => {
                    self.constraints.push(Constraint::Call {
                        callee: callee_expr.ty(),
                        args: arg_tys,
                        ret: ret.clone(),
                        span,
                    });
                    UntypedCallee::Expr(Box::new(callee_expr))
                }
                Res::Type(symbol) | Res::Module(symbol) => {
                    // A call's callee must not be a bare type or module
                    // name.
                    self.diagnostics.report(
                        DiagnosticKind::IllegalReferenceContext {
                            name: self.symbols.name(symbol).to_string(),
                        },
                        span,
                    );
                    let _ = self.ctx.unify(&ret, &Ty::Error);
                    UntypedCallee::Error
                }
                Res::Missing => {
                    let _ = self.ctx.unify(&ret, &Ty::Error);
                    UntypedCallee::Error
                }
            },
            None => {
                let _ = self.ctx.unify(&ret, &Ty::Error);
                UntypedCallee::Error
            }
        };

        UntypedExpr::Call {
            callee,
            args,
            ret,
            span,
        }
    }

    fn bind_index(&mut self, index: &ast_expr::IndexExpr) -> UntypedExpr {
        let span = span_of(index.syntax());
        let receiver = match index.base() {
            Some(b) => self.bind_expr(&b),
            None => UntypedExpr::Error,
        };
        let idx = match index.index() {
            Some(i) => self.bind_expr(&i),
            None => UntypedExpr::Error,
        };
        let elem = self.ctx.fresh_var();
        self.constraints.push(Constraint::Assignable {
            target: Ty::array(elem.clone()),
            source: receiver.ty(),
            span: receiver.span().unwrap_or(span),
        });
        self.constraints.push(Constraint::Assignable {
            target: Ty::int32(),
            source: idx.ty(),
            span: idx.span().unwrap_or(span),
        });
        UntypedExpr::Index {
            receiver: Box::new(receiver),
            index: Box::new(idx),
            elem,
            span,
        }
    }

    fn bind_unary(&mut self, unary: &ast_expr::UnaryExpr) -> UntypedExpr {
        let span = span_of(unary.syntax());
        let operand = match unary.operand() {
            Some(o) => self.bind_expr(&o),
            None => UntypedExpr::Error,
        };
        let Some(op) = unary.op() else {
            return UntypedExpr::Error;
        };
        match op.kind() {
            SyntaxKind::NOT_KW => {
                self.constraints.push(Constraint::Assignable {
                    target: Ty::bool(),
                    source: operand.ty(),
                    span: operand.span().unwrap_or(span),
                });
                UntypedExpr::Not {
                    operand: Box::new(operand),
                    span,
                }
            }
            SyntaxKind::MINUS | SyntaxKind::PLUS => {
                let name = if op.kind() == SyntaxKind::MINUS {
                    "unary-"
                } else {
                    "unary+"
                };
                self.operator_call(name, vec![operand], span)
            }
            _ => UntypedExpr::Error,
        }
    }

    fn operator_call(&mut self, name: &str, operands: Vec<UntypedExpr>, span: Span) -> UntypedExpr {
        let candidates = self
            .intrinsics
            .operators
            .get(name)
            .cloned()
            .unwrap_or_default();
        let arg_tys: Vec<Ty> = operands.iter().map(|o| o.ty()).collect();
        let ret = self.ctx.fresh_var();
        let promise = self.promises.alloc();
        self.constraints.push(Constraint::Overload(OverloadConstraint {
            name: name.to_string(),
            candidates,
            type_args: None,
            args: arg_tys,
            ret: ret.clone(),
            promise,
            span,
        }));
        UntypedExpr::OperatorCall {
            op: name.to_string(),
            promise,
            operands,
            ret,
            span,
        }
    }

    fn bind_binary(&mut self, binary: &ast_expr::BinaryExpr) -> UntypedExpr {
        let span = span_of(binary.syntax());
        let lhs = match binary.lhs() {
            Some(l) => self.bind_expr(&l),
            None => UntypedExpr::Error,
        };
        let rhs = match binary.rhs() {
            Some(r) => self.bind_expr(&r),
            None => UntypedExpr::Error,
        };
        let Some(op) = binary.op() else {
            return UntypedExpr::Error;
        };
        match op.kind() {
            SyntaxKind::AND_KW | SyntaxKind::OR_KW => {
                let logical_op = if op.kind() == SyntaxKind::AND_KW {
                    LogicalOp::And
                } else {
                    LogicalOp::Or
                };
                self.constraints.push(Constraint::Assignable {
                    target: Ty::bool(),
                    source: lhs.ty(),
                    span: lhs.span().unwrap_or(span),
                });
                self.constraints.push(Constraint::Assignable {
                    target: Ty::bool(),
                    source: rhs.ty(),
                    span: rhs.span().unwrap_or(span),
                });
                UntypedExpr::Logical {
                    op: logical_op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    span,
                }
            }
            kind => {
                let name = match kind {
                    SyntaxKind::PLUS => "+",
                    SyntaxKind::MINUS => "-",
                    SyntaxKind::STAR => "*",
                    SyntaxKind::SLASH => "/",
                    SyntaxKind::MOD_KW => "mod",
                    SyntaxKind::REM_KW => "rem",
                    _ => return UntypedExpr::Error,
                };
                self.operator_call(name, vec![lhs, rhs], span)
            }
        }
    }

    fn bind_relational(&mut self, rel: &ast_expr::RelationalExpr) -> UntypedExpr {
        let span = span_of(rel.syntax());
        let first = match rel.first() {
            Some(f) => self.bind_expr(&f),
            None => UntypedExpr::Error,
        };

        let mut comparisons = Vec::new();
        let mut prev_ty = first.ty();
        for comparison in rel.comparisons() {
            let op_name = comparison
                .op()
                .map(|t| match t.kind() {
                    SyntaxKind::LT => "<",
                    SyntaxKind::GT => ">",
                    SyntaxKind::LT_EQ => "<=",
                    SyntaxKind::GT_EQ => ">=",
                    SyntaxKind::EQ_EQ => "==",
                    SyntaxKind::NOT_EQ => "!=",
                    _ => "<",
                })
                .unwrap_or("<");
            let right = match comparison.operand() {
                Some(r) => self.bind_expr(&r),
                None => UntypedExpr::Error,
            };
            let right_ty = right.ty();
            let comparison_span = span_of(comparison.syntax());

            let candidates = self
                .intrinsics
                .operators
                .get(op_name)
                .cloned()
                .unwrap_or_default();
            let ret = self.ctx.fresh_var();
            let promise = self.promises.alloc();
            self.constraints.push(Constraint::Overload(OverloadConstraint {
                name: op_name.to_string(),
                candidates,
                type_args: None,
                args: vec![prev_ty.clone(), right_ty.clone()],
                ret: ret.clone(),
                promise,
                span: comparison_span,
            }));
            self.constraints.push(Constraint::Assignable {
                target: Ty::bool(),
                source: ret,
                span: comparison_span,
            });

            comparisons.push(UntypedComparison {
                op: op_name.to_string(),
                promise,
                right,
            });
            prev_ty = right_ty;
        }

        UntypedExpr::Relational {
            first: Box::new(first),
            comparisons,
            span,
        }
    }

    fn bind_assign(&mut self, assign: &ast_expr::AssignExpr) -> UntypedExpr {
        let span = span_of(assign.syntax());
        let value = match assign.rvalue() {
            Some(v) => self.bind_expr(&v),
            None => UntypedExpr::Error,
        };
        let target = match assign.lvalue() {
            Some(l) => self.bind_lvalue(&l),
            None => UntypedLValue::Error,
        };

        let compound = assign.op().and_then(|t| match t.kind() {
            SyntaxKind::PLUS_ASSIGN => Some("+"),
            SyntaxKind::MINUS_ASSIGN => Some("-"),
            SyntaxKind::STAR_ASSIGN => Some("*"),
            SyntaxKind::SLASH_ASSIGN => Some("/"),
            _ => None,
        });

        let op = match compound {
            Some(op_name) => {
                let candidates = self
                    .intrinsics
                    .operators
                    .get(op_name)
                    .cloned()
                    .unwrap_or_default();
                let ret = self.ctx.fresh_var();
                let promise = self.promises.alloc();
                self.constraints.push(Constraint::Overload(OverloadConstraint {
                    name: op_name.to_string(),
                    candidates,
                    type_args: None,
                    args: vec![target.ty(), value.ty()],
                    ret: ret.clone(),
                    promise,
                    span,
                }));
                self.constraints.push(Constraint::Assignable {
                    target: target.ty(),
                    source: ret,
                    span,
                });
                Some((op_name.to_string(), promise))
            }
            None => {
                self.constraints.push(Constraint::Assignable {
                    target: target.ty(),
                    source: value.ty(),
                    span,
                });
                None
            }
        };

        UntypedExpr::Assign {
            target,
            op,
            value: Box::new(value),
            span,
        }
    }

    fn bind_lvalue(&mut self, e: &ast_expr::Expr) -> UntypedLValue {
        let span = span_of(e.syntax());
        match e {
            ast_expr::Expr::Grouping(g) => match g.inner() {
                Some(inner) => self.bind_lvalue(&inner),
                None => UntypedLValue::Error,
            },
            ast_expr::Expr::Name(_) => match self.resolve_expr_path(e) {
                Res::Value(UntypedExpr::VarRef { symbol, ty, span }) => {
                    UntypedLValue::Var { symbol, ty, span }
                }
                Res::Missing => UntypedLValue::Error,
                _ => {
                    self.diagnostics.report(
                        DiagnosticKind::IllegalReferenceContext {
                            name: e.syntax().text().to_string(),
                        },
                        span,
                    );
                    UntypedLValue::Error
                }
            },
            ast_expr::Expr::Index(index) => {
                let receiver = match index.base() {
                    Some(b) => self.bind_expr(&b),
                    None => UntypedExpr::Error,
                };
                let idx = match index.index() {
                    Some(i) => self.bind_expr(&i),
                    None => UntypedExpr::Error,
                };
                let elem = self.ctx.fresh_var();
                self.constraints.push(Constraint::Assignable {
                    target: Ty::array(elem.clone()),
                    source: receiver.ty(),
                    span: receiver.span().unwrap_or(span),
                });
                self.constraints.push(Constraint::Assignable {
                    target: Ty::int32(),
                    source: idx.ty(),
                    span: idx.span().unwrap_or(span),
                });
                UntypedLValue::Index {
                    receiver: Box::new(receiver),
                    index: Box::new(idx),
                    elem,
                    span,
                }
            }
            ast_expr::Expr::Member(member) => {
                match self.resolve_expr_path(e) {
                    Res::Value(UntypedExpr::Member {
                        receiver,
                        name,
                        promise,
                        ty,
                        span,
                    }) => UntypedLValue::Member {
                        receiver,
                        name,
                        promise,
                        ty,
                        span,
                    },
                    Res::Value(UntypedExpr::VarRef { symbol, ty, span }) => {
                        // A static (module/type) member.
                        UntypedLValue::Var { symbol, ty, span }
                    }
                    Res::Missing => UntypedLValue::Error,
                    _ => {
                        self.diagnostics.report(
                            DiagnosticKind::IllegalReferenceContext {
                                name: member
                                    .name()
                                    .map(|t| t.text().to_string())
                                    .unwrap_or_default(),
                            },
                            span,
                        );
                        UntypedLValue::Error
                    }
                }
            }
            _ => {
                self.diagnostics.report(
                    DiagnosticKind::IllegalElementInContext {
                        what: "assignment target".to_string(),
                    },
                    span,
                );
                UntypedLValue::Error
            }
        }
    }

    fn bind_if(&mut self, if_expr: &ast_expr::IfExpr) -> UntypedExpr {
        let span = span_of(if_expr.syntax());
        let condition = match if_expr.condition() {
            Some(c) => self.bind_expr(&c),
            None => UntypedExpr::Error,
        };
        self.constraints.push(Constraint::Assignable {
            target: Ty::bool(),
            source: condition.ty(),
            span: condition.span().unwrap_or(span),
        });

        let then_branch = match if_expr.then_branch() {
            Some(t) => self.bind_expr(&t),
            None => UntypedExpr::Error,
        };
        let else_branch = if_expr
            .else_clause()
            .and_then(|e| e.expr())
            .map(|e| self.bind_expr(&e));

        let ty = match &else_branch {
            None => Ty::unit(),
            Some(else_expr) => {
                let result = self.ctx.fresh_var();
                let then_ty = then_branch.ty();
                let else_ty = else_expr.ty();
                // A branch that never produces a value does not pin the
                // result type.
                let then_never = matches!(then_ty, Ty::Never);
                let else_never = matches!(else_ty, Ty::Never);
                if !then_never {
                    self.constraints.push(Constraint::Assignable {
                        target: result.clone(),
                        source: then_ty,
                        span: then_branch.span().unwrap_or(span),
                    });
                }
                if !else_never {
                    self.constraints.push(Constraint::Assignable {
                        target: result.clone(),
                        source: else_ty,
                        span: else_expr.span().unwrap_or(span),
                    });
                }
                if then_never && else_never {
                    Ty::Never
                } else {
                    result
                }
            }
        };

        UntypedExpr::If {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
            ty,
            span,
        }
    }

    fn bind_while(&mut self, while_expr: &ast_expr::WhileExpr) -> UntypedExpr {
        let span = span_of(while_expr.syntax());
        let condition = match while_expr.condition() {
            Some(c) => self.bind_expr(&c),
            None => UntypedExpr::Error,
        };
        self.constraints.push(Constraint::Assignable {
            target: Ty::bool(),
            source: condition.ty(),
            span: condition.span().unwrap_or(span),
        });

        self.scopes.push(ScopeKind::While);
        let body = match while_expr.body() {
            Some(b) => self.bind_expr(&b),
            None => UntypedExpr::Error,
        };
        self.scopes.pop();

        UntypedExpr::While {
            condition: Box::new(condition),
            body: Box::new(body),
            span,
        }
    }

    fn bind_return(&mut self, ret: &ast_expr::ReturnExpr) -> UntypedExpr {
        let span = span_of(ret.syntax());
        let value = ret.value().map(|e| self.bind_expr(&e));
        let return_ty = self
            .return_types
            .last()
            .cloned()
            .unwrap_or(Ty::Error);
        let source = value.as_ref().map(|v| v.ty()).unwrap_or_else(Ty::unit);
        self.constraints.push(Constraint::Assignable {
            target: return_ty,
            source,
            span,
        });
        UntypedExpr::Return {
            value: value.map(Box::new),
            span,
        }
    }

    fn bind_goto(&mut self, goto: &ast_expr::GotoExpr) -> UntypedExpr {
        let span = span_of(goto.syntax());
        let label = goto.label().and_then(|name| {
            let found = self
                .scopes
                .lookup(name.text())
                .iter()
                .copied()
                .find(|&s| matches!(self.symbols.get(s).kind, SymbolKind::Label));
            if found.is_none() {
                self.diagnostics.report(
                    DiagnosticKind::UndefinedReference {
                        name: name.text().to_string(),
                    },
                    span_of_token(&name),
                );
            }
            found
        });
        UntypedExpr::Goto { label, span }
    }
}
