//! Typed wrappers for expressions.

use super::{ast_node, child_token, first_token, AstNode};
use crate::ast::item::Stmt;
use crate::ast::ty::GenericArgList;
use crate::cst::{SyntaxNode, SyntaxToken};
use crate::syntax_kind::SyntaxKind;

/// Any expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(LiteralExpr),
    Name(NameExpr),
    Member(MemberExpr),
    Call(CallExpr),
    Index(IndexExpr),
    Generic(GenericExpr),
    Unary(UnaryExpr),
    Binary(BinaryExpr),
    Relational(RelationalExpr),
    If(IfExpr),
    While(WhileExpr),
    Block(BlockExpr),
    Return(ReturnExpr),
    Goto(GotoExpr),
    Str(StringExpr),
    Grouping(GroupingExpr),
    Assign(AssignExpr),
}

impl Expr {
    pub fn cast(node: SyntaxNode) -> Option<Expr> {
        let expr = match node.kind() {
            SyntaxKind::LITERAL_EXPR => Expr::Literal(LiteralExpr { syntax: node }),
            SyntaxKind::NAME_EXPR => Expr::Name(NameExpr { syntax: node }),
            SyntaxKind::MEMBER_EXPR => Expr::Member(MemberExpr { syntax: node }),
            SyntaxKind::CALL_EXPR => Expr::Call(CallExpr { syntax: node }),
            SyntaxKind::INDEX_EXPR => Expr::Index(IndexExpr { syntax: node }),
            SyntaxKind::GENERIC_EXPR => Expr::Generic(GenericExpr { syntax: node }),
            SyntaxKind::UNARY_EXPR => Expr::Unary(UnaryExpr { syntax: node }),
            SyntaxKind::BINARY_EXPR => Expr::Binary(BinaryExpr { syntax: node }),
            SyntaxKind::RELATIONAL_EXPR => Expr::Relational(RelationalExpr { syntax: node }),
            SyntaxKind::IF_EXPR => Expr::If(IfExpr { syntax: node }),
            SyntaxKind::WHILE_EXPR => Expr::While(WhileExpr { syntax: node }),
            SyntaxKind::BLOCK_EXPR => Expr::Block(BlockExpr { syntax: node }),
            SyntaxKind::RETURN_EXPR => Expr::Return(ReturnExpr { syntax: node }),
            SyntaxKind::GOTO_EXPR => Expr::Goto(GotoExpr { syntax: node }),
            SyntaxKind::STRING_EXPR => Expr::Str(StringExpr { syntax: node }),
            SyntaxKind::GROUPING_EXPR => Expr::Grouping(GroupingExpr { syntax: node }),
            SyntaxKind::ASSIGN_EXPR => Expr::Assign(AssignExpr { syntax: node }),
            _ => return None,
        };
        Some(expr)
    }

    pub fn syntax(&self) -> &SyntaxNode {
        match self {
            Expr::Literal(e) => e.syntax(),
            Expr::Name(e) => e.syntax(),
            Expr::Member(e) => e.syntax(),
            Expr::Call(e) => e.syntax(),
            Expr::Index(e) => e.syntax(),
            Expr::Generic(e) => e.syntax(),
            Expr::Unary(e) => e.syntax(),
            Expr::Binary(e) => e.syntax(),
            Expr::Relational(e) => e.syntax(),
            Expr::If(e) => e.syntax(),
            Expr::While(e) => e.syntax(),
            Expr::Block(e) => e.syntax(),
            Expr::Return(e) => e.syntax(),
            Expr::Goto(e) => e.syntax(),
            Expr::Str(e) => e.syntax(),
            Expr::Grouping(e) => e.syntax(),
            Expr::Assign(e) => e.syntax(),
        }
    }
}

/// The `n`th child expression of a node (0-based, skipping non-expressions).
fn nth_expr(parent: &SyntaxNode, n: usize) -> Option<Expr> {
    parent.children().filter_map(Expr::cast).nth(n)
}

ast_node!(LiteralExpr, LITERAL_EXPR);

impl LiteralExpr {
    /// The literal token itself.
    pub fn token(&self) -> Option<SyntaxToken> {
        first_token(&self.syntax)
    }
}

ast_node!(NameExpr, NAME_EXPR);

impl NameExpr {
    pub fn ident(&self) -> Option<SyntaxToken> {
        child_token(&self.syntax, SyntaxKind::IDENT)
    }
}

ast_node!(MemberExpr, MEMBER_EXPR);

impl MemberExpr {
    pub fn receiver(&self) -> Option<Expr> {
        nth_expr(&self.syntax, 0)
    }

    pub fn name(&self) -> Option<SyntaxToken> {
        child_token(&self.syntax, SyntaxKind::IDENT)
    }
}

ast_node!(CallExpr, CALL_EXPR);

impl CallExpr {
    pub fn callee(&self) -> Option<Expr> {
        nth_expr(&self.syntax, 0)
    }

    pub fn arg_list(&self) -> Option<ArgList> {
        super::child_node(&self.syntax)
    }

    pub fn args(&self) -> Vec<Expr> {
        self.arg_list()
            .map(|list| list.args().collect())
            .unwrap_or_default()
    }
}

ast_node!(ArgList, ARG_LIST);

impl ArgList {
    pub fn args(&self) -> impl Iterator<Item = Expr> + '_ {
        self.syntax.children().filter_map(Expr::cast)
    }
}

ast_node!(IndexExpr, INDEX_EXPR);

impl IndexExpr {
    pub fn base(&self) -> Option<Expr> {
        nth_expr(&self.syntax, 0)
    }

    pub fn index(&self) -> Option<Expr> {
        nth_expr(&self.syntax, 1)
    }
}

ast_node!(GenericExpr, GENERIC_EXPR);

impl GenericExpr {
    pub fn callee(&self) -> Option<Expr> {
        nth_expr(&self.syntax, 0)
    }

    pub fn arg_list(&self) -> Option<GenericArgList> {
        super::child_node(&self.syntax)
    }
}

ast_node!(UnaryExpr, UNARY_EXPR);

impl UnaryExpr {
    pub fn op(&self) -> Option<SyntaxToken> {
        first_token(&self.syntax)
    }

    pub fn operand(&self) -> Option<Expr> {
        nth_expr(&self.syntax, 0)
    }
}

ast_node!(BinaryExpr, BINARY_EXPR);

impl BinaryExpr {
    pub fn lhs(&self) -> Option<Expr> {
        nth_expr(&self.syntax, 0)
    }

    pub fn rhs(&self) -> Option<Expr> {
        nth_expr(&self.syntax, 1)
    }

    pub fn op(&self) -> Option<SyntaxToken> {
        first_token(&self.syntax)
    }
}

ast_node!(RelationalExpr, RELATIONAL_EXPR);

impl RelationalExpr {
    /// The leftmost operand of the chain.
    pub fn first(&self) -> Option<Expr> {
        nth_expr(&self.syntax, 0)
    }

    /// The `(operator, operand)` links of the chain, in order.
    pub fn comparisons(&self) -> impl Iterator<Item = Comparison> + '_ {
        super::child_nodes(&self.syntax)
    }
}

ast_node!(Comparison, COMPARISON);

impl Comparison {
    pub fn op(&self) -> Option<SyntaxToken> {
        first_token(&self.syntax)
    }

    pub fn operand(&self) -> Option<Expr> {
        nth_expr(&self.syntax, 0)
    }
}

ast_node!(IfExpr, IF_EXPR);

impl IfExpr {
    pub fn condition(&self) -> Option<Expr> {
        nth_expr(&self.syntax, 0)
    }

    pub fn then_branch(&self) -> Option<Expr> {
        nth_expr(&self.syntax, 1)
    }

    pub fn else_clause(&self) -> Option<ElseClause> {
        super::child_node(&self.syntax)
    }
}

ast_node!(ElseClause, ELSE_CLAUSE);

impl ElseClause {
    pub fn expr(&self) -> Option<Expr> {
        nth_expr(&self.syntax, 0)
    }
}

ast_node!(WhileExpr, WHILE_EXPR);

impl WhileExpr {
    pub fn condition(&self) -> Option<Expr> {
        nth_expr(&self.syntax, 0)
    }

    pub fn body(&self) -> Option<Expr> {
        nth_expr(&self.syntax, 1)
    }
}

ast_node!(BlockExpr, BLOCK_EXPR);

impl BlockExpr {
    pub fn statements(&self) -> impl Iterator<Item = Stmt> + '_ {
        self.syntax.children().filter_map(Stmt::cast)
    }

    /// The block's value: its last statement when that is an expression
    /// statement without a trailing semicolon.
    pub fn tail_expr(&self) -> Option<Expr> {
        match self.statements().last()? {
            Stmt::Expr(stmt) if !stmt.has_semicolon() => stmt.expr(),
            _ => None,
        }
    }
}

ast_node!(ReturnExpr, RETURN_EXPR);

impl ReturnExpr {
    pub fn value(&self) -> Option<Expr> {
        nth_expr(&self.syntax, 0)
    }
}

ast_node!(GotoExpr, GOTO_EXPR);

impl GotoExpr {
    /// The target label's name.
    pub fn label(&self) -> Option<SyntaxToken> {
        child_token(&self.syntax, SyntaxKind::IDENT)
    }
}

ast_node!(GroupingExpr, GROUPING_EXPR);

impl GroupingExpr {
    pub fn inner(&self) -> Option<Expr> {
        nth_expr(&self.syntax, 0)
    }
}

ast_node!(AssignExpr, ASSIGN_EXPR);

impl AssignExpr {
    pub fn lvalue(&self) -> Option<Expr> {
        nth_expr(&self.syntax, 0)
    }

    pub fn rvalue(&self) -> Option<Expr> {
        nth_expr(&self.syntax, 1)
    }

    pub fn op(&self) -> Option<SyntaxToken> {
        first_token(&self.syntax)
    }
}

// ── Strings ────────────────────────────────────────────────────────────

ast_node!(StringExpr, STRING_EXPR);

/// One piece of a string expression, in source order.
#[derive(Debug, Clone)]
pub enum StringPart {
    /// Raw content text (escapes not yet decoded; see [`decode_content`]).
    Content(SyntaxToken),
    /// A line break inside a multi-line string.
    Newline(SyntaxToken),
    /// An interpolated expression.
    Interpolation(Interpolation),
}

impl StringExpr {
    pub fn is_multi_line(&self) -> bool {
        child_token(&self.syntax, SyntaxKind::MULTI_LINE_STRING_START).is_some()
    }

    /// Number of `#`s in the string's delimiter, which governs escapes.
    pub fn hash_count(&self) -> u32 {
        first_token(&self.syntax)
            .map(|t| t.text().chars().take_while(|&c| c == '#').count() as u32)
            .unwrap_or(0)
    }

    /// The string's pieces in order.
    pub fn parts(&self) -> Vec<StringPart> {
        self.syntax
            .children_with_tokens()
            .filter_map(|el| match el {
                rowan::NodeOrToken::Token(t) if t.kind() == SyntaxKind::STRING_CONTENT => {
                    Some(StringPart::Content(t))
                }
                rowan::NodeOrToken::Token(t) if t.kind() == SyntaxKind::STRING_NEWLINE => {
                    Some(StringPart::Newline(t))
                }
                rowan::NodeOrToken::Node(n) => Interpolation::cast(n).map(StringPart::Interpolation),
                _ => None,
            })
            .collect()
    }

    /// Whether the string has any interpolated parts.
    pub fn has_interpolation(&self) -> bool {
        self.parts()
            .iter()
            .any(|p| matches!(p, StringPart::Interpolation(_)))
    }

    /// The indentation of the closing delimiter of a multi-line string:
    /// the whitespace token directly before the end quotes.
    pub fn closing_indent(&self) -> String {
        let mut prev: Option<SyntaxToken> = None;
        for el in self.syntax.children_with_tokens() {
            if let rowan::NodeOrToken::Token(t) = el {
                if t.kind() == SyntaxKind::MULTI_LINE_STRING_END {
                    return prev
                        .filter(|p| p.kind() == SyntaxKind::WHITESPACE)
                        .map(|p| p.text().to_string())
                        .unwrap_or_default();
                }
                prev = Some(t);
            }
        }
        String::new()
    }

    /// Decode a string with no interpolations into its runtime value.
    /// Multi-line strings are dedented by the closing delimiter's
    /// indentation and their lines joined with `\n`; the line break before
    /// the closing delimiter is not part of the value.
    pub fn cooked_value(&self) -> Option<String> {
        if self.has_interpolation() {
            return None;
        }
        let hashes = self.hash_count();

        if !self.is_multi_line() {
            let mut out = String::new();
            for part in self.parts() {
                if let StringPart::Content(t) = part {
                    out.push_str(&decode_content(t.text(), hashes));
                }
            }
            return Some(out);
        }

        let prefix = self.closing_indent();
        let mut lines: Vec<String> = Vec::new();
        let mut buf = String::new();
        let mut line_has_content = false;
        for part in self.parts() {
            match part {
                StringPart::Content(t) => {
                    let text = t.text();
                    let text = text.strip_prefix(prefix.as_str()).unwrap_or(text);
                    buf.push_str(&decode_content(text, hashes));
                    line_has_content = true;
                }
                StringPart::Newline(_) => {
                    lines.push(std::mem::take(&mut buf));
                    line_has_content = false;
                }
                StringPart::Interpolation(_) => {}
            }
        }
        if line_has_content {
            lines.push(buf);
        }
        Some(lines.join("\n"))
    }
}

ast_node!(Interpolation, INTERPOLATION);

impl Interpolation {
    pub fn expr(&self) -> Option<Expr> {
        nth_expr(&self.syntax, 0)
    }
}

/// Decode the escapes of one raw content piece. The lexer has already
/// validated the escapes; unknown ones are kept as-is here.
pub fn decode_content(text: &str, hashes: u32) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    'outer: while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        // An escape needs `hashes` hashes after the backslash.
        let mut lookahead = chars.clone();
        for _ in 0..hashes {
            if lookahead.peek() != Some(&'#') {
                out.push('\\');
                continue 'outer;
            }
            lookahead.next();
        }
        chars = lookahead;
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('u') => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    let mut digits = String::new();
                    while let Some(&d) = chars.peek() {
                        if d == '}' {
                            break;
                        }
                        digits.push(d);
                        chars.next();
                    }
                    chars.next(); // }
                    if let Some(decoded) = u32::from_str_radix(&digits, 16)
                        .ok()
                        .and_then(char::from_u32)
                    {
                        out.push(decoded);
                    }
                }
            }
            Some(other) => {
                out.push('\\');
                for _ in 0..hashes {
                    out.push('#');
                }
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
