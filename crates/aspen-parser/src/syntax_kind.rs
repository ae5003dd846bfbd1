//! SyntaxKind enum for the Aspen CST.
//!
//! This is a superset of `TokenKind` and `TriviaKind` (mapped to
//! SCREAMING_SNAKE_CASE) plus composite node kinds for CST nodes produced by
//! the parser.

use aspen_common::token::{TokenKind, TriviaKind};

/// Every kind of syntax element in the Aspen CST.
///
/// Token and trivia kinds (leaves) are mapped 1:1 from [`TokenKind`] and
/// [`TriviaKind`]. Composite node kinds represent parser-produced tree
/// nodes. The first two values are sentinels used by the event-based parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
#[allow(non_camel_case_types)]
pub enum SyntaxKind {
    // ── Sentinels ──────────────────────────────────────────────────────
    /// Placeholder kind for incomplete/unfinished parser events.
    TOMBSTONE = 0,
    /// Wrapper for tokens/nodes that couldn't be parsed.
    ERROR_NODE = 1,

    // ── Keywords (19) ──────────────────────────────────────────────────
    AND_KW,
    ELSE_KW,
    FALSE_KW,
    FUNC_KW,
    GOTO_KW,
    IF_KW,
    IMPORT_KW,
    INTERNAL_KW,
    MOD_KW,
    MODULE_KW,
    NOT_KW,
    OR_KW,
    PUBLIC_KW,
    REM_KW,
    RETURN_KW,
    TRUE_KW,
    VAL_KW,
    VAR_KW,
    WHILE_KW,

    // ── Operators (15) ─────────────────────────────────────────────────
    ASSIGN,
    PLUS_ASSIGN,
    MINUS_ASSIGN,
    STAR_ASSIGN,
    SLASH_ASSIGN,
    EQ_EQ,
    NOT_EQ,
    LT,
    GT,
    LT_EQ,
    GT_EQ,
    PLUS,
    MINUS,
    STAR,
    SLASH,

    // ── Delimiters and punctuation (11) ────────────────────────────────
    L_PAREN,
    R_PAREN,
    L_BRACKET,
    R_BRACKET,
    L_BRACE,
    R_BRACE,
    COMMA,
    DOT,
    COLON,
    SEMICOLON,
    ELLIPSIS,

    // ── Literals (3) ───────────────────────────────────────────────────
    INT_LITERAL,
    FLOAT_LITERAL,
    CHAR_LITERAL,

    // ── String pieces (8) ──────────────────────────────────────────────
    LINE_STRING_START,
    LINE_STRING_END,
    MULTI_LINE_STRING_START,
    MULTI_LINE_STRING_END,
    STRING_CONTENT,
    STRING_NEWLINE,
    INTERPOLATION_START,
    INTERPOLATION_END,

    // ── Identifiers and special (2) ────────────────────────────────────
    IDENT,
    EOF,

    // ── Trivia (5) ─────────────────────────────────────────────────────
    WHITESPACE,
    NEWLINE,
    LINE_COMMENT,
    DOC_COMMENT,
    SKIPPED,

    // ── Declarations ───────────────────────────────────────────────────
    /// Root node of a parsed source file.
    SOURCE_FILE,
    /// Import declaration: `import a.b.c;`
    IMPORT_DECL,
    /// Dotted path of an import declaration.
    IMPORT_PATH,
    /// Function declaration: `func f<T>(a: T): T { ... }` or `= expr;`
    FUNC_DECL,
    /// Module declaration: `module name { ... }`
    MODULE_DECL,
    /// Variable declaration: `var x: T = e;` / `val x = e;`
    VARIABLE_DECL,
    /// Label declaration: `name:`
    LABEL_DECL,
    /// Visibility modifier: `internal` or `public`.
    VISIBILITY,
    /// Parameter list including parentheses.
    PARAM_LIST,
    /// Single parameter, optionally variadic (`...name: T`).
    PARAM,
    /// Type parameter list: `<T, U>`
    TYPE_PARAM_LIST,
    /// Single type parameter.
    TYPE_PARAM,
    /// Type annotation: `: Type`
    TYPE_ANNOTATION,
    /// Inline function body: `= expr;`
    INLINE_BODY,

    // ── Statements ─────────────────────────────────────────────────────
    /// A declaration used as a statement.
    DECL_STMT,
    /// An expression statement (semicolon optional for control flow and
    /// for a block's trailing value).
    EXPR_STMT,
    /// A lone `;`.
    NO_OP_STMT,

    // ── Expressions ────────────────────────────────────────────────────
    /// Literal expression (int, float, char, true, false).
    LITERAL_EXPR,
    /// Identifier used as an expression.
    NAME_EXPR,
    /// Member access: `expr.name`
    MEMBER_EXPR,
    /// Function call: `f(args)`
    CALL_EXPR,
    /// Argument list: `(a, b, c)`
    ARG_LIST,
    /// Index access: `expr[index]`
    INDEX_EXPR,
    /// Generic instantiation: `f<T, U>`
    GENERIC_EXPR,
    /// Generic argument list in expression or type position: `<T, U>`
    GENERIC_ARG_LIST,
    /// Prefix expression: `-x`, `+x`, `not x`
    UNARY_EXPR,
    /// Binary expression: `a + b`, `a and b`, ...
    BINARY_EXPR,
    /// Chained relational expression: `a < b > c` with COMPARISON children.
    RELATIONAL_EXPR,
    /// One `(op, operand)` link of a relational chain.
    COMPARISON,
    /// If expression: `if (cond) expr else expr`
    IF_EXPR,
    /// Else branch of an if expression.
    ELSE_CLAUSE,
    /// While expression: `while (cond) expr`
    WHILE_EXPR,
    /// Block: `{ stmt* expr? }`
    BLOCK_EXPR,
    /// Return expression: `return expr?`
    RETURN_EXPR,
    /// Goto expression: `goto label`
    GOTO_EXPR,
    /// String literal, possibly with interpolation.
    STRING_EXPR,
    /// Interpolation segment: `\{expr}`
    INTERPOLATION,
    /// Parenthesized expression: `(expr)`
    GROUPING_EXPR,
    /// Assignment: `lvalue = expr`, `lvalue += expr`, ...
    ASSIGN_EXPR,

    // ── Types ──────────────────────────────────────────────────────────
    /// Named type: `int32`
    NAME_TYPE,
    /// Qualified type: `module.Type`
    MEMBER_TYPE,
    /// Generic type instantiation: `Array<int32>`
    GENERIC_TYPE,
}

impl SyntaxKind {
    /// Whether this kind is trivia (never significant to the grammar).
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            SyntaxKind::WHITESPACE
                | SyntaxKind::NEWLINE
                | SyntaxKind::LINE_COMMENT
                | SyntaxKind::DOC_COMMENT
                | SyntaxKind::SKIPPED
        )
    }

    /// Short human-readable description of a token kind, used in
    /// `expected ...` diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            SyntaxKind::AND_KW => "`and`",
            SyntaxKind::ELSE_KW => "`else`",
            SyntaxKind::FALSE_KW => "`false`",
            SyntaxKind::FUNC_KW => "`func`",
            SyntaxKind::GOTO_KW => "`goto`",
            SyntaxKind::IF_KW => "`if`",
            SyntaxKind::IMPORT_KW => "`import`",
            SyntaxKind::INTERNAL_KW => "`internal`",
            SyntaxKind::MOD_KW => "`mod`",
            SyntaxKind::MODULE_KW => "`module`",
            SyntaxKind::NOT_KW => "`not`",
            SyntaxKind::OR_KW => "`or`",
            SyntaxKind::PUBLIC_KW => "`public`",
            SyntaxKind::REM_KW => "`rem`",
            SyntaxKind::RETURN_KW => "`return`",
            SyntaxKind::TRUE_KW => "`true`",
            SyntaxKind::VAL_KW => "`val`",
            SyntaxKind::VAR_KW => "`var`",
            SyntaxKind::WHILE_KW => "`while`",
            SyntaxKind::ASSIGN => "`=`",
            SyntaxKind::PLUS_ASSIGN => "`+=`",
            SyntaxKind::MINUS_ASSIGN => "`-=`",
            SyntaxKind::STAR_ASSIGN => "`*=`",
            SyntaxKind::SLASH_ASSIGN => "`/=`",
            SyntaxKind::EQ_EQ => "`==`",
            SyntaxKind::NOT_EQ => "`!=`",
            SyntaxKind::LT => "`<`",
            SyntaxKind::GT => "`>`",
            SyntaxKind::LT_EQ => "`<=`",
            SyntaxKind::GT_EQ => "`>=`",
            SyntaxKind::PLUS => "`+`",
            SyntaxKind::MINUS => "`-`",
            SyntaxKind::STAR => "`*`",
            SyntaxKind::SLASH => "`/`",
            SyntaxKind::L_PAREN => "`(`",
            SyntaxKind::R_PAREN => "`)`",
            SyntaxKind::L_BRACKET => "`[`",
            SyntaxKind::R_BRACKET => "`]`",
            SyntaxKind::L_BRACE => "`{`",
            SyntaxKind::R_BRACE => "`}`",
            SyntaxKind::COMMA => "`,`",
            SyntaxKind::DOT => "`.`",
            SyntaxKind::COLON => "`:`",
            SyntaxKind::SEMICOLON => "`;`",
            SyntaxKind::ELLIPSIS => "`...`",
            SyntaxKind::INT_LITERAL => "integer literal",
            SyntaxKind::FLOAT_LITERAL => "float literal",
            SyntaxKind::CHAR_LITERAL => "character literal",
            SyntaxKind::LINE_STRING_START | SyntaxKind::MULTI_LINE_STRING_START => "string",
            SyntaxKind::LINE_STRING_END | SyntaxKind::MULTI_LINE_STRING_END => {
                "closing string quotes"
            }
            SyntaxKind::STRING_CONTENT => "string content",
            SyntaxKind::STRING_NEWLINE => "string line break",
            SyntaxKind::INTERPOLATION_START => "interpolation",
            SyntaxKind::INTERPOLATION_END => "`}`",
            SyntaxKind::IDENT => "identifier",
            SyntaxKind::EOF => "end of input",
            _ => "syntax node",
        }
    }
}

impl From<TokenKind> for SyntaxKind {
    fn from(kind: TokenKind) -> SyntaxKind {
        match kind {
            TokenKind::And => SyntaxKind::AND_KW,
            TokenKind::Else => SyntaxKind::ELSE_KW,
            TokenKind::False => SyntaxKind::FALSE_KW,
            TokenKind::Func => SyntaxKind::FUNC_KW,
            TokenKind::Goto => SyntaxKind::GOTO_KW,
            TokenKind::If => SyntaxKind::IF_KW,
            TokenKind::Import => SyntaxKind::IMPORT_KW,
            TokenKind::Internal => SyntaxKind::INTERNAL_KW,
            TokenKind::Mod => SyntaxKind::MOD_KW,
            TokenKind::Module => SyntaxKind::MODULE_KW,
            TokenKind::Not => SyntaxKind::NOT_KW,
            TokenKind::Or => SyntaxKind::OR_KW,
            TokenKind::Public => SyntaxKind::PUBLIC_KW,
            TokenKind::Rem => SyntaxKind::REM_KW,
            TokenKind::Return => SyntaxKind::RETURN_KW,
            TokenKind::True => SyntaxKind::TRUE_KW,
            TokenKind::Val => SyntaxKind::VAL_KW,
            TokenKind::Var => SyntaxKind::VAR_KW,
            TokenKind::While => SyntaxKind::WHILE_KW,
            TokenKind::Assign => SyntaxKind::ASSIGN,
            TokenKind::PlusAssign => SyntaxKind::PLUS_ASSIGN,
            TokenKind::MinusAssign => SyntaxKind::MINUS_ASSIGN,
            TokenKind::StarAssign => SyntaxKind::STAR_ASSIGN,
            TokenKind::SlashAssign => SyntaxKind::SLASH_ASSIGN,
            TokenKind::EqEq => SyntaxKind::EQ_EQ,
            TokenKind::NotEq => SyntaxKind::NOT_EQ,
            TokenKind::Lt => SyntaxKind::LT,
            TokenKind::Gt => SyntaxKind::GT,
            TokenKind::LtEq => SyntaxKind::LT_EQ,
            TokenKind::GtEq => SyntaxKind::GT_EQ,
            TokenKind::Plus => SyntaxKind::PLUS,
            TokenKind::Minus => SyntaxKind::MINUS,
            TokenKind::Star => SyntaxKind::STAR,
            TokenKind::Slash => SyntaxKind::SLASH,
            TokenKind::LParen => SyntaxKind::L_PAREN,
            TokenKind::RParen => SyntaxKind::R_PAREN,
            TokenKind::LBracket => SyntaxKind::L_BRACKET,
            TokenKind::RBracket => SyntaxKind::R_BRACKET,
            TokenKind::LBrace => SyntaxKind::L_BRACE,
            TokenKind::RBrace => SyntaxKind::R_BRACE,
            TokenKind::Comma => SyntaxKind::COMMA,
            TokenKind::Dot => SyntaxKind::DOT,
            TokenKind::Colon => SyntaxKind::COLON,
            TokenKind::Semicolon => SyntaxKind::SEMICOLON,
            TokenKind::Ellipsis => SyntaxKind::ELLIPSIS,
            TokenKind::IntLiteral => SyntaxKind::INT_LITERAL,
            TokenKind::FloatLiteral => SyntaxKind::FLOAT_LITERAL,
            TokenKind::CharLiteral => SyntaxKind::CHAR_LITERAL,
            TokenKind::LineStringStart => SyntaxKind::LINE_STRING_START,
            TokenKind::LineStringEnd => SyntaxKind::LINE_STRING_END,
            TokenKind::MultiLineStringStart => SyntaxKind::MULTI_LINE_STRING_START,
            TokenKind::MultiLineStringEnd => SyntaxKind::MULTI_LINE_STRING_END,
            TokenKind::StringContent => SyntaxKind::STRING_CONTENT,
            TokenKind::StringNewline => SyntaxKind::STRING_NEWLINE,
            TokenKind::InterpolationStart => SyntaxKind::INTERPOLATION_START,
            TokenKind::InterpolationEnd => SyntaxKind::INTERPOLATION_END,
            TokenKind::Ident => SyntaxKind::IDENT,
            TokenKind::EndOfInput => SyntaxKind::EOF,
        }
    }
}

impl From<TriviaKind> for SyntaxKind {
    fn from(kind: TriviaKind) -> SyntaxKind {
        match kind {
            TriviaKind::Whitespace => SyntaxKind::WHITESPACE,
            TriviaKind::Newline => SyntaxKind::NEWLINE,
            TriviaKind::LineComment => SyntaxKind::LINE_COMMENT,
            TriviaKind::DocComment => SyntaxKind::DOC_COMMENT,
            TriviaKind::Skipped => SyntaxKind::SKIPPED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_kinds_map_one_to_one() {
        assert_eq!(SyntaxKind::from(TokenKind::Func), SyntaxKind::FUNC_KW);
        assert_eq!(SyntaxKind::from(TokenKind::EndOfInput), SyntaxKind::EOF);
        assert_eq!(
            SyntaxKind::from(TokenKind::InterpolationStart),
            SyntaxKind::INTERPOLATION_START
        );
    }

    #[test]
    fn trivia_kinds_are_trivia() {
        assert!(SyntaxKind::from(TriviaKind::Whitespace).is_trivia());
        assert!(SyntaxKind::from(TriviaKind::Skipped).is_trivia());
        assert!(!SyntaxKind::IDENT.is_trivia());
    }
}
