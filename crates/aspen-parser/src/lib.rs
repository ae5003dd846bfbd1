//! Aspen parser: recursive descent parser producing a rowan-based CST.
//!
//! This crate transforms the token stream from `aspen-lexer` into a lossless
//! concrete syntax tree (CST) using the `rowan` library. The CST preserves
//! all tokens including whitespace and comments, so the root node's text
//! reproduces the input byte-for-byte. The typed AST layer in [`ast`]
//! provides zero-cost wrappers over the CST for downstream phases.

pub mod ast;
pub mod cst;
mod parser;
pub mod syntax_kind;
mod validation;

use aspen_common::diagnostics::Diagnostics;

pub use cst::{AspenLanguage, SyntaxElement, SyntaxNode, SyntaxToken};
pub use syntax_kind::SyntaxKind;

/// Result of parsing an Aspen source file.
///
/// Contains the green tree (the immutable, cheap-to-clone CST backbone) and
/// every diagnostic produced by lexing, parsing, and post-parse validation.
pub struct Parse {
    green: rowan::GreenNode,
    diagnostics: Diagnostics,
}

impl Parse {
    /// Build a syntax tree root from the green node. Each call materializes
    /// a fresh red tree over the shared green tree.
    pub fn syntax(&self) -> SyntaxNode {
        SyntaxNode::new_root(self.green.clone())
    }

    /// The typed root of the tree.
    pub fn tree(&self) -> ast::item::SourceFile {
        use ast::AstNode;
        ast::item::SourceFile::cast(self.syntax()).expect("the parser always produces SOURCE_FILE")
    }

    /// All diagnostics from lexing, parsing, and validation.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Whether parsing completed without error-severity diagnostics.
    pub fn ok(&self) -> bool {
        !self.diagnostics.has_errors()
    }
}

/// Parse an Aspen source file into a CST.
///
/// This is the main entry point for the parser. It lexes the source, parses
/// the token stream, runs post-parse validation (multi-line string layout),
/// and returns a [`Parse`] with the tree and accumulated diagnostics. It
/// never fails: ill-formed input produces error nodes and diagnostics, and
/// the tree still round-trips the input exactly.
pub fn parse(source: &str) -> Parse {
    let lexed = aspen_lexer::Lexer::tokenize(source);
    let mut diagnostics = lexed.diagnostics;

    let mut p = parser::Parser::new(lexed.tokens, source);
    parser::items::parse_source_file(&mut p);
    let (green, parse_diagnostics) = p.build_tree();
    diagnostics.extend(parse_diagnostics);

    let root = SyntaxNode::new_root(green.clone());
    validation::validate(&root, &mut diagnostics);

    Parse { green, diagnostics }
}
