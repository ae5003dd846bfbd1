//! Event-based parser for Aspen.
//!
//! The parser consumes a token stream and produces events (Open/Close/
//! Advance) that are later converted into a rowan green tree. This decouples
//! parsing logic from tree construction.
//!
//! # Architecture
//!
//! 1. Parse functions call `open()` to start a node, `advance()` to consume
//!    tokens, and `close()` to finish a node with its actual kind.
//! 2. Events are collected into a flat `Vec<Event>`.
//! 3. `build_tree()` converts events into a rowan `GreenNode`.
//!
//! The `open_before()` method enables wrapping a previously completed node
//! (e.g., turning `ident` into `call_expr(ident, arg_list)`) using the
//! "forward parent" technique.
//!
//! # Trivia
//!
//! Tokens arrive from the lexer with leading and trailing trivia already
//! attached, so lookahead never has to skip anything: `nth(n)` indexes the
//! significant token stream directly. `advance()` emits the leading trivia,
//! the token, and the trailing trivia into the tree, which is what makes the
//! CST reproduce the source byte-for-byte.

pub(crate) mod expressions;
pub(crate) mod items;

use aspen_common::diagnostics::{DiagnosticKind, Diagnostics};
use aspen_common::span::Span;
use aspen_common::token::{Token, TokenKind};

use crate::syntax_kind::SyntaxKind;

/// A parser event. Events are collected during parsing and later converted
/// into a rowan green tree by [`Parser::build_tree`].
#[derive(Debug)]
enum Event {
    /// Start a new CST node. The `kind` is initially TOMBSTONE and gets
    /// patched by `close()` with the real node kind.
    ///
    /// `forward_parent` is used by `open_before()` to indicate that this
    /// node should be opened before the node at the specified event index.
    Open {
        kind: SyntaxKind,
        forward_parent: Option<usize>,
    },
    /// Finish the current CST node.
    Close,
    /// Consume the current token, advancing the token position.
    Advance,
}

/// An opaque marker for a started but not-yet-closed CST node.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MarkOpened {
    index: usize,
}

/// An opaque marker for a completed (opened and closed) CST node.
/// Used by `open_before()` to wrap a previously completed node; carries the
/// closed node's kind so callers can dispatch on what they just parsed.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MarkClosed {
    index: usize,
    pub(crate) kind: SyntaxKind,
}

/// Event-based parser for Aspen source code.
pub(crate) struct Parser<'src> {
    /// All tokens from the lexer (including EndOfInput), trivia attached.
    tokens: Vec<Token>,
    /// Current position in the token stream.
    pos: usize,
    /// Collected parser events.
    events: Vec<Event>,
    /// Original source text (for extracting token text via spans).
    source: &'src str,
    /// Collected diagnostics.
    pub(crate) diagnostics: Diagnostics,
}

impl<'src> Parser<'src> {
    /// Create a new parser from a token stream and source text.
    pub(crate) fn new(tokens: Vec<Token>, source: &'src str) -> Self {
        Self {
            tokens,
            pos: 0,
            events: Vec::new(),
            source,
            diagnostics: Diagnostics::new(),
        }
    }

    // ── Lookahead ──────────────────────────────────────────────────────

    /// Returns the SyntaxKind of the current token.
    pub(crate) fn current(&self) -> SyntaxKind {
        self.nth(0)
    }

    /// Returns the SyntaxKind of the Nth token ahead. `nth(0)` is the
    /// current token. Past the end, returns `EOF`.
    ///
    /// This is also the throwaway-offset scan used by `<` disambiguation:
    /// looking ahead never consumes from the stream.
    pub(crate) fn nth(&self, n: usize) -> SyntaxKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| SyntaxKind::from(t.kind))
            .unwrap_or(SyntaxKind::EOF)
    }

    /// Returns the text of the current token.
    pub(crate) fn current_text(&self) -> &str {
        match self.tokens.get(self.pos) {
            Some(token) => &self.source[token.span.start as usize..token.span.end as usize],
            None => "",
        }
    }

    /// Returns the span of the current token.
    pub(crate) fn current_span(&self) -> Span {
        match self.tokens.get(self.pos) {
            Some(token) => token.span,
            None => Span::empty_at(self.source.len() as u32),
        }
    }

    /// Current position in the token stream. Used by callers to detect a
    /// parse step that made no progress.
    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    /// Check if the current token matches the given kind.
    pub(crate) fn at(&self, kind: SyntaxKind) -> bool {
        self.current() == kind
    }

    /// Check if the current token matches any of the given kinds.
    pub(crate) fn at_any(&self, kinds: &[SyntaxKind]) -> bool {
        kinds.contains(&self.current())
    }

    // ── Mutation: node management ──────────────────────────────────────

    /// Start a new CST node. Returns a marker that must be passed to
    /// `close()` to finish the node.
    pub(crate) fn open(&mut self) -> MarkOpened {
        let mark = MarkOpened {
            index: self.events.len(),
        };
        self.events.push(Event::Open {
            kind: SyntaxKind::TOMBSTONE,
            forward_parent: None,
        });
        mark
    }

    /// Start a new CST node BEFORE a previously completed node.
    ///
    /// Uses the "forward parent" technique: instead of physically inserting
    /// into the events vec (which would invalidate indices), we set a
    /// `forward_parent` link on the completed node's Open event.
    pub(crate) fn open_before(&mut self, completed: MarkClosed) -> MarkOpened {
        let mark = MarkOpened {
            index: self.events.len(),
        };
        self.events.push(Event::Open {
            kind: SyntaxKind::TOMBSTONE,
            forward_parent: None,
        });
        if let Event::Open { forward_parent, .. } = &mut self.events[completed.index] {
            *forward_parent = Some(mark.index);
        }
        mark
    }

    /// Close a CST node, patching its Open event with the actual kind.
    pub(crate) fn close(&mut self, m: MarkOpened, kind: SyntaxKind) -> MarkClosed {
        if let Event::Open {
            kind: slot_kind, ..
        } = &mut self.events[m.index]
        {
            *slot_kind = kind;
        }
        self.events.push(Event::Close);
        MarkClosed {
            index: m.index,
            kind,
        }
    }

    // ── Mutation: token consumption ────────────────────────────────────

    /// Consume the current token (with its trivia).
    pub(crate) fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.events.push(Event::Advance);
            self.pos += 1;
        }
    }

    /// Consume the current token wrapped in an ERROR_NODE, reporting it as
    /// unexpected input.
    pub(crate) fn advance_with_error(&mut self) {
        let m = self.open();
        self.report_unexpected();
        self.advance();
        self.close(m, SyntaxKind::ERROR_NODE);
    }

    /// If the current token matches `kind`, consume it and return true.
    /// Otherwise report `ExpectedToken` at a zero-width span before the
    /// current token and return false without consuming -- the missing
    /// token's slot stays empty and the tree shape is preserved.
    pub(crate) fn expect(&mut self, kind: SyntaxKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            self.diagnostics.report(
                DiagnosticKind::ExpectedToken {
                    expected: kind.describe().to_string(),
                },
                Span::empty_at(self.current_span().start),
            );
            false
        }
    }

    /// If the current token matches `kind`, consume it and return true.
    /// Otherwise, return false (no diagnostic).
    pub(crate) fn eat(&mut self, kind: SyntaxKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    // ── Error reporting and recovery ───────────────────────────────────

    /// Record an `UnexpectedInput` diagnostic for the current token.
    pub(crate) fn report_unexpected(&mut self) {
        let what = if self.at(SyntaxKind::EOF) {
            "end of input".to_string()
        } else {
            format!("`{}`", self.current_text())
        };
        let span = self.current_span();
        self.diagnostics
            .report(DiagnosticKind::UnexpectedInput { what }, span);
    }

    /// Panic-mode recovery: consume tokens into one ERROR_NODE until a
    /// token from `recovery` (or end of input) comes up. One
    /// `UnexpectedInput` diagnostic covers the whole synchronized run.
    pub(crate) fn recover_until(&mut self, recovery: &[SyntaxKind]) {
        if self.at(SyntaxKind::EOF) || self.at_any(recovery) {
            return;
        }
        let m = self.open();
        self.report_unexpected();
        while !self.at(SyntaxKind::EOF) && !self.at_any(recovery) {
            self.advance();
        }
        self.close(m, SyntaxKind::ERROR_NODE);
    }

    // ── Tree building ──────────────────────────────────────────────────

    /// Convert collected events into a rowan `GreenNode` and diagnostics.
    ///
    /// Forward parents: when `open_before(completed)` was called, the
    /// completed node's Open event got a `forward_parent` link to the
    /// wrapping Open event. When we encounter such an Open, we follow the
    /// chain, collect all kinds, and open nodes in reverse order (outermost
    /// wrapper first). The wrapper Open events are then tombstoned so they
    /// are skipped when reached later.
    pub(crate) fn build_tree(mut self) -> (rowan::GreenNode, Diagnostics) {
        let mut builder = rowan::GreenNodeBuilder::new();
        let mut token_pos: usize = 0;
        let mut forward_parents: Vec<(usize, SyntaxKind)> = Vec::new();

        let mut i = 0;
        while i < self.events.len() {
            match self.events[i] {
                Event::Open {
                    kind,
                    forward_parent,
                } => {
                    if forward_parent.is_some() {
                        forward_parents.clear();
                        let mut current = i;
                        loop {
                            let (fk, fp) = match self.events[current] {
                                Event::Open {
                                    kind,
                                    forward_parent,
                                } => (kind, forward_parent),
                                _ => unreachable!(),
                            };
                            forward_parents.push((current, fk));
                            match fp {
                                Some(next) => current = next,
                                None => break,
                            }
                        }

                        for &(fp_idx, _) in forward_parents.iter().skip(1) {
                            if let Event::Open {
                                ref mut kind,
                                ref mut forward_parent,
                            } = self.events[fp_idx]
                            {
                                *kind = SyntaxKind::TOMBSTONE;
                                *forward_parent = None;
                            }
                        }
                        if let Event::Open {
                            ref mut forward_parent,
                            ..
                        } = self.events[i]
                        {
                            *forward_parent = None;
                        }

                        for &(_, fk) in forward_parents.iter().rev() {
                            if fk != SyntaxKind::TOMBSTONE {
                                builder.start_node(rowan::SyntaxKind(fk as u16));
                            }
                        }
                    } else if kind != SyntaxKind::TOMBSTONE {
                        builder.start_node(rowan::SyntaxKind(kind as u16));
                    }
                }
                Event::Close => {
                    builder.finish_node();
                }
                Event::Advance => {
                    if token_pos < self.tokens.len() {
                        emit_token(&mut builder, &self.tokens[token_pos], self.source);
                        token_pos += 1;
                    }
                }
            }
            i += 1;
        }

        (builder.finish(), self.diagnostics)
    }
}

/// Emit one token into the green tree: leading trivia, text, trailing
/// trivia, each as its own leaf.
fn emit_token(builder: &mut rowan::GreenNodeBuilder<'_>, token: &Token, source: &str) {
    for trivia in &token.leading {
        let kind = SyntaxKind::from(trivia.kind);
        let text = &source[trivia.span.start as usize..trivia.span.end as usize];
        builder.token(rowan::SyntaxKind(kind as u16), text);
    }
    // EndOfInput is zero-width; emitting it would add an empty leaf.
    if token.kind != TokenKind::EndOfInput {
        let kind = SyntaxKind::from(token.kind);
        let text = &source[token.span.start as usize..token.span.end as usize];
        builder.token(rowan::SyntaxKind(kind as u16), text);
    }
    for trivia in &token.trailing {
        let kind = SyntaxKind::from(trivia.kind);
        let text = &source[trivia.span.start as usize..trivia.span.end as usize];
        builder.token(rowan::SyntaxKind(kind as u16), text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aspen_lexer::Lexer;

    #[test]
    fn smoke_test_parser_produces_green_node() {
        let source = "val x = 5;";
        let lexed = Lexer::tokenize(source);
        let mut parser = Parser::new(lexed.tokens, source);

        let root = parser.open();
        let binding = parser.open();
        parser.advance(); // val
        parser.advance(); // x
        parser.advance(); // =
        parser.advance(); // 5
        parser.advance(); // ;
        parser.close(binding, SyntaxKind::VARIABLE_DECL);
        parser.advance(); // EndOfInput
        parser.close(root, SyntaxKind::SOURCE_FILE);

        let (green, diagnostics) = parser.build_tree();
        assert!(diagnostics.is_empty());

        let root_node = crate::cst::SyntaxNode::new_root(green);
        assert_eq!(root_node.kind(), SyntaxKind::SOURCE_FILE);
        // Trivia is part of the tree, so the text round-trips exactly.
        assert_eq!(root_node.text().to_string(), source);

        let children: Vec<_> = root_node.children().collect();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].kind(), SyntaxKind::VARIABLE_DECL);
    }

    #[test]
    fn lookahead_is_pure() {
        let source = "a b c";
        let lexed = Lexer::tokenize(source);
        let parser = Parser::new(lexed.tokens, source);
        assert_eq!(parser.nth(0), SyntaxKind::IDENT);
        assert_eq!(parser.nth(1), SyntaxKind::IDENT);
        assert_eq!(parser.nth(2), SyntaxKind::IDENT);
        assert_eq!(parser.nth(3), SyntaxKind::EOF);
        assert_eq!(parser.nth(100), SyntaxKind::EOF);
        assert_eq!(parser.pos(), 0);
    }

    #[test]
    fn expect_reports_without_consuming() {
        let source = "val x";
        let lexed = Lexer::tokenize(source);
        let mut parser = Parser::new(lexed.tokens, source);

        let root = parser.open();
        assert!(parser.expect(SyntaxKind::VAL_KW));
        assert!(!parser.expect(SyntaxKind::SEMICOLON));
        // The identifier is still there -- expect() did not consume it.
        assert!(parser.at(SyntaxKind::IDENT));
        parser.advance();
        parser.advance(); // EndOfInput
        parser.close(root, SyntaxKind::SOURCE_FILE);

        let (_green, diagnostics) = parser.build_tree();
        assert_eq!(diagnostics.len(), 1);
        let d = diagnostics.iter().next().unwrap();
        assert!(d.span.is_empty(), "missing tokens are zero-width");
    }

    #[test]
    fn open_before_wraps_completed_node() {
        let source = "f(42)";
        let lexed = Lexer::tokenize(source);
        let mut parser = Parser::new(lexed.tokens, source);

        let root = parser.open();
        let name = parser.open();
        parser.advance(); // f
        let name_closed = parser.close(name, SyntaxKind::NAME_EXPR);
        assert_eq!(name_closed.kind, SyntaxKind::NAME_EXPR);

        let call = parser.open_before(name_closed);
        parser.advance(); // (
        parser.advance(); // 42
        parser.advance(); // )
        parser.close(call, SyntaxKind::CALL_EXPR);

        parser.advance(); // EndOfInput
        parser.close(root, SyntaxKind::SOURCE_FILE);

        let (green, diagnostics) = parser.build_tree();
        assert!(diagnostics.is_empty());

        let root_node = crate::cst::SyntaxNode::new_root(green);
        let call_node = root_node.children().next().unwrap();
        assert_eq!(call_node.kind(), SyntaxKind::CALL_EXPR);
        let name_ref = call_node.children().next().unwrap();
        assert_eq!(name_ref.kind(), SyntaxKind::NAME_EXPR);
    }

    #[test]
    fn recover_until_wraps_garbage() {
        let source = "@ @ ; val";
        let lexed = Lexer::tokenize(source);
        // The `@`s are already skipped trivia from the lexer; recovery only
        // sees significant tokens.
        let mut parser = Parser::new(lexed.tokens, source);
        let root = parser.open();
        parser.recover_until(&[SyntaxKind::VAL_KW]);
        assert!(parser.at(SyntaxKind::VAL_KW));
        parser.advance();
        parser.advance(); // EndOfInput
        parser.close(root, SyntaxKind::SOURCE_FILE);
        let (green, _diagnostics) = parser.build_tree();
        let root_node = crate::cst::SyntaxNode::new_root(green);
        assert_eq!(root_node.text().to_string(), source);
    }
}
