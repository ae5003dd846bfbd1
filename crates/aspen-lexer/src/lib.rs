// Aspen lexer -- tokenizer for the Aspen programming language.

mod cursor;

use aspen_common::diagnostics::{DiagnosticKind, Diagnostics};
use aspen_common::span::Span;
use aspen_common::token::{keyword_from_str, Token, TokenKind, TokenValue, Trivia, TriviaKind};
use cursor::Cursor;

/// Tracks what the lexer is currently doing.
///
/// String literals and interpolations nest arbitrarily, so the lexer keeps a
/// stack of modes: entering a string pushes, the closing delimiter pops, and
/// `\{` inside a string pushes an interpolation frame that lexes ordinary
/// tokens until its matching `}`.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    /// Normal top-level tokenization.
    Normal,
    /// Inside a single-line string with the given hash count.
    LineString { hashes: u32 },
    /// Inside a multi-line (`"""`) string with the given hash count.
    MultiLineString { hashes: u32 },
    /// Inside `\{...}` string interpolation. `depth` tracks nested braces so
    /// a `}` belonging to the expression does not close the interpolation.
    Interpolation { depth: u32 },
}

/// The output of tokenizing a source file: the token stream (always ending
/// in `EndOfInput`) and any diagnostics. The lexer never fails; invalid
/// input becomes `Skipped` trivia with a diagnostic attached.
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<Token>,
    pub diagnostics: Diagnostics,
}

/// The Aspen lexer. Converts source text into a stream of tokens with
/// leading and trailing trivia attached.
///
/// Attachment discipline: horizontal whitespace and comments become leading
/// trivia of the next token; the line break that ends a line, plus any
/// spaces before it, become trailing trivia of the preceding token. The
/// concatenated full extents of the token stream reproduce the source
/// byte-for-byte.
pub struct Lexer<'src> {
    cursor: Cursor<'src>,
    source: &'src str,
    modes: Vec<Mode>,
    diagnostics: Diagnostics,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source text.
    pub fn new(source: &'src str) -> Self {
        Self {
            cursor: Cursor::new(source),
            source,
            modes: vec![Mode::Normal],
            diagnostics: Diagnostics::new(),
        }
    }

    /// Tokenize the entire source. The returned stream always ends with a
    /// single `EndOfInput` token.
    pub fn tokenize(source: &str) -> LexResult {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let done = token.kind == TokenKind::EndOfInput;
            tokens.push(token);
            if done {
                break;
            }
        }
        LexResult {
            tokens,
            diagnostics: lexer.diagnostics,
        }
    }

    fn mode(&self) -> Mode {
        *self.modes.last().expect("mode stack must never be empty")
    }

    /// Produce the next token based on the current mode.
    fn next_token(&mut self) -> Token {
        match self.mode() {
            Mode::Normal | Mode::Interpolation { .. } => self.lex_default(),
            Mode::LineString { hashes } => self.lex_line_string(hashes),
            Mode::MultiLineString { hashes } => self.lex_multi_line_string(hashes),
        }
    }

    // ── Default mode (top level and interpolation bodies) ──────────────

    fn lex_default(&mut self) -> Token {
        let mut leading = Vec::new();
        let mut token = loop {
            self.collect_leading(&mut leading);

            let start = self.cursor.pos();
            if self.cursor.is_eof() {
                break Token::new(TokenKind::EndOfInput, start, start);
            }
            if let Some(token) = self.scan_token(&mut leading) {
                break token;
            }
            // scan_token consumed invalid input into `leading`; try again.
        };
        token.leading = leading;

        // Tokens that hand control to a string mode must not swallow string
        // content as trivia. The multi-line opener is the exception: the
        // line break after `"""` belongs to it and governs the indentation
        // check, and `collect_trailing` only attaches when a line break
        // actually follows.
        let wants_trailing = !matches!(
            token.kind,
            TokenKind::EndOfInput | TokenKind::LineStringStart | TokenKind::InterpolationEnd
        );
        if wants_trailing {
            token.trailing = self.collect_trailing();
        }
        token
    }

    /// Scan a single token in default mode. Returns `None` after consuming
    /// an invalid character into `leading` as `Skipped` trivia.
    fn scan_token(&mut self, leading: &mut Vec<Trivia>) -> Option<Token> {
        let start = self.cursor.pos();
        let c = self.cursor.peek()?;

        let token = match c {
            '(' => self.single(TokenKind::LParen, start),
            ')' => self.single(TokenKind::RParen, start),
            '[' => self.single(TokenKind::LBracket, start),
            ']' => self.single(TokenKind::RBracket, start),
            ',' => self.single(TokenKind::Comma, start),
            ':' => self.single(TokenKind::Colon, start),
            ';' => self.single(TokenKind::Semicolon, start),

            '{' => {
                if let Mode::Interpolation { depth } = self.mode() {
                    *self.modes.last_mut().unwrap() = Mode::Interpolation { depth: depth + 1 };
                }
                self.single(TokenKind::LBrace, start)
            }
            '}' => match self.mode() {
                Mode::Interpolation { depth: 0 } => {
                    self.cursor.advance();
                    self.modes.pop();
                    Token::new(TokenKind::InterpolationEnd, start, self.cursor.pos())
                }
                Mode::Interpolation { depth } => {
                    *self.modes.last_mut().unwrap() = Mode::Interpolation { depth: depth - 1 };
                    self.single(TokenKind::RBrace, start)
                }
                _ => self.single(TokenKind::RBrace, start),
            },

            '.' => {
                if self.cursor.starts_with("...") {
                    self.cursor.advance();
                    self.cursor.advance();
                    self.cursor.advance();
                    Token::new(TokenKind::Ellipsis, start, self.cursor.pos())
                } else {
                    self.single(TokenKind::Dot, start)
                }
            }

            '=' => self.one_or_two(TokenKind::Assign, '=', TokenKind::EqEq, start),
            '<' => self.one_or_two(TokenKind::Lt, '=', TokenKind::LtEq, start),
            '>' => self.one_or_two(TokenKind::Gt, '=', TokenKind::GtEq, start),
            '+' => self.one_or_two(TokenKind::Plus, '=', TokenKind::PlusAssign, start),
            '-' => self.one_or_two(TokenKind::Minus, '=', TokenKind::MinusAssign, start),
            '*' => self.one_or_two(TokenKind::Star, '=', TokenKind::StarAssign, start),
            '/' => self.one_or_two(TokenKind::Slash, '=', TokenKind::SlashAssign, start),

            '!' => {
                if self.cursor.peek_second() == Some('=') {
                    self.cursor.advance();
                    self.cursor.advance();
                    Token::new(TokenKind::NotEq, start, self.cursor.pos())
                } else {
                    self.skip_invalid_char(leading);
                    return None;
                }
            }

            '0'..='9' => self.lex_number(start),
            '\'' => self.lex_char(start),
            '"' | '#' => match self.lex_string_start(start) {
                Some(token) => token,
                None => {
                    self.skip_invalid_char(leading);
                    return None;
                }
            },

            c if is_ident_start(c) => self.lex_ident(start),

            _ => {
                self.skip_invalid_char(leading);
                return None;
            }
        };
        Some(token)
    }

    fn single(&mut self, kind: TokenKind, start: u32) -> Token {
        self.cursor.advance();
        Token::new(kind, start, self.cursor.pos())
    }

    fn one_or_two(&mut self, one: TokenKind, second: char, two: TokenKind, start: u32) -> Token {
        self.cursor.advance();
        if self.cursor.peek() == Some(second) {
            self.cursor.advance();
            Token::new(two, start, self.cursor.pos())
        } else {
            Token::new(one, start, self.cursor.pos())
        }
    }

    /// Consume one invalid character as `Skipped` trivia plus a diagnostic.
    fn skip_invalid_char(&mut self, leading: &mut Vec<Trivia>) {
        let start = self.cursor.pos();
        let c = self.cursor.advance().unwrap_or('\0');
        let span = Span::new(start, self.cursor.pos());
        self.diagnostics.report(
            DiagnosticKind::UnexpectedInput {
                what: format!("character `{c}`"),
            },
            span,
        );
        leading.push(Trivia {
            kind: TriviaKind::Skipped,
            span,
        });
    }

    // ── Trivia ─────────────────────────────────────────────────────────

    /// Collect whitespace, line breaks, and comments into `out`.
    fn collect_leading(&mut self, out: &mut Vec<Trivia>) {
        loop {
            let start = self.cursor.pos();
            match self.cursor.peek() {
                Some(' ') | Some('\t') => {
                    self.cursor.eat_while(|c| c == ' ' || c == '\t');
                    out.push(Trivia::new(TriviaKind::Whitespace, start, self.cursor.pos()));
                }
                Some('\n') => {
                    self.cursor.advance();
                    out.push(Trivia::new(TriviaKind::Newline, start, self.cursor.pos()));
                }
                Some('\r') => {
                    self.cursor.advance();
                    if self.cursor.peek() == Some('\n') {
                        self.cursor.advance();
                    }
                    out.push(Trivia::new(TriviaKind::Newline, start, self.cursor.pos()));
                }
                Some('/') if self.cursor.peek_second() == Some('/') => {
                    let kind = if self.cursor.peek_third() == Some('/') {
                        TriviaKind::DocComment
                    } else {
                        TriviaKind::LineComment
                    };
                    self.cursor.eat_while(|c| c != '\n' && c != '\r');
                    out.push(Trivia::new(kind, start, self.cursor.pos()));
                }
                _ => break,
            }
        }
    }

    /// Collect trailing trivia: spaces up to a line break, plus the line
    /// break itself. If no line break follows on this line, nothing is
    /// consumed -- same-line whitespace before another token is that
    /// token's leading trivia.
    fn collect_trailing(&mut self) -> Vec<Trivia> {
        let mut out = Vec::new();
        let start = self.cursor.pos();
        self.cursor.eat_while(|c| c == ' ' || c == '\t');
        let ws_end = self.cursor.pos();

        match self.cursor.peek() {
            Some('\n') => {
                self.cursor.advance();
            }
            Some('\r') => {
                self.cursor.advance();
                if self.cursor.peek() == Some('\n') {
                    self.cursor.advance();
                }
            }
            _ => {
                self.cursor.set_pos(start);
                return out;
            }
        }

        if ws_end > start {
            out.push(Trivia::new(TriviaKind::Whitespace, start, ws_end));
        }
        out.push(Trivia::new(TriviaKind::Newline, ws_end, self.cursor.pos()));
        out
    }

    // ── Identifiers and literals ───────────────────────────────────────

    fn lex_ident(&mut self, start: u32) -> Token {
        self.cursor.eat_while(is_ident_continue);
        let text = &self.source[start as usize..self.cursor.pos() as usize];
        let kind = keyword_from_str(text).unwrap_or(TokenKind::Ident);
        Token::new(kind, start, self.cursor.pos())
    }

    fn lex_number(&mut self, start: u32) -> Token {
        self.cursor.eat_while(|c| c.is_ascii_digit());

        let mut is_float = false;
        if self.cursor.peek() == Some('.')
            && self.cursor.peek_second().is_some_and(|c| c.is_ascii_digit())
        {
            is_float = true;
            self.cursor.advance();
            self.cursor.eat_while(|c| c.is_ascii_digit());
        }
        if matches!(self.cursor.peek(), Some('e') | Some('E')) {
            let exp_digit_at = if matches!(self.cursor.peek_second(), Some('+') | Some('-')) {
                self.cursor.peek_third()
            } else {
                self.cursor.peek_second()
            };
            if exp_digit_at.is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.cursor.advance();
                if matches!(self.cursor.peek(), Some('+') | Some('-')) {
                    self.cursor.advance();
                }
                self.cursor.eat_while(|c| c.is_ascii_digit());
            }
        }

        let end = self.cursor.pos();
        let text = &self.source[start as usize..end as usize];
        let mut token = Token::new(
            if is_float {
                TokenKind::FloatLiteral
            } else {
                TokenKind::IntLiteral
            },
            start,
            end,
        );
        if is_float {
            token.value = text.parse::<f64>().ok().map(TokenValue::Float);
        } else {
            token.value = match text.parse::<i64>() {
                Ok(v) => Some(TokenValue::Int(v)),
                Err(_) => {
                    self.diagnostics.report(
                        DiagnosticKind::UnexpectedInput {
                            what: format!("integer literal `{text}` out of range"),
                        },
                        Span::new(start, end),
                    );
                    None
                }
            };
        }
        token
    }

    fn lex_char(&mut self, start: u32) -> Token {
        self.cursor.advance(); // opening quote
        let mut decoded = String::new();
        match self.cursor.peek() {
            None | Some('\n') | Some('\r') => {
                self.diagnostics.report(
                    DiagnosticKind::UnterminatedStringLiteral,
                    Span::new(start, self.cursor.pos()),
                );
            }
            Some('\\') => self.scan_escape(0, &mut decoded),
            Some(c) => {
                self.cursor.advance();
                decoded.push(c);
            }
        }
        if self.cursor.peek() == Some('\'') {
            self.cursor.advance();
        } else {
            self.diagnostics.report(
                DiagnosticKind::UnterminatedStringLiteral,
                Span::new(start, self.cursor.pos()),
            );
        }
        let mut token = Token::new(TokenKind::CharLiteral, start, self.cursor.pos());
        token.value = decoded.chars().next().map(TokenValue::Char);
        token
    }

    // ── String lexing ──────────────────────────────────────────────────

    /// At a `"` or `#`: try to open a string. `#`s not followed by a quote
    /// are not a string delimiter and the caller skips them as invalid.
    fn lex_string_start(&mut self, start: u32) -> Option<Token> {
        let hashes = self.cursor.count_run('#');
        let after = &self.cursor.rest()[hashes as usize..];
        if after.starts_with("\"\"\"") {
            for _ in 0..hashes + 3 {
                self.cursor.advance();
            }
            self.modes.push(Mode::MultiLineString { hashes });
            Some(Token::new(
                TokenKind::MultiLineStringStart,
                start,
                self.cursor.pos(),
            ))
        } else if after.starts_with('"') {
            for _ in 0..hashes + 1 {
                self.cursor.advance();
            }
            self.modes.push(Mode::LineString { hashes });
            Some(Token::new(
                TokenKind::LineStringStart,
                start,
                self.cursor.pos(),
            ))
        } else {
            None
        }
    }

    /// Whether the input at the cursor closes a line string with `hashes`.
    fn at_line_close(&self, hashes: u32) -> bool {
        let rest = self.cursor.rest();
        rest.starts_with('"') && rest[1..].chars().take_while(|&c| c == '#').count() as u32 >= hashes
    }

    /// Whether the input at the cursor closes a multi-line string.
    fn at_multi_close(&self, hashes: u32) -> bool {
        let rest = self.cursor.rest();
        rest.starts_with("\"\"\"")
            && rest[3..].chars().take_while(|&c| c == '#').count() as u32 >= hashes
    }

    /// Whether the input at the cursor is `\` followed by `hashes` hashes,
    /// i.e. an escape (or interpolation) introducer for this string.
    fn at_escape_intro(&self, hashes: u32) -> bool {
        let rest = self.cursor.rest();
        rest.starts_with('\\')
            && rest[1..].chars().take_while(|&c| c == '#').count() as u32 >= hashes
    }

    /// The character following an escape introducer, without consuming.
    fn escape_char(&self, hashes: u32) -> Option<char> {
        self.cursor.rest()[1 + hashes as usize..].chars().next()
    }

    fn lex_line_string(&mut self, hashes: u32) -> Token {
        let start = self.cursor.pos();

        if self.cursor.is_eof() || matches!(self.cursor.peek(), Some('\n') | Some('\r')) {
            self.diagnostics.report(
                DiagnosticKind::UnterminatedStringLiteral,
                Span::empty_at(start),
            );
            self.modes.pop();
            let mut token = Token::new(TokenKind::LineStringEnd, start, start);
            token.trailing = self.collect_trailing();
            return token;
        }

        if self.at_line_close(hashes) {
            for _ in 0..hashes + 1 {
                self.cursor.advance();
            }
            self.modes.pop();
            let mut token = Token::new(TokenKind::LineStringEnd, start, self.cursor.pos());
            token.trailing = self.collect_trailing();
            return token;
        }

        if self.at_escape_intro(hashes) && self.escape_char(hashes) == Some('{') {
            for _ in 0..hashes + 2 {
                self.cursor.advance();
            }
            self.modes.push(Mode::Interpolation { depth: 0 });
            return Token::new(TokenKind::InterpolationStart, start, self.cursor.pos());
        }

        self.lex_string_content(hashes, false, start)
    }

    fn lex_multi_line_string(&mut self, hashes: u32) -> Token {
        let start = self.cursor.pos();

        if self.cursor.is_eof() {
            self.diagnostics.report(
                DiagnosticKind::UnterminatedStringLiteral,
                Span::empty_at(start),
            );
            self.modes.pop();
            return Token::new(TokenKind::MultiLineStringEnd, start, start);
        }

        if matches!(self.cursor.peek(), Some('\n') | Some('\r')) {
            self.cursor.advance();
            if self.source.as_bytes()[start as usize] == b'\r' && self.cursor.peek() == Some('\n')
            {
                self.cursor.advance();
            }
            return Token::new(TokenKind::StringNewline, start, self.cursor.pos());
        }

        // At the start of a line, indentation followed by the closing
        // delimiter belongs to the closing token as leading trivia; the
        // parser compares content lines against it.
        if self.at_line_start() {
            self.cursor.eat_while(|c| c == ' ' || c == '\t');
            if self.at_multi_close(hashes) {
                let ws_end = self.cursor.pos();
                for _ in 0..hashes + 3 {
                    self.cursor.advance();
                }
                self.modes.pop();
                let mut token = Token::new(TokenKind::MultiLineStringEnd, ws_end, self.cursor.pos());
                if ws_end > start {
                    token.leading.push(Trivia::new(TriviaKind::Whitespace, start, ws_end));
                }
                token.trailing = self.collect_trailing();
                return token;
            }
            self.cursor.set_pos(start);
        }

        if self.at_multi_close(hashes) {
            for _ in 0..hashes + 3 {
                self.cursor.advance();
            }
            self.modes.pop();
            let mut token = Token::new(TokenKind::MultiLineStringEnd, start, self.cursor.pos());
            token.trailing = self.collect_trailing();
            return token;
        }

        if self.at_escape_intro(hashes) && self.escape_char(hashes) == Some('{') {
            for _ in 0..hashes + 2 {
                self.cursor.advance();
            }
            self.modes.push(Mode::Interpolation { depth: 0 });
            return Token::new(TokenKind::InterpolationStart, start, self.cursor.pos());
        }

        self.lex_string_content(hashes, true, start)
    }

    /// Scan a run of string content, stopping before anything that is not
    /// plain content: the closing delimiter, an escape introducing an
    /// interpolation, a line break, or end of input.
    fn lex_string_content(&mut self, hashes: u32, multi_line: bool, start: u32) -> Token {
        let mut decoded = String::new();
        loop {
            if self.cursor.is_eof() {
                break;
            }
            let c = self.cursor.peek().unwrap();
            if c == '\n' || c == '\r' {
                break;
            }
            if c == '"' {
                let closes = if multi_line {
                    self.at_multi_close(hashes)
                } else {
                    self.at_line_close(hashes)
                };
                if closes {
                    break;
                }
                self.cursor.advance();
                decoded.push('"');
                continue;
            }
            if c == '\\' && self.at_escape_intro(hashes) {
                if self.escape_char(hashes) == Some('{') {
                    break;
                }
                self.scan_escape(hashes, &mut decoded);
                continue;
            }
            self.cursor.advance();
            decoded.push(c);
        }

        let mut token = Token::new(TokenKind::StringContent, start, self.cursor.pos());
        token.value = Some(TokenValue::String(decoded));
        token
    }

    /// Consume an escape sequence (`\`, `hashes` hashes, escape character)
    /// and append its decoded form to `buf`. Unknown escapes keep their raw
    /// text and report a diagnostic.
    fn scan_escape(&mut self, hashes: u32, buf: &mut String) {
        let start = self.cursor.pos();
        self.cursor.advance(); // backslash
        for _ in 0..hashes {
            self.cursor.advance();
        }
        match self.cursor.advance() {
            Some('n') => buf.push('\n'),
            Some('r') => buf.push('\r'),
            Some('t') => buf.push('\t'),
            Some('0') => buf.push('\0'),
            Some('\\') => buf.push('\\'),
            Some('"') => buf.push('"'),
            Some('\'') => buf.push('\''),
            Some('u') => {
                let mut ok = false;
                if self.cursor.peek() == Some('{') {
                    self.cursor.advance();
                    let digits_start = self.cursor.pos();
                    self.cursor.eat_while(|c| c.is_ascii_hexdigit());
                    let digits = &self.source[digits_start as usize..self.cursor.pos() as usize];
                    if self.cursor.peek() == Some('}') {
                        self.cursor.advance();
                        if let Some(c) = u32::from_str_radix(digits, 16)
                            .ok()
                            .and_then(char::from_u32)
                        {
                            buf.push(c);
                            ok = true;
                        }
                    }
                }
                if !ok {
                    let span = Span::new(start, self.cursor.pos());
                    self.diagnostics.report(
                        DiagnosticKind::InvalidEscapeSequence {
                            sequence: self.source[start as usize..self.cursor.pos() as usize]
                                .to_string(),
                        },
                        span,
                    );
                    buf.push_str(&self.source[start as usize..self.cursor.pos() as usize]);
                }
            }
            other => {
                let span = Span::new(start, self.cursor.pos());
                self.diagnostics.report(
                    DiagnosticKind::InvalidEscapeSequence {
                        sequence: self.source[start as usize..self.cursor.pos() as usize]
                            .to_string(),
                    },
                    span,
                );
                buf.push('\\');
                for _ in 0..hashes {
                    buf.push('#');
                }
                if let Some(c) = other {
                    buf.push(c);
                }
            }
        }
    }

    fn at_line_start(&self) -> bool {
        let pos = self.cursor.pos() as usize;
        pos == 0 || matches!(self.source.as_bytes()[pos - 1], b'\n' | b'\r')
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::tokenize(source)
            .tokens
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn empty_source_is_just_eof() {
        let result = Lexer::tokenize("");
        assert_eq!(result.tokens.len(), 1);
        assert_eq!(result.tokens[0].kind, TokenKind::EndOfInput);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("func main var x val"),
            vec![
                TokenKind::Func,
                TokenKind::Ident,
                TokenKind::Var,
                TokenKind::Ident,
                TokenKind::Val,
                TokenKind::EndOfInput,
            ]
        );
    }

    #[test]
    fn compound_operators() {
        assert_eq!(
            kinds("= == != <= >= += -= *= /= ..."),
            vec![
                TokenKind::Assign,
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::PlusAssign,
                TokenKind::MinusAssign,
                TokenKind::StarAssign,
                TokenKind::SlashAssign,
                TokenKind::Ellipsis,
                TokenKind::EndOfInput,
            ]
        );
    }

    #[test]
    fn int_and_float_literals_decode() {
        let result = Lexer::tokenize("42 3.25 1e3");
        assert_eq!(result.tokens[0].value, Some(TokenValue::Int(42)));
        assert_eq!(result.tokens[1].value, Some(TokenValue::Float(3.25)));
        assert_eq!(result.tokens[2].kind, TokenKind::FloatLiteral);
        assert_eq!(result.tokens[2].value, Some(TokenValue::Float(1000.0)));
    }

    #[test]
    fn member_access_is_not_a_float() {
        assert_eq!(
            kinds("a.1"),
            vec![
                TokenKind::Ident,
                TokenKind::Dot,
                TokenKind::IntLiteral,
                TokenKind::EndOfInput
            ]
        );
    }

    #[test]
    fn leading_trivia_holds_comments_and_space() {
        let result = Lexer::tokenize("  // note\n  x");
        let x = &result.tokens[0];
        assert_eq!(x.kind, TokenKind::Ident);
        let kinds: Vec<_> = x.leading.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TriviaKind::Whitespace,
                TriviaKind::LineComment,
                TriviaKind::Newline,
                TriviaKind::Whitespace,
            ]
        );
    }

    #[test]
    fn trailing_trivia_takes_the_line_break() {
        let result = Lexer::tokenize("x  \ny");
        let x = &result.tokens[0];
        let kinds: Vec<_> = x.trailing.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TriviaKind::Whitespace, TriviaKind::Newline]);
        // y gets no leading whitespace -- it all went to x's trailing.
        assert!(result.tokens[1].leading.is_empty());
    }

    #[test]
    fn same_line_space_is_leading_of_next() {
        let result = Lexer::tokenize("x y");
        assert!(result.tokens[0].trailing.is_empty());
        assert_eq!(result.tokens[1].leading.len(), 1);
        assert_eq!(result.tokens[1].leading[0].kind, TriviaKind::Whitespace);
    }

    #[test]
    fn crlf_counts_as_one_newline() {
        let result = Lexer::tokenize("x\r\ny");
        let x = &result.tokens[0];
        assert_eq!(x.trailing.len(), 1);
        assert_eq!(x.trailing[0].kind, TriviaKind::Newline);
        assert_eq!(x.trailing[0].span.len(), 2);
    }

    #[test]
    fn invalid_character_becomes_skipped_trivia() {
        let result = Lexer::tokenize("a $ b");
        assert_eq!(
            result
                .tokens
                .iter()
                .map(|t| t.kind)
                .collect::<Vec<_>>(),
            vec![TokenKind::Ident, TokenKind::Ident, TokenKind::EndOfInput]
        );
        let b = &result.tokens[1];
        assert!(b.leading.iter().any(|t| t.kind == TriviaKind::Skipped));
        assert_eq!(result.diagnostics.len(), 1);
    }

    #[test]
    fn line_string_tokens() {
        let result = Lexer::tokenize("\"hello\"");
        assert_eq!(
            result.tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![
                TokenKind::LineStringStart,
                TokenKind::StringContent,
                TokenKind::LineStringEnd,
                TokenKind::EndOfInput,
            ]
        );
        assert_eq!(
            result.tokens[1].value,
            Some(TokenValue::String("hello".to_string()))
        );
    }

    #[test]
    fn line_string_escapes_decode() {
        let result = Lexer::tokenize(r#""a\nb""#);
        assert_eq!(
            result.tokens[1].value,
            Some(TokenValue::String("a\nb".to_string()))
        );
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn raw_string_hash_rule() {
        // One hash: `"` alone is content; `\n` is not an escape.
        let result = Lexer::tokenize("#\"quote \" and \\n here\"#");
        assert_eq!(
            result.tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![
                TokenKind::LineStringStart,
                TokenKind::StringContent,
                TokenKind::LineStringEnd,
                TokenKind::EndOfInput,
            ]
        );
        assert_eq!(
            result.tokens[1].value,
            Some(TokenValue::String("quote \" and \\n here".to_string()))
        );
    }

    #[test]
    fn raw_string_escape_with_hash() {
        let result = Lexer::tokenize("#\"a\\#nb\"#");
        assert_eq!(
            result.tokens[1].value,
            Some(TokenValue::String("a\nb".to_string()))
        );
    }

    #[test]
    fn interpolation_nests_the_lexer() {
        let result = Lexer::tokenize(r#""a\{1 + 2}b""#);
        assert_eq!(
            result.tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![
                TokenKind::LineStringStart,
                TokenKind::StringContent,
                TokenKind::InterpolationStart,
                TokenKind::IntLiteral,
                TokenKind::Plus,
                TokenKind::IntLiteral,
                TokenKind::InterpolationEnd,
                TokenKind::StringContent,
                TokenKind::LineStringEnd,
                TokenKind::EndOfInput,
            ]
        );
    }

    #[test]
    fn interpolation_tracks_nested_braces() {
        let result = Lexer::tokenize(r#""\{ { 1 } }""#);
        let kinds: Vec<_> = result.tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::LineStringStart,
                TokenKind::InterpolationStart,
                TokenKind::LBrace,
                TokenKind::IntLiteral,
                TokenKind::RBrace,
                TokenKind::InterpolationEnd,
                TokenKind::LineStringEnd,
                TokenKind::EndOfInput,
            ]
        );
    }

    #[test]
    fn unterminated_line_string_recovers() {
        let result = Lexer::tokenize("\"abc\nx");
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::UnterminatedStringLiteral));
        // The synthetic end token is zero-width and the newline attaches to it.
        let end = result
            .tokens
            .iter()
            .find(|t| t.kind == TokenKind::LineStringEnd)
            .unwrap();
        assert!(end.span.is_empty());
        assert!(end.trailing.iter().any(|t| t.kind == TriviaKind::Newline));
    }

    #[test]
    fn multi_line_string_emits_newlines_and_indent_trivia() {
        let source = "\"\"\"\n  foo\n  \"\"\"";
        let result = Lexer::tokenize(source);
        let kinds: Vec<_> = result.tokens.iter().map(|t| t.kind).collect();
        // The newline after `"""` is the opener's trailing trivia, so the
        // only StringNewline token is the one ending the `  foo` line.
        assert_eq!(
            kinds,
            vec![
                TokenKind::MultiLineStringStart,
                TokenKind::StringContent,
                TokenKind::StringNewline,
                TokenKind::MultiLineStringEnd,
                TokenKind::EndOfInput,
            ]
        );
        let start = &result.tokens[0];
        assert!(start.trailing.iter().any(|t| t.kind == TriviaKind::Newline));
        let end = result
            .tokens
            .iter()
            .find(|t| t.kind == TokenKind::MultiLineStringEnd)
            .unwrap();
        assert_eq!(end.leading.len(), 1);
        assert_eq!(end.leading[0].kind, TriviaKind::Whitespace);
        assert_eq!(end.leading[0].span.len(), 2);
    }

    #[test]
    fn lexing_is_deterministic() {
        let source = "func f() { val s = \"a\\{x}b\"; } $";
        let a = Lexer::tokenize(source);
        let b = Lexer::tokenize(source);
        assert_eq!(a.tokens, b.tokens);
        assert_eq!(a.diagnostics.len(), b.diagnostics.len());
    }
}
