//! Recursive descent parser from tokens to the structural tree.
//!
//! The parser recognizes statement boundaries, blocks, bracket groups and
//! import statements. Errors are reported to the diagnostic sink and parsing
//! continues at the next logical line, so one pass reports every problem in
//! the file.

use crate::ast::*;
use crate::diagnostic::{codes, Diagnostic, DiagnosticCode, DiagnosticSink};
use crate::source::Span;
use crate::token::{PyToken, Token};

/// Parser over a token stream produced by [`lex`](crate::lexer::lex).
pub struct PyParser<'src> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'src str,
    sink: &'src DiagnosticSink,
}

impl<'src> PyParser<'src> {
    /// Creates a parser. `tokens` must have been lexed from `source` and end
    /// with [`PyToken::Eof`].
    pub fn new(tokens: Vec<Token>, source: &'src str, sink: &'src DiagnosticSink) -> Self {
        Self {
            tokens,
            pos: 0,
            source,
            sink,
        }
    }

    // ========================================================================
    // Primitive operations
    // ========================================================================

    fn token_at(&self, offset: usize) -> Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        self.tokens[idx]
    }

    fn current(&self) -> PyToken {
        self.token_at(0).kind
    }

    fn current_span(&self) -> Span {
        self.token_at(0).span
    }

    fn text(&self, span: Span) -> &'src str {
        self.source
            .get(span.start as usize..span.end as usize)
            .unwrap_or("")
    }

    fn current_text(&self) -> &'src str {
        self.text(self.current_span())
    }

    fn at(&self, kind: PyToken) -> bool {
        self.current() == kind
    }

    fn at_eof(&self) -> bool {
        self.at(PyToken::Eof)
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.current(),
            PyToken::Semicolon | PyToken::Newline | PyToken::Eof
        )
    }

    fn prev_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            self.current_span()
        }
    }

    fn advance(&mut self) {
        if !self.at_eof() {
            self.pos += 1;
        }
    }

    fn eat(&mut self, kind: PyToken) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, code: DiagnosticCode, msg: impl Into<String>, span: Span) {
        self.sink.emit(Diagnostic::error(code, msg, span));
    }

    fn recover_to_newline(&mut self) {
        while !matches!(self.current(), PyToken::Newline | PyToken::Eof) {
            self.advance();
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    /// Parses the whole token stream into a module.
    pub fn parse_module(&mut self) -> PyModule {
        let mut body = Vec::new();
        while !self.at_eof() {
            self.parse_statement_into(&mut body);
        }
        PyModule { body }
    }

    fn parse_block(&mut self) -> Vec<Stmt> {
        let mut body = Vec::new();
        while !self.at(PyToken::Dedent) && !self.at_eof() {
            self.parse_statement_into(&mut body);
        }
        self.eat(PyToken::Dedent);
        body
    }

    fn parse_statement_into(&mut self, out: &mut Vec<Stmt>) {
        match self.current() {
            PyToken::Newline | PyToken::Dedent => self.advance(),
            PyToken::Indent => {
                self.error(codes::UNEXPECTED_INDENT, "unexpected indent", self.current_span());
                self.advance();
                let nested = self.parse_block();
                out.extend(nested);
            }
            kind if kind.starts_compound() => out.push(self.parse_compound()),
            PyToken::Name if self.at_soft_compound() => out.push(self.parse_compound()),
            _ => self.parse_simple_line(out),
        }
    }

    /// `match subject:` and `case pattern:` only open a block when the line
    /// ends in `:` and the next line is indented; otherwise `match` and
    /// `case` are plain names.
    fn at_soft_compound(&self) -> bool {
        if !matches!(self.current_text(), "match" | "case") {
            return false;
        }
        let mut i = 1;
        while !matches!(self.token_at(i).kind, PyToken::Newline | PyToken::Eof) {
            i += 1;
        }
        i > 2 && self.token_at(i - 1).kind == PyToken::Colon && self.token_at(i + 1).kind == PyToken::Indent
    }

    fn parse_simple_line(&mut self, out: &mut Vec<Stmt>) {
        loop {
            out.push(self.parse_small_stmt());
            if !self.eat(PyToken::Semicolon) || matches!(self.current(), PyToken::Newline | PyToken::Eof) {
                break;
            }
        }
        if !self.eat(PyToken::Newline) && !self.at_eof() {
            self.error(
                codes::UNEXPECTED_TOKEN,
                format!("unexpected token '{}'", self.current_text()),
                self.current_span(),
            );
            self.recover_to_newline();
            self.eat(PyToken::Newline);
        }
    }

    fn parse_small_stmt(&mut self) -> Stmt {
        let start = self.current_span();
        match self.current() {
            PyToken::Import => self.parse_import(),
            PyToken::From => self.parse_from_import(),
            _ => {
                let (nodes, last) = self.parse_nodes(false);
                if nodes.is_empty() {
                    self.error(codes::UNEXPECTED_TOKEN, "expected a statement", start);
                }
                self.check_operand(last);
                Stmt {
                    kind: StmtKind::Simple(nodes),
                    span: start.to(self.prev_span()),
                }
            }
        }
    }

    fn parse_compound(&mut self) -> Stmt {
        let start = self.current_span();
        self.check_definition_name();

        let (header, last) = self.parse_nodes(true);
        self.check_operand(last);

        if !self.eat(PyToken::Colon) {
            self.error(codes::EXPECTED_COLON, "expected ':'", self.current_span());
            self.recover_to_newline();
            self.eat(PyToken::Newline);
            let body = if self.eat(PyToken::Indent) {
                self.parse_block()
            } else {
                Vec::new()
            };
            return Stmt {
                kind: StmtKind::Compound { header, body },
                span: start.to(self.prev_span()),
            };
        }

        let body = if self.eat(PyToken::Newline) {
            if self.eat(PyToken::Indent) {
                self.parse_block()
            } else {
                self.error(
                    codes::EXPECTED_BLOCK,
                    "expected an indented block",
                    self.current_span(),
                );
                Vec::new()
            }
        } else if self.at_eof() {
            self.error(
                codes::EXPECTED_BLOCK,
                "expected an indented block",
                self.current_span(),
            );
            Vec::new()
        } else {
            let mut suite = Vec::new();
            self.parse_simple_line(&mut suite);
            suite
        };

        Stmt {
            kind: StmtKind::Compound { header, body },
            span: start.to(self.prev_span()),
        }
    }

    /// `def` and `class` (optionally after `async`) must be followed by a name.
    fn check_definition_name(&self) {
        let mut i = 0;
        if self.token_at(i).kind == PyToken::Async {
            i += 1;
        }
        let keyword = self.token_at(i);
        if matches!(keyword.kind, PyToken::Def | PyToken::Class) && self.token_at(i + 1).kind != PyToken::Name {
            self.error(
                codes::EXPECTED_NAME,
                format!("expected name after '{}'", self.text(keyword.span)),
                self.token_at(i + 1).span,
            );
        }
    }

    /// Reports an operator that ends a statement, header or group.
    fn check_operand(&self, last: Option<Token>) {
        if let Some(tok) = last {
            if tok.kind.needs_operand() {
                self.error(
                    codes::DANGLING_OPERATOR,
                    format!("expected expression after '{}'", self.text(tok.span)),
                    tok.span,
                );
            }
        }
    }

    // ========================================================================
    // Imports
    // ========================================================================

    fn parse_import(&mut self) -> Stmt {
        let start = self.current_span();
        self.advance();
        let mut names = Vec::new();
        loop {
            let Some(name) = self.parse_dotted_name() else {
                self.error(
                    codes::EXPECTED_NAME,
                    "expected module name after 'import'",
                    self.current_span(),
                );
                break;
            };
            let asname = self.parse_as_name();
            names.push(ImportAlias { name, asname });
            if !self.eat(PyToken::Comma) {
                break;
            }
        }
        self.expect_statement_end();
        Stmt {
            kind: StmtKind::Import(names),
            span: start.to(self.prev_span()),
        }
    }

    fn parse_from_import(&mut self) -> Stmt {
        let start = self.current_span();
        self.advance();

        let mut level = 0;
        loop {
            if self.eat(PyToken::Dot) {
                level += 1;
            } else if self.eat(PyToken::Ellipsis) {
                level += 3;
            } else {
                break;
            }
        }
        let module = self.parse_dotted_name();
        if level == 0 && module.is_none() {
            self.error(
                codes::EXPECTED_NAME,
                "expected module name after 'from'",
                self.current_span(),
            );
        }

        let mut names = Vec::new();
        if !self.eat(PyToken::Import) {
            self.error(
                codes::UNEXPECTED_TOKEN,
                "expected 'import'",
                self.current_span(),
            );
            while !self.at_statement_end() {
                self.advance();
            }
        } else if self.eat(PyToken::Star) {
            names.push(ImportAlias {
                name: "*".to_string(),
                asname: None,
            });
        } else {
            let parenthesized = self.eat(PyToken::LeftParen);
            loop {
                if parenthesized && self.at(PyToken::RightParen) {
                    break;
                }
                if !self.at(PyToken::Name) {
                    self.error(
                        codes::EXPECTED_NAME,
                        "expected name after 'import'",
                        self.current_span(),
                    );
                    break;
                }
                let name = self.current_text().to_string();
                self.advance();
                let asname = self.parse_as_name();
                names.push(ImportAlias { name, asname });
                if !self.eat(PyToken::Comma) {
                    break;
                }
            }
            if parenthesized && !self.eat(PyToken::RightParen) {
                self.error(codes::UNEXPECTED_TOKEN, "expected ')'", self.current_span());
            }
        }
        self.expect_statement_end();
        Stmt {
            kind: StmtKind::ImportFrom {
                level,
                module,
                names,
            },
            span: start.to(self.prev_span()),
        }
    }

    fn parse_dotted_name(&mut self) -> Option<String> {
        if !self.at(PyToken::Name) {
            return None;
        }
        let mut name = self.current_text().to_string();
        self.advance();
        while self.eat(PyToken::Dot) {
            if !self.at(PyToken::Name) {
                self.error(codes::EXPECTED_NAME, "expected name after '.'", self.current_span());
                break;
            }
            name.push('.');
            name.push_str(self.current_text());
            self.advance();
        }
        Some(name)
    }

    fn parse_as_name(&mut self) -> Option<String> {
        if !self.eat(PyToken::As) {
            return None;
        }
        if self.at(PyToken::Name) {
            let name = self.current_text().to_string();
            self.advance();
            Some(name)
        } else {
            self.error(codes::EXPECTED_NAME, "expected name after 'as'", self.current_span());
            None
        }
    }

    fn expect_statement_end(&mut self) {
        if self.at_statement_end() {
            return;
        }
        self.error(
            codes::UNEXPECTED_TOKEN,
            format!("unexpected token '{}'", self.current_text()),
            self.current_span(),
        );
        while !self.at_statement_end() {
            self.advance();
        }
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    /// Collects top-level nodes up to the end of the statement. In `header`
    /// mode a `:` that does not belong to a `lambda` also ends the sequence.
    ///
    /// Returns the nodes and the last top-level token consumed.
    fn parse_nodes(&mut self, header: bool) -> (Vec<Node>, Option<Token>) {
        let mut nodes = Vec::new();
        let mut last = None;
        let mut open_lambdas = 0u32;
        loop {
            let tok = self.token_at(0);
            match tok.kind {
                PyToken::Semicolon
                | PyToken::Newline
                | PyToken::Indent
                | PyToken::Dedent
                | PyToken::Eof => break,
                PyToken::Colon if header && open_lambdas == 0 => break,
                PyToken::Error | PyToken::RightParen | PyToken::RightBracket | PyToken::RightBrace => {
                    self.advance();
                }
                PyToken::LeftParen | PyToken::LeftBracket | PyToken::LeftBrace => {
                    let (group, close) = self.parse_group();
                    nodes.push(Node::Group(group));
                    last = Some(close);
                }
                kind => {
                    match kind {
                        PyToken::Lambda => open_lambdas += 1,
                        PyToken::Colon => open_lambdas = open_lambdas.saturating_sub(1),
                        _ => {}
                    }
                    nodes.push(self.leaf(tok));
                    last = Some(tok);
                    self.advance();
                }
            }
        }
        (nodes, last)
    }

    fn parse_group(&mut self) -> (Group, Token) {
        let delim = match self.current() {
            PyToken::LeftParen => Delim::Paren,
            PyToken::LeftBracket => Delim::Bracket,
            _ => Delim::Brace,
        };
        self.advance();

        let mut items = Vec::new();
        let mut last = None;
        let close = loop {
            let tok = self.token_at(0);
            match tok.kind {
                PyToken::RightParen | PyToken::RightBracket | PyToken::RightBrace => {
                    self.advance();
                    break tok;
                }
                // The lexer has already reported the unclosed bracket.
                PyToken::Eof => break tok,
                PyToken::Newline | PyToken::Indent | PyToken::Dedent | PyToken::Error => {
                    self.advance();
                }
                PyToken::LeftParen | PyToken::LeftBracket | PyToken::LeftBrace => {
                    let (group, close) = self.parse_group();
                    items.push(Node::Group(group));
                    last = Some(close);
                }
                _ => {
                    items.push(self.leaf(tok));
                    last = Some(tok);
                    self.advance();
                }
            }
        };
        self.check_operand(last);
        (Group { delim, items }, close)
    }

    fn leaf(&self, tok: Token) -> Node {
        let text = self.text(tok.span);
        let leaf = match tok.kind {
            PyToken::Name => Leaf {
                kind: LeafKind::Name,
                text: text.to_string(),
            },
            PyToken::Number => Leaf {
                kind: LeafKind::Number,
                text: text.replace('_', "").to_ascii_lowercase(),
            },
            PyToken::String => string_leaf(text),
            kind if kind.is_keyword() => Leaf {
                kind: LeafKind::Keyword,
                text: text.to_string(),
            },
            _ => Leaf {
                kind: LeafKind::Op,
                text: text.to_string(),
            },
        };
        Node::Leaf(leaf)
    }
}

/// Splits a string token into prefix flags and the body between its quotes.
fn string_leaf(text: &str) -> Leaf {
    let quote_at = text.find(|c: char| c == '"' || c == '\'').unwrap_or(text.len());
    let prefix = text[..quote_at].to_ascii_lowercase();
    let literal = &text[quote_at..];
    let quote_len = match literal.as_bytes() {
        [a, b, c, ..] if a == b && b == c && literal.len() >= 6 => 3,
        [_, ..] if literal.len() >= 2 => 1,
        _ => 0,
    };
    let body = literal
        .get(quote_len..literal.len() - quote_len)
        .unwrap_or("")
        .to_string();
    Leaf {
        kind: LeafKind::Str {
            bytes: prefix.contains('b'),
            raw: prefix.contains('r'),
            formatted: prefix.contains('f'),
        },
        text: body,
    }
}
