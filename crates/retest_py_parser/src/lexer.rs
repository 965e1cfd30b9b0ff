//! Lexical analyzer for test-module source text.
//!
//! Produces a flat token stream in which indentation has already been turned
//! into [`PyToken::Indent`] / [`PyToken::Dedent`] tokens and logical line ends
//! into [`PyToken::Newline`]. Comments, blank lines, line continuations and
//! newlines inside brackets never reach the parser, which is what makes the
//! structural dump insensitive to layout.

use crate::diagnostic::{codes, Diagnostic, DiagnosticCode, DiagnosticSink};
use crate::source::Span;
use crate::token::{lookup_keyword, PyToken, Token, OPERATORS};

/// Columns a tab advances to (the next multiple of this value).
const TAB_WIDTH: u32 = 8;

/// Lexes `source` into tokens. The result always ends with [`PyToken::Eof`].
pub fn lex(source: &str, sink: &DiagnosticSink) -> Vec<Token> {
    let mut lexer = Lexer {
        source: source.as_bytes(),
        pos: 0,
        sink,
        tokens: Vec::new(),
        indents: vec![0],
        brackets: Vec::new(),
        at_line_start: true,
    };
    lexer.lex_all();
    lexer.tokens
}

struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    sink: &'a DiagnosticSink,
    tokens: Vec<Token>,
    indents: Vec<u32>,
    /// Open brackets with the offset they were opened at.
    brackets: Vec<(u8, usize)>,
    at_line_start: bool,
}

impl Lexer<'_> {
    fn lex_all(&mut self) {
        loop {
            if self.at_line_start && self.brackets.is_empty() && !self.lex_indentation() {
                break;
            }
            self.skip_inline_whitespace();
            if self.pos >= self.source.len() {
                break;
            }
            self.next_token();
        }
        self.finish();
    }

    fn peek(&self) -> u8 {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> u8 {
        self.source.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start as u32, self.pos as u32)
    }

    fn push(&mut self, kind: PyToken, start: usize) {
        let span = self.span_from(start);
        self.tokens.push(Token { kind, span });
    }

    fn error(&self, code: DiagnosticCode, msg: impl Into<String>, span: Span) {
        self.sink.emit(Diagnostic::error(code, msg, span));
    }

    fn last_kind(&self) -> Option<PyToken> {
        self.tokens.last().map(|t| t.kind)
    }

    fn skip_inline_whitespace(&mut self) {
        while matches!(self.peek(), b' ' | b'\t' | b'\x0c') {
            self.pos += 1;
        }
    }

    fn skip_comment(&mut self) {
        while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
            self.pos += 1;
        }
    }

    /// Consumes `\n` or `\r\n` (or a lone `\r`) at the current position.
    fn eat_line_break(&mut self) -> bool {
        match self.peek() {
            b'\n' => {
                self.pos += 1;
                true
            }
            b'\r' => {
                self.pos += 1;
                if self.peek() == b'\n' {
                    self.pos += 1;
                }
                true
            }
            _ => false,
        }
    }

    /// Measures the indentation of the next non-blank line and emits
    /// indent/dedent tokens. Returns `false` at end of input.
    fn lex_indentation(&mut self) -> bool {
        loop {
            let mut col = 0u32;
            while self.pos < self.source.len() {
                match self.source[self.pos] {
                    b' ' => col += 1,
                    b'\t' => col = (col / TAB_WIDTH + 1) * TAB_WIDTH,
                    b'\x0c' => col = 0,
                    _ => break,
                }
                self.pos += 1;
            }
            if self.pos >= self.source.len() {
                return false;
            }
            match self.peek() {
                b'#' => {
                    self.skip_comment();
                    self.eat_line_break();
                }
                b'\n' | b'\r' => {
                    self.eat_line_break();
                }
                _ => {
                    self.at_line_start = false;
                    self.apply_indent(col);
                    return true;
                }
            }
        }
    }

    fn apply_indent(&mut self, col: u32) {
        let start = self.pos;
        let top = *self.indents.last().unwrap_or(&0);
        if col > top {
            self.indents.push(col);
            self.push(PyToken::Indent, start);
            return;
        }
        while col < *self.indents.last().unwrap_or(&0) {
            self.indents.pop();
            self.push(PyToken::Dedent, start);
        }
        if col != *self.indents.last().unwrap_or(&0) {
            self.error(
                codes::INCONSISTENT_DEDENT,
                "unindent does not match any outer indentation level",
                Span::new(start as u32, start as u32 + 1),
            );
            self.indents.push(col);
        }
    }

    fn next_token(&mut self) {
        let start = self.pos;
        let b = self.peek();

        if b == b'#' {
            self.skip_comment();
            return;
        }
        if b == b'\\' {
            self.pos += 1;
            if !self.eat_line_break() {
                self.error(
                    codes::BAD_CONTINUATION,
                    "unexpected character after line continuation character",
                    self.span_from(start),
                );
            }
            return;
        }
        if b == b'\n' || b == b'\r' {
            self.eat_line_break();
            if self.brackets.is_empty() {
                if !matches!(self.last_kind(), None | Some(PyToken::Newline)) {
                    self.tokens.push(Token {
                        kind: PyToken::Newline,
                        span: Span::new(start as u32, start as u32 + 1),
                    });
                }
                self.at_line_start = true;
            }
            return;
        }
        if is_ident_start(b) {
            self.lex_name_or_string(start);
            return;
        }
        if b.is_ascii_digit() || (b == b'.' && self.peek_at(1).is_ascii_digit()) {
            self.lex_number(start);
            return;
        }
        if b == b'"' || b == b'\'' {
            self.lex_string_body(start);
            return;
        }
        if matches!(b, b'(' | b'[' | b'{' | b')' | b']' | b'}') {
            self.lex_bracket(start, b);
            return;
        }
        self.lex_operator(start);
    }

    fn lex_name_or_string(&mut self, start: usize) {
        while self.pos < self.source.len() && is_ident_char(self.source[self.pos]) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap_or("");
        if matches!(self.peek(), b'"' | b'\'') && is_string_prefix(text) {
            self.lex_string_body(start);
            return;
        }
        let kind = lookup_keyword(text).unwrap_or(PyToken::Name);
        self.push(kind, start);
    }

    /// Lexes a string literal whose opening quote is at the current position.
    /// `start` includes any prefix already consumed. A backslash always
    /// protects the next byte, raw strings included.
    fn lex_string_body(&mut self, start: usize) {
        let quote = self.peek();
        let triple = self.peek_at(1) == quote && self.peek_at(2) == quote;
        self.pos += if triple { 3 } else { 1 };
        loop {
            if self.pos >= self.source.len() {
                self.error(
                    codes::UNTERMINATED_STRING,
                    "unterminated string literal",
                    self.span_from(start),
                );
                break;
            }
            let c = self.source[self.pos];
            if c == b'\\' {
                self.pos += 2;
                continue;
            }
            if !triple && (c == b'\n' || c == b'\r') {
                self.error(
                    codes::UNTERMINATED_STRING,
                    "unterminated string literal",
                    self.span_from(start),
                );
                break;
            }
            if c == quote {
                if !triple {
                    self.pos += 1;
                    break;
                }
                if self.peek_at(1) == quote && self.peek_at(2) == quote {
                    self.pos += 3;
                    break;
                }
            }
            self.pos += 1;
        }
        self.pos = self.pos.min(self.source.len());
        self.push(PyToken::String, start);
    }

    fn lex_number(&mut self, start: usize) {
        if self.peek() == b'0' && matches!(self.peek_at(1), b'x' | b'X' | b'o' | b'O' | b'b' | b'B') {
            self.pos += 2;
            while self.peek().is_ascii_hexdigit() || self.peek() == b'_' {
                self.pos += 1;
            }
        } else {
            self.eat_digits();
            if self.peek() == b'.' {
                self.pos += 1;
                self.eat_digits();
            }
            if matches!(self.peek(), b'e' | b'E')
                && (self.peek_at(1).is_ascii_digit()
                    || (matches!(self.peek_at(1), b'+' | b'-') && self.peek_at(2).is_ascii_digit()))
            {
                self.pos += 2;
                self.eat_digits();
            }
            if matches!(self.peek(), b'j' | b'J') {
                self.pos += 1;
            }
        }
        if is_ident_char(self.peek()) {
            while is_ident_char(self.peek()) {
                self.pos += 1;
            }
            self.error(codes::INVALID_NUMBER, "invalid numeric literal", self.span_from(start));
            self.push(PyToken::Error, start);
            return;
        }
        self.push(PyToken::Number, start);
    }

    fn eat_digits(&mut self) {
        while self.peek().is_ascii_digit() || self.peek() == b'_' {
            self.pos += 1;
        }
    }

    fn lex_bracket(&mut self, start: usize, b: u8) {
        self.pos += 1;
        let kind = match b {
            b'(' => PyToken::LeftParen,
            b'[' => PyToken::LeftBracket,
            b'{' => PyToken::LeftBrace,
            b')' => PyToken::RightParen,
            b']' => PyToken::RightBracket,
            _ => PyToken::RightBrace,
        };
        if matches!(b, b'(' | b'[' | b'{') {
            self.brackets.push((b, start));
            self.push(kind, start);
            return;
        }
        match self.brackets.pop() {
            None => {
                self.error(
                    codes::UNMATCHED_BRACKET,
                    format!("unmatched '{}'", b as char),
                    self.span_from(start),
                );
                self.push(PyToken::Error, start);
            }
            Some((open, _)) if closing_for(open) != b => {
                self.error(
                    codes::MISMATCHED_BRACKET,
                    format!(
                        "closing parenthesis '{}' does not match opening parenthesis '{}'",
                        b as char, open as char
                    ),
                    self.span_from(start),
                );
                self.push(kind, start);
            }
            Some(_) => self.push(kind, start),
        }
    }

    fn lex_operator(&mut self, start: usize) {
        let rest = &self.source[self.pos..];
        if let Some((text, kind)) = OPERATORS.iter().find(|(op, _)| rest.starts_with(op.as_bytes())) {
            self.pos += text.len();
            self.push(*kind, start);
            return;
        }
        let len = utf8_len(self.peek());
        self.pos = (self.pos + len).min(self.source.len());
        let text = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
        self.error(
            codes::INVALID_CHARACTER,
            format!("invalid character '{text}'"),
            self.span_from(start),
        );
        self.push(PyToken::Error, start);
    }

    fn finish(&mut self) {
        let end = self.source.len();
        for &(open, at) in &self.brackets {
            self.sink.emit(Diagnostic::error(
                codes::UNCLOSED_BRACKET,
                format!("'{}' was never closed", open as char),
                Span::new(at as u32, at as u32 + 1),
            ));
        }
        if !matches!(
            self.last_kind(),
            None | Some(PyToken::Newline) | Some(PyToken::Dedent) | Some(PyToken::Indent)
        ) {
            self.push(PyToken::Newline, end);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(PyToken::Dedent, end);
        }
        self.push(PyToken::Eof, end);
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

fn is_string_prefix(text: &str) -> bool {
    matches!(
        text.to_ascii_lowercase().as_str(),
        "r" | "u" | "b" | "f" | "br" | "rb" | "fr" | "rf"
    )
}

fn closing_for(open: u8) -> u8 {
    match open {
        b'(' => b')',
        b'[' => b']',
        _ => b'}',
    }
}

fn utf8_len(first: u8) -> usize {
    match first {
        0xF0..=0xFF => 4,
        0xE0..=0xEF => 3,
        0xC0..=0xDF => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<PyToken> {
        let sink = DiagnosticSink::new();
        let tokens = lex(source, &sink);
        assert!(!sink.has_errors(), "unexpected errors: {:?}", sink.take_all());
        tokens.into_iter().map(|t| t.kind).collect()
    }

    fn errors(source: &str) -> Vec<Diagnostic> {
        let sink = DiagnosticSink::new();
        lex(source, &sink);
        sink.take_all()
    }

    #[test]
    fn simple_assignment() {
        assert_eq!(
            kinds("x = 1\n"),
            vec![PyToken::Name, PyToken::Equal, PyToken::Number, PyToken::Newline, PyToken::Eof]
        );
    }

    #[test]
    fn indentation_produces_indent_and_dedent() {
        use PyToken::*;
        assert_eq!(
            kinds("def f():\n    return 1\nx\n"),
            vec![
                Def, Name, LeftParen, RightParen, Colon, Newline, Indent, Return, Number, Newline,
                Dedent, Name, Newline, Eof
            ]
        );
    }

    #[test]
    fn dedents_flushed_at_eof() {
        use PyToken::*;
        assert_eq!(
            kinds("if a:\n  if b:\n    c"),
            vec![If, Name, Colon, Newline, Indent, If, Name, Colon, Newline, Indent, Name, Newline, Dedent, Dedent, Eof]
        );
    }

    #[test]
    fn comments_and_blank_lines_vanish() {
        assert_eq!(kinds("# header\n\n   # indented comment\nx  # trailing\n"), kinds("x\n"));
    }

    #[test]
    fn newlines_inside_brackets_are_ignored() {
        assert_eq!(kinds("f(a,\n      b)\n"), kinds("f(a, b)\n"));
    }

    #[test]
    fn backslash_continuation() {
        assert_eq!(kinds("x = 1 + \\\n    2\n"), kinds("x = 1 + 2\n"));
    }

    #[test]
    fn crlf_line_endings() {
        assert_eq!(kinds("if a:\r\n    b\r\n"), kinds("if a:\n    b\n"));
    }

    #[test]
    fn string_prefixes_and_triple_quotes() {
        use PyToken::*;
        assert_eq!(
            kinds("a = rb'\\d'\nb = \"\"\"multi\nline\"\"\"\nc = f\"{x}\"\n"),
            vec![
                Name, Equal, String, Newline, Name, Equal, String, Newline, Name, Equal, String,
                Newline, Eof
            ]
        );
    }

    #[test]
    fn escaped_quote_does_not_terminate() {
        let sink = DiagnosticSink::new();
        let tokens = lex("s = 'it\\'s'\n", &sink);
        assert!(!sink.has_errors());
        assert_eq!(tokens[2].kind, PyToken::String);
        assert_eq!(tokens[2].span, Span::new(4, 11));
    }

    #[test]
    fn numbers() {
        use PyToken::*;
        assert_eq!(
            kinds("1_000 0xFF 1.5e-3 .5 3j 10.\n"),
            vec![Number, Number, Number, Number, Number, Number, Newline, Eof]
        );
    }

    #[test]
    fn longest_operator_match() {
        let sink = DiagnosticSink::new();
        let source = "a **= b -> c ... d := e\n";
        let tokens = lex(source, &sink);
        let texts: Vec<&str> = tokens
            .iter()
            .filter(|t| !matches!(t.kind, PyToken::Name | PyToken::Newline | PyToken::Eof))
            .map(|t| &source[t.span.start as usize..t.span.end as usize])
            .collect();
        assert_eq!(texts, vec!["**=", "->", "...", ":="]);
    }

    #[test]
    fn unterminated_string_reported() {
        let errs = errors("s = 'abc\n");
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].code, codes::UNTERMINATED_STRING);
    }

    #[test]
    fn unterminated_triple_string_reported() {
        let errs = errors("s = \"\"\"abc\n\n");
        assert_eq!(errs[0].code, codes::UNTERMINATED_STRING);
    }

    #[test]
    fn invalid_character_reported() {
        let errs = errors("x = $\n");
        assert_eq!(errs[0].code, codes::INVALID_CHARACTER);
        assert!(errs[0].message.contains('$'));
    }

    #[test]
    fn unbalanced_brackets_reported() {
        assert_eq!(errors("f(a\n")[0].code, codes::UNCLOSED_BRACKET);
        assert_eq!(errors("a)\n")[0].code, codes::UNMATCHED_BRACKET);
        assert_eq!(errors("f(a]\n")[0].code, codes::MISMATCHED_BRACKET);
    }

    #[test]
    fn inconsistent_dedent_reported() {
        let errs = errors("if a:\n    b\n  c\n");
        assert_eq!(errs[0].code, codes::INCONSISTENT_DEDENT);
    }

    #[test]
    fn invalid_number_reported() {
        assert_eq!(errors("x = 12abc\n")[0].code, codes::INVALID_NUMBER);
    }

    #[test]
    fn bad_continuation_reported() {
        assert_eq!(errors("x = 1 \\ 2\n")[0].code, codes::BAD_CONTINUATION);
    }

    #[test]
    fn tabs_expand_to_multiple_of_eight() {
        // A tab and eight spaces open the same block level.
        assert_eq!(kinds("if a:\n\tb\n        c\n"), kinds("if a:\n\tb\n\tc\n"));
    }
}
