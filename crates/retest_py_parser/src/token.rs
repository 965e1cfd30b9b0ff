//! Token types for the test-module lexer.
//!
//! Literal and operator text is not stored in the token; it is sliced from
//! the source using the token's span.

use crate::source::Span;

/// A token kind.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PyToken {
    // === Keywords ===
    /// `False`
    False,
    /// `None`
    None,
    /// `True`
    True,
    /// `and`
    And,
    /// `as`
    As,
    /// `assert`
    Assert,
    /// `async`
    Async,
    /// `await`
    Await,
    /// `break`
    Break,
    /// `class`
    Class,
    /// `continue`
    Continue,
    /// `def`
    Def,
    /// `del`
    Del,
    /// `elif`
    Elif,
    /// `else`
    Else,
    /// `except`
    Except,
    /// `finally`
    Finally,
    /// `for`
    For,
    /// `from`
    From,
    /// `global`
    Global,
    /// `if`
    If,
    /// `import`
    Import,
    /// `in`
    In,
    /// `is`
    Is,
    /// `lambda`
    Lambda,
    /// `nonlocal`
    Nonlocal,
    /// `not`
    Not,
    /// `or`
    Or,
    /// `pass`
    Pass,
    /// `raise`
    Raise,
    /// `return`
    Return,
    /// `try`
    Try,
    /// `while`
    While,
    /// `with`
    With,
    /// `yield`
    Yield,

    // === Literals and names ===
    /// An identifier (including soft keywords such as `match`).
    Name,
    /// A numeric literal.
    Number,
    /// A string literal, including its prefix and quotes.
    String,

    // === Punctuation ===
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `:`
    Colon,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `.`
    Dot,
    /// `...`
    Ellipsis,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `@`
    At,
    /// `->`
    Arrow,
    /// `=`
    Equal,
    /// Any other operator (`+`, `**=`, `:=`, `!=`, ...).
    Operator,

    // === Layout ===
    /// End of a logical line.
    Newline,
    /// Start of an indented block.
    Indent,
    /// End of an indented block.
    Dedent,
    /// End of file.
    Eof,
    /// A byte sequence the lexer could not tokenize.
    Error,
}

impl PyToken {
    /// Returns `true` for reserved keywords.
    pub fn is_keyword(self) -> bool {
        (self as u8) <= (PyToken::Yield as u8)
    }

    /// Returns `true` for keywords that introduce a compound statement.
    pub fn starts_compound(self) -> bool {
        matches!(
            self,
            PyToken::Async
                | PyToken::Class
                | PyToken::Def
                | PyToken::Elif
                | PyToken::Else
                | PyToken::Except
                | PyToken::Finally
                | PyToken::For
                | PyToken::If
                | PyToken::Try
                | PyToken::While
                | PyToken::With
        )
    }

    /// Returns `true` for operator tokens that need a right-hand operand.
    ///
    /// `,`, `:`, `...` and the positional-only marker `/` may legitimately
    /// end a statement or bracket group, so they are excluded.
    pub fn needs_operand(self) -> bool {
        matches!(
            self,
            PyToken::Dot | PyToken::Star | PyToken::At | PyToken::Arrow | PyToken::Equal | PyToken::Operator
        )
    }
}

/// A lexed token with its kind and source location.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Token {
    /// The kind of this token.
    pub kind: PyToken,
    /// The bytes this token covers.
    pub span: Span,
}

/// Looks up a reserved keyword. Soft keywords (`match`, `case`, `type`) are
/// ordinary names.
pub fn lookup_keyword(s: &str) -> Option<PyToken> {
    let kw = match s {
        "False" => PyToken::False,
        "None" => PyToken::None,
        "True" => PyToken::True,
        "and" => PyToken::And,
        "as" => PyToken::As,
        "assert" => PyToken::Assert,
        "async" => PyToken::Async,
        "await" => PyToken::Await,
        "break" => PyToken::Break,
        "class" => PyToken::Class,
        "continue" => PyToken::Continue,
        "def" => PyToken::Def,
        "del" => PyToken::Del,
        "elif" => PyToken::Elif,
        "else" => PyToken::Else,
        "except" => PyToken::Except,
        "finally" => PyToken::Finally,
        "for" => PyToken::For,
        "from" => PyToken::From,
        "global" => PyToken::Global,
        "if" => PyToken::If,
        "import" => PyToken::Import,
        "in" => PyToken::In,
        "is" => PyToken::Is,
        "lambda" => PyToken::Lambda,
        "nonlocal" => PyToken::Nonlocal,
        "not" => PyToken::Not,
        "or" => PyToken::Or,
        "pass" => PyToken::Pass,
        "raise" => PyToken::Raise,
        "return" => PyToken::Return,
        "try" => PyToken::Try,
        "while" => PyToken::While,
        "with" => PyToken::With,
        "yield" => PyToken::Yield,
        _ => return None,
    };
    Some(kw)
}

/// Operators recognized by the lexer, longest first so a greedy scan picks
/// the longest match.
pub(crate) const OPERATORS: &[(&str, PyToken)] = &[
    ("**=", PyToken::Operator),
    ("//=", PyToken::Operator),
    (">>=", PyToken::Operator),
    ("<<=", PyToken::Operator),
    ("...", PyToken::Ellipsis),
    ("->", PyToken::Arrow),
    (":=", PyToken::Operator),
    ("**", PyToken::Operator),
    ("//", PyToken::Operator),
    ("<<", PyToken::Operator),
    (">>", PyToken::Operator),
    ("<=", PyToken::Operator),
    (">=", PyToken::Operator),
    ("==", PyToken::Operator),
    ("!=", PyToken::Operator),
    ("+=", PyToken::Operator),
    ("-=", PyToken::Operator),
    ("*=", PyToken::Operator),
    ("/=", PyToken::Operator),
    ("%=", PyToken::Operator),
    ("&=", PyToken::Operator),
    ("|=", PyToken::Operator),
    ("^=", PyToken::Operator),
    ("@=", PyToken::Operator),
    ("+", PyToken::Operator),
    ("-", PyToken::Operator),
    ("%", PyToken::Operator),
    ("&", PyToken::Operator),
    ("|", PyToken::Operator),
    ("^", PyToken::Operator),
    ("~", PyToken::Operator),
    ("<", PyToken::Operator),
    (">", PyToken::Operator),
    ("*", PyToken::Star),
    ("/", PyToken::Slash),
    ("@", PyToken::At),
    ("=", PyToken::Equal),
    (":", PyToken::Colon),
    (",", PyToken::Comma),
    (";", PyToken::Semicolon),
    (".", PyToken::Dot),
];
