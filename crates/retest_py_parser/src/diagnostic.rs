//! Syntax diagnostics emitted by the lexer and parser.

use crate::source::{SourceFile, Span};
use std::cell::RefCell;
use std::fmt;

/// A numbered syntax error code, displayed as `E` plus three digits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct DiagnosticCode(pub u16);

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:03}", self.0)
    }
}

/// Codes for every syntax error the front end can report.
pub mod codes {
    use super::DiagnosticCode;

    /// A byte that cannot start any token.
    pub const INVALID_CHARACTER: DiagnosticCode = DiagnosticCode(101);
    /// A string literal reaches end of line or file without its closing quote.
    pub const UNTERMINATED_STRING: DiagnosticCode = DiagnosticCode(102);
    /// A closing bracket with no open bracket.
    pub const UNMATCHED_BRACKET: DiagnosticCode = DiagnosticCode(103);
    /// An open bracket still open at end of file.
    pub const UNCLOSED_BRACKET: DiagnosticCode = DiagnosticCode(104);
    /// A closing bracket of the wrong kind.
    pub const MISMATCHED_BRACKET: DiagnosticCode = DiagnosticCode(105);
    /// An indented line where no block was opened.
    pub const UNEXPECTED_INDENT: DiagnosticCode = DiagnosticCode(106);
    /// A dedent to a column that matches no enclosing block.
    pub const INCONSISTENT_DEDENT: DiagnosticCode = DiagnosticCode(107);
    /// A compound statement header without its `:`.
    pub const EXPECTED_COLON: DiagnosticCode = DiagnosticCode(108);
    /// A `:` followed by a newline but no indented block.
    pub const EXPECTED_BLOCK: DiagnosticCode = DiagnosticCode(109);
    /// A missing name after `def`, `class`, `import`, `as`, or `.`.
    pub const EXPECTED_NAME: DiagnosticCode = DiagnosticCode(110);
    /// An operator with nothing after it.
    pub const DANGLING_OPERATOR: DiagnosticCode = DiagnosticCode(111);
    /// A malformed numeric literal such as `12abc`.
    pub const INVALID_NUMBER: DiagnosticCode = DiagnosticCode(112);
    /// Something other than a newline after a `\` continuation.
    pub const BAD_CONTINUATION: DiagnosticCode = DiagnosticCode(113);
    /// A token that cannot appear where it was found.
    pub const UNEXPECTED_TOKEN: DiagnosticCode = DiagnosticCode(114);
}

/// A syntax error at a location in one source file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// Error code.
    pub code: DiagnosticCode,
    /// Human-readable message.
    pub message: String,
    /// Where the problem was detected.
    pub span: Span,
}

impl Diagnostic {
    /// Creates a diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>, span: Span) -> Self {
        Self {
            code,
            message: message.into(),
            span,
        }
    }

    /// Formats the diagnostic as `path:line:col: error[E1xx]: message`.
    pub fn render(&self, file: &SourceFile) -> String {
        let (line, col) = file.line_col(self.span.start);
        format!(
            "{}:{line}:{col}: error[{}]: {}",
            file.path.display(),
            self.code,
            self.message
        )
    }
}

/// Collects diagnostics while a single file is lexed and parsed.
///
/// Parsing is single-threaded, so interior mutability through a `RefCell` is
/// enough to let the lexer and parser share the sink by reference.
#[derive(Default)]
pub struct DiagnosticSink {
    diagnostics: RefCell<Vec<Diagnostic>>,
}

impl DiagnosticSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a diagnostic.
    pub fn emit(&self, diag: Diagnostic) {
        self.diagnostics.borrow_mut().push(diag);
    }

    /// Returns `true` if anything has been emitted.
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.borrow().is_empty()
    }

    /// Removes and returns every diagnostic, in emission order.
    pub fn take_all(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.borrow_mut())
    }
}
