//! Structural parser for Python test modules.
//!
//! This crate turns a test module, fixture file or helper module into a
//! layout-independent tree. Two sources that differ only in comments, blank
//! lines, line wrapping, quote style or redundant trailing commas produce the
//! same [`dump`]. The main entry point is [`parse_file`].
//!
//! # Architecture
//!
//! - **Lexer** ([`lexer`]): Converts source text to tokens, resolving
//!   indentation into indent/dedent tokens and dropping comments.
//! - **Parser** ([`parser`]): Recursive descent over statements, blocks,
//!   bracket groups and imports, with recovery at line boundaries.
//! - **Dump** ([`dump`]): Canonical span-free rendering used for hashing.

#![warn(missing_docs)]

/// Structural tree types.
pub mod ast;
/// Syntax diagnostics.
pub mod diagnostic;
mod dump;
/// Lexical analyzer for test-module source text.
pub mod lexer;
/// Recursive descent parser with line-level error recovery.
pub mod parser;
/// Source text and byte spans.
pub mod source;
/// Token types for the lexer.
pub mod token;

pub use ast::{ImportAlias, PyModule, Stmt, StmtKind};
pub use diagnostic::{Diagnostic, DiagnosticSink};
pub use dump::dump;
pub use source::{SourceFile, Span};

/// Parses a loaded source file.
///
/// Errors are reported to the sink; the returned tree holds whatever could
/// be recovered and should not be trusted when the sink is non-empty.
pub fn parse_file(file: &SourceFile, sink: &DiagnosticSink) -> PyModule {
    let tokens = lexer::lex(&file.content, sink);
    let mut parser = parser::PyParser::new(tokens, &file.content, sink);
    parser.parse_module()
}

/// Parses source text, returning every diagnostic if it is not valid.
pub fn parse_str(source: &str) -> Result<PyModule, Vec<Diagnostic>> {
    let sink = DiagnosticSink::new();
    let tokens = lexer::lex(source, &sink);
    let module = parser::PyParser::new(tokens, source, &sink).parse_module();
    if sink.has_errors() {
        Err(sink.take_all())
    } else {
        Ok(module)
    }
}
