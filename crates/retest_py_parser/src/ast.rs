//! Structural tree produced by the parser.
//!
//! The tree keeps statement boundaries, block nesting, bracket nesting and
//! normalized leaf text. It does not model expressions: two files with the
//! same tree are treated as the same program.

use crate::source::Span;
use serde::{Deserialize, Serialize};

/// A parsed test module or helper file.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PyModule {
    /// Top-level statements in source order.
    pub body: Vec<Stmt>,
}

impl PyModule {
    /// Iterates over the import statements at the top level of the module.
    ///
    /// Imports nested inside functions, classes or conditionals are not
    /// returned.
    pub fn top_level_imports(&self) -> impl Iterator<Item = &Stmt> {
        self.body
            .iter()
            .filter(|s| matches!(s.kind, StmtKind::Import(_) | StmtKind::ImportFrom { .. }))
    }
}

/// A statement with its source span.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stmt {
    /// What kind of statement this is.
    pub kind: StmtKind,
    /// Source location (not part of the structural dump).
    pub span: Span,
}

/// The kinds of statement the structural parser distinguishes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StmtKind {
    /// `import a.b as c, d`
    Import(Vec<ImportAlias>),
    /// `from ..pkg import x as y` or `from pkg import *`
    ImportFrom {
        /// Number of leading dots (0 for an absolute import).
        level: u32,
        /// Dotted module path after the dots, if any.
        module: Option<String>,
        /// Imported names; a single `*` alias for a star import.
        names: Vec<ImportAlias>,
    },
    /// Any other single-line statement: its top-level nodes.
    Simple(Vec<Node>),
    /// A statement that owns a block (`def`, `if`, `with`, decorators excluded).
    Compound {
        /// Nodes of the header line, without the terminating `:`.
        header: Vec<Node>,
        /// Statements of the block (or of the inline suite after the `:`).
        body: Vec<Stmt>,
    },
}

/// One name in an import statement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportAlias {
    /// The (dotted) name being imported.
    pub name: String,
    /// The `as` binding, if present.
    pub asname: Option<String>,
}

/// A leaf token or a bracketed group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Node {
    /// A single token.
    Leaf(Leaf),
    /// A bracketed group of nodes.
    Group(Group),
}

impl Node {
    /// Returns `true` if this node is a `,` leaf.
    pub fn is_comma(&self) -> bool {
        matches!(self, Node::Leaf(Leaf { kind: LeafKind::Op, text }) if text == ",")
    }
}

/// A token with its normalized text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaf {
    /// The token class.
    pub kind: LeafKind,
    /// Normalized text: numbers without `_` and lower-cased, strings as
    /// their body without quotes.
    pub text: String,
}

/// Token classes that survive into the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeafKind {
    /// An identifier.
    Name,
    /// A reserved keyword.
    Keyword,
    /// A numeric literal.
    Number,
    /// A string literal body.
    Str {
        /// Whether the literal was a bytes literal (`b` prefix).
        bytes: bool,
        /// Whether the literal was raw (`r` prefix).
        raw: bool,
        /// Whether the literal was formatted (`f` prefix).
        formatted: bool,
    },
    /// An operator or punctuation.
    Op,
}

/// A bracketed sequence of nodes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// The bracket kind.
    pub delim: Delim,
    /// Nodes between the brackets.
    pub items: Vec<Node>,
}

/// Bracket kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Delim {
    /// `( )`
    Paren,
    /// `[ ]`
    Bracket,
    /// `{ }`
    Brace,
}

impl Delim {
    /// The dump tag for this bracket kind.
    pub fn tag(self) -> &'static str {
        match self {
            Delim::Paren => "paren",
            Delim::Bracket => "bracket",
            Delim::Brace => "brace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmt(kind: StmtKind) -> Stmt {
        Stmt {
            kind,
            span: Span::default(),
        }
    }

    #[test]
    fn top_level_imports_filters_other_statements() {
        let module = PyModule {
            body: vec![
                stmt(StmtKind::Import(vec![ImportAlias {
                    name: "os".to_string(),
                    asname: None,
                }])),
                stmt(StmtKind::Simple(vec![])),
                stmt(StmtKind::ImportFrom {
                    level: 1,
                    module: None,
                    names: vec![],
                }),
            ],
        };
        assert_eq!(module.top_level_imports().count(), 2);
    }

    #[test]
    fn comma_detection() {
        let comma = Node::Leaf(Leaf {
            kind: LeafKind::Op,
            text: ",".to_string(),
        });
        let name = Node::Leaf(Leaf {
            kind: LeafKind::Name,
            text: ",".to_string(),
        });
        assert!(comma.is_comma());
        assert!(!name.is_comma());
    }
}
