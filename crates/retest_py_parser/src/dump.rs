//! Canonical text dump of the structural tree.
//!
//! The dump omits spans and is the input to structural fingerprinting, so
//! anything that changes it changes the fingerprint. Trailing commas are
//! dropped wherever removing them cannot change meaning: in list, set and
//! dict displays, in call arguments and parameter lists, in subscripts and
//! parenthesized tuples with more than one element. `(a,)` keeps its comma.

use crate::ast::*;
use std::fmt::Write;

/// Renders a module as an S-expression.
pub fn dump(module: &PyModule) -> String {
    let mut out = String::from("(module");
    for stmt in &module.body {
        out.push(' ');
        dump_stmt(stmt, &mut out);
    }
    out.push(')');
    out
}

fn dump_stmt(stmt: &Stmt, out: &mut String) {
    match &stmt.kind {
        StmtKind::Import(names) => {
            out.push_str("(import");
            dump_aliases(names, out);
            out.push(')');
        }
        StmtKind::ImportFrom {
            level,
            module,
            names,
        } => {
            let _ = write!(out, "(from {level} {}", module.as_deref().unwrap_or("-"));
            dump_aliases(names, out);
            out.push(')');
        }
        StmtKind::Simple(nodes) => {
            out.push_str("(stmt");
            dump_nodes(nodes, false, out);
            out.push(')');
        }
        StmtKind::Compound { header, body } => {
            out.push_str("(block (header");
            dump_nodes(header, false, out);
            out.push_str(") (body");
            for stmt in body {
                out.push(' ');
                dump_stmt(stmt, out);
            }
            out.push_str("))");
        }
    }
}

fn dump_aliases(names: &[ImportAlias], out: &mut String) {
    for alias in names {
        match &alias.asname {
            Some(asname) => {
                let _ = write!(out, " (as {} {asname})", alias.name);
            }
            None => {
                out.push(' ');
                out.push_str(&alias.name);
            }
        }
    }
}

fn dump_nodes(nodes: &[Node], strip_trailing_comma: bool, out: &mut String) {
    let end = match nodes.last() {
        Some(last) if strip_trailing_comma && last.is_comma() => nodes.len() - 1,
        _ => nodes.len(),
    };
    for (i, node) in nodes[..end].iter().enumerate() {
        out.push(' ');
        match node {
            Node::Leaf(leaf) => dump_leaf(leaf, out),
            Node::Group(group) => {
                let applied = i > 0 && is_operand(&nodes[i - 1]);
                dump_group(group, applied, out);
            }
        }
    }
}

/// Whether a bracket group after `node` is a call or subscript rather than
/// a display.
fn is_operand(node: &Node) -> bool {
    match node {
        Node::Group(_) => true,
        Node::Leaf(leaf) => matches!(leaf.kind, LeafKind::Name | LeafKind::Str { .. }),
    }
}

fn dump_group(group: &Group, applied: bool, out: &mut String) {
    let commas = group.items.iter().filter(|n| n.is_comma()).count();
    let strip = match group.delim {
        Delim::Brace => true,
        Delim::Paren if applied => true,
        Delim::Bracket if !applied => true,
        // Tuple or subscript tuple: `(a,)` and `x[a,]` differ from `(a)` and `x[a]`.
        _ => commas > 1,
    };
    out.push('(');
    out.push_str(group.delim.tag());
    dump_nodes(&group.items, strip, out);
    out.push(')');
}

fn dump_leaf(leaf: &Leaf, out: &mut String) {
    match leaf.kind {
        LeafKind::Str {
            bytes,
            raw,
            formatted,
        } => {
            for (set, flag) in [(raw, 'r'), (bytes, 'b'), (formatted, 'f')] {
                if set {
                    out.push(flag);
                }
            }
            let _ = write!(out, "{:?}", leaf.text);
        }
        _ => out.push_str(&leaf.text),
    }
}
