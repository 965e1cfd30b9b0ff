//! Source text with a line index, and byte spans into it.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

/// A byte offset range within one source file.
///
/// `start` is inclusive and `end` is exclusive. Spans are used for diagnostics
/// only; they never contribute to a structural fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset of the first byte covered.
    pub start: u32,
    /// Byte offset one past the last byte covered.
    pub end: u32,
}

impl Span {
    /// Creates a span covering `start..end`.
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Returns the smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// A test module or helper file loaded for parsing.
pub struct SourceFile {
    /// Path the file was loaded from (or a synthetic name for in-memory text).
    pub path: PathBuf,
    /// Full text of the file.
    pub content: String,
    line_starts: Vec<u32>,
}

impl SourceFile {
    /// Creates a source file from in-memory text.
    pub fn new(path: impl Into<PathBuf>, content: String) -> Self {
        let line_starts = std::iter::once(0)
            .chain(
                content
                    .bytes()
                    .enumerate()
                    .filter(|&(_, b)| b == b'\n')
                    .map(|(i, _)| (i + 1) as u32),
            )
            .collect();
        Self {
            path: path.into(),
            content,
            line_starts,
        }
    }

    /// Reads a source file from disk.
    pub fn load(path: &Path) -> io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::new(path, content))
    }

    /// Converts a byte offset to 1-indexed `(line, column)`.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        (idx as u32 + 1, offset - self.line_starts[idx] + 1)
    }

    /// Returns the text covered by `span`.
    pub fn snippet(&self, span: Span) -> &str {
        &self.content[span.start as usize..span.end as usize]
    }
}
