//! Structural fingerprints of test modules.
//!
//! A fingerprint covers the canonical dump of a file plus the dumps of the
//! project files it imports at the top level, so edits to comments or
//! layout never invalidate a module while edits to its code or its helpers
//! do. Test modules additionally fold in the fingerprints of the
//! configuration files (`conftest.py`) in every directory between the test
//! file and the project root.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use retest_common::Fingerprint;
use retest_py_parser::{dump, parse_file, DiagnosticSink, PyModule, SourceFile};
use tracing::{debug, warn};

use crate::error::CacheError;
use crate::resolve::ImportResolver;

/// A parse failure remembered for a configuration file, so every test below
/// it reports the same error without reparsing.
#[derive(Debug, Clone)]
struct ParseFailure {
    line: u32,
    col: u32,
    message: String,
}

impl ParseFailure {
    fn to_error(&self, path: &Path) -> CacheError {
        CacheError::SourceParse {
            path: path.to_path_buf(),
            line: self.line,
            col: self.col,
            message: self.message.clone(),
        }
    }
}

/// Computes structural fingerprints for files of one project.
///
/// Configuration-file fingerprints are computed once per hasher and reused
/// for every test module beneath them.
pub struct StructuralHasher {
    resolver: ImportResolver,
    conftest_name: String,
    conftests: BTreeMap<PathBuf, Result<Fingerprint, ParseFailure>>,
}

impl StructuralHasher {
    /// Creates a hasher for the project at `root`.
    pub fn new(root: impl Into<PathBuf>, search_paths: Vec<PathBuf>, conftest_name: &str) -> Self {
        Self {
            resolver: ImportResolver::new(root, search_paths),
            conftest_name: conftest_name.to_string(),
            conftests: BTreeMap::new(),
        }
    }

    /// The project root.
    pub fn root(&self) -> &Path {
        self.resolver.root()
    }

    /// Fingerprint of `path` and its top-level local imports.
    ///
    /// Fails with [`CacheError::SourceParse`] if the file or one of its local
    /// dependencies is not valid source, and with
    /// [`CacheError::DependencyResolution`] if a local import does not exist.
    pub fn fingerprint(&self, path: &Path) -> Result<Fingerprint, CacheError> {
        let (_, module) = parse_path(path)?;
        let deps = self.resolver.local_dependencies(path, &module)?;

        let mut content = dump(&module);
        for dep in &deps {
            let (_, dep_module) = parse_path(dep)?;
            content.push('\n');
            content.push_str(&dump(&dep_module));
        }
        debug!(path = %path.display(), deps = deps.len(), "fingerprinted");
        Ok(Fingerprint::from_bytes(content.as_bytes()))
    }

    /// Fingerprint of a test module: [`fingerprint`](Self::fingerprint)
    /// chained with the fingerprints of the configuration files in its
    /// directory and every ancestor up to the project root, in path order.
    pub fn test_fingerprint(&mut self, path: &Path) -> Result<Fingerprint, CacheError> {
        let base = self.fingerprint(path)?;

        let mut confs = BTreeMap::new();
        let mut dir = path.parent();
        while let Some(current) = dir {
            if !current.starts_with(self.root()) {
                break;
            }
            let candidate = current.join(&self.conftest_name);
            if candidate.is_file() {
                let conf = self.conftest_fingerprint(&candidate)?;
                confs.insert(candidate, conf);
            }
            dir = current.parent();
        }
        Ok(base.chain(confs.values()))
    }

    /// Fingerprint of one configuration file, computed on first use.
    fn conftest_fingerprint(&mut self, path: &Path) -> Result<Fingerprint, CacheError> {
        if let Some(known) = self.conftests.get(path) {
            return known.clone().map_err(|failure| failure.to_error(path));
        }
        let outcome = match self.fingerprint(path) {
            Ok(fp) => Ok(fp),
            Err(CacheError::SourceParse {
                line, col, message, ..
            }) => {
                warn!(
                    path = %path.display(),
                    line,
                    col,
                    %message,
                    "configuration file does not parse; tests below it will always run"
                );
                Err(ParseFailure { line, col, message })
            }
            Err(other) => return Err(other),
        };
        self.conftests.insert(path.to_path_buf(), outcome.clone());
        outcome.map_err(|failure| failure.to_error(path))
    }
}

/// Loads and parses a file, turning the first syntax error into a
/// [`CacheError::SourceParse`].
fn parse_path(path: &Path) -> Result<(SourceFile, PyModule), CacheError> {
    let file = SourceFile::load(path).map_err(|e| CacheError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let sink = DiagnosticSink::new();
    let module = parse_file(&file, &sink);
    if let Some(first) = sink.take_all().into_iter().next() {
        let (line, col) = file.line_col(first.span.start);
        return Err(CacheError::SourceParse {
            path: path.to_path_buf(),
            line,
            col,
            message: first.message,
        });
    }
    Ok((file, module))
}
