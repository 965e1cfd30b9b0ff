//! Error types for cache operations.

use std::path::PathBuf;

/// Errors that can occur during cache operations.
///
/// Reading the persisted cache never produces one of these: a missing or
/// corrupt cache file is an empty cache. Parse failures make a module
/// always-dirty, while an unresolvable local import is fatal for the run.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading sources or writing the cache.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A test module, configuration file or local dependency is not valid
    /// source.
    #[error("failed to parse {path}:{line}:{col}: {message}")]
    SourceParse {
        /// The file that failed to parse.
        path: PathBuf,
        /// 1-indexed line of the first error.
        line: u32,
        /// 1-indexed column of the first error.
        col: u32,
        /// Description of the first error.
        message: String,
    },

    /// A top-level import names a project module that does not exist.
    #[error("cannot resolve local import '{module}' in {path}")]
    DependencyResolution {
        /// The importing file.
        path: PathBuf,
        /// The module as written in the import statement.
        module: String,
    },

    /// The cache state could not be serialized.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// A compiled contract artifact is malformed.
    #[error("invalid build artifact {path}: {reason}")]
    Build {
        /// The artifact file.
        path: PathBuf,
        /// Description of the problem.
        reason: String,
    },
}

impl CacheError {
    /// Returns `true` for errors that only make a single module dirty rather
    /// than aborting the run: unreadable or unparseable sources.
    pub fn is_module_local(&self) -> bool {
        matches!(self, CacheError::SourceParse { .. } | CacheError::Io { .. })
    }
}
