//! Test module discovery.

use std::path::{Path, PathBuf};

use crate::error::CacheError;

/// Finds test modules under `dir`: `.py` files whose name starts with
/// `prefix`, sorted by path. Hidden directories and `__pycache__` are
/// skipped. A missing directory yields no modules.
pub fn discover_test_modules(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>, CacheError> {
    let mut files = Vec::new();
    if dir.is_dir() {
        walk_dir(dir, prefix, &mut files)?;
    }
    files.sort();
    Ok(files)
}

fn walk_dir(dir: &Path, prefix: &str, files: &mut Vec<PathBuf>) -> Result<(), CacheError> {
    let io_err = |e: std::io::Error| CacheError::Io {
        path: dir.to_path_buf(),
        source: e,
    };
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if path.is_dir() {
            if !name.starts_with('.') && name != "__pycache__" {
                walk_dir(&path, prefix, files)?;
            }
        } else if name.starts_with(prefix) && name.ends_with(".py") {
            files.push(path);
        }
    }
    Ok(())
}
