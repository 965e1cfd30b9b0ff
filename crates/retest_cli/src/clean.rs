//! `retest clean`: deletes the persisted cache.

use std::io::ErrorKind;
use std::path::Path;

use tracing::info;

use crate::project::Project;
use crate::GlobalArgs;

/// Runs the `retest clean` command.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Project::load(global)?;
    let location = project.cache_path();
    let removed = remove_cache(&location)?;
    if !global.quiet {
        let rel = project.relative(&location).display();
        if removed {
            eprintln!("    Removed {rel}");
        } else {
            eprintln!("    Nothing to clean at {rel}");
        }
    }
    Ok(0)
}

/// Removes the cache file. Returns `false` if there was none.
fn remove_cache(location: &Path) -> std::io::Result<bool> {
    match std::fs::remove_file(location) {
        Ok(()) => {
            info!(path = %location.display(), "cache removed");
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
