//! Configuration types deserialized from `retest.toml`.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// The top-level project configuration parsed from `retest.toml`.
///
/// Only `[project]` is required; every other section falls back to the
/// defaults of its type.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Core project metadata.
    pub project: ProjectMeta,
    /// Test discovery settings.
    #[serde(default)]
    pub tests: TestsConfig,
    /// Persisted cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Build output settings.
    #[serde(default)]
    pub build: BuildConfig,
    /// Import resolution settings.
    #[serde(default)]
    pub imports: ImportsConfig,
}

impl ProjectConfig {
    /// Absolute path of the test discovery root under `root`.
    pub fn tests_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.tests.dir)
    }

    /// Absolute path of the persisted cache file under `root`.
    pub fn cache_path(&self, root: &Path) -> PathBuf {
        root.join(&self.cache.path)
    }

    /// Absolute path of the compiled contract directory under `root`.
    pub fn contracts_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.build.contracts)
    }

    /// Absolute extra import roots under `root`.
    pub fn search_paths(&self, root: &Path) -> Vec<PathBuf> {
        self.imports
            .search_paths
            .iter()
            .map(|p| root.join(p))
            .collect()
    }

    /// The run configuration implied by the file alone.
    pub fn default_run(&self) -> RunConfig {
        RunConfig {
            coverage: self.tests.coverage,
        }
    }
}

/// Core project metadata required in every `retest.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// A brief description of the project.
    #[serde(default)]
    pub description: String,
}

/// Where test modules and their configuration files live.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TestsConfig {
    /// Test discovery root, relative to the project root.
    pub dir: String,
    /// File name of the per-directory configuration file.
    pub conftest: String,
    /// File-name prefix that marks a test module.
    pub pattern: String,
    /// Whether runs require coverage unless overridden.
    pub coverage: bool,
}

impl Default for TestsConfig {
    fn default() -> Self {
        Self {
            dir: "tests".to_string(),
            conftest: "conftest.py".to_string(),
            pattern: "test_".to_string(),
            coverage: false,
        }
    }
}

/// Persisted cache location.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache file path, relative to the project root.
    pub path: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: "build/tests.json".to_string(),
        }
    }
}

/// Compiled contract artifacts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Directory of contract JSON artifacts, relative to the project root.
    pub contracts: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            contracts: "build/contracts".to_string(),
        }
    }
}

/// Extra roots searched for absolute imports.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImportsConfig {
    /// Directories relative to the project root.
    pub search_paths: Vec<String>,
}

/// Settings for a single test run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunConfig {
    /// Whether this run collects coverage; modules without collected
    /// coverage can then not be skipped.
    pub coverage: bool,
}
