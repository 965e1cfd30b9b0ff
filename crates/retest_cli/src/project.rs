//! Shared project helpers for CLI commands.
//!
//! Locates the project root, loads `retest.toml`, and turns the loaded
//! configuration into the inputs the cache needs.

use std::path::{Path, PathBuf};

use retest_cache::{CacheOptions, ContractsDir};
use retest_config::{ProjectConfig, RunConfig};
use tracing::debug;

use crate::GlobalArgs;

/// A project root together with its loaded configuration.
pub struct Project {
    /// Directory containing `retest.toml`.
    pub root: PathBuf,
    /// The parsed configuration.
    pub config: ProjectConfig,
}

impl Project {
    /// Resolves and loads the project selected by the global CLI args.
    ///
    /// If `--config` is specified it names either the configuration file
    /// (its parent is the root) or the root directory. Otherwise the root is
    /// found by walking up from the current directory.
    pub fn load(global: &GlobalArgs) -> Result<Self, Box<dyn std::error::Error>> {
        let (root, config) = match global.config {
            Some(ref config_path) => {
                let p = PathBuf::from(config_path);
                if p.is_file() {
                    let root = p
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| PathBuf::from("."));
                    (root, retest_config::load_config_file(&p)?)
                } else {
                    let config = retest_config::load_config(&p)?;
                    (p, config)
                }
            }
            None => {
                let root = retest_config::find_project_root(&std::env::current_dir()?)?;
                let config = retest_config::load_config(&root)?;
                (root, config)
            }
        };
        debug!(root = %root.display(), name = %config.project.name, "loaded project");
        Ok(Self { root, config })
    }

    /// Run settings: the configured default, with coverage forced on by
    /// `--coverage`.
    pub fn run_config(&self, coverage: bool) -> RunConfig {
        let mut run = self.config.default_run();
        run.coverage |= coverage;
        run
    }

    /// Options for opening the cache of this project.
    pub fn cache_options(&self, run: RunConfig) -> CacheOptions {
        CacheOptions::from_config(&self.root, &self.config, run)
    }

    /// The compiled contract artifacts of this project.
    pub fn contracts(&self) -> ContractsDir {
        ContractsDir::new(self.config.contracts_dir(&self.root))
    }

    /// Location of the persisted cache file.
    pub fn cache_path(&self) -> PathBuf {
        self.config.cache_path(&self.root)
    }

    /// Absolute path of a module named on the command line. Relative paths
    /// are taken relative to the project root.
    pub fn module_path(&self, module: &str) -> PathBuf {
        let p = Path::new(module);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }

    /// Path of `path` relative to the project root, for display.
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::fs;
    use std::path::Path;

    use tempfile::TempDir;

    use crate::GlobalArgs;

    /// A project with two test modules and two compiled contracts.
    pub fn sample_project() -> TempDir {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "retest.toml", "[project]\nname = \"token\"\n");
        write(tmp.path(), "tests/conftest.py", "import pytest\n");
        write(tmp.path(), "tests/test_token.py", "def test_supply(token):\n    assert token.totalSupply()\n");
        write(tmp.path(), "tests/test_vault.py", "def test_deposit(vault):\n    vault.deposit(1)\n");
        write(
            tmp.path(),
            "build/contracts/Token.json",
            "{\"contractName\": \"Token\", \"bytecode\": \"0x6001\"}",
        );
        write(
            tmp.path(),
            "build/contracts/Vault.json",
            "{\"contractName\": \"Vault\", \"bytecode\": \"0x6002\"}",
        );
        tmp
    }

    pub fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub fn global_for(root: &Path) -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbose: false,
            config: Some(root.to_string_lossy().into_owned()),
        }
    }
}
