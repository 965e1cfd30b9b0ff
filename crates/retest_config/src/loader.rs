//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::ProjectConfig;
use std::path::{Component, Path, PathBuf};

/// Name of the configuration file that marks a project root.
pub const CONFIG_FILE: &str = "retest.toml";

/// Loads and validates a `retest.toml` configuration from a project directory.
///
/// Reads `<project_dir>/retest.toml`, parses it, and validates required fields.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    load_config_file(&project_dir.join(CONFIG_FILE))
}

/// Loads and validates a configuration from an explicit file path.
pub fn load_config_file(path: &Path) -> Result<ProjectConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `retest.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Walks up from `start` to the nearest directory containing `retest.toml`.
pub fn find_project_root(start: &Path) -> Result<PathBuf, ConfigError> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).is_file() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(ConfigError::NotFound(start.to_path_buf()));
        }
    }
}

/// Validates that required fields are present and paths stay inside the project.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    let non_empty = [
        ("tests.dir", &config.tests.dir),
        ("tests.conftest", &config.tests.conftest),
        ("tests.pattern", &config.tests.pattern),
        ("cache.path", &config.cache.path),
        ("build.contracts", &config.build.contracts),
    ];
    for (field, value) in non_empty {
        if value.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{field} must not be empty"
            )));
        }
    }
    if config.tests.conftest.contains(|c: char| c == '/' || c == '\\') {
        return Err(ConfigError::ValidationError(
            "tests.conftest must be a file name, not a path".to_string(),
        ));
    }
    for path in &config.imports.search_paths {
        if !is_project_relative(Path::new(path)) {
            return Err(ConfigError::ValidationError(format!(
                "imports.search_paths entry '{path}' must be relative to the project root"
            )));
        }
    }
    Ok(())
}

fn is_project_relative(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
[project]
name = "token"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.project.name, "token");
        assert_eq!(config.tests.dir, "tests");
        assert_eq!(config.tests.conftest, "conftest.py");
        assert_eq!(config.tests.pattern, "test_");
        assert!(!config.tests.coverage);
        assert_eq!(config.cache.path, "build/tests.json");
        assert_eq!(config.build.contracts, "build/contracts");
        assert!(config.imports.search_paths.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[project]
name = "vault"
description = "Yield vault"

[tests]
dir = "suite"
conftest = "fixtures.py"
pattern = "check_"
coverage = true

[cache]
path = ".retest/cache.json"

[build]
contracts = "out/contracts"

[imports]
search_paths = ["lib", "scripts/helpers"]
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.project.description, "Yield vault");
        assert_eq!(config.tests.dir, "suite");
        assert_eq!(config.tests.conftest, "fixtures.py");
        assert!(config.default_run().coverage);
        let root = Path::new("/p");
        assert_eq!(config.cache_path(root), Path::new("/p/.retest/cache.json"));
        assert_eq!(config.contracts_dir(root), Path::new("/p/out/contracts"));
        assert_eq!(config.tests_dir(root), Path::new("/p/suite"));
        assert_eq!(
            config.search_paths(root),
            vec![PathBuf::from("/p/lib"), PathBuf::from("/p/scripts/helpers")]
        );
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let toml = r#"
[project]
name = "token"

[tests]
coverage = true
"#;
        let config = load_config_from_str(toml).unwrap();
        assert!(config.tests.coverage);
        assert_eq!(config.tests.dir, "tests");
    }

    #[test]
    fn missing_name_errors() {
        let toml = r#"
[project]
name = ""
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn missing_project_section_errors() {
        let err = load_config_from_str("[tests]\ndir = \"t\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn empty_values_rejected() {
        let toml = r#"
[project]
name = "token"

[cache]
path = ""
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(msg) if msg.contains("cache.path")));
    }

    #[test]
    fn conftest_must_be_file_name() {
        let toml = r#"
[project]
name = "token"

[tests]
conftest = "tests/conftest.py"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn search_paths_must_stay_in_project() {
        for bad in ["/usr/lib/python3", "../shared"] {
            let toml = format!(
                "[project]\nname = \"token\"\n[imports]\nsearch_paths = [\"{bad}\"]\n"
            );
            let err = load_config_from_str(&toml).unwrap_err();
            assert!(matches!(err, ConfigError::ValidationError(_)), "{bad}");
        }
    }

    #[test]
    fn invalid_toml_errors() {
        let toml = "this is not valid toml {{{}}}";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn io_error_from_nonexistent_dir() {
        let err = load_config(Path::new("/nonexistent/dir")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }

    #[test]
    fn find_project_root_in_current_dir() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "[project]\nname=\"t\"\n").unwrap();
        let root = find_project_root(tmp.path()).unwrap();
        assert_eq!(root, tmp.path());
    }

    #[test]
    fn find_project_root_in_parent() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "[project]\nname=\"t\"\n").unwrap();
        let nested = tmp.path().join("tests").join("unit");
        fs::create_dir_all(&nested).unwrap();
        let root = find_project_root(&nested).unwrap();
        assert_eq!(root, tmp.path());
    }

    #[test]
    fn find_project_root_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = find_project_root(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn load_config_from_directory() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "[project]\nname=\"token\"\n").unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.project.name, "token");
    }
}
