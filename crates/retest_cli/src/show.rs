//! `retest show`: summary of the persisted cache.

use std::path::Path;

use retest_cache::{CacheState, Isolation, TestModuleEntry};

use crate::project::Project;
use crate::GlobalArgs;

/// Runs the `retest show` command.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Project::load(global)?;
    let location = project.cache_path();
    if !location.is_file() {
        if !global.quiet {
            eprintln!("    No cache at {}", project.relative(&location).display());
        }
        return Ok(0);
    }

    let state = CacheState::load(&location);
    for line in summarize(&state) {
        println!("{line}");
    }
    for (path, entry) in &state.tests {
        println!("  {}", describe(path, entry));
    }
    Ok(0)
}

fn summarize(state: &CacheState) -> Vec<String> {
    let skippable = state
        .tests
        .values()
        .filter(|e| e.isolation.skippable_deps().is_some())
        .count();
    let with_coverage = state.tests.values().filter(|e| e.coverage_collected).count();
    vec![
        format!("contracts: {}", state.contracts.len()),
        format!(
            "tests: {} ({} skippable, {} with coverage)",
            state.tests.len(),
            skippable,
            with_coverage
        ),
        format!("coverage records: {}", state.tx.len()),
    ]
}

fn describe(path: &Path, entry: &TestModuleEntry) -> String {
    let isolation = match &entry.isolation {
        Isolation::NotIsolated => "not isolated".to_string(),
        Isolation::IsolatedWith(deps) if deps.is_empty() => "isolated, no contracts".to_string(),
        Isolation::IsolatedWith(deps) => {
            let names: Vec<&str> = deps.iter().map(|c| c.as_str()).collect();
            format!("isolated with {}", names.join(", "))
        }
    };
    let coverage = if entry.coverage_collected { " [coverage]" } else { "" };
    format!("{}: {isolation}{coverage}", path.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use retest_common::{ContractId, Fingerprint};
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn entry(isolation: Isolation, coverage_collected: bool) -> TestModuleEntry {
        TestModuleEntry {
            coverage_collected,
            fingerprint: Fingerprint::from_bytes(b"module"),
            isolation,
            tx_hashes: Vec::new(),
        }
    }

    fn ids(names: &[&str]) -> BTreeSet<ContractId> {
        names.iter().map(|n| ContractId::new(*n)).collect()
    }

    #[test]
    fn describe_isolated_module() {
        let line = describe(
            Path::new("tests/test_ab.py"),
            &entry(Isolation::IsolatedWith(ids(&["Vault", "Token"])), true),
        );
        assert_eq!(line, "tests/test_ab.py: isolated with Token, Vault [coverage]");
    }

    #[test]
    fn describe_shared_state_module() {
        let line = describe(Path::new("tests/test_global.py"), &entry(Isolation::NotIsolated, false));
        assert_eq!(line, "tests/test_global.py: not isolated");
    }

    #[test]
    fn summary_counts() {
        let mut state = CacheState::default();
        state.tests.insert(
            PathBuf::from("tests/test_a.py"),
            entry(Isolation::IsolatedWith(ids(&["Token"])), true),
        );
        state.tests.insert(
            PathBuf::from("tests/test_b.py"),
            entry(Isolation::IsolatedWith(BTreeSet::new()), false),
        );
        let lines = summarize(&state);
        assert_eq!(lines[0], "contracts: 0");
        assert_eq!(lines[1], "tests: 2 (1 skippable, 1 with coverage)");
        assert_eq!(lines[2], "coverage records: 0");
    }
}
