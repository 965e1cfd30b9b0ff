//! `retest record`: stores the outcome of one module run.

use std::collections::BTreeSet;
use std::path::Path;

use retest_cache::{CacheError, CoverageHistory, CoverageMap, MemoryHistory, TestCache};
use retest_common::{ContractId, TxHash};
use retest_config::RunConfig;

use crate::project::Project;
use crate::{GlobalArgs, RecordArgs};

/// Runs the `retest record` command.
pub fn run(args: &RecordArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Project::load(global)?;
    let module = project.module_path(&args.module);
    let observed: BTreeSet<ContractId> = args.deps.iter().map(|d| ContractId::new(d.as_str())).collect();

    record_module(
        &project,
        &module,
        project.run_config(args.coverage),
        args.isolated,
        &observed,
        &args.tx,
    )?;

    if !global.quiet {
        eprintln!("    Recorded {}", project.relative(&module).display());
    }
    Ok(0)
}

/// Opens the cache, records `module`, and saves.
///
/// Each transaction in `txs` is added to the history with an empty coverage
/// entry for every contract in `observed`.
pub fn record_module(
    project: &Project,
    module: &Path,
    run: RunConfig,
    isolated: bool,
    observed: &BTreeSet<ContractId>,
    txs: &[String],
) -> Result<(), CacheError> {
    let mut cache = TestCache::open(
        project.cache_options(run),
        &project.contracts(),
        MemoryHistory::new(),
    )?;
    if isolated {
        cache.set_isolated([module]);
    }
    for tx in txs {
        let coverage: CoverageMap = observed
            .iter()
            .map(|c| (c.clone(), serde_json::json!({})))
            .collect();
        cache.history_mut().add_coverage(TxHash::new(tx.as_str()), coverage);
    }
    cache.record_result(module, &run, observed)?;
    cache.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::testutil::*;
    use retest_cache::{CacheState, Isolation};

    fn ids(names: &[&str]) -> BTreeSet<ContractId> {
        names.iter().map(|n| ContractId::new(*n)).collect()
    }

    #[test]
    fn records_isolated_module() {
        let tmp = sample_project();
        let project = Project::load(&global_for(tmp.path())).unwrap();
        let module = project.module_path("tests/test_token.py");
        record_module(
            &project,
            &module,
            RunConfig { coverage: true },
            true,
            &ids(&["Token", "Missing"]),
            &["0xaa".to_string()],
        )
        .unwrap();

        let state = CacheState::load(&project.cache_path());
        let entry = &state.tests[Path::new("tests/test_token.py")];
        assert_eq!(entry.isolation, Isolation::IsolatedWith(ids(&["Token"])));
        assert!(entry.coverage_collected);
        assert_eq!(entry.tx_hashes, vec![TxHash::new("0xaa")]);
        assert_eq!(state.tx.len(), 1);
        assert_eq!(state.contracts.len(), 2);
    }

    #[test]
    fn records_shared_state_module() {
        let tmp = sample_project();
        let project = Project::load(&global_for(tmp.path())).unwrap();
        let module = project.module_path("tests/test_vault.py");
        record_module(&project, &module, RunConfig::default(), false, &ids(&["Vault"]), &[])
            .unwrap();

        let state = CacheState::load(&project.cache_path());
        assert_eq!(
            state.tests[Path::new("tests/test_vault.py")].isolation,
            Isolation::NotIsolated
        );
    }

    #[test]
    fn unparseable_module_is_not_recorded() {
        let tmp = sample_project();
        write(tmp.path(), "tests/test_broken.py", "def test():\n    return 1 $ 2\n");
        let project = Project::load(&global_for(tmp.path())).unwrap();
        let module = project.module_path("tests/test_broken.py");
        let err = record_module(&project, &module, RunConfig::default(), true, &ids(&["Token"]), &[])
            .unwrap_err();
        assert!(matches!(err, CacheError::SourceParse { .. }));

        let state = CacheState::load(&project.cache_path());
        assert!(!state.tests.contains_key(Path::new("tests/test_broken.py")));
    }
}
