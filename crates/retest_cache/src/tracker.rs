//! Per-run test cache: the operations a harness calls around each module.
//!
//! A [`TestCache`] is opened once per run. Opening loads the persisted state
//! and reconciles it against the current build; the harness then asks
//! [`TestCache::should_skip`] before each module and reports back through
//! [`TestCache::record_result`] afterwards. The state is written exactly once,
//! by [`TestCache::finish`] or, if the run ends early, when the cache is
//! dropped.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use retest_common::{ContractId, TxHash};
use retest_config::{ProjectConfig, RunConfig};
use tracing::{debug, warn};

use crate::build::BuildOutput;
use crate::error::CacheError;
use crate::hasher::StructuralHasher;
use crate::history::CoverageHistory;
use crate::invalidate::{contract_fingerprints, reconcile, Reconciliation};
use crate::state::{CacheState, Isolation, TestModuleEntry};

/// Where the cache lives and how the current run is configured.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Project root; cache keys are paths relative to it.
    pub root: PathBuf,
    /// Persisted cache file.
    pub location: PathBuf,
    /// Extra absolute-import roots.
    pub search_paths: Vec<PathBuf>,
    /// File name of per-directory configuration files.
    pub conftest: String,
    /// Settings of the current run.
    pub run: RunConfig,
}

impl CacheOptions {
    /// Derives options from a loaded project configuration.
    pub fn from_config(root: &Path, config: &ProjectConfig, run: RunConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            location: config.cache_path(root),
            search_paths: config.search_paths(root),
            conftest: config.tests.conftest.clone(),
            run,
        }
    }
}

/// The incremental test-selection cache for one run.
pub struct TestCache<H: CoverageHistory> {
    root: PathBuf,
    location: PathBuf,
    run: RunConfig,
    hasher: StructuralHasher,
    state: CacheState,
    reconciliation: Reconciliation,
    isolated: BTreeSet<PathBuf>,
    history: H,
    /// Number of history hashes that belong to earlier modules.
    module_start: usize,
    persist: bool,
    saved: bool,
}

impl<H: CoverageHistory> TestCache<H> {
    /// Loads the persisted state and reconciles it with the current build.
    ///
    /// Fails only if the build output cannot be read or a cached module has
    /// an unresolvable local import.
    pub fn open(
        options: CacheOptions,
        build: &dyn BuildOutput,
        mut history: H,
    ) -> Result<Self, CacheError> {
        let mut state = CacheState::load(&options.location);
        let mut hasher =
            StructuralHasher::new(&options.root, options.search_paths, &options.conftest);
        let current = contract_fingerprints(build)?;
        let root = options.root;
        let reconciliation = reconcile(&mut state, &current, &mut history, |key| {
            hasher.test_fingerprint(&root.join(key))
        })?;

        let module_start = history.coverage_hashes().len();
        Ok(Self {
            root,
            location: options.location,
            run: options.run,
            hasher,
            state,
            reconciliation,
            isolated: BTreeSet::new(),
            history,
            module_start,
            persist: true,
            saved: false,
        })
    }

    /// Stops the cache from writing its state, for dry runs.
    pub fn read_only(mut self) -> Self {
        self.persist = false;
        self
    }

    /// The current state.
    pub fn state(&self) -> &CacheState {
        &self.state
    }

    /// What reconciliation decided when the cache was opened.
    pub fn reconciliation(&self) -> &Reconciliation {
        &self.reconciliation
    }

    /// Contracts whose bytecode changed since the last run.
    pub fn changed_contracts(&self) -> &BTreeSet<ContractId> {
        &self.reconciliation.changed
    }

    /// The coverage history.
    pub fn history(&self) -> &H {
        &self.history
    }

    /// Mutable access to the coverage history, for the harness to add the
    /// coverage of transactions it executes.
    pub fn history_mut(&mut self) -> &mut H {
        &mut self.history
    }

    /// Marks modules whose chain state is reset after they run.
    pub fn set_isolated<I, P>(&mut self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for path in paths {
            let key = self.key_for(path.as_ref());
            self.isolated.insert(key);
        }
    }

    /// Returns `true` if the module can be skipped this run.
    ///
    /// A module is skipped only when it has a surviving entry whose
    /// fingerprint matches the file on disk, whose isolation set is
    /// non-empty, and which collected coverage if this run needs it. An
    /// unreadable or unparseable module always runs.
    pub fn should_skip(&mut self, path: &Path) -> Result<bool, CacheError> {
        let key = self.key_for(path);
        let Some(entry) = self.state.tests.get(&key) else {
            return Ok(false);
        };
        if entry.isolation.skippable_deps().is_none() {
            return Ok(false);
        }
        if self.run.coverage && !entry.coverage_collected {
            return Ok(false);
        }
        let stored = entry.fingerprint;
        match self.hasher.test_fingerprint(&self.root.join(&key)) {
            Ok(fresh) => Ok(fresh == stored),
            Err(e) if e.is_module_local() => {
                warn!(path = %key.display(), error = %e, "module will run");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Marks the start of a module: history transactions added from now on
    /// belong to it. Recording a result does this implicitly for the next
    /// module.
    pub fn begin_module(&mut self) {
        self.module_start = self.history.coverage_hashes().len();
    }

    /// Records the outcome of running a module.
    ///
    /// `observed` is the set of contracts the module touched; only those
    /// with bytecode are kept. Coverage stays recorded once collected.
    /// `run` describes the run that just executed and decides whether
    /// coverage was collected; the run settings given at open only govern
    /// [`TestCache::should_skip`]. The module's transaction hashes are the
    /// ones added to the history since the previous module was recorded
    /// (or since [`TestCache::begin_module`]).
    ///
    /// If the module cannot be fingerprinted any previous entry is removed,
    /// nothing is recorded and the error is returned.
    pub fn record_result(
        &mut self,
        path: &Path,
        run: &RunConfig,
        observed: &BTreeSet<ContractId>,
    ) -> Result<(), CacheError> {
        let key = self.key_for(path);
        let tx_hashes = self.take_module_hashes();
        let fingerprint = match self.hasher.test_fingerprint(&self.root.join(&key)) {
            Ok(fp) => fp,
            Err(e) => {
                self.state.tests.remove(&key);
                if e.is_module_local() {
                    warn!(path = %key.display(), error = %e, "result not recorded");
                }
                return Err(e);
            }
        };

        let isolation = if self.isolated.contains(&key) {
            Isolation::IsolatedWith(
                observed
                    .iter()
                    .filter(|c| self.state.contracts.contains_key(*c))
                    .cloned()
                    .collect(),
            )
        } else {
            Isolation::NotIsolated
        };
        let coverage_collected = run.coverage
            || self
                .state
                .tests
                .get(&key)
                .is_some_and(|prev| prev.coverage_collected);

        debug!(path = %key.display(), ?isolation, coverage_collected, "recorded module");
        self.state.tests.insert(
            key,
            TestModuleEntry {
                coverage_collected,
                fingerprint,
                isolation,
                tx_hashes,
            },
        );
        Ok(())
    }

    /// Persists the state and consumes the cache.
    ///
    /// A write failure is logged and returned; it never affects test results.
    pub fn finish(mut self) -> Result<(), CacheError> {
        self.saved = true;
        if !self.persist {
            return Ok(());
        }
        self.save()
    }

    fn save(&mut self) -> Result<(), CacheError> {
        self.state.tx = self.history.coverage();
        self.state.save(&self.location).map_err(|e| {
            warn!(path = %self.location.display(), error = %e, "could not save test cache");
            e
        })
    }

    /// Hashes added since the module started; the next module starts here.
    fn take_module_hashes(&mut self) -> Vec<TxHash> {
        let mut hashes = self.history.coverage_hashes();
        let start = self.module_start.min(hashes.len());
        self.module_start = hashes.len();
        hashes.split_off(start)
    }

    /// Cache key of a module: its path relative to the project root.
    fn key_for(&self, path: &Path) -> PathBuf {
        match path.strip_prefix(&self.root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => path.to_path_buf(),
        }
    }
}

impl<H: CoverageHistory> Drop for TestCache<H> {
    fn drop(&mut self) {
        if self.persist && !self.saved {
            self.saved = true;
            // Already logged at warn by `save`.
            let _ = self.save();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryHistory;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, CacheOptions) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("tests")).unwrap();
        fs::write(dir.path().join("tests/test_a.py"), "def test_a():\n    pass\n").unwrap();
        let options = CacheOptions {
            root: dir.path().to_path_buf(),
            location: dir.path().join("build/tests.json"),
            search_paths: Vec::new(),
            conftest: "conftest.py".to_string(),
            run: RunConfig::default(),
        };
        (dir, options)
    }

    fn build(pairs: &[(&str, &[u8])]) -> BTreeMap<ContractId, Vec<u8>> {
        pairs
            .iter()
            .map(|(n, code)| (ContractId::new(*n), code.to_vec()))
            .collect()
    }

    fn deps(names: &[&str]) -> BTreeSet<ContractId> {
        names.iter().map(|n| ContractId::new(*n)).collect()
    }

    #[test]
    fn relative_and_absolute_paths_share_a_key() {
        let (dir, options) = setup();
        let bytecode = build(&[("Token", b"\x01")]);
        let mut cache = TestCache::open(options, &bytecode, MemoryHistory::new()).unwrap();
        cache.set_isolated([dir.path().join("tests/test_a.py")]);
        cache
            .record_result(Path::new("tests/test_a.py"), &RunConfig::default(), &deps(&["Token"]))
            .unwrap();
        let entry = &cache.state().tests[Path::new("tests/test_a.py")];
        assert_eq!(entry.isolation, Isolation::IsolatedWith(deps(&["Token"])));
        assert!(cache.should_skip(&dir.path().join("tests/test_a.py")).unwrap());
    }

    #[test]
    fn observed_interfaces_are_not_dependencies() {
        let (_dir, options) = setup();
        let bytecode = build(&[("Token", b"\x01"), ("IERC20", b"")]);
        let mut cache = TestCache::open(options, &bytecode, MemoryHistory::new()).unwrap();
        cache.set_isolated(["tests/test_a.py"]);
        cache
            .record_result(
                Path::new("tests/test_a.py"),
                &RunConfig::default(),
                &deps(&["Token", "IERC20", "Unknown"]),
            )
            .unwrap();
        assert_eq!(
            cache.state().tests[Path::new("tests/test_a.py")].isolation,
            Isolation::IsolatedWith(deps(&["Token"]))
        );
    }

    #[test]
    fn not_isolated_module_never_skips() {
        let (_dir, options) = setup();
        let bytecode = build(&[("Token", b"\x01")]);
        let mut cache = TestCache::open(options, &bytecode, MemoryHistory::new()).unwrap();
        let path = Path::new("tests/test_a.py");
        cache.record_result(path, &RunConfig::default(), &deps(&["Token"])).unwrap();
        assert_eq!(cache.state().tests[path].isolation, Isolation::NotIsolated);
        assert!(!cache.should_skip(path).unwrap());
    }

    #[test]
    fn edited_module_runs_again() {
        let (dir, options) = setup();
        let bytecode = build(&[("Token", b"\x01")]);
        let mut cache = TestCache::open(options, &bytecode, MemoryHistory::new()).unwrap();
        let path = Path::new("tests/test_a.py");
        cache.set_isolated([path]);
        cache.record_result(path, &RunConfig::default(), &deps(&["Token"])).unwrap();
        fs::write(dir.path().join(path), "def test_a():\n    assert False\n").unwrap();
        assert!(!cache.should_skip(path).unwrap());
    }

    #[test]
    fn unparseable_module_is_not_recorded() {
        let (dir, options) = setup();
        let bytecode = build(&[("Token", b"\x01")]);
        let mut cache = TestCache::open(options, &bytecode, MemoryHistory::new()).unwrap();
        let path = Path::new("tests/test_a.py");
        cache.set_isolated([path]);
        cache.record_result(path, &RunConfig::default(), &deps(&["Token"])).unwrap();

        fs::write(dir.path().join(path), "def test_a(\n").unwrap();
        assert!(!cache.should_skip(path).unwrap());
        let err = cache
            .record_result(path, &RunConfig::default(), &deps(&["Token"]))
            .unwrap_err();
        assert!(err.is_module_local());
        assert!(!cache.state().tests.contains_key(path));
    }

    #[test]
    fn unknown_module_runs() {
        let (_dir, options) = setup();
        let mut cache = TestCache::open(options, &build(&[]), MemoryHistory::new()).unwrap();
        assert!(!cache.should_skip(Path::new("tests/test_new.py")).unwrap());
    }

    #[test]
    fn read_only_cache_never_writes() {
        let (_dir, options) = setup();
        let location = options.location.clone();
        {
            let cache = TestCache::open(options.clone(), &build(&[]), MemoryHistory::new())
                .unwrap()
                .read_only();
            cache.finish().unwrap();
        }
        {
            let _cache = TestCache::open(options, &build(&[]), MemoryHistory::new())
                .unwrap()
                .read_only();
        }
        assert!(!location.exists());
    }

    #[test]
    fn drop_persists_once() {
        let (_dir, options) = setup();
        let location = options.location.clone();
        {
            let mut cache =
                TestCache::open(options, &build(&[]), MemoryHistory::new()).unwrap();
            cache
                .record_result(Path::new("tests/test_a.py"), &RunConfig::default(), &BTreeSet::new())
                .unwrap();
        }
        let state = CacheState::load(&location);
        assert!(state.tests.contains_key(Path::new("tests/test_a.py")));
    }

    #[test]
    fn transactions_belong_to_the_module_that_produced_them() {
        let (dir, options) = setup();
        fs::write(dir.path().join("tests/test_b.py"), "def test_b():\n    pass\n").unwrap();
        let bytecode = build(&[("Token", b"\x01")]);
        let (a, b) = (Path::new("tests/test_a.py"), Path::new("tests/test_b.py"));
        let run = RunConfig::default();

        let mut cache = TestCache::open(options.clone(), &bytecode, MemoryHistory::new()).unwrap();
        cache.set_isolated([a, b]);
        cache.history_mut().add_coverage(TxHash::new("0x0a"), BTreeMap::new());
        cache.record_result(a, &run, &deps(&["Token"])).unwrap();
        cache.history_mut().add_coverage(TxHash::new("0x0b"), BTreeMap::new());
        cache.record_result(b, &run, &deps(&["Token"])).unwrap();
        assert_eq!(cache.state().tests[a].tx_hashes, vec![TxHash::new("0x0a")]);
        assert_eq!(cache.state().tests[b].tx_hashes, vec![TxHash::new("0x0b")]);
        cache.finish().unwrap();

        // Replayed coverage from the previous run is not attributed again.
        let mut cache = TestCache::open(options, &bytecode, MemoryHistory::new()).unwrap();
        assert_eq!(cache.history().len(), 2);
        cache.set_isolated([b]);
        cache.history_mut().add_coverage(TxHash::new("0x0c"), BTreeMap::new());
        cache.record_result(b, &run, &deps(&["Token"])).unwrap();
        assert_eq!(cache.state().tests[b].tx_hashes, vec![TxHash::new("0x0c")]);
    }

    #[test]
    fn recorded_coverage_follows_the_reported_run() {
        let (_dir, options) = setup();
        let mut cache = TestCache::open(options, &build(&[]), MemoryHistory::new()).unwrap();
        let path = Path::new("tests/test_a.py");
        cache.record_result(path, &RunConfig { coverage: true }, &BTreeSet::new()).unwrap();
        assert!(cache.state().tests[path].coverage_collected);
    }

    #[test]
    fn begin_module_excludes_earlier_transactions() {
        let (_dir, options) = setup();
        let mut cache = TestCache::open(options, &build(&[]), MemoryHistory::new()).unwrap();
        cache.history_mut().add_coverage(TxHash::new("0x01"), BTreeMap::new());
        cache.begin_module();
        cache.history_mut().add_coverage(TxHash::new("0x02"), BTreeMap::new());
        let path = Path::new("tests/test_a.py");
        cache.record_result(path, &RunConfig::default(), &BTreeSet::new()).unwrap();
        assert_eq!(cache.state().tests[path].tx_hashes, vec![TxHash::new("0x02")]);
    }

    #[test]
    fn finish_reports_write_failure() {
        let (dir, mut options) = setup();
        fs::write(dir.path().join("blocker"), "file").unwrap();
        options.location = dir.path().join("blocker/tests.json");
        let cache = TestCache::open(options, &build(&[]), MemoryHistory::new()).unwrap();
        assert!(matches!(cache.finish(), Err(CacheError::Io { .. })));
    }
}
