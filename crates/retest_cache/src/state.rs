//! Persisted cache state and its JSON file.
//!
//! The state is a single JSON document with three top-level keys:
//!
//! - `contracts`: contract name to bytecode fingerprint,
//! - `tests`: test module path (relative to the project root) to its entry,
//! - `tx`: transaction hash to the coverage data it produced.
//!
//! Every map is a `BTreeMap` and every set a `BTreeSet`, so the file is
//! byte-identical for identical state regardless of insertion order.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use retest_common::{ContractId, Fingerprint, TxHash};
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::CacheError;

/// Coverage evaluation data of one transaction, keyed by contract.
///
/// The per-contract payload is opaque to the cache.
pub type CoverageMap = BTreeMap<ContractId, serde_json::Value>;

/// Everything the cache remembers between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheState {
    /// Bytecode fingerprints of the contracts seen in the last run.
    #[serde(default)]
    pub contracts: BTreeMap<ContractId, Fingerprint>,
    /// Test module entries keyed by project-relative path.
    #[serde(default)]
    pub tests: BTreeMap<PathBuf, TestModuleEntry>,
    /// Coverage records keyed by transaction hash.
    #[serde(default)]
    pub tx: BTreeMap<TxHash, CoverageMap>,
}

/// What the cache knows about one test module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestModuleEntry {
    /// Whether any recorded run of the module collected coverage.
    #[serde(rename = "coverage")]
    pub coverage_collected: bool,
    /// Structural fingerprint of the module, its local imports and the
    /// configuration files above it.
    pub fingerprint: Fingerprint,
    /// The contracts the module's outcome depends on.
    #[serde(rename = "isolated")]
    pub isolation: Isolation,
    /// Transactions produced by the module's last run.
    #[serde(rename = "txhash", default)]
    pub tx_hashes: Vec<TxHash>,
}

/// Whether a module's side effects are confined to known contracts.
///
/// Persisted as `false` for [`Isolation::NotIsolated`] and as a sorted array
/// of contract names for [`Isolation::IsolatedWith`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Isolation {
    /// The module may leave global chain state behind; it is never skipped.
    #[default]
    NotIsolated,
    /// The module's state is reset after it runs and it only touched these
    /// contracts.
    IsolatedWith(BTreeSet<ContractId>),
}

impl Isolation {
    /// The dependency set when the module can be skipped: isolated and
    /// depending on at least one contract.
    pub fn skippable_deps(&self) -> Option<&BTreeSet<ContractId>> {
        match self {
            Isolation::IsolatedWith(deps) if !deps.is_empty() => Some(deps),
            _ => None,
        }
    }
}

impl Serialize for Isolation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Isolation::NotIsolated => serializer.serialize_bool(false),
            Isolation::IsolatedWith(deps) => deps.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Isolation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Flag(bool),
            Deps(BTreeSet<ContractId>),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Flag(false) => Ok(Isolation::NotIsolated),
            Repr::Flag(true) => Err(de::Error::custom(
                "isolation must be `false` or a list of contracts",
            )),
            Repr::Deps(deps) => Ok(Isolation::IsolatedWith(deps)),
        }
    }
}

impl CacheState {
    /// Loads the state from `location`.
    ///
    /// Never fails: a missing, unreadable or malformed file yields the empty
    /// state, so a corrupt cache costs a full run and nothing else.
    pub fn load(location: &Path) -> Self {
        let content = match std::fs::read_to_string(location) {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %location.display(), error = %e, "no cache file, starting empty");
                return Self::default();
            }
        };
        match serde_json::from_str::<Self>(&content) {
            Ok(state) => {
                debug!(
                    path = %location.display(),
                    tests = state.tests.len(),
                    contracts = state.contracts.len(),
                    tx = state.tx.len(),
                    "loaded cache"
                );
                state
            }
            Err(e) => {
                debug!(path = %location.display(), error = %e, "discarding unreadable cache");
                Self::default()
            }
        }
    }

    /// Writes the state to `location` atomically.
    ///
    /// The JSON is written to a sibling temporary file which is then renamed
    /// over the target, so readers never observe a partial file.
    pub fn save(&self, location: &Path) -> Result<(), CacheError> {
        if let Some(dir) = location.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| CacheError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;

        let temp_path = temp_path_for(location);
        if let Err(e) = std::fs::write(&temp_path, json) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(CacheError::Io {
                path: temp_path,
                source: e,
            });
        }
        if let Err(e) = std::fs::rename(&temp_path, location) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(CacheError::Io {
                path: location.to_path_buf(),
                source: e,
            });
        }
        info!(
            path = %location.display(),
            tests = self.tests.len(),
            contracts = self.contracts.len(),
            tx = self.tx.len(),
            "cache saved"
        );
        Ok(())
    }

    /// Returns `true` if the state holds nothing.
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty() && self.tests.is_empty() && self.tx.is_empty()
    }
}

fn temp_path_for(location: &Path) -> PathBuf {
    let mut name = location
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    location.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fp(data: &str) -> Fingerprint {
        Fingerprint::from_bytes(data.as_bytes())
    }

    fn sample_state() -> CacheState {
        let mut state = CacheState::default();
        state.contracts.insert(ContractId::new("Token"), fp("token"));
        state.contracts.insert(ContractId::new("Vault"), fp("vault"));
        state.tests.insert(
            PathBuf::from("tests/test_token.py"),
            TestModuleEntry {
                coverage_collected: true,
                fingerprint: fp("test_token"),
                isolation: Isolation::IsolatedWith(
                    [ContractId::new("Token")].into_iter().collect(),
                ),
                tx_hashes: vec![TxHash::new("0xaa"), TxHash::new("0xbb")],
            },
        );
        state.tests.insert(
            PathBuf::from("tests/test_global.py"),
            TestModuleEntry {
                coverage_collected: false,
                fingerprint: fp("test_global"),
                isolation: Isolation::NotIsolated,
                tx_hashes: Vec::new(),
            },
        );
        let mut cov = CoverageMap::new();
        cov.insert(ContractId::new("Token"), json!({"pcs": [1, 2, 3]}));
        state.tx.insert(TxHash::new("0xaa"), cov);
        state
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = CacheState::load(&dir.path().join("tests.json"));
        assert!(state.is_empty());
    }

    #[test]
    fn malformed_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tests.json");
        for content in ["{not json", "[]", "{\"tests\": {\"a.py\": {\"isolated\": true}}}"] {
            std::fs::write(&path, content).unwrap();
            assert!(CacheState::load(&path).is_empty(), "{content}");
        }
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tests.json");
        std::fs::write(&path, "{\"contracts\": {}}").unwrap();
        assert!(CacheState::load(&path).is_empty());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("build").join("tests.json");
        let state = sample_state();
        state.save(&path).unwrap();
        assert_eq!(CacheState::load(&path), state);
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn saved_json_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tests.json");
        sample_state().save(&path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["contracts", "tests", "tx"]);

        let token = &value["tests"]["tests/test_token.py"];
        assert_eq!(token["isolated"], json!(["Token"]));
        assert_eq!(token["coverage"], json!(true));
        assert_eq!(token["txhash"], json!(["0xaa", "0xbb"]));
        assert_eq!(token["fingerprint"], json!(fp("test_token").to_string()));
        assert_eq!(value["tests"]["tests/test_global.py"]["isolated"], json!(false));
        assert_eq!(value["tx"]["0xaa"]["Token"], json!({"pcs": [1, 2, 3]}));
    }

    #[test]
    fn output_is_independent_of_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");

        let mut first = CacheState::default();
        let mut second = CacheState::default();
        for name in ["Vault", "Token", "Oracle"] {
            first.contracts.insert(ContractId::new(name), fp(name));
        }
        for name in ["Oracle", "Vault", "Token"] {
            second.contracts.insert(ContractId::new(name), fp(name));
        }
        first.save(&a).unwrap();
        second.save(&b).unwrap();
        assert_eq!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());
    }

    #[test]
    fn isolation_serde() {
        let isolated = Isolation::IsolatedWith(
            ["Vault", "Token"].into_iter().map(ContractId::new).collect(),
        );
        assert_eq!(serde_json::to_value(&isolated).unwrap(), json!(["Token", "Vault"]));
        assert_eq!(serde_json::to_value(&Isolation::NotIsolated).unwrap(), json!(false));
        let back: Isolation = serde_json::from_value(json!(["Token", "Vault"])).unwrap();
        assert_eq!(back, isolated);
        let back: Isolation = serde_json::from_value(json!(false)).unwrap();
        assert_eq!(back, Isolation::NotIsolated);
        assert!(serde_json::from_value::<Isolation>(json!(true)).is_err());
    }

    #[test]
    fn skippable_deps_requires_non_empty_set() {
        assert!(Isolation::NotIsolated.skippable_deps().is_none());
        assert!(Isolation::IsolatedWith(BTreeSet::new()).skippable_deps().is_none());
        let deps: BTreeSet<ContractId> = [ContractId::new("Token")].into_iter().collect();
        assert_eq!(Isolation::IsolatedWith(deps.clone()).skippable_deps(), Some(&deps));
    }

    #[test]
    fn save_into_unwritable_location_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("build");
        std::fs::write(&blocker, "not a directory").unwrap();
        let err = CacheState::default()
            .save(&blocker.join("tests.json"))
            .unwrap_err();
        assert!(matches!(err, CacheError::Io { .. }));
    }
}
