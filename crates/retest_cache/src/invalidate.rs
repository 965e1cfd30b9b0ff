//! Reconciliation of the loaded cache against the current build.
//!
//! Contract bytecode fingerprints decide which contracts changed since the
//! last run. Changes cascade to the test entries and coverage records that
//! depend on those contracts; test entries are additionally checked against
//! fresh fingerprints of their source files.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use retest_common::{ContractId, Fingerprint};
use tracing::{debug, info};

use crate::build::BuildOutput;
use crate::error::CacheError;
use crate::history::CoverageHistory;
use crate::state::CacheState;

/// Why a test entry was dropped during reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The module file no longer exists.
    Missing,
    /// The module, a local import or a configuration file changed.
    Modified,
    /// The module or something it depends on does not parse.
    Unparseable,
    /// The module is not isolated and a contract changed.
    NotIsolated,
    /// The module depends on a changed contract.
    DependsOnChanged,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DropReason::Missing => "file missing",
            DropReason::Modified => "source changed",
            DropReason::Unparseable => "does not parse",
            DropReason::NotIsolated => "not isolated",
            DropReason::DependsOnChanged => "depends on changed contract",
        };
        f.write_str(text)
    }
}

/// The outcome of [`reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Contracts whose bytecode fingerprint is new or differs from the cache.
    pub changed: BTreeSet<ContractId>,
    /// Test entries that survived.
    pub retained: BTreeSet<PathBuf>,
    /// Test entries that were removed, with the reason.
    pub dropped: BTreeMap<PathBuf, DropReason>,
}

/// Fingerprints every contract that has bytecode. Interface-only contracts
/// are left out, so they can never be reported as changed.
pub fn contract_fingerprints(
    build: &dyn BuildOutput,
) -> Result<BTreeMap<ContractId, Fingerprint>, CacheError> {
    Ok(build
        .bytecode()?
        .into_iter()
        .filter(|(_, code)| !code.is_empty())
        .map(|(name, code)| (name, Fingerprint::from_bytes(&code)))
        .collect())
}

/// Reconciles `state` in place against the current contract fingerprints.
///
/// `fresh_fingerprint` computes the current fingerprint of a test module
/// given its cache key. It should fail with an error for which
/// [`CacheError::is_module_local`] holds when the module is missing or
/// unparseable; any other error aborts reconciliation.
///
/// Surviving coverage records are fed to `history`. On return the cached
/// contract fingerprints are replaced by `current`.
pub fn reconcile<H, F>(
    state: &mut CacheState,
    current: &BTreeMap<ContractId, Fingerprint>,
    history: &mut H,
    mut fresh_fingerprint: F,
) -> Result<Reconciliation, CacheError>
where
    H: CoverageHistory + ?Sized,
    F: FnMut(&Path) -> Result<Fingerprint, CacheError>,
{
    let changed: BTreeSet<ContractId> = current
        .iter()
        .filter(|(name, fp)| state.contracts.get(*name) != Some(*fp))
        .map(|(name, _)| name.clone())
        .collect();

    let mut dropped = BTreeMap::new();
    if !changed.is_empty() {
        info!(changed = changed.len(), "contracts changed since last run");
        state.tx.retain(|_, coverage| coverage.keys().all(|c| !changed.contains(c)));
        state.tests.retain(|path, entry| {
            let reason = match entry.isolation.skippable_deps() {
                None => DropReason::NotIsolated,
                Some(deps) if !deps.is_disjoint(&changed) => DropReason::DependsOnChanged,
                Some(_) => return true,
            };
            dropped.insert(path.clone(), reason);
            false
        });
    }

    for (tx, coverage) in &state.tx {
        history.add_coverage(tx.clone(), coverage.clone());
    }

    let mut stale = Vec::new();
    for (path, entry) in &state.tests {
        match fresh_fingerprint(path) {
            Ok(fp) if fp == entry.fingerprint => {}
            Ok(_) => stale.push((path.clone(), DropReason::Modified)),
            Err(CacheError::Io { .. }) => stale.push((path.clone(), DropReason::Missing)),
            Err(e) if e.is_module_local() => {
                debug!(path = %path.display(), error = %e, "cached module does not parse");
                stale.push((path.clone(), DropReason::Unparseable));
            }
            Err(e) => return Err(e),
        }
    }
    for (path, reason) in stale {
        state.tests.remove(&path);
        dropped.insert(path, reason);
    }

    for (path, reason) in &dropped {
        debug!(path = %path.display(), %reason, "dropped cached test");
    }
    state.contracts = current.clone();

    let retained: BTreeSet<PathBuf> = state.tests.keys().cloned().collect();
    info!(
        retained = retained.len(),
        dropped = dropped.len(),
        coverage = state.tx.len(),
        "reconciled cache"
    );
    Ok(Reconciliation {
        changed,
        retained,
        dropped,
    })
}
