//! Execution history: coverage data per transaction.
//!
//! The harness owns the real history. The cache feeds it the coverage
//! records that survive reconciliation, reads back the transaction hashes a
//! module produced, and persists the final coverage at the end of the run.

use std::collections::BTreeMap;

use retest_common::TxHash;

use crate::state::CoverageMap;

/// Coverage aggregation hooks provided by the test harness.
pub trait CoverageHistory {
    /// Adds or replaces the coverage data of one transaction.
    fn add_coverage(&mut self, tx: TxHash, coverage: CoverageMap);

    /// Hashes of every transaction with coverage, in the order they were
    /// first added.
    fn coverage_hashes(&self) -> Vec<TxHash>;

    /// All coverage data, keyed by transaction.
    fn coverage(&self) -> BTreeMap<TxHash, CoverageMap>;
}

/// A [`CoverageHistory`] kept in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    records: BTreeMap<TxHash, CoverageMap>,
    order: Vec<TxHash>,
}

impl MemoryHistory {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transactions with coverage.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if no coverage has been added.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl CoverageHistory for MemoryHistory {
    fn add_coverage(&mut self, tx: TxHash, coverage: CoverageMap) {
        if self.records.insert(tx.clone(), coverage).is_none() {
            self.order.push(tx);
        }
    }

    fn coverage_hashes(&self) -> Vec<TxHash> {
        self.order.clone()
    }

    fn coverage(&self) -> BTreeMap<TxHash, CoverageMap> {
        self.records.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retest_common::ContractId;
    use serde_json::json;

    fn cov(contract: &str, value: u64) -> CoverageMap {
        let mut map = CoverageMap::new();
        map.insert(ContractId::new(contract), json!(value));
        map
    }

    #[test]
    fn hashes_keep_insertion_order() {
        let mut history = MemoryHistory::new();
        history.add_coverage(TxHash::new("0xbb"), cov("Token", 1));
        history.add_coverage(TxHash::new("0xaa"), cov("Vault", 2));
        assert_eq!(
            history.coverage_hashes(),
            vec![TxHash::new("0xbb"), TxHash::new("0xaa")]
        );
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn re_adding_replaces_data_without_duplicating() {
        let mut history = MemoryHistory::new();
        history.add_coverage(TxHash::new("0xaa"), cov("Token", 1));
        history.add_coverage(TxHash::new("0xaa"), cov("Token", 5));
        assert_eq!(history.coverage_hashes().len(), 1);
        assert_eq!(history.coverage()[&TxHash::new("0xaa")], cov("Token", 5));
    }

    #[test]
    fn new_history_is_empty() {
        let history = MemoryHistory::new();
        assert!(history.is_empty());
        assert!(history.coverage().is_empty());
    }
}
