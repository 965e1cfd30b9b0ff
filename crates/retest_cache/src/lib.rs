//! Incremental test-selection cache.
//!
//! Decides, between runs of a test suite against compiled contracts, which
//! test modules can be skipped because nothing they depend on has changed.
//! Test modules are identified by structural fingerprints that ignore
//! formatting; contracts by bytecode fingerprints. A change to a contract
//! invalidates every cached module and coverage record that touched it.
//!
//! The entry point is [`TestCache`]; the building blocks are exposed for
//! harnesses that need finer control.

#![warn(missing_docs)]

pub mod build;
pub mod discover;
pub mod error;
pub mod hasher;
pub mod history;
pub mod invalidate;
pub mod resolve;
pub mod state;
pub mod tracker;

pub use build::{BuildOutput, ContractsDir};
pub use discover::discover_test_modules;
pub use error::CacheError;
pub use hasher::StructuralHasher;
pub use history::{CoverageHistory, MemoryHistory};
pub use invalidate::{contract_fingerprints, reconcile, DropReason, Reconciliation};
pub use resolve::ImportResolver;
pub use state::{CacheState, CoverageMap, Isolation, TestModuleEntry};
pub use tracker::{CacheOptions, TestCache};
