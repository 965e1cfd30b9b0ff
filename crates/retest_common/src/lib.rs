//! Shared foundational types for the retest workspace.
//!
//! This crate provides the SHA-256 [`Fingerprint`] used for every cached hash
//! and the [`ContractId`] / [`TxHash`] identifiers shared by the cache and CLI.

#![warn(missing_docs)]

pub mod fingerprint;
pub mod ids;

pub use fingerprint::{Fingerprint, ParseFingerprintError};
pub use ids::{ContractId, TxHash};
