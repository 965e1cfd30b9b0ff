//! Access to compiled contract bytecode.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use retest_common::ContractId;
use serde::Deserialize;
use tracing::debug;

use crate::error::CacheError;

/// The build system's view of the compiled contracts.
pub trait BuildOutput {
    /// Returns every contract with its deployable bytecode. Interfaces and
    /// abstract contracts map to an empty byte vector.
    fn bytecode(&self) -> Result<BTreeMap<ContractId, Vec<u8>>, CacheError>;
}

impl BuildOutput for BTreeMap<ContractId, Vec<u8>> {
    fn bytecode(&self) -> Result<BTreeMap<ContractId, Vec<u8>>, CacheError> {
        Ok(self.clone())
    }
}

/// A directory of JSON contract artifacts, one file per contract.
///
/// Each `*.json` file must contain a `contractName` string and may contain a
/// `bytecode` hex string. Other fields are ignored.
#[derive(Debug, Clone)]
pub struct ContractsDir {
    dir: PathBuf,
}

#[derive(Deserialize)]
struct Artifact {
    #[serde(rename = "contractName")]
    contract_name: String,
    #[serde(default)]
    bytecode: String,
}

impl ContractsDir {
    /// Creates a reader for `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The artifact directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_artifact(path: &Path) -> Result<(ContractId, Vec<u8>), CacheError> {
        let content = std::fs::read_to_string(path).map_err(|e| CacheError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let artifact: Artifact = serde_json::from_str(&content).map_err(|e| CacheError::Build {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok((
            ContractId::new(artifact.contract_name),
            decode_bytecode(&artifact.bytecode),
        ))
    }
}

impl BuildOutput for ContractsDir {
    /// A missing directory means nothing has been compiled yet.
    fn bytecode(&self) -> Result<BTreeMap<ContractId, Vec<u8>>, CacheError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(dir = %self.dir.display(), "no build output");
                return Ok(BTreeMap::new());
            }
            Err(e) => {
                return Err(CacheError::Io {
                    path: self.dir.clone(),
                    source: e,
                })
            }
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::Io {
                path: self.dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut contracts = BTreeMap::new();
        for path in &paths {
            let (name, code) = Self::read_artifact(path)?;
            contracts.insert(name, code);
        }
        debug!(dir = %self.dir.display(), contracts = contracts.len(), "read build output");
        Ok(contracts)
    }
}

/// Decodes a `0x`-prefixed or bare hex string. Unlinked bytecode contains
/// library placeholders that are not hex; it is kept as text.
fn decode_bytecode(text: &str) -> Vec<u8> {
    let digits = text.strip_prefix("0x").unwrap_or(text);
    hex::decode(digits).unwrap_or_else(|_| digits.as_bytes().to_vec())
}
