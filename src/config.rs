// src/config.rs
//! Node configuration.
//!
//! One `NodeConfig` per chain instance. The data path can be set directly
//! or through the `BRANCHCHAIN_DATA_PATH` environment variable; each chain
//! keeps its records under a sibling directory keyed by its chain id.

use crate::chain::ChainId;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Identity of the chain this node serves.
    pub chain: ChainId,
    /// Base directory for persistent records.
    pub data_dir: PathBuf,
    /// Bootstrap peer list advertised when this node's branch registers.
    #[serde(default)]
    pub vseeds: String,
    /// Packed seed address spec advertised at registration.
    #[serde(default)]
    pub seed_spec6: String,
}

impl NodeConfig {
    pub fn new(chain: ChainId, data_dir: impl Into<PathBuf>) -> Self {
        NodeConfig {
            chain,
            data_dir: data_dir.into(),
            vseeds: String::new(),
            seed_spec6: String::new(),
        }
    }

    /// Config rooted at `BRANCHCHAIN_DATA_PATH` (default `./branchchain_data`).
    pub fn from_env(chain: ChainId) -> Self {
        let base = env::var("BRANCHCHAIN_DATA_PATH").unwrap_or_else(|_| "./branchchain_data".into());
        Self::new(chain, base)
    }

    /// Per-chain store directory, a sibling path keyed by chain id.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(format!("txrecords_{}", self.chain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Txid;

    #[test]
    fn store_paths_are_chain_scoped() {
        let main = NodeConfig::new(ChainId::Main, "/tmp/bc");
        let branch = NodeConfig::new(ChainId::Branch(Txid([1; 32])), "/tmp/bc");
        assert_ne!(main.store_path(), branch.store_path());
        assert!(main.store_path().ends_with("txrecords_main"));
    }
}
