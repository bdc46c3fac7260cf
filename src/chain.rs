// src/chain.rs
//! Minimal single-chain ledger view.
//!
//! Each chain (main and every branch) is an independently mined,
//! single-writer ledger. This module holds the block sequence and the
//! transaction index the orchestration layer reads from; block production
//! and relay are external concerns. Confirmation depth is always
//! recomputed from the current tip so a reorg is reflected immediately.

use crate::transaction::{Transaction, Txid};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub type BlockHash = [u8; 32];

/// Chain identity. `"main"` is reserved for the primary chain; a branch is
/// identified by the txid of its branch-creation transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainId {
    Main,
    Branch(Txid),
}

impl ChainId {
    pub fn is_main(&self) -> bool {
        matches!(self, ChainId::Main)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainId::Main => write!(f, "main"),
            ChainId::Branch(id) => write!(f, "{}", id),
        }
    }
}

impl FromStr for ChainId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s == "main" {
            return Ok(ChainId::Main);
        }
        let txid = Txid::from_str(s).map_err(|e| format!("invalid chain id: {}", e))?;
        Ok(ChainId::Branch(txid))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub hash: BlockHash,
    pub prev: BlockHash,
    pub height: u64,
    pub txs: Vec<Transaction>,
}

/// Where a mined transaction sits in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxEntry {
    pub block_hash: BlockHash,
    pub height: u64,
    pub tx_index: u32,
}

struct ChainInner {
    blocks: Vec<Block>,
    /// txid -> position of its including block and its index within it.
    tx_index: HashMap<Txid, TxEntry>,
}

/// One ledger. Interior locking keeps reads consistent snapshots; there is
/// no cross-chain lock anywhere above this.
pub struct Chain {
    id: ChainId,
    inner: RwLock<ChainInner>,
}

impl Chain {
    pub fn new(id: ChainId) -> Self {
        let genesis = Block {
            hash: block_hash(&[0u8; 32], 0, &[]),
            prev: [0u8; 32],
            height: 0,
            txs: Vec::new(),
        };
        Chain {
            id,
            inner: RwLock::new(ChainInner {
                blocks: vec![genesis],
                tx_index: HashMap::new(),
            }),
        }
    }

    pub fn id(&self) -> ChainId {
        self.id
    }

    pub fn best_height(&self) -> u64 {
        let inner = self.inner.read();
        inner.blocks.last().map(|b| b.height).unwrap_or(0)
    }

    pub fn best_block_hash(&self) -> BlockHash {
        let inner = self.inner.read();
        inner.blocks.last().map(|b| b.hash).unwrap_or([0u8; 32])
    }

    /// Append a block containing `txs` to the tip; returns the new block.
    pub fn connect_block(&self, txs: Vec<Transaction>) -> Block {
        let mut inner = self.inner.write();
        let prev = inner.blocks.last().expect("genesis always present");
        let height = prev.height + 1;
        let hash = block_hash(&prev.hash, height, &txs);
        let block = Block {
            hash,
            prev: prev.hash,
            height,
            txs,
        };
        for (i, tx) in block.txs.iter().enumerate() {
            inner.tx_index.insert(
                tx.txid(),
                TxEntry {
                    block_hash: hash,
                    height,
                    tx_index: i as u32,
                },
            );
        }
        inner.blocks.push(block.clone());
        log::debug!(
            "chain {}: connected block {} at height {} ({} txs)",
            self.id,
            hex::encode(hash),
            height,
            block.txs.len()
        );
        block
    }

    /// Orphan the tip block. Its transactions drop out of the index, so
    /// their confirmation count is reported as missing afterwards.
    pub fn disconnect_tip(&self) -> Option<Block> {
        let mut inner = self.inner.write();
        if inner.blocks.len() <= 1 {
            return None;
        }
        let block = inner.blocks.pop()?;
        for tx in &block.txs {
            inner.tx_index.remove(&tx.txid());
        }
        log::debug!(
            "chain {}: disconnected tip {} (height {})",
            self.id,
            hex::encode(block.hash),
            block.height
        );
        Some(block)
    }

    pub fn tx_entry(&self, txid: &Txid) -> Option<TxEntry> {
        self.inner.read().tx_index.get(txid).copied()
    }

    pub fn get_transaction(&self, txid: &Txid) -> Option<Transaction> {
        let inner = self.inner.read();
        let entry = inner.tx_index.get(txid)?;
        inner
            .blocks
            .iter()
            .find(|b| b.hash == entry.block_hash)
            .and_then(|b| b.txs.get(entry.tx_index as usize))
            .cloned()
    }

    /// Confirmation depth of a mined transaction, recomputed from the
    /// current tip on every call. `None` once the including block is
    /// orphaned or the transaction was never mined here.
    pub fn confirmations(&self, txid: &Txid) -> Option<u64> {
        let inner = self.inner.read();
        let entry = inner.tx_index.get(txid)?;
        let best = inner.blocks.last()?.height;
        Some(best - entry.height + 1)
    }
}

fn block_hash(prev: &BlockHash, height: u64, txs: &[Transaction]) -> BlockHash {
    let mut hasher = Sha256::new();
    hasher.update(prev);
    hasher.update(height.to_le_bytes());
    for tx in txs {
        hasher.update(tx.txid().as_bytes());
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}
