// src/txdb.rs
//! Branch transaction records database.
//!
//! Three column families:
//! - `sendinfo`: per cross-chain / branch-create txid, where it was mined
//!   and the transfer metadata needed to rebuild a step-2 later.
//! - `recv`: per step-1 txid on the destination side, the block that
//!   already contains its step-2. Duplicate detection across blocks.
//! - `branches`: the created-branch list the registry reads.
//!
//! Records are written on block connect and erased on block disconnect, so
//! the store always reflects the canonical chain.

use crate::address::Address;
use crate::chain::{BlockHash, ChainId};
use crate::transaction::Txid;
use anyhow::{Context, Result};
use rocksdb::{ColumnFamilyDescriptor, Options, DB};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Transfer metadata recorded when a cross-chain or branch-create
/// transaction is mined on this chain.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SendInfo {
    pub txid: Txid,
    pub block_hash: BlockHash,
    pub tx_index: u32,
    pub version: u32,
    /// Destination for step-1 records; `None` for branch-create records.
    pub dest_chain: Option<ChainId>,
    pub dest_address: Option<Address>,
    pub amount: u64,
}

/// Destination-side record: the block that contains the step-2 for a
/// given step-1 reference.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RecvInfo {
    pub step_one_txid: Txid,
    pub step_two_txid: Txid,
    pub block_hash: BlockHash,
}

/// Created-branch summary, as recorded by the branch-creation transaction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BranchCreateInfo {
    pub txid: Txid,
    pub vseeds: String,
    pub seed_spec6: String,
    pub block_hash: BlockHash,
}

pub struct BranchTxStore {
    db: Arc<DB>,
}

const CF_SENDINFO: &str = "sendinfo";
const CF_RECV: &str = "recv";
const CF_BRANCHES: &str = "branches";

impl BranchTxStore {
    pub fn open(path: &Path) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(128);

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_SENDINFO, Options::default()),
            ColumnFamilyDescriptor::new(CF_RECV, Options::default()),
            ColumnFamilyDescriptor::new(CF_BRANCHES, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cfs).context("open branch tx records db")?;
        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| anyhow::anyhow!("column family '{}' not found", name))
    }

    // ── send-info ──────────────────────────────────────────────────

    pub fn put_send_info(&self, info: &SendInfo) -> Result<()> {
        let cf = self.cf(CF_SENDINFO)?;
        let v = serde_json::to_vec(info)?;
        self.db.put_cf(cf, info.txid.as_bytes(), v)?;
        Ok(())
    }

    pub fn get_send_info(&self, txid: &Txid) -> Result<Option<SendInfo>> {
        let cf = self.cf(CF_SENDINFO)?;
        match self.db.get_cf(cf, txid.as_bytes())? {
            Some(v) => Ok(Some(serde_json::from_slice(&v)?)),
            None => Ok(None),
        }
    }

    pub fn del_send_info(&self, txid: &Txid) -> Result<()> {
        let cf = self.cf(CF_SENDINFO)?;
        self.db.delete_cf(cf, txid.as_bytes())?;
        Ok(())
    }

    // ── recv records ───────────────────────────────────────────────

    pub fn put_recv(&self, info: &RecvInfo) -> Result<()> {
        let cf = self.cf(CF_RECV)?;
        let v = serde_json::to_vec(info)?;
        self.db.put_cf(cf, info.step_one_txid.as_bytes(), v)?;
        Ok(())
    }

    pub fn get_recv(&self, step_one_txid: &Txid) -> Result<Option<RecvInfo>> {
        let cf = self.cf(CF_RECV)?;
        match self.db.get_cf(cf, step_one_txid.as_bytes())? {
            Some(v) => Ok(Some(serde_json::from_slice(&v)?)),
            None => Ok(None),
        }
    }

    pub fn del_recv(&self, step_one_txid: &Txid) -> Result<()> {
        let cf = self.cf(CF_RECV)?;
        self.db.delete_cf(cf, step_one_txid.as_bytes())?;
        Ok(())
    }

    /// Has a step-2 for this reference already been mined, outside of
    /// `block_hash` (re-connecting the same block is not a duplicate)?
    pub fn is_recv_repeat(&self, step_one_txid: &Txid, block_hash: Option<&BlockHash>) -> Result<bool> {
        match self.get_recv(step_one_txid)? {
            None => Ok(false),
            Some(info) => match block_hash {
                Some(h) if *h == info.block_hash => Ok(false),
                _ => Ok(true),
            },
        }
    }

    // ── created branches ───────────────────────────────────────────

    pub fn add_created_branch(&self, info: &BranchCreateInfo) -> Result<()> {
        let cf = self.cf(CF_BRANCHES)?;
        let v = serde_json::to_vec(info)?;
        self.db.put_cf(cf, info.txid.as_bytes(), v)?;
        Ok(())
    }

    pub fn del_created_branch(&self, txid: &Txid) -> Result<()> {
        let cf = self.cf(CF_BRANCHES)?;
        self.db.delete_cf(cf, txid.as_bytes())?;
        Ok(())
    }

    pub fn get_created_branch(&self, txid: &Txid) -> Result<Option<BranchCreateInfo>> {
        let cf = self.cf(CF_BRANCHES)?;
        match self.db.get_cf(cf, txid.as_bytes())? {
            Some(v) => Ok(Some(serde_json::from_slice(&v)?)),
            None => Ok(None),
        }
    }

    pub fn list_created_branches(&self) -> Result<Vec<BranchCreateInfo>> {
        let cf = self.cf(CF_BRANCHES)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_, v) = item?;
            out.push(serde_json::from_slice(&v)?);
        }
        Ok(out)
    }

    pub fn is_branch_created(&self, branch_id: &Txid) -> Result<bool> {
        Ok(self.get_created_branch(branch_id)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, BranchTxStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = BranchTxStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn send_info_round_trip_and_erase() {
        let (_dir, store) = open_temp();
        let info = SendInfo {
            txid: Txid([1; 32]),
            block_hash: [2; 32],
            tx_index: 3,
            version: crate::CROSS_CHAIN_TX_VERSION,
            dest_chain: Some(ChainId::Main),
            dest_address: Some(Address::new_key()),
            amount: 1000,
        };
        store.put_send_info(&info).unwrap();
        let got = store.get_send_info(&info.txid).unwrap().unwrap();
        assert_eq!(got.amount, 1000);
        assert_eq!(got.block_hash, [2; 32]);

        store.del_send_info(&info.txid).unwrap();
        assert!(store.get_send_info(&info.txid).unwrap().is_none());
    }

    #[test]
    fn recv_repeat_ignores_same_block() {
        let (_dir, store) = open_temp();
        let step_one = Txid([7; 32]);
        store
            .put_recv(&RecvInfo {
                step_one_txid: step_one,
                step_two_txid: Txid([8; 32]),
                block_hash: [9; 32],
            })
            .unwrap();

        assert!(store.is_recv_repeat(&step_one, None).unwrap());
        assert!(store.is_recv_repeat(&step_one, Some(&[1; 32])).unwrap());
        assert!(!store.is_recv_repeat(&step_one, Some(&[9; 32])).unwrap());
        assert!(!store.is_recv_repeat(&Txid([0; 32]), None).unwrap());
    }

    #[test]
    fn created_branch_list_matches_lookups() {
        let (_dir, store) = open_temp();
        let a = BranchCreateInfo {
            txid: Txid([1; 32]),
            vseeds: "seed1.example.com".into(),
            seed_spec6: "02000000".into(),
            block_hash: [3; 32],
        };
        let b = BranchCreateInfo {
            txid: Txid([2; 32]),
            vseeds: "seed2.example.com".into(),
            seed_spec6: "03000000".into(),
            block_hash: [4; 32],
        };
        store.add_created_branch(&a).unwrap();
        store.add_created_branch(&b).unwrap();

        let listed = store.list_created_branches().unwrap();
        assert_eq!(listed.len(), 2);
        for info in listed {
            let direct = store.get_created_branch(&info.txid).unwrap().unwrap();
            assert_eq!(direct, info);
        }
        assert!(store.is_branch_created(&a.txid).unwrap());

        store.del_created_branch(&a.txid).unwrap();
        assert!(!store.is_branch_created(&a.txid).unwrap());
    }
}
