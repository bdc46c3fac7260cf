// src/mempool.rs
//! Per-chain mempool.
//!
//! Admission is a single atomic check-and-insert under one lock: two racing
//! submissions of a step-2 for the same step-1 reference cannot both pass
//! the dedup check. The step-1 txid is the idempotency key of the whole
//! cross-chain protocol.

use crate::error::{ChainError, Result};
use crate::transaction::{Transaction, TxPayload, Txid};
use parking_lot::Mutex;
use std::collections::HashMap;

struct PoolInner {
    /// Insertion order, for block assembly.
    order: Vec<Txid>,
    txs: HashMap<Txid, Transaction>,
    /// step-1 txid -> step-2 txid currently pending.
    step2_by_source: HashMap<Txid, Txid>,
    /// branch id -> pending header record. A newer header replaces the
    /// older pending one, so each branch holds at most one entry here.
    header_by_branch: HashMap<Txid, Txid>,
}

pub struct Mempool {
    inner: Mutex<PoolInner>,
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

impl Mempool {
    pub fn new() -> Self {
        Mempool {
            inner: Mutex::new(PoolInner {
                order: Vec::new(),
                txs: HashMap::new(),
                step2_by_source: HashMap::new(),
                header_by_branch: HashMap::new(),
            }),
        }
    }

    /// Atomic admission. Rejects a second step-2 carrying an already-pending
    /// step-1 reference with [`ChainError::AlreadyInMempool`].
    pub fn admit(&self, tx: Transaction) -> Result<Txid> {
        let txid = tx.txid();
        let mut inner = self.inner.lock();

        if inner.txs.contains_key(&txid) {
            return Err(ChainError::AlreadyInMempool);
        }

        match &tx.payload {
            TxPayload::TransStep2 { step_one_txid, .. } => {
                if inner.step2_by_source.contains_key(step_one_txid) {
                    return Err(ChainError::AlreadyInMempool);
                }
                let step_one = *step_one_txid;
                inner.step2_by_source.insert(step_one, txid);
            }
            TxPayload::BranchHeader { branch_id, .. } => {
                let branch = *branch_id;
                if let Some(old) = inner.header_by_branch.remove(&branch) {
                    inner.txs.remove(&old);
                    inner.order.retain(|t| *t != old);
                }
                inner.header_by_branch.insert(branch, txid);
            }
            _ => {}
        }

        inner.order.push(txid);
        inner.txs.insert(txid, tx);
        log::debug!("mempool: admitted {} ({} pending)", txid, inner.order.len());
        Ok(txid)
    }

    pub fn contains(&self, txid: &Txid) -> bool {
        self.inner.lock().txs.contains_key(txid)
    }

    pub fn get(&self, txid: &Txid) -> Option<Transaction> {
        self.inner.lock().txs.get(txid).cloned()
    }

    /// Pending step-2 for this step-1 reference, if any.
    pub fn step_two_for(&self, step_one_txid: &Txid) -> Option<Txid> {
        self.inner.lock().step2_by_source.get(step_one_txid).copied()
    }

    /// Is a step-2 for this step-1 reference already pending?
    pub fn has_step_two_for(&self, step_one_txid: &Txid) -> bool {
        self.step_two_for(step_one_txid).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw mempool view: txid and version of every pending transaction.
    pub fn raw(&self) -> Vec<(Txid, u32)> {
        let inner = self.inner.lock();
        inner
            .order
            .iter()
            .filter_map(|t| inner.txs.get(t).map(|tx| (*t, tx.version)))
            .collect()
    }

    /// Take every pending transaction, in admission order, for block
    /// assembly. Indexes reset with the drain.
    pub fn drain(&self) -> Vec<Transaction> {
        let mut inner = self.inner.lock();
        let order = std::mem::take(&mut inner.order);
        let mut txs = std::mem::take(&mut inner.txs);
        inner.step2_by_source.clear();
        inner.header_by_branch.clear();
        order.into_iter().filter_map(|t| txs.remove(&t)).collect()
    }
}
