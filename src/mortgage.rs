// src/mortgage.rs
//! Mortgage ledger.
//!
//! A mortgage is a main-chain-locked deposit authorizing a payout identity
//! to mine blocks on one branch chain. Creation is a main-chain-only
//! operation and the payout must be a plain key identity; both rules are
//! enforced before the registration transaction is even built. The record
//! is `Pending` while the registration sits in the mempool and becomes
//! `Active` once mined; branch block-producer selection consumes
//! [`MortgageBook::is_eligible_miner`].

use crate::address::Address;
use crate::transaction::Txid;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MortgageState {
    Pending,
    Active,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mortgage {
    /// Registration transaction id on the main chain.
    pub txid: Txid,
    pub branch_id: Txid,
    pub amount: u64,
    pub payout: Address,
    pub state: MortgageState,
}

#[derive(Default)]
pub struct MortgageBook {
    inner: RwLock<HashMap<Txid, Mortgage>>,
}

impl MortgageBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly built registration, still unmined.
    pub fn insert_pending(&self, mortgage: Mortgage) {
        debug_assert_eq!(mortgage.state, MortgageState::Pending);
        self.inner.write().insert(mortgage.txid, mortgage);
    }

    /// Flip a mortgage to `Active` once its registration is mined.
    pub fn activate(&self, txid: &Txid) {
        if let Some(m) = self.inner.write().get_mut(txid) {
            m.state = MortgageState::Active;
            log::info!(
                "mortgage {} active: {} locked for mining branch {}",
                txid,
                m.amount,
                m.branch_id
            );
        }
    }

    /// Roll back to `Pending` when the containing block is disconnected.
    pub fn deactivate(&self, txid: &Txid) {
        if let Some(m) = self.inner.write().get_mut(txid) {
            m.state = MortgageState::Pending;
        }
    }

    pub fn get(&self, txid: &Txid) -> Option<Mortgage> {
        self.inner.read().get(txid).cloned()
    }

    /// Total amount locked against one branch by active mortgages.
    pub fn total_locked(&self, branch_id: &Txid) -> u64 {
        self.inner
            .read()
            .values()
            .filter(|m| m.branch_id == *branch_id && m.state == MortgageState::Active)
            .map(|m| m.amount)
            .sum()
    }

    /// May `payout` mine blocks on `branch_id`? True once any active
    /// mortgage for that branch names the identity.
    pub fn is_eligible_miner(&self, branch_id: &Txid, payout: &Address) -> bool {
        self.inner
            .read()
            .values()
            .any(|m| m.branch_id == *branch_id && m.payout == *payout && m.state == MortgageState::Active)
    }
}
