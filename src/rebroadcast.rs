// src/rebroadcast.rs
//! Rebroadcast recovery service.
//!
//! Re-announces the step-2 of a mature, not-yet-admitted transfer. The
//! call is idempotent: the destination mempool's atomic dedup on the
//! step-1 reference guarantees at most one pending step-2 per transfer,
//! so a retry either re-creates lost work or fails with
//! `txn-already-in-mempool`. The service never retries on its own;
//! recovery is always caller-driven.

use crate::error::{ChainError, Result};
use crate::maturity::MaturityTracker;
use crate::transaction::Txid;
use crate::transfer::TransferEngine;
use crate::CROSS_CHAIN_TX_VERSION;
use std::sync::Arc;

pub struct RebroadcastService {
    engine: Arc<TransferEngine>,
    maturity: Arc<MaturityTracker>,
}

impl RebroadcastService {
    pub fn new(engine: Arc<TransferEngine>, maturity: Arc<MaturityTracker>) -> Self {
        RebroadcastService { engine, maturity }
    }

    /// Rebuild and re-announce the step-2 for `step_one_txid`.
    ///
    /// Error ladder, in order: missing send-info, immature lock, duplicate
    /// already pending, then the full destination-side admission.
    pub fn rebroadcast(&self, step_one_txid: &Txid) -> Result<Txid> {
        let info = self
            .engine
            .send_info_for(step_one_txid)?
            .ok_or(ChainError::SendInfoUnavailable)?;
        if info.version != CROSS_CHAIN_TX_VERSION {
            return Err(ChainError::InvalidReference);
        }
        let dest_chain = info.dest_chain.ok_or(ChainError::InvalidReference)?;

        if !self.maturity.is_mature(step_one_txid) {
            return Err(ChainError::InsufficientConfirmations);
        }

        let dest = self
            .engine
            .peer_handle(&dest_chain)
            .ok_or_else(|| ChainError::ChainUnreachable(dest_chain.to_string()))?;

        // The admission below re-checks atomically; this pass only picks
        // the more specific error for the common duplicate cases.
        if dest.pending_step_two(step_one_txid).is_some() {
            return Err(ChainError::AlreadyInMempool);
        }
        if dest.received_step_two(step_one_txid).is_some() {
            return Err(ChainError::AlreadyKnown);
        }

        let step_one = self
            .engine
            .local_transaction(step_one_txid)
            .ok_or(ChainError::SendInfoUnavailable)?;

        let step_two_txid = dest.submit_step_two(&step_one.to_hex())?;
        log::info!(
            "rebroadcast {}: step-2 {} re-announced to {}",
            step_one_txid,
            step_two_txid,
            dest_chain
        );
        Ok(step_two_txid)
    }
}
