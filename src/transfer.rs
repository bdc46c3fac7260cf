// src/transfer.rs
//! Cross-chain transfer engine.
//!
//! One transfer is two transactions: a step-1 lock mined on the source
//! chain and a step-2 mint admitted to the destination chain's mempool
//! once the lock is mature. The two chains never share state; the engine
//! reads the other side through [`RemoteChain`], an eventually-consistent
//! snapshot taken without any cross-chain lock. Safety comes from the
//! maturity gate plus the mempool's atomic dedup on the step-1 reference.

use crate::chain::{BlockHash, Chain, ChainId, TxEntry};
use crate::error::{ChainError, Result};
use crate::mempool::Mempool;
use crate::registry::BranchRegistry;
use crate::transaction::{Transaction, TxPayload, Txid};
use crate::txdb::{BranchTxStore, SendInfo};
use crate::{CROSS_CHAIN_TX_VERSION, TRANSFER_MATURITY};
use crate::address::Address;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// What one chain may ask of another. Implementations are snapshots of an
/// independently mined ledger; callers must treat every answer as
/// possibly stale.
pub trait RemoteChain: Send + Sync {
    fn chain_id(&self) -> ChainId;
    fn best_block(&self) -> (BlockHash, u64);
    fn tx_block_entry(&self, txid: &Txid) -> Option<TxEntry>;
    fn fetch_transaction(&self, txid: &Txid) -> Option<Transaction>;
    fn tx_confirmations(&self, txid: &Txid) -> Option<u64>;
    /// Step-2 for this step-1 reference pending in the remote mempool, if any.
    fn pending_step_two(&self, step_one_txid: &Txid) -> Option<Txid>;
    /// Step-2 for this reference already mined remotely, if any.
    fn received_step_two(&self, step_one_txid: &Txid) -> Option<Txid>;
    /// Full destination-side admission of a raw step-1: decode, validate,
    /// build the step-2 and attempt mempool insertion.
    fn submit_step_two(&self, raw_step_one_hex: &str) -> Result<Txid>;
    /// Deliver a branch block-header record to this chain's mempool.
    fn submit_branch_header(&self, tx: Transaction) -> Result<Txid>;
}

/// Connected peer ledgers, keyed by chain id.
pub type PeerMap = RwLock<HashMap<ChainId, Arc<dyn RemoteChain>>>;

/// Lifecycle of one transfer, derived from ground truth on each query
/// rather than cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferState {
    /// Step-1 built and pending in the source mempool.
    Created,
    /// Step-1 mined, below the maturity threshold.
    AwaitingMaturity,
    /// Deep enough to act on; no step-2 emitted yet.
    Mature,
    /// Step-2 pending in the destination mempool.
    Broadcasted,
    /// Step-2 mined on the destination chain.
    Confirmed,
}

/// One atomic move of value between chains, assembled from ground truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossChainTransfer {
    pub source_chain: ChainId,
    pub dest_chain: ChainId,
    pub step_one_txid: Txid,
    pub step_one_confirmations: u64,
    pub step_two_txid: Option<Txid>,
    pub amount: u64,
    pub dest_address: Address,
    pub state: TransferState,
}

/// `transferStatus` receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub txid: Txid,
    pub confirmations: u64,
}

pub struct TransferEngine {
    local: ChainId,
    chain: Arc<Chain>,
    mempool: Arc<Mempool>,
    store: Arc<BranchTxStore>,
    /// Present on the main chain only; branch nodes validate targets
    /// against the reserved main identifier instead.
    registry: Option<Arc<BranchRegistry>>,
    peers: Arc<PeerMap>,
}

impl TransferEngine {
    pub fn new(
        chain: Arc<Chain>,
        mempool: Arc<Mempool>,
        store: Arc<BranchTxStore>,
        registry: Option<Arc<BranchRegistry>>,
        peers: Arc<PeerMap>,
    ) -> Self {
        TransferEngine {
            local: chain.id(),
            chain,
            mempool,
            store,
            registry,
            peers,
        }
    }

    pub fn local_chain(&self) -> ChainId {
        self.local
    }

    fn peer(&self, chain: &ChainId) -> Option<Arc<dyn RemoteChain>> {
        self.peers.read().get(chain).cloned()
    }

    /// One hop only: a branch sends to main, main sends to a created
    /// branch. Everything else is an invalid target.
    fn is_valid_destination(&self, dest: &ChainId) -> Result<bool> {
        if *dest == self.local {
            return Ok(false);
        }
        match (&self.local, dest) {
            (ChainId::Main, ChainId::Branch(id)) => match &self.registry {
                Some(registry) => registry.is_branch_known(id),
                None => Ok(false),
            },
            (ChainId::Branch(_), ChainId::Main) => Ok(true),
            _ => Ok(false),
        }
    }

    /// Build and admit the step-1 lock on the calling (source) chain.
    pub fn initiate_transfer(
        &self,
        dest_chain: ChainId,
        dest_address: Address,
        amount: u64,
    ) -> Result<Txid> {
        if !self.is_valid_destination(&dest_chain)? {
            return Err(ChainError::InvalidTarget(dest_chain.to_string()));
        }
        let tx = Transaction::trans_step1(self.local, dest_chain, dest_address, amount);
        let txid = self.mempool.admit(tx)?;
        log::info!(
            "transfer {}: locked {} on {} for {}",
            txid,
            amount,
            self.local,
            dest_chain
        );
        Ok(txid)
    }

    /// `transferStatus`: confirmation receipt for a cross-chain txid
    /// visible on this chain.
    pub fn transfer_status(&self, txid: &Txid) -> Result<TransferReceipt> {
        let info = self
            .store
            .get_send_info(txid)?
            .ok_or(ChainError::SendInfoUnavailable)?;
        if info.version != CROSS_CHAIN_TX_VERSION {
            // Branch-create and other recorded non-transfer transactions.
            return Err(ChainError::InvalidReference);
        }
        Ok(TransferReceipt {
            txid: *txid,
            confirmations: self.chain.confirmations(txid).unwrap_or(0),
        })
    }

    /// Decode a raw transaction and build its step-2 counterpart.
    ///
    /// Eligibility is a shape property: a transaction that is not a step-1
    /// lock is refused no matter how deeply it is confirmed.
    pub fn build_step_two(&self, raw_hex: &str) -> Result<Transaction> {
        let tx = Transaction::from_hex(raw_hex)?;
        let (dest_chain, dest_address) = match &tx.payload {
            TxPayload::TransStep1 {
                dest_chain,
                dest_address,
                ..
            } if tx.is_step_one() => (*dest_chain, *dest_address),
            _ => return Err(ChainError::NotStepOne),
        };
        if dest_chain != self.local {
            return Err(ChainError::InvalidTargetBranch);
        }
        Ok(Transaction::trans_step2(tx.txid(), dest_address, tx.amount))
    }

    /// Destination-side admission of a raw step-1: build the step-2 and
    /// insert it into the local mempool. All admission failures surface as
    /// mempool-boundary errors; the dedup check and the insertion are one
    /// atomic step inside [`Mempool::admit`].
    pub fn submit_step_two(&self, raw_step_one_hex: &str) -> Result<Txid> {
        let step_one = Transaction::from_hex(raw_step_one_hex)?;
        let step_two = self.build_step_two(raw_step_one_hex)?;
        let step_one_txid = step_one.txid();

        let source_chain = match &step_one.payload {
            TxPayload::TransStep1 { source_chain, .. } => *source_chain,
            _ => return Err(ChainError::NotStepOne),
        };

        // The step-1's block data must be retrievable from the source
        // chain before the mint may enter this mempool.
        let source = self
            .peer(&source_chain)
            .ok_or_else(|| ChainError::MempoolReject("Get transstep2 blockdata fail".into()))?;
        let entry = source
            .tx_block_entry(&step_one_txid)
            .ok_or_else(|| ChainError::MempoolReject("Get transstep2 blockdata fail".into()))?;

        let confirmations = source.tx_confirmations(&step_one_txid).unwrap_or(0);
        if confirmations < TRANSFER_MATURITY {
            return Err(ChainError::MempoolReject("transstep1 not mature".into()));
        }

        if self.store.is_recv_repeat(&step_one_txid, None)? {
            return Err(ChainError::AlreadyKnown);
        }

        let step_two_txid = self.mempool.admit(step_two)?;
        log::info!(
            "transfer {}: step-2 {} admitted on {} (source block {}, depth {})",
            step_one_txid,
            step_two_txid,
            self.local,
            hex::encode(entry.block_hash),
            confirmations
        );
        Ok(step_two_txid)
    }

    /// Assemble the full transfer view from ground truth. Source-side only.
    pub fn describe_transfer(&self, step_one_txid: &Txid) -> Result<CrossChainTransfer> {
        if let Some(tx) = self.mempool.get(step_one_txid) {
            return self.assemble(step_one_txid, Some(tx), 0, TransferState::Created);
        }

        let info = self
            .store
            .get_send_info(step_one_txid)?
            .ok_or(ChainError::SendInfoUnavailable)?;
        if info.version != CROSS_CHAIN_TX_VERSION {
            return Err(ChainError::InvalidReference);
        }
        let confirmations = self.chain.confirmations(step_one_txid).unwrap_or(0);
        let dest_chain = info.dest_chain.ok_or(ChainError::InvalidReference)?;

        let (state, step_two_txid) = if confirmations < TRANSFER_MATURITY {
            (TransferState::AwaitingMaturity, None)
        } else if let Some(dest) = self.peer(&dest_chain) {
            if let Some(txid) = dest.received_step_two(step_one_txid) {
                (TransferState::Confirmed, Some(txid))
            } else if let Some(txid) = dest.pending_step_two(step_one_txid) {
                (TransferState::Broadcasted, Some(txid))
            } else {
                (TransferState::Mature, None)
            }
        } else {
            (TransferState::Mature, None)
        };

        let tx = self.chain.get_transaction(step_one_txid);
        let mut transfer = self.assemble(step_one_txid, tx, confirmations, state)?;
        transfer.step_two_txid = step_two_txid;
        Ok(transfer)
    }

    fn assemble(
        &self,
        step_one_txid: &Txid,
        tx: Option<Transaction>,
        confirmations: u64,
        state: TransferState,
    ) -> Result<CrossChainTransfer> {
        let (dest_chain, dest_address, amount) = match tx.as_ref().map(|t| &t.payload) {
            Some(TxPayload::TransStep1 {
                dest_chain,
                dest_address,
                ..
            }) => (
                *dest_chain,
                *dest_address,
                tx.as_ref().map(|t| t.amount).unwrap_or(0),
            ),
            _ => {
                let info = self
                    .store
                    .get_send_info(step_one_txid)?
                    .ok_or(ChainError::SendInfoUnavailable)?;
                (
                    info.dest_chain.ok_or(ChainError::InvalidReference)?,
                    info.dest_address.ok_or(ChainError::InvalidReference)?,
                    info.amount,
                )
            }
        };

        Ok(CrossChainTransfer {
            source_chain: self.local,
            dest_chain,
            step_one_txid: *step_one_txid,
            step_one_confirmations: confirmations,
            step_two_txid: None,
            amount,
            dest_address,
            state,
        })
    }

    pub(crate) fn send_info_for(&self, txid: &Txid) -> Result<Option<SendInfo>> {
        Ok(self.store.get_send_info(txid)?)
    }

    pub(crate) fn peer_handle(&self, chain: &ChainId) -> Option<Arc<dyn RemoteChain>> {
        self.peer(chain)
    }

    pub(crate) fn local_transaction(&self, txid: &Txid) -> Option<Transaction> {
        self.chain.get_transaction(txid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_for(chain: Arc<Chain>, dir: &std::path::Path) -> TransferEngine {
        let store = Arc::new(BranchTxStore::open(dir).unwrap());
        TransferEngine::new(
            Arc::clone(&chain),
            Arc::new(Mempool::new()),
            store,
            None,
            Arc::new(PeerMap::default()),
        )
    }

    #[test]
    fn plain_transaction_is_never_a_step_one() {
        let dir = tempfile::tempdir().unwrap();
        let chain = Arc::new(Chain::new(ChainId::Main));
        let engine = engine_for(Arc::clone(&chain), dir.path());

        let plain = Transaction::plain(Address::new_key(), 1);
        let raw = plain.to_hex();
        let err = engine.build_step_two(&raw).unwrap_err();
        assert!(matches!(err, ChainError::NotStepOne));

        // Depth does not change the shape verdict.
        chain.connect_block(vec![plain]);
        for _ in 0..TRANSFER_MATURITY {
            chain.connect_block(Vec::new());
        }
        let err = engine.build_step_two(&raw).unwrap_err();
        assert!(matches!(err, ChainError::NotStepOne));
    }

    #[test]
    fn step_two_is_not_a_step_one_either() {
        let dir = tempfile::tempdir().unwrap();
        let chain = Arc::new(Chain::new(ChainId::Main));
        let engine = engine_for(chain, dir.path());

        let step2 = Transaction::trans_step2(Txid([1; 32]), Address::new_key(), 5);
        let err = engine.build_step_two(&step2.to_hex()).unwrap_err();
        assert!(matches!(err, ChainError::NotStepOne));
    }

    #[test]
    fn wrong_destination_chain_is_an_invalid_target_branch() {
        let dir = tempfile::tempdir().unwrap();
        // Engine on main; step-1 targets a branch, so main must refuse it.
        let chain = Arc::new(Chain::new(ChainId::Main));
        let engine = engine_for(chain, dir.path());

        let step1 = Transaction::trans_step1(
            ChainId::Main,
            ChainId::Branch(Txid([2; 32])),
            Address::new_key(),
            100,
        );
        let err = engine.build_step_two(&step1.to_hex()).unwrap_err();
        assert!(matches!(err, ChainError::InvalidTargetBranch));
    }

    #[test]
    fn branch_engine_accepts_its_own_step_one_shape() {
        let dir = tempfile::tempdir().unwrap();
        let branch = ChainId::Branch(Txid([2; 32]));
        let chain = Arc::new(Chain::new(branch));
        let engine = engine_for(chain, dir.path());

        let step1 = Transaction::trans_step1(ChainId::Main, branch, Address::new_key(), 100);
        let step2 = engine.build_step_two(&step1.to_hex()).unwrap();
        assert!(step2.is_step_two());
        assert_eq!(step2.amount, 100);
        match step2.payload {
            TxPayload::TransStep2 { step_one_txid, .. } => {
                assert_eq!(step_one_txid, step1.txid())
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn initiate_refuses_unknown_targets() {
        let dir = tempfile::tempdir().unwrap();
        let chain = Arc::new(Chain::new(ChainId::Main));
        let engine = engine_for(chain, dir.path());

        // Main node with no registry knows no branches; every branch
        // target is invalid, as is "main" itself.
        let err = engine
            .initiate_transfer(ChainId::Branch(Txid([3; 32])), Address::new_key(), 10)
            .unwrap_err();
        assert!(matches!(err, ChainError::InvalidTarget(_)));
        let err = engine
            .initiate_transfer(ChainId::Main, Address::new_key(), 10)
            .unwrap_err();
        assert!(matches!(err, ChainError::InvalidTarget(_)));
    }

    #[test]
    fn submit_without_source_peer_is_a_blockdata_failure() {
        let dir = tempfile::tempdir().unwrap();
        let branch = ChainId::Branch(Txid([2; 32]));
        let chain = Arc::new(Chain::new(branch));
        let engine = engine_for(chain, dir.path());

        let step1 = Transaction::trans_step1(ChainId::Main, branch, Address::new_key(), 100);
        let err = engine.submit_step_two(&step1.to_hex()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "accept to memory pool fail: Get transstep2 blockdata fail"
        );
    }
}
