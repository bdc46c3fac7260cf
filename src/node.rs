// src/node.rs
//! Per-chain node wiring.
//!
//! One `ChainNode` serves one ledger (the main chain or a single branch)
//! and owns its chain view, mempool, record store, mortgage book and
//! transfer engine. Nodes see each other only through [`RemoteChain`]
//! peer handles; there is no shared ledger object anywhere.
//!
//! Block connection is where the record store is kept canonical:
//! send-info for cross-chain and branch-create transactions, recv records
//! for mined step-2s, the created-branch list, and mortgage activation all
//! happen in the connect hook and are undone in the disconnect hook.

use crate::address::Address;
use crate::chain::{BlockHash, Block, Chain, ChainId, TxEntry};
use crate::config::NodeConfig;
use crate::error::{ChainError, Result};
use crate::maturity::MaturityTracker;
use crate::mempool::Mempool;
use crate::mortgage::{Mortgage, MortgageBook, MortgageState};
use crate::registry::{BranchRegistry, BranchSummary};
use crate::rebroadcast::RebroadcastService;
use crate::transaction::{Transaction, TxPayload, Txid};
use crate::transfer::{
    CrossChainTransfer, PeerMap, RemoteChain, TransferEngine, TransferReceipt,
};
use crate::txdb::{BranchCreateInfo, BranchTxStore, RecvInfo, SendInfo};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A chain's tip, as reported by the chain itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainTip {
    pub block_hash: String,
    pub height: u64,
}

pub struct ChainNode {
    config: NodeConfig,
    chain: Arc<Chain>,
    mempool: Arc<Mempool>,
    store: Arc<BranchTxStore>,
    registry: Option<Arc<BranchRegistry>>,
    mortgages: Arc<MortgageBook>,
    peers: Arc<PeerMap>,
    engine: Arc<TransferEngine>,
    maturity: Arc<MaturityTracker>,
    recovery: RebroadcastService,
}

impl ChainNode {
    pub fn open(config: NodeConfig) -> Result<Arc<Self>> {
        let chain = Arc::new(Chain::new(config.chain));
        let mempool = Arc::new(Mempool::new());
        let store = Arc::new(BranchTxStore::open(&config.store_path()).map_err(ChainError::Store)?);
        let peers: Arc<PeerMap> = Arc::new(RwLock::new(HashMap::new()));

        let registry = config.chain.is_main().then(|| {
            Arc::new(BranchRegistry::new(Arc::clone(&chain), Arc::clone(&store)))
        });

        let engine = Arc::new(TransferEngine::new(
            Arc::clone(&chain),
            Arc::clone(&mempool),
            Arc::clone(&store),
            registry.clone(),
            Arc::clone(&peers),
        ));
        let maturity = Arc::new(MaturityTracker::new(Arc::clone(&chain)));
        let recovery = RebroadcastService::new(Arc::clone(&engine), Arc::clone(&maturity));

        log::info!("node open: chain {}", config.chain);
        Ok(Arc::new(ChainNode {
            config,
            chain,
            mempool,
            store,
            registry,
            mortgages: Arc::new(MortgageBook::new()),
            peers,
            engine,
            maturity,
            recovery,
        }))
    }

    pub fn chain_id(&self) -> ChainId {
        self.config.chain
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    pub fn maturity(&self) -> &MaturityTracker {
        &self.maturity
    }

    pub fn mortgages(&self) -> &MortgageBook {
        &self.mortgages
    }

    /// Register a peer handle for another ledger.
    pub fn add_peer(&self, peer: Arc<dyn RemoteChain>) {
        let id = peer.chain_id();
        self.peers.write().insert(id, peer);
        log::debug!("node {}: peer {} connected", self.chain_id(), id);
    }

    // ── block production ───────────────────────────────────────────

    /// Mine `count` blocks from the current mempool. The first block takes
    /// every pending transaction; the rest are empty depth-builders.
    pub fn generate(&self, count: usize) -> Vec<BlockHash> {
        let mut hashes = Vec::with_capacity(count);
        for _ in 0..count {
            let txs = self.mempool.drain();
            let block = self.chain.connect_block(txs);
            self.on_block_connected(&block);
            hashes.push(block.hash);
        }
        hashes
    }

    fn on_block_connected(&self, block: &Block) {
        for (i, tx) in block.txs.iter().enumerate() {
            let txid = tx.txid();
            let result = match &tx.payload {
                TxPayload::BranchCreate { vseeds, seed_spec6 } => self
                    .store
                    .add_created_branch(&BranchCreateInfo {
                        txid,
                        vseeds: vseeds.clone(),
                        seed_spec6: seed_spec6.clone(),
                        block_hash: block.hash,
                    })
                    .and_then(|_| {
                        self.store.put_send_info(&SendInfo {
                            txid,
                            block_hash: block.hash,
                            tx_index: i as u32,
                            version: tx.version,
                            dest_chain: None,
                            dest_address: None,
                            amount: tx.amount,
                        })
                    }),
                TxPayload::TransStep1 {
                    dest_chain,
                    dest_address,
                    ..
                } => self.store.put_send_info(&SendInfo {
                    txid,
                    block_hash: block.hash,
                    tx_index: i as u32,
                    version: tx.version,
                    dest_chain: Some(*dest_chain),
                    dest_address: Some(*dest_address),
                    amount: tx.amount,
                }),
                TxPayload::TransStep2 { step_one_txid, .. } => self.store.put_recv(&RecvInfo {
                    step_one_txid: *step_one_txid,
                    step_two_txid: txid,
                    block_hash: block.hash,
                }),
                TxPayload::MortgageMine { .. } => {
                    self.mortgages.activate(&txid);
                    Ok(())
                }
                TxPayload::Plain { .. } | TxPayload::BranchHeader { .. } => Ok(()),
            };
            if let Err(e) = result {
                log::error!("node {}: record update for {} failed: {}", self.chain_id(), txid, e);
            }
        }

        // A branch announces its new tip to the main chain. At most one
        // pending header record per branch lives in the main mempool.
        if let ChainId::Branch(branch_id) = self.chain_id() {
            let main = self.peers.read().get(&ChainId::Main).cloned();
            if let Some(main) = main {
                let header = Transaction::branch_header(branch_id, block.hash, block.height);
                match main.submit_branch_header(header) {
                    Ok(txid) => log::debug!(
                        "node {}: header for height {} announced as {}",
                        self.chain_id(),
                        block.height,
                        txid
                    ),
                    Err(e) => log::debug!(
                        "node {}: header announce skipped: {}",
                        self.chain_id(),
                        e
                    ),
                }
            }
        }
    }

    /// Orphan the tip and roll every derived record back.
    pub fn invalidate_tip(&self) -> Option<BlockHash> {
        let block = self.chain.disconnect_tip()?;
        for tx in &block.txs {
            let txid = tx.txid();
            let result = match &tx.payload {
                TxPayload::BranchCreate { .. } => self
                    .store
                    .del_created_branch(&txid)
                    .and_then(|_| self.store.del_send_info(&txid)),
                TxPayload::TransStep1 { .. } => self.store.del_send_info(&txid),
                TxPayload::TransStep2 { step_one_txid, .. } => {
                    self.store.del_recv(step_one_txid)
                }
                TxPayload::MortgageMine { .. } => {
                    self.mortgages.deactivate(&txid);
                    Ok(())
                }
                TxPayload::Plain { .. } | TxPayload::BranchHeader { .. } => Ok(()),
            };
            if let Err(e) = result {
                log::error!("node {}: record rollback for {} failed: {}", self.chain_id(), txid, e);
            }
        }
        Some(block.hash)
    }

    // ── registry surface (main chain) ──────────────────────────────

    /// Build and announce a branch-creation transaction. The returned txid
    /// is the branch id once the registration matures.
    pub fn create_branch(&self, vseeds: String, seed_spec6: String) -> Result<Txid> {
        if !self.chain_id().is_main() {
            return Err(ChainError::InvalidTarget(
                "branch creation is a main chain operation".into(),
            ));
        }
        self.mempool.admit(Transaction::branch_create(vseeds, seed_spec6))
    }

    pub fn get_branch(&self, branch_id: &Txid) -> Result<BranchSummary> {
        match &self.registry {
            Some(registry) => registry.get_branch(branch_id),
            None => Err(ChainError::BranchNotFound(branch_id.to_string())),
        }
    }

    pub fn list_branches(&self) -> Result<Vec<BranchSummary>> {
        match &self.registry {
            Some(registry) => registry.list_branches(),
            None => Ok(Vec::new()),
        }
    }

    /// The branch chain's own view of its tip, fetched through the peer
    /// handle so it can never disagree with the branch.
    pub fn branch_best_height(&self, branch_id: &Txid) -> Result<ChainTip> {
        let chain = ChainId::Branch(*branch_id);
        if let Some(registry) = &self.registry {
            if !registry.is_branch_known(branch_id)? {
                return Err(ChainError::BranchNotFound(branch_id.to_string()));
            }
        }
        let peer = self
            .peers
            .read()
            .get(&chain)
            .cloned()
            .ok_or_else(|| ChainError::ChainUnreachable(chain.to_string()))?;
        let (block_hash, height) = peer.best_block();
        Ok(ChainTip {
            block_hash: hex::encode(block_hash),
            height,
        })
    }

    pub fn best_height(&self) -> ChainTip {
        ChainTip {
            block_hash: hex::encode(self.chain.best_block_hash()),
            height: self.chain.best_height(),
        }
    }

    // ── transfer surface ───────────────────────────────────────────

    pub fn initiate_transfer(
        &self,
        dest_chain: ChainId,
        dest_address: Address,
        amount: u64,
    ) -> Result<Txid> {
        self.engine.initiate_transfer(dest_chain, dest_address, amount)
    }

    pub fn transfer_status(&self, txid: &Txid) -> Result<TransferReceipt> {
        self.engine.transfer_status(txid)
    }

    pub fn describe_transfer(&self, txid: &Txid) -> Result<CrossChainTransfer> {
        self.engine.describe_transfer(txid)
    }

    /// `makebranchtransaction`: decode a raw step-1 and admit its step-2
    /// into this chain's mempool.
    pub fn make_branch_transaction(&self, raw_step_one_hex: &str) -> Result<Txid> {
        self.engine.submit_step_two(raw_step_one_hex)
    }

    pub fn rebroadcast_transfer(&self, step_one_txid: &Txid) -> Result<Txid> {
        self.recovery.rebroadcast(step_one_txid)
    }

    /// Submit an ordinary same-chain transfer. Exists so the surrounding
    /// ledger flows (and their error cases) are exercisable.
    pub fn send_to_address(&self, to: Address, amount: u64) -> Result<Txid> {
        self.mempool.admit(Transaction::plain(to, amount))
    }

    // ── mortgage surface ───────────────────────────────────────────

    /// Lock coin on the main chain to authorize mining on a branch.
    pub fn mortgage_for_branch_mining(
        &self,
        branch_id: &Txid,
        amount: u64,
        payout: Address,
    ) -> Result<Txid> {
        if !self.chain_id().is_main() {
            return Err(ChainError::MortgageOffMain);
        }
        if !payout.is_key() {
            return Err(ChainError::InvalidKeyId);
        }
        if !self.store.is_branch_created(branch_id).map_err(ChainError::Store)? {
            return Err(ChainError::BranchNotFound(branch_id.to_string()));
        }

        let tx = Transaction::mortgage_mine(*branch_id, payout, amount);
        let txid = self.mempool.admit(tx)?;
        self.mortgages.insert_pending(Mortgage {
            txid,
            branch_id: *branch_id,
            amount,
            payout,
            state: MortgageState::Pending,
        });
        log::info!(
            "mortgage {} pending: {} for mining branch {}",
            txid,
            amount,
            branch_id
        );
        Ok(txid)
    }
}

impl RemoteChain for ChainNode {
    fn chain_id(&self) -> ChainId {
        self.config.chain
    }

    fn best_block(&self) -> (BlockHash, u64) {
        (self.chain.best_block_hash(), self.chain.best_height())
    }

    fn tx_block_entry(&self, txid: &Txid) -> Option<TxEntry> {
        self.chain.tx_entry(txid)
    }

    fn fetch_transaction(&self, txid: &Txid) -> Option<Transaction> {
        self.chain.get_transaction(txid)
    }

    fn tx_confirmations(&self, txid: &Txid) -> Option<u64> {
        self.chain.confirmations(txid)
    }

    fn pending_step_two(&self, step_one_txid: &Txid) -> Option<Txid> {
        self.mempool.step_two_for(step_one_txid)
    }

    fn received_step_two(&self, step_one_txid: &Txid) -> Option<Txid> {
        self.store
            .get_recv(step_one_txid)
            .ok()
            .flatten()
            .map(|r| r.step_two_txid)
    }

    fn submit_step_two(&self, raw_step_one_hex: &str) -> Result<Txid> {
        self.engine.submit_step_two(raw_step_one_hex)
    }

    fn submit_branch_header(&self, tx: Transaction) -> Result<Txid> {
        debug_assert!(matches!(tx.payload, TxPayload::BranchHeader { .. }));
        self.mempool.admit(tx)
    }
}

/// Wire two nodes so each can read the other as a remote ledger.
pub fn link_nodes(a: &Arc<ChainNode>, b: &Arc<ChainNode>) {
    a.add_peer(Arc::clone(b) as Arc<dyn RemoteChain>);
    b.add_peer(Arc::clone(a) as Arc<dyn RemoteChain>);
}
