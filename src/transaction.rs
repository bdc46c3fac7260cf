// src/transaction.rs
//! Transaction model and the raw hex codec.
//!
//! Cross-chain transactions (step-1 lock, step-2 mint) carry the
//! distinguished version tag [`crate::CROSS_CHAIN_TX_VERSION`] so mempool
//! and block-indexing logic can tell them apart from ordinary transfers.

use crate::address::Address;
use crate::chain::ChainId;
use crate::error::{ChainError, Result};
use crate::{BRANCH_CREATE_TX_VERSION, CROSS_CHAIN_TX_VERSION, MORTGAGE_TX_VERSION, TX_VERSION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// 32-byte transaction identifier (SHA-256 of the serialized transaction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Txid(pub [u8; 32]);

impl Txid {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for Txid {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| format!("invalid txid hex: {}", e))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| "txid must be 32 bytes".to_string())?;
        Ok(Txid(arr))
    }
}

/// What a transaction does. The variant fixes the required version tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxPayload {
    /// Ordinary same-chain transfer.
    Plain { to: Address },
    /// Main-chain transaction creating and registering a branch chain.
    /// Its txid becomes the branch id.
    BranchCreate { vseeds: String, seed_spec6: String },
    /// Step-1 lock on the source chain of a cross-chain transfer.
    TransStep1 {
        source_chain: ChainId,
        dest_chain: ChainId,
        dest_address: Address,
    },
    /// Step-2 mint on the destination chain, referencing its step-1.
    TransStep2 {
        step_one_txid: Txid,
        dest_address: Address,
    },
    /// Main-chain deposit locking coin to authorize mining a branch.
    MortgageMine { branch_id: Txid, payout: Address },
    /// Branch block header record submitted to the main chain. At most one
    /// pending header entry per branch lives in the main mempool.
    BranchHeader {
        branch_id: Txid,
        block_hash: [u8; 32],
        height: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub amount: u64,
    pub fee: u64,
    pub timestamp: DateTime<Utc>,
    /// Collision guard for otherwise-identical transactions.
    pub nonce: u64,
    pub payload: TxPayload,
}

impl Transaction {
    fn build(version: u32, amount: u64, payload: TxPayload) -> Self {
        Transaction {
            version,
            amount,
            fee: 0,
            timestamp: Utc::now(),
            nonce: rand::random(),
            payload,
        }
    }

    pub fn plain(to: Address, amount: u64) -> Self {
        Self::build(TX_VERSION, amount, TxPayload::Plain { to })
    }

    pub fn branch_create(vseeds: String, seed_spec6: String) -> Self {
        Self::build(
            BRANCH_CREATE_TX_VERSION,
            0,
            TxPayload::BranchCreate { vseeds, seed_spec6 },
        )
    }

    pub fn trans_step1(
        source_chain: ChainId,
        dest_chain: ChainId,
        dest_address: Address,
        amount: u64,
    ) -> Self {
        Self::build(
            CROSS_CHAIN_TX_VERSION,
            amount,
            TxPayload::TransStep1 {
                source_chain,
                dest_chain,
                dest_address,
            },
        )
    }

    pub fn trans_step2(step_one_txid: Txid, dest_address: Address, amount: u64) -> Self {
        Self::build(
            CROSS_CHAIN_TX_VERSION,
            amount,
            TxPayload::TransStep2 {
                step_one_txid,
                dest_address,
            },
        )
    }

    pub fn mortgage_mine(branch_id: Txid, payout: Address, amount: u64) -> Self {
        Self::build(
            MORTGAGE_TX_VERSION,
            amount,
            TxPayload::MortgageMine { branch_id, payout },
        )
    }

    pub fn branch_header(branch_id: Txid, block_hash: [u8; 32], height: u64) -> Self {
        Self::build(
            TX_VERSION,
            0,
            TxPayload::BranchHeader {
                branch_id,
                block_hash,
                height,
            },
        )
    }

    pub fn txid(&self) -> Txid {
        let bytes = bincode::serialize(self).expect("transaction serialization is infallible");
        let digest = Sha256::digest(&bytes);
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Txid(out)
    }

    /// Shape check, independent of confirmation state: a transaction is a
    /// step-1 lock only if it carries both the cross-chain version tag and
    /// the step-1 payload.
    pub fn is_step_one(&self) -> bool {
        self.version == CROSS_CHAIN_TX_VERSION
            && matches!(self.payload, TxPayload::TransStep1 { .. })
    }

    pub fn is_step_two(&self) -> bool {
        self.version == CROSS_CHAIN_TX_VERSION
            && matches!(self.payload, TxPayload::TransStep2 { .. })
    }

    pub fn is_branch_create(&self) -> bool {
        matches!(self.payload, TxPayload::BranchCreate { .. })
    }

    pub fn is_cross_chain(&self) -> bool {
        self.version == CROSS_CHAIN_TX_VERSION
    }

    /// Raw wire encoding, hex over bincode.
    pub fn to_hex(&self) -> String {
        hex::encode(bincode::serialize(self).expect("transaction serialization is infallible"))
    }

    /// Decode a raw transaction. Malformed input is a [`ChainError::DecodeHex`].
    pub fn from_hex(raw: &str) -> Result<Self> {
        let bytes = hex::decode(raw).map_err(|_| ChainError::DecodeHex)?;
        bincode::deserialize(&bytes).map_err(|_| ChainError::DecodeHex)
    }
}
