// src/error.rs
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChainError>;

/// Broad retriability classes for [`ChainError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input bytes. Not retriable.
    Decode,
    /// Shape or semantic mismatch. Not retriable with the same input.
    Validation,
    /// Referenced entity absent. Retriable after external state change.
    NotFound,
    /// Operation attempted outside its required lifecycle state.
    State,
    /// Wrong chain context or wrong identity kind. Not retriable.
    Authorization,
    /// Storage-layer failure.
    Internal,
}

/// Every fallible protocol operation returns one of these. Messages for the
/// wire-observable failures are fixed strings that callers match on.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("DecodeHexTx tx hex fail.")]
    DecodeHex,

    #[error("Transaction is not a valid chain trans step1")]
    NotStepOne,

    #[error("Target branch id is not valid")]
    InvalidTargetBranch,

    /// The txid names a transaction that carries branch metadata but is not a
    /// cross-chain transfer (e.g. the branch-creation transaction itself).
    #[error("Invalid branch transaction.")]
    InvalidReference,

    /// No send-info record exists on this side for the txid.
    #[error("Load transaction sendinfo fail.")]
    SendInfoUnavailable,

    #[error("can not broadcast because no enough confirmations")]
    InsufficientConfirmations,

    #[error("txn-already-in-mempool")]
    AlreadyInMempool,

    /// A step-2 for this transfer was already mined on the destination chain.
    #[error("txn-already-known")]
    AlreadyKnown,

    /// Destination-side mempool admission failure; the payload names the
    /// admission check that rejected the transaction.
    #[error("accept to memory pool fail: {0}")]
    MempoolReject(String),

    #[error("Only in main chain can mortgage coin for mining branch!")]
    MortgageOffMain,

    #[error("Invalid keyid")]
    InvalidKeyId,

    #[error("branch chain {0} not found")]
    BranchNotFound(String),

    #[error("branch chain {0} is not mature")]
    BranchNotMature(String),

    #[error("invalid transfer target {0}")]
    InvalidTarget(String),

    /// The named chain is known but no peer handle to it is connected.
    #[error("chain {0} is not reachable")]
    ChainUnreachable(String),

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl ChainError {
    /// Stable machine-readable code, independent of the display message.
    pub fn code(&self) -> &'static str {
        match self {
            ChainError::DecodeHex => "decode-error",
            ChainError::NotStepOne => "not-a-step-one-transaction",
            ChainError::InvalidTargetBranch => "invalid-target-branch",
            ChainError::InvalidReference => "invalid-reference",
            ChainError::SendInfoUnavailable => "send-info-unavailable",
            ChainError::InsufficientConfirmations => "insufficient-confirmations",
            ChainError::AlreadyInMempool => "already-in-mempool",
            ChainError::AlreadyKnown => "already-known",
            ChainError::MempoolReject(_) => "mempool-reject",
            ChainError::MortgageOffMain => "invalid-context",
            ChainError::InvalidKeyId => "invalid-address",
            ChainError::BranchNotFound(_) => "branch-not-found",
            ChainError::BranchNotMature(_) => "branch-not-mature",
            ChainError::InvalidTarget(_) => "invalid-target",
            ChainError::ChainUnreachable(_) => "chain-unreachable",
            ChainError::Store(_) => "store-error",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ChainError::DecodeHex => ErrorKind::Decode,
            ChainError::NotStepOne
            | ChainError::InvalidTargetBranch
            | ChainError::InvalidReference
            | ChainError::InvalidTarget(_) => ErrorKind::Validation,
            ChainError::SendInfoUnavailable
            | ChainError::BranchNotFound(_)
            | ChainError::ChainUnreachable(_)
            | ChainError::MempoolReject(_) => ErrorKind::NotFound,
            ChainError::InsufficientConfirmations
            | ChainError::AlreadyInMempool
            | ChainError::AlreadyKnown
            | ChainError::BranchNotMature(_) => ErrorKind::State,
            ChainError::MortgageOffMain | ChainError::InvalidKeyId => ErrorKind::Authorization,
            ChainError::Store(_) => ErrorKind::Internal,
        }
    }
}
