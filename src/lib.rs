//! Cross-chain transfer protocol between a main ledger and its branch
//! ledgers.
//!
//! Value moves between chains in two phases: a step-1 transaction locks
//! the amount on the source chain, and a step-2 transaction referencing
//! the step-1 txid mints it on the destination chain. The step-1 reference
//! is the idempotency key for the whole transfer; destination-side
//! admission dedups against both the mempool and the mined record store.
//!
//! Branch ledgers are registered on the main chain by a branch-creation
//! transaction whose txid becomes the branch id once the registration has
//! matured. Mining on a branch is authorized by mortgaging coin on the
//! main chain.

pub mod address;
pub mod api;
pub mod chain;
pub mod config;
pub mod error;
pub mod maturity;
pub mod mempool;
pub mod mortgage;
pub mod node;
pub mod rebroadcast;
pub mod registry;
pub mod transaction;
pub mod transfer;
pub mod txdb;

pub use crate::error::{ChainError, ErrorKind, Result};

/// Depth before a branch registration appears in branch listings.
pub const BRANCH_REGISTRATION_MATURITY: u64 = 15;

/// Depth a step-1 needs before its step-2 is admissible on the
/// destination chain.
pub const TRANSFER_MATURITY: u64 = 8;

/// Version tag of ordinary same-chain transfers.
pub const TX_VERSION: u32 = 2;

/// Version tag of branch-creation transactions.
pub const BRANCH_CREATE_TX_VERSION: u32 = 5;

/// Version tag of mortgage-mine transactions.
pub const MORTGAGE_TX_VERSION: u32 = 6;

/// Version tag shared by step-1 and step-2 cross-chain transactions.
pub const CROSS_CHAIN_TX_VERSION: u32 = 7;
