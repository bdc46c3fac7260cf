// src/maturity.rs
//! Maturity tracker.
//!
//! Confirmation depth of a step-1 transaction on its source chain, and the
//! predicate gating phase two. Depth is derived from best height minus
//! inclusion height on every query; nothing is cached, so an orphaned
//! including block immediately reports the transaction as missing.

use crate::chain::Chain;
use crate::transaction::Txid;
use crate::TRANSFER_MATURITY;
use std::sync::Arc;

pub struct MaturityTracker {
    chain: Arc<Chain>,
    threshold: u64,
}

impl MaturityTracker {
    pub fn new(chain: Arc<Chain>) -> Self {
        MaturityTracker {
            chain,
            threshold: TRANSFER_MATURITY,
        }
    }

    /// Current confirmation depth; `None` if unmined or orphaned.
    pub fn confirmations_of(&self, txid: &Txid) -> Option<u64> {
        self.chain.confirmations(txid)
    }

    /// The probabilistic finality gate before phase two.
    pub fn is_mature(&self, txid: &Txid) -> bool {
        self.confirmations_of(txid)
            .map(|c| c >= self.threshold)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::chain::ChainId;
    use crate::transaction::Transaction;

    fn mined_tx(chain: &Chain) -> Txid {
        let tx = Transaction::plain(Address::new_key(), 1);
        let txid = tx.txid();
        chain.connect_block(vec![tx]);
        txid
    }

    #[test]
    fn maturity_flips_exactly_at_the_threshold() {
        let chain = Arc::new(Chain::new(ChainId::Main));
        let tracker = MaturityTracker::new(Arc::clone(&chain));
        let txid = mined_tx(&chain);

        for _ in 0..(TRANSFER_MATURITY - 1) {
            assert!(!tracker.is_mature(&txid));
            chain.connect_block(Vec::new());
        }
        assert_eq!(tracker.confirmations_of(&txid), Some(TRANSFER_MATURITY));
        assert!(tracker.is_mature(&txid));
    }

    #[test]
    fn unmined_transaction_is_immature() {
        let chain = Arc::new(Chain::new(ChainId::Main));
        let tracker = MaturityTracker::new(chain);
        assert_eq!(tracker.confirmations_of(&Txid([1; 32])), None);
        assert!(!tracker.is_mature(&Txid([1; 32])));
    }

    #[test]
    fn reorg_revokes_maturity() {
        let chain = Arc::new(Chain::new(ChainId::Main));
        let tracker = MaturityTracker::new(Arc::clone(&chain));
        let txid = mined_tx(&chain);
        for _ in 0..TRANSFER_MATURITY {
            chain.connect_block(Vec::new());
        }
        assert!(tracker.is_mature(&txid));

        // Orphan everything back past the including block.
        for _ in 0..=TRANSFER_MATURITY {
            chain.disconnect_tip();
        }
        assert_eq!(tracker.confirmations_of(&txid), None);
        assert!(!tracker.is_mature(&txid));
    }
}
