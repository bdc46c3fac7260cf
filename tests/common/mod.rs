// tests/common/mod.rs
//! Shared two-node harness: a main chain with one registered, fully
//! matured branch chain, wired to each other as peers.

use branchchain::chain::ChainId;
use branchchain::config::NodeConfig;
use branchchain::node::{link_nodes, ChainNode};
use branchchain::transaction::Txid;
use branchchain::BRANCH_REGISTRATION_MATURITY;
use std::sync::Arc;
use tempfile::TempDir;

pub struct TwoChainNet {
    pub main: Arc<ChainNode>,
    pub branch: Arc<ChainNode>,
    pub branch_id: Txid,
    _dirs: (TempDir, TempDir),
}

pub fn two_chain_net() -> TwoChainNet {
    let _ = env_logger::builder().is_test(true).try_init();

    let main_dir = tempfile::tempdir().unwrap();
    let branch_dir = tempfile::tempdir().unwrap();

    let main = ChainNode::open(NodeConfig::new(ChainId::Main, main_dir.path())).unwrap();

    let branch_id = main
        .create_branch("seed1.example.net".into(), "fd00::1".into())
        .unwrap();
    // Mine the registration and bury it past the listing threshold.
    main.generate(BRANCH_REGISTRATION_MATURITY as usize);

    let branch = ChainNode::open(NodeConfig::new(
        ChainId::Branch(branch_id),
        branch_dir.path(),
    ))
    .unwrap();
    link_nodes(&main, &branch);

    TwoChainNet {
        main,
        branch,
        branch_id,
        _dirs: (main_dir, branch_dir),
    }
}
