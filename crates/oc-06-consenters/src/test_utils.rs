//! Fixtures for consenter tests.

use oc_02_chain_config::ChainConfigManager;
use oc_03_ledger::{LedgerError, LedgerResult, RamLedger, ReadWriter, Reader, Writer};
use oc_05_multichain::{standard_filters, ChainResources, ConsenterSupport, GenesisBlockFactory};
use shared_crypto::LocalSigner;
use shared_types::{policy_names, BatchSize, Block, ChainConfig, Envelope, Hash, PolicyDefinition};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub fn config(batch_size: BatchSize, batch_timeout_ms: u64) -> ChainConfig {
    let mut policies = BTreeMap::new();
    policies.insert(policy_names::WRITERS.to_string(), PolicyDefinition::AnySignature);
    ChainConfig {
        chain_id: "app".into(),
        sequence: 0,
        consensus_type: "solo".into(),
        batch_size,
        batch_timeout_ms,
        ingress_policy: policy_names::WRITERS.into(),
        egress_policy: String::new(),
        modification_policy: policy_names::WRITERS.into(),
        chain_creation_policies: vec![],
        creation_policy: None,
        policies,
    }
}

/// Resources for chain "app", with its genesis block appended if `ledger`
/// is empty.
pub fn chain_support(
    ledger: Arc<dyn ReadWriter>,
    batch_size: BatchSize,
    batch_timeout_ms: u64,
) -> Arc<dyn ConsenterSupport> {
    let admin = LocalSigner::from_seed([1u8; 32]);
    let config = config(batch_size, batch_timeout_ms);
    if ledger.height() == 0 {
        let genesis = GenesisBlockFactory::from_config(&config, &[&admin], &admin)
            .unwrap()
            .block()
            .unwrap();
        ledger.append(genesis).unwrap();
    }
    let manager = Arc::new(ChainConfigManager::new(config).unwrap());
    let filters = standard_filters(&manager).unwrap();
    Arc::new(ChainResources::new(
        manager,
        filters,
        ledger,
        Arc::new(LocalSigner::from_seed([2u8; 32])),
    )
    .unwrap())
}

pub fn envelope(b: u8) -> Envelope {
    Envelope {
        payload: vec![b; 16],
        signature: vec![],
    }
}

pub async fn wait_for_height<R: Reader + ?Sized>(ledger: &R, height: u64) {
    let mut rx = ledger.watch_height();
    tokio::time::timeout(Duration::from_secs(30), rx.wait_for(|h| *h >= height))
        .await
        .expect("height not reached")
        .expect("ledger closed");
}

/// Holds a genesis block and refuses every further append.
pub struct FailingLedger {
    inner: RamLedger,
}

impl FailingLedger {
    pub fn new() -> Self {
        let inner = RamLedger::new(10);
        let admin = LocalSigner::from_seed([1u8; 32]);
        let genesis = GenesisBlockFactory::from_config(
            &config(BatchSize::default(), 500),
            &[&admin],
            &admin,
        )
        .unwrap()
        .block()
        .unwrap();
        inner.append(genesis).unwrap();
        Self { inner }
    }
}

impl Reader for FailingLedger {
    fn height(&self) -> u64 {
        self.inner.height()
    }

    fn tip_hash(&self) -> Hash {
        self.inner.tip_hash()
    }

    fn get_block(&self, number: u64) -> LedgerResult<Block> {
        self.inner.get_block(number)
    }

    fn watch_height(&self) -> watch::Receiver<u64> {
        self.inner.watch_height()
    }
}

impl Writer for FailingLedger {
    fn append(&self, _block: Block) -> LedgerResult<()> {
        Err(LedgerError::Io {
            path: "failing".into(),
            message: "disk full".into(),
        })
    }
}
