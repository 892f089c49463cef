//! # Orderer Node
//!
//! Assembles the process from an [`OrdererConfig`]:
//!
//! ```text
//! OrdererConfig ──→ LedgerFactory (ram | file)
//!               ──→ LocalSigner (seed | ephemeral)
//!               ──→ system genesis (first start only)
//!               ──→ consenters {solo, quorum}
//!               ──→ MultiChainRegistry ──→ BroadcastHandler / DeliverHandler
//! ```

use crate::config::{ConfigError, LedgerType, OrdererConfig};
use crate::genesis::{system_genesis_block, GenesisError};
use oc_03_ledger::{FileLedgerFactory, LedgerError, LedgerFactory, RamLedgerFactory};
use oc_05_multichain::{
    BroadcastHandler, ChainFault, Consenter, ConsenterError, DeliverHandler, MultiChainRegistry,
    RegistryError,
};
use oc_06_consenters::{LocalQuorum, QuorumConsenter, ReplicaSet, SoloConsenter, QUORUM, SOLO};
use shared_crypto::{LocalSigner, Signer};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Ledger unavailable: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Genesis failed: {0}")]
    Genesis(#[from] GenesisError),

    #[error("Consenter setup failed: {0}")]
    Consenter(#[from] ConsenterError),

    #[error("Registry failed to start: {0}")]
    Registry(#[from] RegistryError),
}

/// A running orderer: every chain found on disk, started.
pub struct OrdererNode {
    registry: MultiChainRegistry,
    broadcast: BroadcastHandler,
    deliver: DeliverHandler,
    identity: Vec<u8>,
}

impl OrdererNode {
    /// Open the ledgers, bootstrap the system chain if needed and start
    /// every chain. Must be called inside a tokio runtime.
    pub fn start(config: OrdererConfig) -> Result<Self, NodeError> {
        config.validate()?;

        let factory: Arc<dyn LedgerFactory> = match config.ledger_type {
            LedgerType::Ram => Arc::new(RamLedgerFactory::new(config.ram_max_blocks)),
            LedgerType::File => Arc::new(FileLedgerFactory::new(&config.ledger_dir)?),
        };

        let signer = match config.signer_seed {
            Some(seed) => LocalSigner::from_seed(seed),
            None => {
                warn!("⚠️ No ORDERER_SIGNER_SEED set, using an ephemeral signing key");
                LocalSigner::generate()
            }
        };
        let identity = signer.identity();

        let existing = factory.chain_ids();
        if existing.is_empty() || existing.contains(&config.system_chain_id) {
            let genesis = system_genesis_block(&config, &signer)?;
            if MultiChainRegistry::bootstrap(factory.as_ref(), genesis)? {
                info!(
                    chain_id = %config.system_chain_id,
                    consensus = %config.consensus_type,
                    "🌱 Created system chain"
                );
            }
        }

        let consenters = consenters(&config)?;
        let signer: Arc<dyn Signer> = Arc::new(signer);
        let registry = MultiChainRegistry::new(factory, consenters, signer)?;
        if registry.system_chain_id() != config.system_chain_id {
            warn!(
                configured = %config.system_chain_id,
                found = %registry.system_chain_id(),
                "System chain on disk differs from ORDERER_SYSTEM_CHAIN"
            );
        }

        info!(
            identity = %hex::encode(&identity),
            chains = ?registry.chain_ids(),
            "🚀 Orderer started"
        );
        Ok(Self {
            broadcast: BroadcastHandler::new(registry.clone()),
            deliver: DeliverHandler::new(registry.clone()),
            registry,
            identity,
        })
    }

    pub fn registry(&self) -> &MultiChainRegistry {
        &self.registry
    }

    pub fn broadcast(&self) -> &BroadcastHandler {
        &self.broadcast
    }

    pub fn deliver(&self) -> &DeliverHandler {
        &self.deliver
    }

    /// Public key the orderer signs blocks with.
    pub fn identity(&self) -> &[u8] {
        &self.identity
    }

    /// Resolves with the first block write failure of any chain. The
    /// failed chain has stopped; the process should exit.
    pub async fn fatal(&self) -> ChainFault {
        self.registry.fatal().await
    }

    /// Halt every chain. Pending batches are discarded.
    pub async fn shutdown(&self) {
        info!("🛑 Halting all chains");
        self.registry.halt_all().await;
        info!("Shutdown complete");
    }
}

/// Both consensus types are always available so that created chains may
/// pick either one.
fn consenters(config: &OrdererConfig) -> Result<HashMap<String, Arc<dyn Consenter>>, NodeError> {
    let quorum = Arc::new(LocalQuorum::generate(config.quorum_replicas));
    let replicas = ReplicaSet::new(quorum.identities())?;
    info!(
        replicas = replicas.len(),
        quorum = replicas.quorum(),
        "Local quorum replicas ready"
    );

    let mut consenters: HashMap<String, Arc<dyn Consenter>> = HashMap::new();
    consenters.insert(SOLO.into(), Arc::new(SoloConsenter));
    consenters.insert(QUORUM.into(), Arc::new(QuorumConsenter::new(quorum, replicas)));
    Ok(consenters)
}
