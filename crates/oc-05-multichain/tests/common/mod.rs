//! Shared harness for the registry integration tests.
//!
//! `StepConsenter` is an order-then-cut consenter without a worker task: the
//! test drives it with `step`, which feeds the inbox through the block cutter
//! and writes every batch it produces, plus a final timer-style cut.

#![allow(dead_code)]

use async_trait::async_trait;
use oc_03_ledger::LedgerFactory;
use oc_04_blockcutter::{AdmittedEnvelope, Batch};
use oc_05_multichain::{
    creation_envelope, BroadcastHandler, BroadcastStatus, Chain, Consenter, ConsenterError,
    ConsenterSupport, GenesisBlockFactory, MultiChainRegistry,
};
use parking_lot::Mutex;
use shared_crypto::{create_signed_envelope, sign_config, verify, LocalSigner};
use shared_types::{
    marshal, policy_names, BatchSize, Block, BlockMetadataIndex, ChainConfig, Envelope,
    HeaderType, PolicyDefinition,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const SYSTEM_CHAIN: &str = "system";

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Fixed admin identity so restarted nodes agree on policies.
pub fn admin() -> LocalSigner {
    LocalSigner::from_seed([7u8; 32])
}

pub fn app_config(chain_id: &str, admin: &LocalSigner) -> ChainConfig {
    let mut policies = BTreeMap::new();
    policies.insert(policy_names::WRITERS.to_string(), PolicyDefinition::AnySignature);
    policies.insert(
        policy_names::ADMINS.to_string(),
        PolicyDefinition::NOutOf {
            n: 1,
            identities: vec![*admin.public_key().as_bytes()],
        },
    );
    ChainConfig {
        chain_id: chain_id.to_string(),
        sequence: 0,
        consensus_type: "step".into(),
        batch_size: BatchSize {
            max_message_count: 3,
            ..BatchSize::default()
        },
        batch_timeout_ms: 1_000,
        ingress_policy: policy_names::WRITERS.into(),
        egress_policy: String::new(),
        modification_policy: policy_names::ADMINS.into(),
        chain_creation_policies: vec![],
        creation_policy: Some(policy_names::CHAIN_CREATORS.into()),
        policies,
    }
}

pub fn system_config(admin: &LocalSigner) -> ChainConfig {
    let mut config = app_config(SYSTEM_CHAIN, admin);
    config.creation_policy = None;
    config.policies.insert(
        policy_names::CHAIN_CREATORS.to_string(),
        PolicyDefinition::NOutOf {
            n: 1,
            identities: vec![*admin.public_key().as_bytes()],
        },
    );
    config.chain_creation_policies = vec![policy_names::CHAIN_CREATORS.to_string()];
    config
}

// =============================================================================
// ENVELOPES
// =============================================================================

pub fn message(chain_id: &str, body: &[u8], signer: &LocalSigner) -> Envelope {
    create_signed_envelope(HeaderType::Message, chain_id, body.to_vec(), signer).unwrap()
}

pub fn config_update(config: &ChainConfig, signer: &LocalSigner) -> Envelope {
    let signed = sign_config(config, &[signer]).unwrap();
    create_signed_envelope(
        HeaderType::ConfigTx,
        &config.chain_id,
        marshal(&signed).unwrap(),
        signer,
    )
    .unwrap()
}

pub fn creation_request(chain_id: &str, admin: &LocalSigner) -> Envelope {
    creation_for(&app_config(chain_id, admin), admin)
}

/// Creation request for an arbitrary genesis configuration.
pub fn creation_for(config: &ChainConfig, admin: &LocalSigner) -> Envelope {
    let config_tx = GenesisBlockFactory::from_config(config, &[admin], admin)
        .unwrap()
        .config_tx()
        .clone();
    creation_envelope(&config_tx, SYSTEM_CHAIN, admin).unwrap()
}

/// Check one signed metadata slot the way a block consumer would.
pub fn assert_slot_signed(block: &Block, slot: BlockMetadataIndex, signer: &LocalSigner) {
    let metadata = block.metadata(slot).unwrap();
    assert_eq!(metadata.signatures.len(), 1);
    let sig = &metadata.signatures[0];
    let mut signed = metadata.value.clone();
    signed.extend_from_slice(&sig.signature_header);
    signed.extend_from_slice(&block.header.bytes());
    verify(&signer.identity(), &signed, &sig.signature).unwrap();
}

// =============================================================================
// STEP CONSENTER
// =============================================================================

#[derive(Default)]
pub struct StepConsenter {
    chains: Mutex<HashMap<String, Arc<StepChain>>>,
}

impl StepConsenter {
    /// Envelopes enqueued on `chain_id` and not yet stepped.
    pub fn inbox_len(&self, chain_id: &str) -> usize {
        self.chain(chain_id).map_or(0, |c| c.inbox.lock().len())
    }

    /// Order the inbox of `chain_id` and write the resulting blocks.
    pub fn step(&self, chain_id: &str) -> Vec<Block> {
        let Some(chain) = self.chain(chain_id) else {
            return Vec::new();
        };
        if chain.halted.load(Ordering::SeqCst) {
            return Vec::new();
        }
        let inbox: Vec<AdmittedEnvelope> = std::mem::take(&mut *chain.inbox.lock());
        let cutter = chain.support.block_cutter();

        let mut written = Vec::new();
        for admitted in inbox {
            let (batches, _) = cutter.ordered(admitted);
            for batch in batches {
                written.push(chain.write(batch));
            }
        }
        let rest = cutter.cut();
        if !rest.is_empty() {
            written.push(chain.write(rest));
        }
        written
    }

    fn chain(&self, chain_id: &str) -> Option<Arc<StepChain>> {
        self.chains.lock().get(chain_id).cloned()
    }
}

impl Consenter for StepConsenter {
    fn handle_chain(
        &self,
        support: Arc<dyn ConsenterSupport>,
    ) -> Result<Box<dyn Chain>, ConsenterError> {
        let chain = Arc::new(StepChain {
            support: support.clone(),
            inbox: Mutex::new(Vec::new()),
            halted: AtomicBool::new(false),
        });
        self.chains
            .lock()
            .insert(support.chain_id().to_string(), chain.clone());
        Ok(Box::new(StepHandle(chain)))
    }
}

pub struct StepChain {
    support: Arc<dyn ConsenterSupport>,
    inbox: Mutex<Vec<AdmittedEnvelope>>,
    halted: AtomicBool,
}

impl StepChain {
    fn write(&self, batch: Batch) -> Block {
        let (envelopes, committers) = batch.into_parts();
        let block = self.support.create_next_block(envelopes);
        self.support.write_block(block, committers).unwrap()
    }
}

struct StepHandle(Arc<StepChain>);

#[async_trait]
impl Chain for StepHandle {
    fn start(&self) {}

    fn enqueue(&self, admitted: AdmittedEnvelope) -> bool {
        if self.0.halted.load(Ordering::SeqCst) {
            return false;
        }
        self.0.inbox.lock().push(admitted);
        true
    }

    async fn halt(&self) {
        self.0.halted.store(true, Ordering::SeqCst);
        self.0.inbox.lock().clear();
        self.0.support.block_cutter().discard();
    }
}

// =============================================================================
// NODE
// =============================================================================

pub struct Node {
    pub admin: LocalSigner,
    pub signer: Arc<LocalSigner>,
    pub consenter: Arc<StepConsenter>,
    pub registry: MultiChainRegistry,
    pub broadcast: BroadcastHandler,
}

impl Node {
    /// Bootstrap the system chain if needed, then start every chain.
    pub fn start(factory: Arc<dyn LedgerFactory>) -> Self {
        let admin = admin();
        let genesis = GenesisBlockFactory::from_config(&system_config(&admin), &[&admin], &admin)
            .unwrap()
            .block()
            .unwrap();
        MultiChainRegistry::bootstrap(factory.as_ref(), genesis).unwrap();

        let consenter = Arc::new(StepConsenter::default());
        let mut consenters: HashMap<String, Arc<dyn Consenter>> = HashMap::new();
        consenters.insert("step".into(), consenter.clone());
        let signer = Arc::new(LocalSigner::from_seed([9u8; 32]));
        let registry = MultiChainRegistry::new(factory, consenters, signer.clone()).unwrap();
        let broadcast = BroadcastHandler::new(registry.clone());
        Self {
            admin,
            signer,
            consenter,
            registry,
            broadcast,
        }
    }

    pub fn submit(&self, envelope: Envelope) -> BroadcastStatus {
        self.broadcast.handle(envelope)
    }

    pub fn height(&self, chain_id: &str) -> u64 {
        self.registry.get_chain(chain_id).unwrap().reader().height()
    }
}
