//! Shared fixtures for unit tests.

use crate::error::ConsenterError;
use crate::ports::{Chain, Consenter, ConsenterSupport};
use async_trait::async_trait;
use oc_04_blockcutter::AdmittedEnvelope;
use parking_lot::Mutex;
use shared_crypto::LocalSigner;
use shared_types::{policy_names, BatchSize, Block, ChainConfig, PolicyDefinition};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub fn app_config(chain_id: &str, admin: &LocalSigner) -> ChainConfig {
    let admin_key = *admin.public_key().as_bytes();
    let mut policies = BTreeMap::new();
    policies.insert(policy_names::WRITERS.to_string(), PolicyDefinition::AnySignature);
    policies.insert(
        policy_names::ADMINS.to_string(),
        PolicyDefinition::NOutOf {
            n: 1,
            identities: vec![admin_key],
        },
    );
    ChainConfig {
        chain_id: chain_id.to_string(),
        sequence: 0,
        consensus_type: "solo".into(),
        batch_size: BatchSize::default(),
        batch_timeout_ms: 50,
        ingress_policy: policy_names::WRITERS.into(),
        egress_policy: String::new(),
        modification_policy: policy_names::ADMINS.into(),
        chain_creation_policies: vec![],
        creation_policy: None,
        policies,
    }
}

pub fn system_config(chain_id: &str, admin: &LocalSigner) -> ChainConfig {
    let mut config = app_config(chain_id, admin);
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

/// Consenter whose chains only queue envelopes until told to write.
#[derive(Default)]
pub struct ManualConsenter {
    chains: Mutex<HashMap<String, Arc<ManualChain>>>,
    started: Arc<AtomicUsize>,
}

impl ManualConsenter {
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn queued(&self) -> usize {
        self.chains.lock().values().map(|c| c.queue.lock().len()).sum()
    }

    /// Write everything queued on `chain_id` as one block.
    pub fn flush(&self, chain_id: &str) -> Option<Block> {
        let chain = self.chains.lock().get(chain_id).cloned()?;
        let queued: Vec<AdmittedEnvelope> = std::mem::take(&mut *chain.queue.lock());
        let mut envelopes = Vec::new();
        let mut committers = Vec::new();
        for admitted in queued {
            envelopes.push(admitted.envelope);
            committers.extend(admitted.committer);
        }
        let block = chain.support.create_next_block(envelopes);
        chain.support.write_block(block, committers).ok()
    }
}

impl Consenter for ManualConsenter {
    fn handle_chain(
        &self,
        support: Arc<dyn ConsenterSupport>,
    ) -> Result<Box<dyn Chain>, ConsenterError> {
        let chain = Arc::new(ManualChain {
            support: support.clone(),
            queue: Mutex::new(Vec::new()),
            halted: AtomicBool::new(false),
            started: self.started.clone(),
        });
        self.chains
            .lock()
            .insert(support.chain_id().to_string(), chain.clone());
        Ok(Box::new(ManualChainHandle(chain)))
    }
}

pub struct ManualChain {
    support: Arc<dyn ConsenterSupport>,
    queue: Mutex<Vec<AdmittedEnvelope>>,
    halted: AtomicBool,
    started: Arc<AtomicUsize>,
}

struct ManualChainHandle(Arc<ManualChain>);

#[async_trait]
impl Chain for ManualChainHandle {
    fn start(&self) {
        self.0.started.fetch_add(1, Ordering::SeqCst);
    }

    fn enqueue(&self, admitted: AdmittedEnvelope) -> bool {
        if self.0.halted.load(Ordering::SeqCst) {
            return false;
        }
        self.0.queue.lock().push(admitted);
        true
    }

    async fn halt(&self) {
        self.0.halted.store(true, Ordering::SeqCst);
        self.0.queue.lock().clear();
    }
}
