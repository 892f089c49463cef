//! Multi-chain registry.
//!
//! ## Startup
//!
//! ```text
//! LedgerFactory::chain_ids()
//!        │
//!        ├─ skip empty ledgers
//!        ├─ load config from the block named by the tip's LAST_CONFIGURATION
//!        ├─ exactly one config with chain creation policies → system chain
//!        ├─ keep other chains only if a system chain block records their
//!        │  creation with the genesis configuration found on their ledger
//!        ↓
//! ChainSupport per chain (system chain gets the chain creation rule) → start
//! ```
//!
//! ## Creation
//!
//! `ChainCreationCommitter` runs while the system chain writes the block
//! holding the request. The new chain is only staged there; it is started
//! and becomes routable once that block is on the system ledger. If the
//! write fails the staged chains are dropped and the failure is published
//! on [`MultiChainRegistry::faults`].

use crate::chain_support::{AppendListener, ChainResources, ChainSupport};
use crate::error::{ChainFault, ChainSupportError, RegistryError, RegistryResult};
use crate::genesis::GenesisBlockFactory;
use crate::metrics;
use crate::ports::Consenter;
use crate::system_chain::{creation_config_tx, SystemChainFilter};
use oc_01_filter::{AcceptRule, EmptyRejectRule, FilterResult, Rule, RuleSet};
use oc_02_chain_config::{parse_config_tx, ChainConfigManager, ConfigTxFilter, SigFilter};
use oc_03_ledger::{LedgerFactory, ReadWriter, Reader};
use parking_lot::{Mutex, RwLock};
use shared_crypto::Signer;
use shared_types::{Block, ChainConfig, Envelope};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Rules for an ordinary chain.
pub fn standard_filters(config: &Arc<ChainConfigManager>) -> FilterResult<RuleSet> {
    let rules: Vec<Arc<dyn Rule>> = vec![
        Arc::new(EmptyRejectRule),
        Arc::new(SigFilter::new(config.clone(), config.clone())),
        Arc::new(ConfigTxFilter::new(config.clone())),
        Arc::new(AcceptRule),
    ];
    RuleSet::new(rules)
}

/// Rules for the system chain: the chain creation rule runs before
/// configuration validation.
pub fn system_chain_filters(
    config: &Arc<ChainConfigManager>,
    creation: Arc<dyn Rule>,
) -> FilterResult<RuleSet> {
    let rules: Vec<Arc<dyn Rule>> = vec![
        Arc::new(EmptyRejectRule),
        Arc::new(SigFilter::new(config.clone(), config.clone())),
        creation,
        Arc::new(ConfigTxFilter::new(config.clone())),
        Arc::new(AcceptRule),
    ];
    RuleSet::new(rules)
}

/// Configuration in force for a non-empty ledger.
pub fn load_chain_config<R: Reader + ?Sized>(
    chain_id: &str,
    ledger: &R,
) -> RegistryResult<ChainConfig> {
    let missing = |reason: String| RegistryError::MissingConfig {
        chain_id: chain_id.to_string(),
        reason,
    };
    let height = ledger.height();
    if height == 0 {
        return Err(missing("ledger is empty".into()));
    }
    let tip = ledger.get_block(height - 1)?;
    let index = tip.last_config_index()?;
    let config_block = ledger.get_block(index)?;
    config_block
        .data
        .envelopes
        .iter()
        .find_map(|env| parse_config_tx(env).ok())
        .map(|parsed| parsed.config)
        .ok_or_else(|| missing(format!("block {} holds no configuration transaction", index)))
}

/// Configuration carried by block 0 of `ledger`, if readable.
fn genesis_config<R: Reader + ?Sized>(ledger: &R) -> Option<ChainConfig> {
    let genesis = ledger.get_block(0).ok()?;
    genesis
        .data
        .envelopes
        .iter()
        .find_map(|env| parse_config_tx(env).ok())
        .map(|parsed| parsed.config)
}

pub(crate) struct RegistryInner {
    chains: RwLock<HashMap<String, Arc<ChainSupport>>>,
    /// Created by the system block being written, not yet routable.
    staged: Mutex<Vec<Arc<ChainSupport>>>,
    faults: watch::Sender<Option<ChainFault>>,
    consenters: HashMap<String, Arc<dyn Consenter>>,
    ledger_factory: Arc<dyn LedgerFactory>,
    signer: Arc<dyn Signer>,
    system_chain_id: String,
}

impl RegistryInner {
    pub(crate) fn contains(&self, chain_id: &str) -> bool {
        self.chains.read().contains_key(chain_id)
            || self.staged.lock().iter().any(|s| s.chain_id() == chain_id)
    }

    pub(crate) fn has_consenter(&self, consensus_type: &str) -> bool {
        self.consenters.contains_key(consensus_type)
    }

    /// Whether a chain may be created from `config`.
    ///
    /// A ledger left behind by a creation whose system block never landed
    /// may only be taken over by the same genesis configuration.
    pub(crate) fn can_create(&self, config: &ChainConfig) -> bool {
        let chain_id = &config.chain_id;
        if self.contains(chain_id) {
            return false;
        }
        if !self.ledger_factory.chain_ids().contains(chain_id) {
            return true;
        }
        match self.ledger_factory.get_or_create(chain_id) {
            Ok(ledger) => {
                ledger.height() == 0 || genesis_config(ledger.as_ref()).as_ref() == Some(config)
            }
            Err(e) => {
                warn!(chain_id = %chain_id, error = %e, "[oc-05] Cannot open existing ledger");
                false
            }
        }
    }

    fn build_chain(
        self: &Arc<Self>,
        config: ChainConfig,
        ledger: Arc<dyn ReadWriter>,
    ) -> RegistryResult<Arc<ChainSupport>> {
        let is_system = config.chain_id == self.system_chain_id;
        let manager = Arc::new(ChainConfigManager::new(config)?);
        let filters = if is_system {
            let creation = Arc::new(SystemChainFilter::new(
                Arc::downgrade(self),
                manager.clone(),
            ));
            system_chain_filters(&manager, creation)?
        } else {
            standard_filters(&manager)?
        };
        let listener: Weak<dyn AppendListener> = Arc::downgrade(self) as Weak<RegistryInner>;
        let resources = ChainResources::new(manager, filters, ledger, self.signer.clone())?
            .with_listener(listener);
        Ok(Arc::new(ChainSupport::new(resources, &self.consenters)?))
    }

    /// Build a chain from its genesis configuration and stage it until the
    /// system block holding its creation is written.
    ///
    /// Runs while the system chain writes that block.
    pub(crate) fn new_chain(self: &Arc<Self>, config_tx: &Envelope) -> RegistryResult<()> {
        let config = parse_config_tx(config_tx)?.config;
        let chain_id = config.chain_id.clone();
        if self.contains(&chain_id) {
            return Err(RegistryError::ChainExists(chain_id));
        }

        let ledger = self.ledger_factory.get_or_create(&chain_id)?;
        if ledger.height() == 0 {
            let genesis = GenesisBlockFactory::new(config_tx.clone()).block()?;
            ledger.append(genesis)?;
        } else if genesis_config(ledger.as_ref()).as_ref() == Some(&config) {
            info!(chain_id = %chain_id, "[oc-05] Adopting ledger left by an unfinished creation");
        } else {
            return Err(RegistryError::ChainExists(chain_id));
        }

        let support = self.build_chain(config, ledger)?;
        self.staged.lock().push(support);
        debug!(chain_id = %chain_id, "[oc-05] Chain staged until its creation block is written");
        Ok(())
    }
}

impl AppendListener for RegistryInner {
    fn appended(&self, chain_id: &str, _number: u64) {
        if chain_id != self.system_chain_id {
            return;
        }
        let staged: Vec<Arc<ChainSupport>> = self.staged.lock().drain(..).collect();
        for support in staged {
            support.start();
            let created = support.chain_id().to_string();
            self.chains.write().insert(created.clone(), support);
            metrics::record_chain_created();
            info!(chain_id = %created, "[oc-05] 🆕 Created chain");
        }
    }

    fn write_failed(&self, chain_id: &str, number: u64, error: &ChainSupportError) {
        if chain_id == self.system_chain_id {
            for support in self.staged.lock().drain(..) {
                warn!(
                    chain_id = %support.chain_id(),
                    block = number,
                    "[oc-05] Chain creation abandoned, its system block was not written"
                );
            }
        }

        let fault = ChainFault {
            chain_id: chain_id.to_string(),
            number,
            reason: error.to_string(),
        };
        // First fault wins
        self.faults.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(fault);
            true
        });
    }
}

/// Owns every chain facade of the process.
#[derive(Clone)]
pub struct MultiChainRegistry {
    inner: Arc<RegistryInner>,
}

impl MultiChainRegistry {
    /// Append `genesis` to the system chain ledger if that ledger is empty.
    ///
    /// Returns true if the block was appended.
    pub fn bootstrap(factory: &dyn LedgerFactory, genesis: Block) -> RegistryResult<bool> {
        let config = genesis
            .data
            .envelopes
            .iter()
            .find_map(|env| parse_config_tx(env).ok())
            .map(|parsed| parsed.config)
            .ok_or_else(|| RegistryError::MissingConfig {
                chain_id: String::new(),
                reason: "genesis block holds no configuration transaction".into(),
            })?;
        let ledger = factory.get_or_create(&config.chain_id)?;
        if ledger.height() > 0 {
            return Ok(false);
        }
        ledger.append(genesis)?;
        info!(chain_id = %config.chain_id, "[oc-05] Bootstrapped system chain from genesis");
        Ok(true)
    }

    /// Rebuild every chain found by `ledger_factory` and start them.
    pub fn new(
        ledger_factory: Arc<dyn LedgerFactory>,
        consenters: HashMap<String, Arc<dyn Consenter>>,
        signer: Arc<dyn Signer>,
    ) -> RegistryResult<Self> {
        let mut found = Vec::new();
        for chain_id in ledger_factory.chain_ids() {
            let ledger = ledger_factory.get_or_create(&chain_id)?;
            if ledger.height() == 0 {
                warn!(chain_id = %chain_id, "[oc-05] Skipping empty ledger");
                continue;
            }
            let config = load_chain_config(&chain_id, ledger.as_ref())?;
            found.push((config, ledger));
        }

        let system: Vec<String> = found
            .iter()
            .filter(|(config, _)| config.is_system_chain())
            .map(|(config, _)| config.chain_id.clone())
            .collect();
        let system_chain_id = match system.as_slice() {
            [id] => id.clone(),
            [] => {
                let all = found.iter().map(|(c, _)| c.chain_id.clone()).collect();
                return Err(RegistryError::NoSystemChain(all));
            }
            _ => return Err(RegistryError::MultipleSystemChains(system)),
        };

        let created = found
            .iter()
            .find(|(config, _)| config.chain_id == system_chain_id)
            .map(|(_, ledger)| created_chains(ledger.as_ref()))
            .unwrap_or_default();

        let (faults, _) = watch::channel(None);
        let inner = Arc::new(RegistryInner {
            chains: RwLock::new(HashMap::new()),
            staged: Mutex::new(Vec::new()),
            faults,
            consenters,
            ledger_factory,
            signer,
            system_chain_id,
        });

        for (config, ledger) in found {
            let chain_id = config.chain_id.clone();
            if chain_id != inner.system_chain_id
                && !creation_committed(&created, &chain_id, ledger.as_ref())
            {
                warn!(
                    chain_id = %chain_id,
                    "[oc-05] Ignoring ledger whose creation was never committed on the system chain"
                );
                continue;
            }
            let support = inner.build_chain(config, ledger)?;
            inner.chains.write().insert(chain_id, support);
        }

        for support in inner.chains.read().values() {
            support.start();
        }

        info!(
            system_chain = %inner.system_chain_id,
            chains = inner.chains.read().len(),
            "[oc-05] Registry started"
        );
        Ok(Self { inner })
    }

    pub fn get_chain(&self, chain_id: &str) -> Option<Arc<ChainSupport>> {
        self.inner.chains.read().get(chain_id).cloned()
    }

    pub fn chain_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.chains.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn system_chain_id(&self) -> &str {
        &self.inner.system_chain_id
    }

    pub fn system_chain(&self) -> Option<Arc<ChainSupport>> {
        self.get_chain(&self.inner.system_chain_id)
    }

    /// First block write failure of any chain; `None` while all are healthy.
    pub fn faults(&self) -> watch::Receiver<Option<ChainFault>> {
        self.inner.faults.subscribe()
    }

    /// Resolves once any chain fails to write a block.
    pub async fn fatal(&self) -> ChainFault {
        let mut faults = self.faults();
        loop {
            if let Some(fault) = faults.borrow_and_update().clone() {
                return fault;
            }
            if faults.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }

    /// Halt every chain. Enqueue fails on all of them afterwards.
    pub async fn halt_all(&self) {
        let chains: Vec<Arc<ChainSupport>> = self.inner.chains.read().values().cloned().collect();
        for chain in chains {
            chain.halt().await;
            info!(chain_id = %chain.chain_id(), "[oc-05] Chain halted");
        }
    }
}

/// Genesis configurations of the chains created by committed system chain
/// blocks, by chain ID.
fn created_chains(system_ledger: &dyn ReadWriter) -> HashMap<String, Vec<ChainConfig>> {
    let mut created: HashMap<String, Vec<ChainConfig>> = HashMap::new();
    for number in system_ledger.base()..system_ledger.height() {
        let block = match system_ledger.get_block(number) {
            Ok(block) => block,
            Err(e) => {
                error!(block = number, error = %e, "[oc-05] Unreadable system chain block");
                continue;
            }
        };
        for config_tx in block.data.envelopes.iter().filter_map(creation_config_tx) {
            if let Ok(parsed) = parse_config_tx(&config_tx) {
                created
                    .entry(parsed.config.chain_id.clone())
                    .or_default()
                    .push(parsed.config);
            }
        }
    }
    created
}

/// Whether `ledger` was started by a creation the system chain committed.
fn creation_committed(
    created: &HashMap<String, Vec<ChainConfig>>,
    chain_id: &str,
    ledger: &dyn ReadWriter,
) -> bool {
    let Some(configs) = created.get(chain_id) else {
        return false;
    };
    if ledger.base() > 0 {
        // Genesis pruned, only the ID can be checked
        return true;
    }
    match genesis_config(ledger) {
        Some(genesis) if configs.contains(&genesis) => true,
        _ => {
            error!(
                chain_id = %chain_id,
                "[oc-05] Ledger genesis differs from every committed creation"
            );
            false
        }
    }
}
