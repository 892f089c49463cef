//! Chain creation through the system chain.
//!
//! A creation request is an `OrdererTransaction` envelope on the system chain
//! whose payload data is the genesis `ConfigTx` envelope of the new chain.
//! The rule validates it at admission. The committer builds the chain while
//! the block holding the request is written; the registry makes it routable
//! once that block is on the ledger.

use crate::error::RegistryError;
use crate::registry::RegistryInner;
use oc_01_filter::{Action, Committer, Rule};
use oc_02_chain_config::{
    parse_config_tx, ChainConfigManager, ConfigTxError, PolicyError, PolicyManager,
    SharedConfigManager,
};
use oc_03_ledger::{check_chain_id, LedgerError};
use shared_crypto::{create_signed_envelope, CryptoError, Signer};
use shared_types::{marshal, unmarshal, Envelope, HeaderType};
use std::sync::{Arc, Weak};
use tracing::{debug, error, warn};

/// Wrap the genesis configuration of a new chain into a creation request.
pub fn creation_envelope(
    config_tx: &Envelope,
    system_chain_id: &str,
    submitter: &dyn Signer,
) -> Result<Envelope, CryptoError> {
    create_signed_envelope(
        HeaderType::OrdererTransaction,
        system_chain_id,
        marshal(config_tx)?,
        submitter,
    )
}

/// Genesis configuration envelope carried by a creation request.
pub(crate) fn creation_config_tx(envelope: &Envelope) -> Option<Envelope> {
    let payload = envelope.payload().ok()?;
    if payload.header_type().ok()? != HeaderType::OrdererTransaction {
        return None;
    }
    unmarshal(&payload.data).ok()
}

/// Chain ID named by a creation request, if `envelope` is one.
pub fn created_chain_id(envelope: &Envelope) -> Option<String> {
    let inner = creation_config_tx(envelope)?;
    let chain_id = inner.payload().ok()?.chain_id().ok()?.to_string();
    Some(chain_id)
}

#[derive(Debug, thiserror::Error)]
enum CreationRejected {
    #[error("malformed genesis configuration: {0}")]
    Malformed(#[from] ConfigTxError),

    #[error("invalid chain ID: {0}")]
    InvalidChainId(#[from] LedgerError),

    #[error("genesis sequence must be 0, got {0}")]
    NonZeroSequence(u64),

    #[error("unknown consensus type {0}")]
    UnknownConsensusType(String),

    #[error("chain {0} already exists")]
    ChainExists(String),

    #[error("configuration names no creation policy")]
    NoCreationPolicy,

    #[error("creation policy {0} is not offered by the system chain")]
    PolicyNotOffered(String),

    #[error("creation policy {0} is not defined")]
    UnknownPolicy(String),

    #[error("creation policy not satisfied: {0}")]
    Unauthorized(#[from] PolicyError),

    #[error("registry is shutting down")]
    RegistryGone,
}

/// Admits chain creation requests on the system chain.
pub struct SystemChainFilter {
    registry: Weak<RegistryInner>,
    system_config: Arc<ChainConfigManager>,
}

impl SystemChainFilter {
    pub(crate) fn new(
        registry: Weak<RegistryInner>,
        system_config: Arc<ChainConfigManager>,
    ) -> Self {
        Self {
            registry,
            system_config,
        }
    }

    fn authorize(&self, config_tx: &Envelope) -> Result<String, CreationRejected> {
        let parsed = parse_config_tx(config_tx)?;
        let config = &parsed.config;
        check_chain_id(&config.chain_id)?;

        if config.sequence != 0 {
            return Err(CreationRejected::NonZeroSequence(config.sequence));
        }

        let registry = self
            .registry
            .upgrade()
            .ok_or(CreationRejected::RegistryGone)?;
        if !registry.has_consenter(&config.consensus_type) {
            return Err(CreationRejected::UnknownConsensusType(
                config.consensus_type.clone(),
            ));
        }
        if !registry.can_create(config) {
            return Err(CreationRejected::ChainExists(config.chain_id.clone()));
        }

        let policy_name = config
            .creation_policy
            .as_ref()
            .ok_or(CreationRejected::NoCreationPolicy)?;
        if !self
            .system_config
            .chain_creation_policies()
            .contains(policy_name)
        {
            return Err(CreationRejected::PolicyNotOffered(policy_name.clone()));
        }
        let policy = self
            .system_config
            .get_policy(policy_name)
            .ok_or_else(|| CreationRejected::UnknownPolicy(policy_name.clone()))?;
        policy.evaluate(&parsed.signed_data())?;

        // The new chain must be able to run on this configuration
        ChainConfigManager::new(config.clone())?;

        Ok(config.chain_id.clone())
    }
}

impl Rule for SystemChainFilter {
    fn apply(&self, envelope: &Envelope) -> (Action, Option<Box<dyn Committer>>) {
        let payload = match envelope.payload() {
            Ok(p) => p,
            Err(_) => return (Action::Reject, None),
        };
        match payload.header_type() {
            Ok(HeaderType::OrdererTransaction) => {}
            Ok(_) => return (Action::Forward, None),
            Err(_) => return (Action::Reject, None),
        }

        let config_tx: Envelope = match unmarshal(&payload.data) {
            Ok(env) => env,
            Err(e) => {
                debug!(error = %e, "Rejecting creation request without inner envelope");
                return (Action::Reject, None);
            }
        };

        match self.authorize(&config_tx) {
            Ok(chain_id) => {
                debug!(chain_id = %chain_id, "Accepted chain creation request");
                (
                    Action::Accept,
                    Some(Box::new(ChainCreationCommitter {
                        registry: self.registry.clone(),
                        chain_id,
                        config_tx,
                    })),
                )
            }
            Err(reason) => {
                debug!(%reason, "Rejecting chain creation request");
                (Action::Reject, None)
            }
        }
    }

    fn name(&self) -> &'static str {
        "SystemChainFilter"
    }
}

/// Builds the chain while the block holding its creation request is written.
pub struct ChainCreationCommitter {
    registry: Weak<RegistryInner>,
    chain_id: String,
    config_tx: Envelope,
}

impl Committer for ChainCreationCommitter {
    fn commit(self: Box<Self>) {
        let Some(registry) = self.registry.upgrade() else {
            warn!(chain_id = %self.chain_id, "[oc-05] Registry gone, chain not created");
            return;
        };
        match registry.new_chain(&self.config_tx) {
            Ok(()) => {}
            Err(RegistryError::ChainExists(id)) => {
                warn!(chain_id = %id, "[oc-05] Chain already exists, creation skipped");
            }
            Err(e) => {
                error!(chain_id = %self.chain_id, error = %e, "[oc-05] Chain creation failed");
            }
        }
    }

    fn isolated(&self) -> bool {
        true
    }
}
