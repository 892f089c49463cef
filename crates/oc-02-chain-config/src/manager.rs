//! Concrete configuration manager backing all three configuration ports.

use crate::error::{ConfigTxError, ConfigTxResult};
use crate::policies::{Policy, PolicyRegistry};
use crate::ports::{ConfigTxManager, PolicyManager, SharedConfigManager};
use parking_lot::RwLock;
use shared_types::{
    unmarshal, BatchSize, ChainConfig, ConfigEnvelope, Envelope, HeaderType, SignedData,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// A decoded configuration transaction.
#[derive(Debug, Clone)]
pub struct ParsedConfigTx {
    /// Chain named in the envelope header.
    pub chain_id: String,
    pub config_envelope: ConfigEnvelope,
    pub config: ChainConfig,
}

impl ParsedConfigTx {
    /// Signatures of the config envelope as policy input.
    pub fn signed_data(&self) -> Vec<SignedData> {
        self.config_envelope
            .signatures
            .iter()
            .map(|s| SignedData {
                data: self.config_envelope.config.clone(),
                identity: s.signer.to_vec(),
                signature: s.signature.clone(),
            })
            .collect()
    }
}

/// Decode a `ConfigTx` envelope down to its `ChainConfig`.
pub fn parse_config_tx(envelope: &Envelope) -> ConfigTxResult<ParsedConfigTx> {
    let payload = envelope.payload()?;
    let header_type = payload.header_type()?;
    if header_type != HeaderType::ConfigTx {
        return Err(ConfigTxError::NotConfigTx(header_type));
    }
    let chain_id = payload.chain_id()?.to_string();
    let config_envelope: ConfigEnvelope = unmarshal(&payload.data)?;
    let config = config_envelope.chain_config()?;
    if config.chain_id != chain_id {
        return Err(ConfigTxError::ChainIdMismatch {
            expected: chain_id,
            actual: config.chain_id,
        });
    }
    Ok(ParsedConfigTx {
        chain_id,
        config_envelope,
        config,
    })
}

struct ConfigState {
    config: ChainConfig,
    policies: PolicyRegistry,
}

/// Holds the current configuration of one chain.
pub struct ChainConfigManager {
    chain_id: String,
    state: RwLock<ConfigState>,
}

impl ChainConfigManager {
    /// Manager seeded with a trusted configuration (genesis or ledger replay).
    pub fn new(config: ChainConfig) -> ConfigTxResult<Self> {
        let policies = compile(&config)?;
        Ok(Self {
            chain_id: config.chain_id.clone(),
            state: RwLock::new(ConfigState { config, policies }),
        })
    }

    /// Manager seeded from the configuration transaction of a genesis block.
    pub fn from_config_tx(envelope: &Envelope) -> ConfigTxResult<Self> {
        Self::new(parse_config_tx(envelope)?.config)
    }

    fn check(
        &self,
        state: &ConfigState,
        envelope: &Envelope,
    ) -> ConfigTxResult<(ChainConfig, PolicyRegistry)> {
        let parsed = parse_config_tx(envelope)?;
        if parsed.chain_id != self.chain_id {
            return Err(ConfigTxError::ChainIdMismatch {
                expected: self.chain_id.clone(),
                actual: parsed.chain_id,
            });
        }

        let expected = state.config.sequence + 1;
        if parsed.config.sequence != expected {
            return Err(ConfigTxError::SequenceMismatch {
                expected,
                actual: parsed.config.sequence,
            });
        }

        if parsed.config.consensus_type != state.config.consensus_type {
            return Err(ConfigTxError::ConsensusTypeChanged {
                current: state.config.consensus_type.clone(),
                proposed: parsed.config.consensus_type.clone(),
            });
        }

        let policies = compile(&parsed.config)?;

        // Authorised by the policy in force, not by the proposed one
        let modification = &state.config.modification_policy;
        let policy = state
            .policies
            .get_policy(modification)
            .ok_or_else(|| ConfigTxError::MissingPolicy(modification.clone()))?;
        policy.evaluate(&parsed.signed_data())?;

        Ok((parsed.config, policies))
    }
}

/// Compile policies and verify that every referenced name exists.
fn compile(config: &ChainConfig) -> ConfigTxResult<PolicyRegistry> {
    let policies = PolicyRegistry::from_definitions(&config.policies)?;
    let mut required = vec![&config.ingress_policy, &config.modification_policy];
    if !config.egress_policy.is_empty() {
        required.push(&config.egress_policy);
    }
    required.extend(config.chain_creation_policies.iter());
    for name in required {
        if !policies.contains(name) {
            return Err(ConfigTxError::MissingPolicy(name.clone()));
        }
    }
    Ok(policies)
}

impl ConfigTxManager for ChainConfigManager {
    fn chain_id(&self) -> String {
        self.chain_id.clone()
    }

    fn sequence(&self) -> u64 {
        self.state.read().config.sequence
    }

    fn validate(&self, envelope: &Envelope) -> ConfigTxResult<ChainConfig> {
        let state = self.state.read();
        self.check(&state, envelope).map(|(config, _)| config)
    }

    fn apply(&self, envelope: &Envelope) -> ConfigTxResult<()> {
        let mut state = self.state.write();
        let (config, policies) = self.check(&state, envelope)?;
        info!(
            chain_id = %self.chain_id,
            sequence = config.sequence,
            "Applied configuration update"
        );
        *state = ConfigState { config, policies };
        Ok(())
    }

    fn chain_config(&self) -> ChainConfig {
        self.state.read().config.clone()
    }
}

impl PolicyManager for ChainConfigManager {
    fn get_policy(&self, name: &str) -> Option<Arc<dyn Policy>> {
        self.state.read().policies.get_policy(name)
    }
}

impl SharedConfigManager for ChainConfigManager {
    fn consensus_type(&self) -> String {
        self.state.read().config.consensus_type.clone()
    }

    fn batch_size(&self) -> BatchSize {
        self.state.read().config.batch_size
    }

    fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.state.read().config.batch_timeout_ms)
    }

    fn ingress_policy(&self) -> String {
        self.state.read().config.ingress_policy.clone()
    }

    fn egress_policy(&self) -> String {
        self.state.read().config.egress_policy.clone()
    }

    fn chain_creation_policies(&self) -> Vec<String> {
        self.state.read().config.chain_creation_policies.clone()
    }
}
