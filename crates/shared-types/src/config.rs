//! # Chain Configuration
//!
//! The configuration of a chain travels inside configuration transactions.
//! A `ConfigEnvelope` carries the encoded `ChainConfig` together with the
//! signatures that authorise it.

use crate::encoding::unmarshal;
use crate::entities::PublicKey;
use crate::errors::EncodingError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Conventional policy names.
pub mod policy_names {
    /// Who may submit transactions.
    pub const WRITERS: &str = "Writers";
    /// Who may read blocks.
    pub const READERS: &str = "Readers";
    /// Who may change the configuration.
    pub const ADMINS: &str = "Admins";
    /// Who may create chains (system chain only).
    pub const CHAIN_CREATORS: &str = "ChainCreators";
}

/// Consensus type identifiers understood by the node.
pub mod consensus_types {
    pub const SOLO: &str = "solo";
    pub const QUORUM: &str = "quorum";
}

/// Limits that govern when accumulated envelopes become a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSize {
    /// Maximum number of envelopes in one block.
    pub max_message_count: u32,
    /// Envelopes larger than this are never ordered.
    pub absolute_max_bytes: u32,
    /// Soft limit on the total size of one block.
    pub preferred_max_bytes: u32,
}

impl Default for BatchSize {
    fn default() -> Self {
        Self {
            max_message_count: 10,
            absolute_max_bytes: 10 * 1024 * 1024,
            preferred_max_bytes: 512 * 1024,
        }
    }
}

/// Definition of a named policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyDefinition {
    /// At least `n` distinct listed identities must have signed.
    NOutOf { n: u32, identities: Vec<PublicKey> },
    /// Any single valid signature satisfies the policy.
    AnySignature,
    /// Never satisfied.
    RejectAll,
}

/// Full configuration of one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: String,
    /// Incremented by exactly one on every accepted configuration update.
    pub sequence: u64,
    /// Selects the consenter at chain construction. Immutable afterwards.
    pub consensus_type: String,
    pub batch_size: BatchSize,
    pub batch_timeout_ms: u64,
    /// Policy evaluated against every submitted envelope.
    pub ingress_policy: String,
    /// Policy evaluated against deliver requests.
    pub egress_policy: String,
    /// Policy that must be satisfied by the signatures of a configuration update.
    pub modification_policy: String,
    /// Policies that may authorise chain creation. Non-empty only on the system chain.
    pub chain_creation_policies: Vec<String>,
    /// For a chain created at runtime: the system chain policy that authorised it.
    pub creation_policy: Option<String>,
    pub policies: BTreeMap<String, PolicyDefinition>,
}

impl ChainConfig {
    /// A chain whose configuration grants chain-creation policies is the system chain.
    pub fn is_system_chain(&self) -> bool {
        !self.chain_creation_policies.is_empty()
    }
}

/// Signature over an encoded `ChainConfig`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSignature {
    pub signer: PublicKey,
    pub signature: Vec<u8>,
}

/// Body of a `ConfigTx` payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfigEnvelope {
    /// Canonically encoded `ChainConfig`; signatures cover these bytes.
    pub config: Vec<u8>,
    pub signatures: Vec<ConfigSignature>,
}

impl ConfigEnvelope {
    /// Decode the carried configuration.
    pub fn chain_config(&self) -> Result<ChainConfig, EncodingError> {
        unmarshal(&self.config)
    }
}
