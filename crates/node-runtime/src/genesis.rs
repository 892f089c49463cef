//! # System Chain Genesis
//!
//! Builds block 0 of the system chain from node configuration.
//!
//! ## Policies
//!
//! | Policy | Rule |
//! |--------|------|
//! | Writers | any valid signature |
//! | Readers | any valid signature |
//! | Admins | 1 of the administrators |
//! | ChainCreators | 1 of the administrators |
//!
//! The orderer identity is always an administrator.

use crate::config::OrdererConfig;
use oc_05_multichain::GenesisBlockFactory;
use shared_crypto::{CryptoError, LocalSigner};
use shared_types::{policy_names, Block, ChainConfig, EncodingError, PolicyDefinition};
use std::collections::BTreeMap;
use thiserror::Error;

/// Genesis block creation errors.
#[derive(Debug, Error)]
pub enum GenesisError {
    #[error("Failed to sign genesis configuration: {0}")]
    Signing(#[from] CryptoError),

    #[error("Failed to encode genesis block: {0}")]
    Encoding(#[from] EncodingError),
}

pub fn system_chain_config(config: &OrdererConfig, orderer: &LocalSigner) -> ChainConfig {
    let mut admins = vec![*orderer.public_key().as_bytes()];
    for admin in &config.admins {
        if !admins.contains(admin) {
            admins.push(*admin);
        }
    }

    let mut policies = BTreeMap::new();
    policies.insert(policy_names::WRITERS.to_string(), PolicyDefinition::AnySignature);
    policies.insert(policy_names::READERS.to_string(), PolicyDefinition::AnySignature);
    policies.insert(
        policy_names::ADMINS.to_string(),
        PolicyDefinition::NOutOf {
            n: 1,
            identities: admins.clone(),
        },
    );
    policies.insert(
        policy_names::CHAIN_CREATORS.to_string(),
        PolicyDefinition::NOutOf {
            n: 1,
            identities: admins,
        },
    );

    ChainConfig {
        chain_id: config.system_chain_id.clone(),
        sequence: 0,
        consensus_type: config.consensus_type.clone(),
        batch_size: config.batch_size,
        batch_timeout_ms: config.batch_timeout_ms,
        ingress_policy: policy_names::WRITERS.into(),
        egress_policy: policy_names::READERS.into(),
        modification_policy: policy_names::ADMINS.into(),
        chain_creation_policies: vec![policy_names::CHAIN_CREATORS.into()],
        creation_policy: None,
        policies,
    }
}

/// Genesis block of the system chain, signed by the orderer.
pub fn system_genesis_block(
    config: &OrdererConfig,
    orderer: &LocalSigner,
) -> Result<Block, GenesisError> {
    let chain_config = system_chain_config(config, orderer);
    let factory = GenesisBlockFactory::from_config(&chain_config, &[orderer], orderer)?;
    Ok(factory.block()?)
}
