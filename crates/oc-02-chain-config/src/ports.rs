//! Driven ports exposing a chain's configuration.
//!
//! Callers always receive snapshots; nothing here hands out a reference into
//! mutable configuration state.

use crate::error::ConfigTxResult;
use crate::policies::Policy;
use shared_types::{BatchSize, ChainConfig, Envelope};
use std::sync::Arc;
use std::time::Duration;

/// Validates and applies configuration transactions.
pub trait ConfigTxManager: Send + Sync {
    /// Chain this manager configures.
    fn chain_id(&self) -> String;

    /// Current configuration sequence number.
    fn sequence(&self) -> u64;

    /// Check a configuration transaction against the current state without
    /// applying it. Returns the proposed configuration.
    fn validate(&self, envelope: &Envelope) -> ConfigTxResult<ChainConfig>;

    /// Validate and apply a configuration transaction.
    fn apply(&self, envelope: &Envelope) -> ConfigTxResult<()>;

    /// Snapshot of the current configuration.
    fn chain_config(&self) -> ChainConfig;
}

/// Looks up named policies of the current configuration.
pub trait PolicyManager: Send + Sync {
    fn get_policy(&self, name: &str) -> Option<Arc<dyn Policy>>;
}

/// Orderer-relevant values of the current configuration.
pub trait SharedConfigManager: Send + Sync {
    fn consensus_type(&self) -> String;
    fn batch_size(&self) -> BatchSize;
    fn batch_timeout(&self) -> Duration;
    fn ingress_policy(&self) -> String;
    fn egress_policy(&self) -> String;
    fn chain_creation_policies(&self) -> Vec<String>;
}
