//! Error types for chain configuration and policy evaluation

use shared_types::{EncodingError, HeaderType};

/// Policy evaluation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("Policy not satisfied: {valid} valid signatures, {required} required")]
    Unsatisfied { valid: usize, required: usize },

    #[error("Policy rejects all requests")]
    RejectAll,

    #[error("Invalid policy definition {name}: {reason}")]
    InvalidDefinition { name: String, reason: String },

    #[error("Unknown policy: {0}")]
    UnknownPolicy(String),
}

/// Configuration transaction failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigTxError {
    #[error("Not a configuration transaction: {0:?}")]
    NotConfigTx(HeaderType),

    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainIdMismatch { expected: String, actual: String },

    #[error("Sequence mismatch: expected {expected}, got {actual}")]
    SequenceMismatch { expected: u64, actual: u64 },

    #[error("Consensus type cannot change from {current} to {proposed}")]
    ConsensusTypeChanged { current: String, proposed: String },

    #[error("Configuration references missing policy: {0}")]
    MissingPolicy(String),

    #[error("Configuration update not authorized: {0}")]
    Unauthorized(#[from] PolicyError),

    #[error("Malformed configuration: {0}")]
    Malformed(#[from] EncodingError),
}

/// Result type for configuration operations
pub type ConfigTxResult<T> = Result<T, ConfigTxError>;
