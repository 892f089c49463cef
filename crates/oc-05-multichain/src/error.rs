//! Error types for chain facades and the registry

use oc_01_filter::FilterError;
use oc_02_chain_config::ConfigTxError;
use oc_03_ledger::LedgerError;
use shared_types::EncodingError;

/// A consenter could not produce a chain.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConsenterError {
    #[error("Consenter cannot handle chain {chain_id}: {reason}")]
    Construction { chain_id: String, reason: String },

    #[error("Invalid consenter configuration: {0}")]
    InvalidConfig(String),
}

/// Chain facade failures. Every variant is fatal to the chain it names.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainSupportError {
    #[error("No consenter registered for consensus type {0}")]
    UnknownConsensusType(String),

    #[error(transparent)]
    Consenter(#[from] ConsenterError),

    #[error("Could not append block {number} to chain {chain_id}: {source}")]
    LedgerAppend {
        chain_id: String,
        number: u64,
        #[source]
        source: LedgerError,
    },

    #[error("Metadata encoding failed: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Chain {chain_id} cannot resume provenance: {reason}")]
    Provenance { chain_id: String, reason: String },
}

/// Result type for facade operations
pub type ChainSupportResult<T> = Result<T, ChainSupportError>;

/// A block a chain failed to write after running its committers.
///
/// Reported once per process through `MultiChainRegistry::faults`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainFault {
    pub chain_id: String,
    pub number: u64,
    pub reason: String,
}

impl std::fmt::Display for ChainFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "chain {} failed to write block {}: {}",
            self.chain_id, self.number, self.reason
        )
    }
}

/// Registry construction and chain creation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("Chain not found: {0}")]
    ChainNotFound(String),

    #[error("Chain already exists: {0}")]
    ChainExists(String),

    #[error("No system chain found among {0:?}")]
    NoSystemChain(Vec<String>),

    #[error("More than one system chain: {0:?}")]
    MultipleSystemChains(Vec<String>),

    #[error("Chain {chain_id} has no readable configuration: {reason}")]
    MissingConfig { chain_id: String, reason: String },

    #[error("Invalid rule set: {0}")]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Config(#[from] ConfigTxError),

    #[error(transparent)]
    ChainSupport(#[from] ChainSupportError),

    #[error("Encoding failed: {0}")]
    Encoding(#[from] EncodingError),
}

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;
