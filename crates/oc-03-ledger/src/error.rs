//! Ledger error types

/// Errors raised by ledger reads and appends.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Block {number} not found (height {height})")]
    BlockNotFound { number: u64, height: u64 },

    #[error("Block {number} was pruned; oldest retained is {base}")]
    Pruned { number: u64, base: u64 },

    #[error("Out of order append: expected block {expected}, got {actual}")]
    OutOfOrder { expected: u64, actual: u64 },

    #[error("Block {number} does not link to the previous header")]
    PreviousHashMismatch { number: u64 },

    #[error("Block {number} data hash does not match its body")]
    DataHashMismatch { number: u64 },

    #[error("Invalid chain ID for ledger: {0:?}")]
    InvalidChainId(String),

    #[error("I/O error at {path}: {message}")]
    Io { path: String, message: String },

    #[error("Corrupt block file {path}: {message}")]
    Corrupt { path: String, message: String },

    #[error("Ledger closed")]
    Closed,
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
