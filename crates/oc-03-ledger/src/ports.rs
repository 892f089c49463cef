//! Ledger ports.

use crate::error::{LedgerError, LedgerResult};
use shared_types::{Block, Envelope, Hash, ZERO_HASH};
use std::sync::Arc;
use tokio::sync::watch;

/// Read access to one chain's blocks.
pub trait Reader: Send + Sync {
    /// Number of blocks ever appended.
    fn height(&self) -> u64;

    /// Lowest block number still readable.
    fn base(&self) -> u64 {
        0
    }

    /// Header hash of the newest block, or `ZERO_HASH` for an empty ledger.
    fn tip_hash(&self) -> Hash;

    fn get_block(&self, number: u64) -> LedgerResult<Block>;

    /// Receiver that observes every height change.
    fn watch_height(&self) -> watch::Receiver<u64>;
}

/// Durable append.
pub trait Writer: Send + Sync {
    fn append(&self, block: Block) -> LedgerResult<()>;
}

/// A ledger that can be both read and appended to.
pub trait ReadWriter: Reader + Writer {
    fn as_reader(self: Arc<Self>) -> Arc<dyn Reader>;
}

impl<T: Reader + Writer + 'static> ReadWriter for T {
    fn as_reader(self: Arc<Self>) -> Arc<dyn Reader> {
        self
    }
}

/// Opens ledgers by chain ID.
pub trait LedgerFactory: Send + Sync {
    /// Existing ledger for `chain_id`, or a new empty one.
    fn get_or_create(&self, chain_id: &str) -> LedgerResult<Arc<dyn ReadWriter>>;

    /// Chain IDs with a ledger, sorted.
    fn chain_ids(&self) -> Vec<String>;
}

/// Build the block that would follow the current tip. Nothing is appended.
pub fn create_next_block<R: Reader + ?Sized>(reader: &R, envelopes: Vec<Envelope>) -> Block {
    Block::new(reader.height(), reader.tip_hash(), envelopes)
}

/// Check that `block` may be appended at `height` after `tip`.
pub(crate) fn check_successor(height: u64, tip: &Hash, block: &Block) -> LedgerResult<()> {
    let number = block.number();
    if number != height {
        return Err(LedgerError::OutOfOrder {
            expected: height,
            actual: number,
        });
    }
    let expected_prev = if height == 0 { &ZERO_HASH } else { tip };
    if &block.header.previous_hash != expected_prev {
        return Err(LedgerError::PreviousHashMismatch { number });
    }
    if block.header.data_hash != block.data.hash() {
        return Err(LedgerError::DataHashMismatch { number });
    }
    Ok(())
}

/// Chain IDs become directory names, so keep them to a safe alphabet.
pub fn check_chain_id(chain_id: &str) -> LedgerResult<()> {
    let valid = !chain_id.is_empty()
        && chain_id.len() <= 249
        && chain_id != "."
        && chain_id != ".."
        && chain_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if valid {
        Ok(())
    } else {
        Err(LedgerError::InvalidChainId(chain_id.to_string()))
    }
}
