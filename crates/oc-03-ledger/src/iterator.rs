//! Positioned block iteration with wait-for-height.

use crate::error::{LedgerError, LedgerResult};
use crate::ports::Reader;
use shared_types::Block;
use std::sync::Arc;
use tokio::sync::watch;

/// Where an iterator starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekPosition {
    /// Oldest retained block.
    Oldest,
    /// Newest block at the time the iterator is created.
    Newest,
    Specified(u64),
}

/// Walks committed blocks in order, optionally waiting for new ones.
pub struct BlockIterator {
    reader: Arc<dyn Reader>,
    next: u64,
    height_rx: watch::Receiver<u64>,
}

impl BlockIterator {
    pub fn new(reader: Arc<dyn Reader>, position: SeekPosition) -> LedgerResult<Self> {
        let height_rx = reader.watch_height();
        let base = reader.base();
        let next = match position {
            SeekPosition::Oldest => base,
            SeekPosition::Newest => reader.height().saturating_sub(1).max(base),
            SeekPosition::Specified(number) => {
                if number < base {
                    return Err(LedgerError::Pruned { number, base });
                }
                number
            }
        };
        Ok(Self {
            reader,
            next,
            height_rx,
        })
    }

    /// Number of the block the next call returns.
    pub fn position(&self) -> u64 {
        self.next
    }

    /// True if the next block is already committed.
    pub fn is_ready(&self) -> bool {
        self.reader.height() > self.next
    }

    /// Next block if it is committed, without waiting.
    pub fn try_next(&mut self) -> LedgerResult<Option<Block>> {
        if !self.is_ready() {
            return Ok(None);
        }
        let block = self.reader.get_block(self.next)?;
        self.next += 1;
        Ok(Some(block))
    }

    /// Next block, waiting until it is committed.
    pub async fn next(&mut self) -> LedgerResult<Block> {
        loop {
            let height = *self.height_rx.borrow_and_update();
            if height > self.next {
                let block = self.reader.get_block(self.next)?;
                self.next += 1;
                return Ok(block);
            }
            self.height_rx
                .changed()
                .await
                .map_err(|_| LedgerError::Closed)?;
        }
    }
}
