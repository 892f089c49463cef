//! Bounded in-memory ledger.

use crate::error::{LedgerError, LedgerResult};
use crate::ports::{check_chain_id, check_successor, LedgerFactory, ReadWriter, Reader, Writer};
use parking_lot::RwLock;
use shared_types::{Block, Hash, ZERO_HASH};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

struct RamState {
    blocks: VecDeque<Block>,
    /// Number of `blocks[0]`.
    base: u64,
    tip: Hash,
}

/// Keeps at most `max_size` most recent blocks in memory.
pub struct RamLedger {
    max_size: usize,
    state: RwLock<RamState>,
    height_tx: watch::Sender<u64>,
}

impl RamLedger {
    pub fn new(max_size: usize) -> Self {
        let (height_tx, _) = watch::channel(0);
        Self {
            max_size: max_size.max(1),
            state: RwLock::new(RamState {
                blocks: VecDeque::new(),
                base: 0,
                tip: ZERO_HASH,
            }),
            height_tx,
        }
    }
}

impl Reader for RamLedger {
    fn height(&self) -> u64 {
        let state = self.state.read();
        state.base + state.blocks.len() as u64
    }

    fn base(&self) -> u64 {
        self.state.read().base
    }

    fn tip_hash(&self) -> Hash {
        self.state.read().tip
    }

    fn get_block(&self, number: u64) -> LedgerResult<Block> {
        let state = self.state.read();
        if number < state.base {
            return Err(LedgerError::Pruned {
                number,
                base: state.base,
            });
        }
        state
            .blocks
            .get((number - state.base) as usize)
            .cloned()
            .ok_or(LedgerError::BlockNotFound {
                number,
                height: state.base + state.blocks.len() as u64,
            })
    }

    fn watch_height(&self) -> watch::Receiver<u64> {
        self.height_tx.subscribe()
    }
}

impl Writer for RamLedger {
    fn append(&self, block: Block) -> LedgerResult<()> {
        let height = {
            let mut state = self.state.write();
            let height = state.base + state.blocks.len() as u64;
            check_successor(height, &state.tip, &block)?;
            state.tip = block.header.hash();
            state.blocks.push_back(block);
            if state.blocks.len() > self.max_size {
                state.blocks.pop_front();
                state.base += 1;
            }
            height + 1
        };
        self.height_tx.send_replace(height);
        Ok(())
    }
}

/// Hands out one `RamLedger` per chain.
pub struct RamLedgerFactory {
    max_size: usize,
    ledgers: RwLock<BTreeMap<String, Arc<RamLedger>>>,
}

impl RamLedgerFactory {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            ledgers: RwLock::new(BTreeMap::new()),
        }
    }
}

impl LedgerFactory for RamLedgerFactory {
    fn get_or_create(&self, chain_id: &str) -> LedgerResult<Arc<dyn ReadWriter>> {
        check_chain_id(chain_id)?;
        let mut ledgers = self.ledgers.write();
        let ledger = ledgers
            .entry(chain_id.to_string())
            .or_insert_with(|| {
                debug!(chain_id, "[oc-03] Created in-memory ledger");
                Arc::new(RamLedger::new(self.max_size))
            })
            .clone();
        Ok(ledger)
    }

    fn chain_ids(&self) -> Vec<String> {
        self.ledgers.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::create_next_block;
    use shared_types::Envelope;

    fn envelope(b: u8) -> Envelope {
        Envelope {
            payload: vec![b; 4],
            signature: vec![],
        }
    }

    #[test]
    fn test_append_and_read_back() {
        let ledger = RamLedger::new(10);
        assert_eq!(ledger.height(), 0);
        assert_eq!(ledger.tip_hash(), ZERO_HASH);

        let genesis = create_next_block(&ledger, vec![envelope(0)]);
        ledger.append(genesis.clone()).unwrap();
        let next = create_next_block(&ledger, vec![envelope(1)]);
        assert_eq!(next.header.previous_hash, genesis.header.hash());
        ledger.append(next).unwrap();

        assert_eq!(ledger.height(), 2);
        assert_eq!(ledger.get_block(0).unwrap(), genesis);
        assert!(matches!(
            ledger.get_block(2),
            Err(LedgerError::BlockNotFound {
                number: 2,
                height: 2
            })
        ));
    }

    #[test]
    fn test_rejects_duplicate_append() {
        let ledger = RamLedger::new(10);
        let genesis = create_next_block(&ledger, vec![]);
        ledger.append(genesis.clone()).unwrap();
        assert!(matches!(
            ledger.append(genesis),
            Err(LedgerError::OutOfOrder { .. })
        ));
    }

    #[test]
    fn test_ring_prunes_oldest() {
        let ledger = RamLedger::new(3);
        for i in 0..5 {
            let block = create_next_block(&ledger, vec![envelope(i)]);
            ledger.append(block).unwrap();
        }
        assert_eq!(ledger.height(), 5);
        assert_eq!(ledger.base(), 2);
        assert!(matches!(
            ledger.get_block(1),
            Err(LedgerError::Pruned { number: 1, base: 2 })
        ));
        assert_eq!(ledger.get_block(4).unwrap().number(), 4);
    }

    #[test]
    fn test_height_watch_sees_appends() {
        let ledger = RamLedger::new(3);
        let rx = ledger.watch_height();
        ledger.append(create_next_block(&ledger, vec![])).unwrap();
        assert_eq!(*rx.borrow(), 1);
    }

    #[test]
    fn test_factory_reuses_ledgers() {
        let factory = RamLedgerFactory::new(10);
        let a = factory.get_or_create("a").unwrap();
        a.append(create_next_block(a.as_ref(), vec![])).unwrap();
        let again = factory.get_or_create("a").unwrap();
        assert_eq!(again.height(), 1);
        factory.get_or_create("b").unwrap();
        assert_eq!(factory.chain_ids(), vec!["a".to_string(), "b".to_string()]);
        assert!(factory.get_or_create("../x").is_err());
    }
}
