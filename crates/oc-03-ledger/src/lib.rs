//! # oc-03-ledger
//!
//! Append-only block log for each chain.
//!
//! ## Architecture
//!
//! ```text
//!  ChainSupport ──create_next_block()──→ Block (number, previous_hash, data_hash)
//!       │                                   │
//!       └──────────── append() ─────────────┘
//!                        │
//!          ┌─────────────┴─────────────┐
//!          │ RamLedger    │ FileLedger  │   (behind LedgerFactory)
//!          └─────────────┬─────────────┘
//!                        │ height watch
//!                        ↓
//!                  BlockIterator ──→ Deliver
//! ```
//!
//! ## Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | Dense numbering | `append` requires `block.number == height` |
//! | Hash chaining | `previous_hash` must equal the SHA-256 of the previous header |
//! | Body integrity | `data_hash` must match the block body |
//! | Append-only | No API removes or rewrites a block |
//!
//! `RamLedger` keeps a bounded window of recent blocks; reading below the
//! window yields `LedgerError::Pruned`.

pub mod adapters;
pub mod error;
pub mod iterator;
pub mod ports;

pub use adapters::file::{FileLedger, FileLedgerFactory};
pub use adapters::ram::{RamLedger, RamLedgerFactory};
pub use error::{LedgerError, LedgerResult};
pub use iterator::{BlockIterator, SeekPosition};
pub use ports::{check_chain_id, create_next_block, LedgerFactory, ReadWriter, Reader, Writer};
