//! # oc-05-multichain
//!
//! Per-chain resources, the registry of running chains and the two client
//! facing handlers.
//!
//! ## Data flow
//!
//! ```text
//!  client ──→ BroadcastHandler ──→ RuleSet (caller's task)
//!                                     │ Accept + committer
//!                                     ↓
//!                                  Chain::enqueue ──→ consenter loop
//!                                                        │
//!                                   BlockCutter ←────────┤
//!                                                        ↓
//!                              ConsenterSupport::write_block
//!                                 │ run committers
//!                                 │ SIGNATURES, LAST_CONFIGURATION
//!                                 ↓
//!                               ledger ──→ DeliverHandler ──→ client
//! ```
//!
//! ## Guarantees
//!
//! | Property | Where |
//! |----------|-------|
//! | Every written block carries both provenance entries | `ChainResources::write_block` |
//! | `LAST_CONFIGURATION` never decreases | `ChainResources::write_block` |
//! | Exactly one system chain | `MultiChainRegistry::new` |
//! | A chain is routable only once its creation block is written | `MultiChainRegistry` |
//! | A failed block write is reported once | `MultiChainRegistry::faults` |
//! | Deliver honours the egress policy | `DeliverHandler::deliver` |

pub mod broadcast;
pub mod chain_support;
pub mod deliver;
pub mod error;
pub mod genesis;
pub mod metrics;
pub mod ports;
pub mod registry;
pub mod system_chain;

#[cfg(test)]
mod test_utils;

pub use broadcast::{BroadcastHandler, BroadcastStatus};
pub use chain_support::{ChainResources, ChainSupport};
pub use deliver::{
    seek_envelope, BlockCursor, DeliverError, DeliverHandler, SeekBehavior, SeekInfo, SeekStart,
};
pub use error::{
    ChainFault, ChainSupportError, ChainSupportResult, ConsenterError, RegistryError,
    RegistryResult,
};
pub use genesis::GenesisBlockFactory;
pub use ports::{Chain, Consenter, ConsenterSupport};
pub use registry::{load_chain_config, standard_filters, system_chain_filters, MultiChainRegistry};
pub use system_chain::{created_chain_id, creation_envelope, ChainCreationCommitter, SystemChainFilter};
