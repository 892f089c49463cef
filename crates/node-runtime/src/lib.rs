//! # Orderer Node Runtime
//!
//! Library half of the `orderer` binary, exposed for integration tests.
//!
//! - `config` - `ORDERER_*` environment configuration
//! - `genesis` - system chain block 0
//! - `node` - ledger, consenter and registry assembly

pub mod config;
pub mod genesis;
pub mod node;

pub use config::{ConfigError, LedgerType, OrdererConfig};
pub use genesis::{system_chain_config, system_genesis_block, GenesisError};
pub use node::{NodeError, OrdererNode};
