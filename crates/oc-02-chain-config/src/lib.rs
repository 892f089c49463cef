//! # oc-02-chain-config
//!
//! Configuration and policy collaborators of a chain, and the two admission
//! rules that depend on them.
//!
//! ## Architecture
//!
//! ```text
//!                ┌──────────────────────────────┐
//! ConfigTx ────→ │ ChainConfigManager            │ ←── SigFilter (ingress policy)
//! envelopes      │  - ChainConfig snapshot        │
//!                │  - PolicyManager (named)       │ ←── ConfigTxFilter (validate)
//!                │  - sequence                    │
//!                └──────────────────────────────┘
//!                          ↑ apply()
//!                  ConfigTxCommitter (at block write)
//! ```
//!
//! The manager is read through three ports (`ConfigTxManager`,
//! `PolicyManager`, `SharedConfigManager`) so that rules and consenters see
//! only what they need.
//!
//! ## Invariants
//!
//! - The configuration sequence increases by exactly one per applied update.
//! - The consensus type never changes after chain construction.
//! - A configuration update is applied only by its committer, never by the
//!   admission rule that validated it.

pub mod configtx;
pub mod error;
pub mod manager;
pub mod policies;
pub mod ports;
pub mod sigfilter;

pub use configtx::{ConfigTxCommitter, ConfigTxFilter};
pub use error::{ConfigTxError, ConfigTxResult, PolicyError};
pub use manager::{parse_config_tx, ChainConfigManager, ParsedConfigTx};
pub use policies::{Policy, PolicyRegistry, SignaturePolicy};
pub use ports::{ConfigTxManager, PolicyManager, SharedConfigManager};
pub use sigfilter::SigFilter;
