//! # Shared Types Crate
//!
//! This crate contains the wire-level entities every ordering crate agrees on:
//! the client `Envelope`, the committed `Block` with its metadata slots, and the
//! `ChainConfig` carried by configuration transactions.
//!
//! ## Design Principles
//!
//! - **Opaque payloads**: an `Envelope` keeps its payload as the exact signed
//!   bytes; decoding is always a separate, fallible step.
//! - **Ledger-owned headers**: block number and hash linkage are produced by the
//!   ledger, never by consenters.
//! - **Typed metadata slots**: `BlockMetadataIndex` names every slot so that
//!   provenance stamping cannot write to the wrong index.

pub mod block;
pub mod config;
pub mod encoding;
pub mod entities;
pub mod errors;

pub use block::*;
pub use config::*;
pub use encoding::{marshal, unmarshal};
pub use entities::*;
pub use errors::*;
