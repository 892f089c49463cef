//! Ledger adapters.

pub mod file;
pub mod ram;
