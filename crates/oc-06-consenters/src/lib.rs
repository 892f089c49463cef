//! # oc-06-consenters
//!
//! Ordering strategies selected by a chain's consensus type.
//!
//! | Type | Shape | Commit condition |
//! |------|-------|------------------|
//! | `solo` | order, then cut | batch cut by count, size or timer |
//! | `quorum` | cut, then order | 2f+1 replica endorsements of the header |
//!
//! Both run one tokio task per chain. `start` spawns it once, `enqueue` never
//! blocks, `halt` joins it and drops whatever was pending. A failed block
//! write stops the task and the chain refuses further envelopes.

pub mod quorum;
pub mod solo;
mod worker;

#[cfg(test)]
mod test_utils;

pub use quorum::{
    Agreement, AgreementError, Endorsement, LocalQuorum, QuorumChain, QuorumConsenter,
    ReplicaSet, QUORUM,
};
pub use solo::{SoloChain, SoloConsenter, SOLO};
