//! # Orderer Metrics
//!
//! Prometheus metrics for the ordering core.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! oc-05-multichain = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `orderer_blocks_written_total` - Counter of blocks appended (by chain)
//! - `orderer_envelopes_rejected_total` - Counter of rejected envelopes (by rule)
//! - `orderer_chains_created_total` - Counter of chains created at runtime

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Blocks appended, labeled by chain
    pub static ref BLOCKS_WRITTEN: IntCounterVec = register_int_counter_vec!(
        "orderer_blocks_written_total",
        "Total number of blocks written",
        &["chain_id"]
    )
    .expect("Failed to create BLOCKS_WRITTEN metric");

    /// Envelopes rejected at admission, labeled by rule
    pub static ref ENVELOPES_REJECTED: IntCounterVec = register_int_counter_vec!(
        "orderer_envelopes_rejected_total",
        "Total number of envelopes rejected at admission",
        &["rule"]
    )
    .expect("Failed to create ENVELOPES_REJECTED metric");

    /// Chains created through the system chain
    pub static ref CHAINS_CREATED: IntCounter = register_int_counter!(
        "orderer_chains_created_total",
        "Total number of chains created at runtime"
    )
    .expect("Failed to create CHAINS_CREATED metric");
}

/// Record a written block
#[cfg(feature = "metrics")]
pub fn record_block_written(chain_id: &str) {
    BLOCKS_WRITTEN.with_label_values(&[chain_id]).inc();
}

/// Record a rejected envelope
#[cfg(feature = "metrics")]
pub fn record_envelope_rejected(rule: &str) {
    ENVELOPES_REJECTED.with_label_values(&[rule]).inc();
}

/// Record a created chain
#[cfg(feature = "metrics")]
pub fn record_chain_created() {
    CHAINS_CREATED.inc();
}

// No-op implementations when metrics feature is disabled
#[cfg(not(feature = "metrics"))]
pub fn record_block_written(_chain_id: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_envelope_rejected(_rule: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_chain_created() {}
