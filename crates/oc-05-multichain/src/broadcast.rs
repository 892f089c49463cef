//! Envelope submission.

use crate::metrics;
use crate::registry::MultiChainRegistry;
use oc_01_filter::FilterError;
use oc_04_blockcutter::AdmittedEnvelope;
use shared_types::Envelope;
use tracing::{debug, error, warn};

/// Outcome reported to a submitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastStatus {
    /// Admitted and handed to the chain's consenter.
    Success,
    /// Malformed or rejected by an admission rule.
    BadRequest,
    /// No chain with the envelope's chain ID.
    NotFound,
    /// The chain is halted or misconfigured.
    ServiceUnavailable,
}

/// Routes envelopes to their chain after running its admission rules.
///
/// Rules run on the caller's task, never on the chain's ordering loop.
#[derive(Clone)]
pub struct BroadcastHandler {
    registry: MultiChainRegistry,
}

impl BroadcastHandler {
    pub fn new(registry: MultiChainRegistry) -> Self {
        Self { registry }
    }

    pub fn handle(&self, envelope: Envelope) -> BroadcastStatus {
        let chain_id = match envelope.payload().and_then(|p| p.chain_id().map(str::to_string)) {
            Ok(id) => id,
            Err(e) => {
                debug!(error = %e, "Rejecting envelope with unreadable header");
                metrics::record_envelope_rejected("Malformed");
                return BroadcastStatus::BadRequest;
            }
        };

        let Some(support) = self.registry.get_chain(&chain_id) else {
            debug!(chain_id = %chain_id, "Rejecting envelope for unknown chain");
            return BroadcastStatus::NotFound;
        };

        match support.filters().apply(&envelope) {
            Ok(committer) => {
                if support.enqueue(AdmittedEnvelope::new(envelope, committer)) {
                    BroadcastStatus::Success
                } else {
                    warn!(chain_id = %chain_id, "Chain is not accepting envelopes");
                    BroadcastStatus::ServiceUnavailable
                }
            }
            Err(FilterError::Rejected { rule }) => {
                metrics::record_envelope_rejected(&rule);
                BroadcastStatus::BadRequest
            }
            Err(e) => {
                error!(chain_id = %chain_id, error = %e, "Admission rules reached no decision");
                BroadcastStatus::ServiceUnavailable
            }
        }
    }
}
