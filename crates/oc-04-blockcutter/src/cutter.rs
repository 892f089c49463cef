use crate::batch::{AdmittedEnvelope, Batch};
use oc_02_chain_config::SharedConfigManager;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Batching collaborator driven by a chain's ordering loop.
pub trait Receiver: Send + Sync {
    /// Offer one admitted envelope.
    ///
    /// Returns the batches that are now complete, in order, and whether
    /// envelopes remain pending afterwards.
    fn ordered(&self, admitted: AdmittedEnvelope) -> (Vec<Batch>, bool);

    /// Cut whatever is pending (possibly nothing).
    fn cut(&self) -> Batch;

    /// Drop pending envelopes without cutting them.
    fn discard(&self) -> usize;
}

/// Size and count based cutter.
pub struct BlockCutter {
    shared: Arc<dyn SharedConfigManager>,
    pending: Mutex<Batch>,
}

impl BlockCutter {
    pub fn new(shared: Arc<dyn SharedConfigManager>) -> Self {
        Self {
            shared,
            pending: Mutex::new(Batch::default()),
        }
    }
}

impl Receiver for BlockCutter {
    fn ordered(&self, admitted: AdmittedEnvelope) -> (Vec<Batch>, bool) {
        let limits = self.shared.batch_size();
        let size = admitted.size();
        let mut pending = self.pending.lock();

        if size > limits.absolute_max_bytes as usize {
            warn!(
                size,
                limit = limits.absolute_max_bytes,
                "[oc-04] Dropping envelope larger than absolute max bytes"
            );
            return (Vec::new(), !pending.is_empty());
        }

        let mut batches = Vec::new();

        if admitted.is_isolated() || size > limits.preferred_max_bytes as usize {
            debug!(
                size,
                isolated = admitted.is_isolated(),
                "[oc-04] Envelope gets its own batch"
            );
            if !pending.is_empty() {
                batches.push(std::mem::take(&mut *pending));
            }
            batches.push(Batch::single(admitted));
            return (batches, false);
        }

        if !pending.is_empty() && pending.size() + size > limits.preferred_max_bytes as usize {
            debug!("[oc-04] Pending batch would overflow preferred max bytes, cutting");
            batches.push(std::mem::take(&mut *pending));
        }

        pending.push(admitted);

        if pending.len() >= limits.max_message_count as usize {
            batches.push(std::mem::take(&mut *pending));
        }

        (batches, !pending.is_empty())
    }

    fn cut(&self) -> Batch {
        std::mem::take(&mut *self.pending.lock())
    }

    fn discard(&self) -> usize {
        let dropped = std::mem::take(&mut *self.pending.lock());
        dropped.len()
    }
}
