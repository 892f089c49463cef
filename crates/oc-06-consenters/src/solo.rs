//! Single-node consenter.
//!
//! Envelopes are ordered by arrival on the chain's queue and cut by the
//! block cutter; every cut batch is written immediately.

use crate::worker::{Sequencer, Worker};
use async_trait::async_trait;
use oc_04_blockcutter::{AdmittedEnvelope, Batch};
use oc_05_multichain::{Chain, ChainSupportResult, Consenter, ConsenterError, ConsenterSupport};
use std::sync::Arc;
use tracing::debug;

pub const SOLO: &str = shared_types::consensus_types::SOLO;

#[derive(Debug, Default, Clone, Copy)]
pub struct SoloConsenter;

impl Consenter for SoloConsenter {
    fn handle_chain(
        &self,
        support: Arc<dyn ConsenterSupport>,
    ) -> Result<Box<dyn Chain>, ConsenterError> {
        if support.shared_config().batch_timeout().is_zero() {
            return Err(ConsenterError::Construction {
                chain_id: support.chain_id().to_string(),
                reason: "batch timeout must be positive".into(),
            });
        }
        Ok(Box::new(SoloChain {
            worker: Worker::new(SOLO, support, Arc::new(WriteThrough)),
        }))
    }
}

struct WriteThrough;

#[async_trait]
impl Sequencer for WriteThrough {
    async fn sequence(
        &self,
        support: &dyn ConsenterSupport,
        batch: Batch,
    ) -> ChainSupportResult<()> {
        let (envelopes, committers) = batch.into_parts();
        let block = support.create_next_block(envelopes);
        let block = support.write_block(block, committers)?;
        debug!(chain_id = %support.chain_id(), block = block.number(), "Solo block written");
        Ok(())
    }
}

pub struct SoloChain {
    worker: Worker,
}

#[async_trait]
impl Chain for SoloChain {
    fn start(&self) {
        self.worker.start();
    }

    fn enqueue(&self, admitted: AdmittedEnvelope) -> bool {
        self.worker.enqueue(admitted)
    }

    async fn halt(&self) {
        self.worker.halt().await;
    }
}
