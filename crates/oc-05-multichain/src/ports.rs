//! Consenter ports.
//!
//! A `Consenter` turns the resources of one chain (`ConsenterSupport`) into a
//! running `Chain`. The chain owns the ordering loop: it feeds envelopes to
//! the block cutter, builds blocks with `create_next_block` and commits them
//! with `write_block`. Whether envelopes are ordered before or after cutting
//! is up to the implementation.

use crate::error::{ChainSupportResult, ConsenterError};
use async_trait::async_trait;
use oc_01_filter::Committer;
use oc_02_chain_config::SharedConfigManager;
use oc_04_blockcutter::{AdmittedEnvelope, Receiver};
use shared_crypto::Signer;
use shared_types::{Block, Envelope};
use std::sync::Arc;

/// Backing ordering mechanism, selected by consensus type.
pub trait Consenter: Send + Sync {
    /// Called once per chain per process. An error is fatal for the chain.
    fn handle_chain(
        &self,
        support: Arc<dyn ConsenterSupport>,
    ) -> Result<Box<dyn Chain>, ConsenterError>;
}

/// A running ordering instance for one chain.
#[async_trait]
pub trait Chain: Send + Sync {
    /// Start the ordering loop. Only the first call has an effect.
    fn start(&self);

    /// Hand off an admitted envelope. Returns false once halted.
    fn enqueue(&self, admitted: AdmittedEnvelope) -> bool;

    /// Stop the ordering loop and wait for it. Pending envelopes are dropped.
    async fn halt(&self);
}

/// Resources a consenter may use for one chain.
pub trait ConsenterSupport: Signer {
    fn chain_id(&self) -> &str;

    fn block_cutter(&self) -> &dyn Receiver;

    fn shared_config(&self) -> Arc<dyn SharedConfigManager>;

    /// Next block on top of the ledger tip. Nothing is appended.
    fn create_next_block(&self, envelopes: Vec<Envelope>) -> Block;

    /// Run committers, stamp provenance metadata and append.
    ///
    /// Must not be called concurrently for one chain. An error means the
    /// chain can no longer make progress.
    fn write_block(
        &self,
        block: Block,
        committers: Vec<Box<dyn Committer>>,
    ) -> ChainSupportResult<Block>;

    /// Current ledger height.
    fn height(&self) -> u64;
}
