//! Block delivery from a position onward.

use crate::registry::MultiChainRegistry;
use oc_03_ledger::{BlockIterator, LedgerError, SeekPosition};
use serde::{Deserialize, Serialize};
use shared_crypto::{create_signed_envelope, CryptoError, Signer};
use shared_types::{marshal, unmarshal, Block, Envelope, HeaderType};
use tracing::debug;

/// First block to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeekStart {
    Oldest,
    Newest,
    Specified(u64),
}

impl From<SeekStart> for SeekPosition {
    fn from(start: SeekStart) -> Self {
        match start {
            SeekStart::Oldest => SeekPosition::Oldest,
            SeekStart::Newest => SeekPosition::Newest,
            SeekStart::Specified(n) => SeekPosition::Specified(n),
        }
    }
}

/// What to do when the requested block does not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeekBehavior {
    BlockUntilReady,
    FailIfNotReady,
}

/// Delivery request carried in a `DeliverSeekInfo` envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekInfo {
    pub start: SeekStart,
    /// Last block to deliver, inclusive. `None` streams forever.
    pub stop: Option<u64>,
    pub behavior: SeekBehavior,
}

/// Build a signed delivery request for `chain_id`.
pub fn seek_envelope(
    chain_id: &str,
    seek: &SeekInfo,
    signer: &dyn Signer,
) -> Result<Envelope, CryptoError> {
    create_signed_envelope(HeaderType::DeliverSeekInfo, chain_id, marshal(seek)?, signer)
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DeliverError {
    #[error("Bad deliver request: {0}")]
    BadRequest(String),

    #[error("Chain not found: {0}")]
    NotFound(String),

    #[error("Delivery from {chain_id} forbidden: {reason}")]
    Forbidden { chain_id: String, reason: String },

    #[error("Block {position} is not ready")]
    NotReady { position: u64 },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Opens block cursors on registered chains.
#[derive(Clone)]
pub struct DeliverHandler {
    registry: MultiChainRegistry,
}

impl DeliverHandler {
    pub fn new(registry: MultiChainRegistry) -> Self {
        Self { registry }
    }

    pub fn deliver(&self, request: &Envelope) -> Result<BlockCursor, DeliverError> {
        let bad = |e: &dyn std::fmt::Display| DeliverError::BadRequest(e.to_string());
        let payload = request.payload().map_err(|e| bad(&e))?;
        let header_type = payload.header_type().map_err(|e| bad(&e))?;
        if header_type != HeaderType::DeliverSeekInfo {
            return Err(DeliverError::BadRequest(format!(
                "expected a seek request, got {:?}",
                header_type
            )));
        }
        let chain_id = payload.chain_id().map_err(|e| bad(&e))?.to_string();
        let seek: SeekInfo = unmarshal(&payload.data).map_err(|e| bad(&e))?;

        let support = self
            .registry
            .get_chain(&chain_id)
            .ok_or_else(|| DeliverError::NotFound(chain_id.clone()))?;

        let forbidden = |reason: String| DeliverError::Forbidden {
            chain_id: chain_id.clone(),
            reason,
        };
        let egress = support.shared_config().egress_policy();
        if !egress.is_empty() {
            let policy = support
                .policy_manager()
                .get_policy(&egress)
                .ok_or_else(|| forbidden(format!("egress policy {} not found", egress)))?;
            let signed = request.as_signed_data().map_err(|e| bad(&e))?;
            policy
                .evaluate(&[signed])
                .map_err(|e| forbidden(e.to_string()))?;
        }

        if let (SeekStart::Specified(start), Some(stop)) = (seek.start, seek.stop) {
            if stop < start {
                return Err(DeliverError::BadRequest(format!(
                    "stop {} precedes start {}",
                    stop, start
                )));
            }
        }

        let iterator = BlockIterator::new(support.reader(), seek.start.into())?;
        debug!(
            chain_id = %chain_id,
            from = iterator.position(),
            stop = ?seek.stop,
            "Opened deliver cursor"
        );
        Ok(BlockCursor {
            iterator,
            stop: seek.stop,
            behavior: seek.behavior,
        })
    }
}

/// Ordered stream of committed blocks.
pub struct BlockCursor {
    iterator: BlockIterator,
    stop: Option<u64>,
    behavior: SeekBehavior,
}

impl BlockCursor {
    /// Number of the next block to be returned.
    pub fn position(&self) -> u64 {
        self.iterator.position()
    }

    /// Next block, or `None` once the stop block has been delivered.
    pub async fn next(&mut self) -> Result<Option<Block>, DeliverError> {
        if self.stop.is_some_and(|stop| self.iterator.position() > stop) {
            return Ok(None);
        }
        match self.behavior {
            SeekBehavior::FailIfNotReady => match self.iterator.try_next()? {
                Some(block) => Ok(Some(block)),
                None => Err(DeliverError::NotReady {
                    position: self.iterator.position(),
                }),
            },
            SeekBehavior::BlockUntilReady => Ok(Some(self.iterator.next().await?)),
        }
    }
}
