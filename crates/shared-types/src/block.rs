//! # Blocks
//!
//! A block is a ledger-numbered header, an ordered body of envelopes, and a
//! fixed array of metadata slots filled in on the write path.

use crate::encoding::{marshal, unmarshal};
use crate::entities::{Envelope, Hash, LastConfiguration, Metadata};
use crate::errors::EncodingError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hash of "no previous block".
pub const ZERO_HASH: Hash = [0u8; 32];

/// Metadata slots carried by every block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMetadataIndex {
    /// Orderer signature over the block header.
    Signatures = 0,
    /// Number of the latest configuration block, signed.
    LastConfiguration = 1,
    /// Reserved for committing peers.
    TransactionsFilter = 2,
    /// Reserved for consenter-specific data.
    Orderer = 3,
}

impl BlockMetadataIndex {
    /// Number of slots in `BlockMetadata`.
    pub const COUNT: usize = 4;
}

/// Positional part of a block, owned by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Position in the chain, starting at 0.
    pub number: u64,
    /// Hash of the previous block's header.
    pub previous_hash: Hash,
    /// Hash of this block's body.
    pub data_hash: Hash,
}

impl BlockHeader {
    /// Canonical bytes signed by provenance metadata.
    pub fn bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + 32 + 32);
        out.extend_from_slice(&self.number.to_be_bytes());
        out.extend_from_slice(&self.previous_hash);
        out.extend_from_slice(&self.data_hash);
        out
    }

    /// SHA-256 of `bytes()`; the next block's `previous_hash`.
    pub fn hash(&self) -> Hash {
        Sha256::digest(self.bytes()).into()
    }
}

/// Ordered envelopes of a block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockData {
    pub envelopes: Vec<Envelope>,
}

impl BlockData {
    /// Length-prefixed SHA-256 over every envelope in order.
    pub fn hash(&self) -> Hash {
        let mut h = Sha256::new();
        for env in &self.envelopes {
            h.update((env.payload.len() as u64).to_be_bytes());
            h.update(&env.payload);
            h.update((env.signature.len() as u64).to_be_bytes());
            h.update(&env.signature);
        }
        h.finalize().into()
    }
}

/// Fixed array of encoded `Metadata` values indexed by `BlockMetadataIndex`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMetadata {
    pub metadata: Vec<Vec<u8>>,
}

impl Default for BlockMetadata {
    fn default() -> Self {
        Self {
            metadata: vec![Vec::new(); BlockMetadataIndex::COUNT],
        }
    }
}

/// A block of ordered envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub data: BlockData,
    pub metadata: BlockMetadata,
}

impl Block {
    /// Create a block with the given position and body. Metadata starts empty.
    pub fn new(number: u64, previous_hash: Hash, envelopes: Vec<Envelope>) -> Self {
        let data = BlockData { envelopes };
        Self {
            header: BlockHeader {
                number,
                previous_hash,
                data_hash: data.hash(),
            },
            data,
            metadata: BlockMetadata::default(),
        }
    }

    /// Block number shortcut.
    pub fn number(&self) -> u64 {
        self.header.number
    }

    /// Raw bytes of a metadata slot (empty if unset).
    pub fn metadata_bytes(&self, index: BlockMetadataIndex) -> &[u8] {
        self.metadata
            .metadata
            .get(index as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Store an encoded `Metadata` in a slot.
    pub fn set_metadata(
        &mut self,
        index: BlockMetadataIndex,
        metadata: &Metadata,
    ) -> Result<(), EncodingError> {
        let encoded = marshal(metadata)?;
        let slots = &mut self.metadata.metadata;
        if slots.len() < BlockMetadataIndex::COUNT {
            slots.resize(BlockMetadataIndex::COUNT, Vec::new());
        }
        slots[index as usize] = encoded;
        Ok(())
    }

    /// Decode a metadata slot.
    pub fn metadata(&self, index: BlockMetadataIndex) -> Result<Metadata, EncodingError> {
        let bytes = self.metadata_bytes(index);
        if bytes.is_empty() {
            return Err(EncodingError::EmptyMetadata(index as usize));
        }
        unmarshal(bytes)
    }

    /// Index stored in LAST_CONFIGURATION.
    pub fn last_config_index(&self) -> Result<u64, EncodingError> {
        let metadata = self.metadata(BlockMetadataIndex::LastConfiguration)?;
        let value: LastConfiguration = unmarshal(&metadata.value)?;
        Ok(value.index)
    }
}
