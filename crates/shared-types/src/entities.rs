//! # Core Domain Entities
//!
//! Defines the transaction-side entities that flow through the orderer.
//!
//! ## Clusters
//!
//! - **Transaction**: `Envelope`, `Payload`, `Header`, `ChannelHeader`, `SignatureHeader`
//! - **Provenance**: `Metadata`, `MetadataSignature`, `LastConfiguration`, `SignedData`

use crate::encoding::unmarshal;
use crate::errors::EncodingError;
use serde::{Deserialize, Serialize};

// =============================================================================
// CLUSTER A: TRANSACTIONS
// =============================================================================

/// A 32-byte hash (SHA-256).
pub type Hash = [u8; 32];

/// A 32-byte Ed25519 public key.
pub type PublicKey = [u8; 32];

/// The kind of transaction a payload carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeaderType {
    /// Ordinary application message.
    Message,
    /// Configuration update for the chain named in the header.
    ConfigTx,
    /// System chain transaction wrapping another envelope (chain creation).
    OrdererTransaction,
    /// Deliver request carrying an encoded seek.
    DeliverSeekInfo,
}

/// Chain-level routing information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelHeader {
    /// Transaction kind.
    pub header_type: HeaderType,
    /// Target chain.
    pub chain_id: String,
    /// Client-supplied creation time (unix seconds). Informational only.
    pub timestamp: u64,
}

/// Identifies the creator of a signature.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignatureHeader {
    /// Serialized identity of the signer (an Ed25519 public key).
    pub creator: Vec<u8>,
    /// Random bytes preventing signature reuse.
    pub nonce: Vec<u8>,
}

/// Combined header of a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub channel_header: ChannelHeader,
    pub signature_header: SignatureHeader,
}

/// The signed content of an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Routing and identity header. `None` only for malformed input.
    pub header: Option<Header>,
    /// Type-specific body.
    pub data: Vec<u8>,
}

impl Payload {
    /// Returns the header or `MissingHeader`.
    pub fn header(&self) -> Result<&Header, EncodingError> {
        self.header.as_ref().ok_or(EncodingError::MissingHeader)
    }

    /// Returns the target chain ID.
    pub fn chain_id(&self) -> Result<&str, EncodingError> {
        Ok(&self.header()?.channel_header.chain_id)
    }

    /// Returns the transaction kind.
    pub fn header_type(&self) -> Result<HeaderType, EncodingError> {
        Ok(self.header()?.channel_header.header_type)
    }
}

/// A signed client message submitted for ordering.
///
/// The payload is kept as the exact bytes that were signed. An envelope is
/// never mutated after it has been received.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Envelope {
    /// Canonically encoded `Payload`.
    pub payload: Vec<u8>,
    /// Creator's signature over `payload`.
    pub signature: Vec<u8>,
}

impl Envelope {
    /// Decode the payload.
    pub fn payload(&self) -> Result<Payload, EncodingError> {
        unmarshal(&self.payload)
    }

    /// An envelope without a payload carries nothing to order.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Size in bytes counted against batch limits.
    pub fn size(&self) -> usize {
        self.payload.len() + self.signature.len()
    }

    /// Build the `SignedData` view used by policy evaluation.
    pub fn as_signed_data(&self) -> Result<SignedData, EncodingError> {
        let payload = self.payload()?;
        let header = payload.header()?;
        Ok(SignedData {
            data: self.payload.clone(),
            identity: header.signature_header.creator.clone(),
            signature: self.signature.clone(),
        })
    }
}

/// A (data, identity, signature) triple evaluated by policies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedData {
    pub data: Vec<u8>,
    pub identity: Vec<u8>,
    pub signature: Vec<u8>,
}

// =============================================================================
// CLUSTER B: PROVENANCE
// =============================================================================

/// One signature over a metadata value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MetadataSignature {
    /// Encoded `SignatureHeader` of the signer.
    pub signature_header: Vec<u8>,
    /// Signature over `value || signature_header || block_header_bytes`.
    pub signature: Vec<u8>,
}

/// Content of a block metadata slot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub value: Vec<u8>,
    pub signatures: Vec<MetadataSignature>,
}

/// Value of the LAST_CONFIGURATION metadata slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LastConfiguration {
    /// Number of the most recent block carrying a configuration.
    pub index: u64,
}
