//! # Error Types
//!
//! Errors raised while decoding or inspecting shared entities.

use thiserror::Error;

/// Errors that can occur while encoding or decoding shared entities.
#[derive(Debug, Clone, Error)]
pub enum EncodingError {
    /// Serialization failed.
    #[error("Failed to encode {what}: {reason}")]
    Encode { what: &'static str, reason: String },

    /// Deserialization failed.
    #[error("Failed to decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },

    /// A payload carried no header.
    #[error("Payload header is missing")]
    MissingHeader,

    /// A metadata slot was read but never written.
    #[error("Metadata slot {0} is empty")]
    EmptyMetadata(usize),
}
