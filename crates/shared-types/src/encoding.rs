//! # Canonical Encoding
//!
//! All structured values that get signed or hashed are encoded with bincode so
//! that two nodes produce identical bytes for identical values.

use crate::errors::EncodingError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode a value into its canonical byte form.
pub fn marshal<T: Serialize>(value: &T) -> Result<Vec<u8>, EncodingError> {
    bincode::serialize(value).map_err(|e| EncodingError::Encode {
        what: std::any::type_name::<T>(),
        reason: e.to_string(),
    })
}

/// Decode a value from its canonical byte form.
pub fn unmarshal<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, EncodingError> {
    bincode::deserialize(bytes).map_err(|e| EncodingError::Decode {
        what: std::any::type_name::<T>(),
        reason: e.to_string(),
    })
}
