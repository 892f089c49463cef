//! # Shared Crypto - Orderer Signing Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `signatures` | Ed25519 | Key pairs, verification of identities |
//! | `signer` | Ed25519 | Block provenance (`Signer` port) |
//! | `envelope` | Ed25519 | Building signed envelopes and config updates |
//!
//! ## Security Properties
//!
//! - **Ed25519**: Deterministic nonces, no RNG dependency for signing
//! - **Signature headers**: 24 random bytes of nonce per header
//! - Secret key material is zeroized on drop

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod envelope;
pub mod errors;
pub mod signatures;
pub mod signer;

// Re-exports
pub use envelope::{create_signed_envelope, sign_config};
pub use errors::CryptoError;
pub use signatures::{verify, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
pub use signer::{LocalSigner, Signer, NONCE_SIZE};
