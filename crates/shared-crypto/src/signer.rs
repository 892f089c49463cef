//! # Signer
//!
//! The `Signer` port produces signature headers and signatures. The orderer
//! uses it to stamp provenance metadata onto every block it writes.

use crate::signatures::{Ed25519KeyPair, Ed25519PublicKey};
use rand::RngCore;
use shared_types::SignatureHeader;

/// Bytes of randomness in every signature header.
pub const NONCE_SIZE: usize = 24;

/// Produces signature headers and signatures for one identity.
pub trait Signer: Send + Sync {
    /// A fresh header naming this signer with a new nonce.
    fn new_signature_header(&self) -> SignatureHeader;

    /// Sign arbitrary bytes.
    fn sign(&self, message: &[u8]) -> Vec<u8>;
}

/// Signer backed by an in-process Ed25519 key.
pub struct LocalSigner {
    keypair: Ed25519KeyPair,
}

impl LocalSigner {
    /// Signer with a freshly generated key.
    pub fn generate() -> Self {
        Self {
            keypair: Ed25519KeyPair::generate(),
        }
    }

    /// Signer with a key derived from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            keypair: Ed25519KeyPair::from_seed(seed),
        }
    }

    /// Public key used to verify this signer's output.
    pub fn public_key(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }

    /// Serialized identity written into signature headers.
    pub fn identity(&self) -> Vec<u8> {
        self.keypair.public_key().as_bytes().to_vec()
    }
}

impl Signer for LocalSigner {
    fn new_signature_header(&self) -> SignatureHeader {
        let mut nonce = vec![0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);
        SignatureHeader {
            creator: self.identity(),
            nonce,
        }
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.keypair.sign(message).as_bytes().to_vec()
    }
}
