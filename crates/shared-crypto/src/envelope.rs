//! # Envelope Construction
//!
//! Helpers that build signed envelopes and signed configuration updates.
//! Used by clients, by the genesis factory and throughout the test suites.

use crate::errors::CryptoError;
use crate::signer::{LocalSigner, Signer};
use shared_types::{
    marshal, ChainConfig, ChannelHeader, ConfigEnvelope, ConfigSignature, Envelope, Header,
    HeaderType, Payload,
};
use std::time::{SystemTime, UNIX_EPOCH};

/// Build a payload for `chain_id` and sign it with `signer`.
pub fn create_signed_envelope(
    header_type: HeaderType,
    chain_id: &str,
    data: Vec<u8>,
    signer: &dyn Signer,
) -> Result<Envelope, CryptoError> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let payload = Payload {
        header: Some(Header {
            channel_header: ChannelHeader {
                header_type,
                chain_id: chain_id.to_string(),
                timestamp,
            },
            signature_header: signer.new_signature_header(),
        }),
        data,
    };
    let payload = marshal(&payload)?;
    let signature = signer.sign(&payload);

    Ok(Envelope { payload, signature })
}

/// Encode `config` and collect a signature from every signer.
pub fn sign_config(
    config: &ChainConfig,
    signers: &[&LocalSigner],
) -> Result<ConfigEnvelope, CryptoError> {
    let encoded = marshal(config)?;
    let signatures = signers
        .iter()
        .map(|s| ConfigSignature {
            signer: *s.public_key().as_bytes(),
            signature: s.sign(&encoded),
        })
        .collect();

    Ok(ConfigEnvelope {
        config: encoded,
        signatures,
    })
}
