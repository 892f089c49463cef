//! Genesis block construction.

use shared_crypto::{create_signed_envelope, sign_config, CryptoError, LocalSigner, Signer};
use shared_types::{
    marshal, Block, BlockMetadataIndex, ChainConfig, EncodingError, Envelope, HeaderType,
    LastConfiguration, Metadata, ZERO_HASH,
};

/// Builds block 0 of a chain around its initial configuration transaction.
#[derive(Debug, Clone)]
pub struct GenesisBlockFactory {
    config_tx: Envelope,
}

impl GenesisBlockFactory {
    /// Use an existing `ConfigTx` envelope.
    pub fn new(config_tx: Envelope) -> Self {
        Self { config_tx }
    }

    /// Sign `config` with `signers` and wrap it in a `ConfigTx` submitted by
    /// `submitter`.
    pub fn from_config(
        config: &ChainConfig,
        signers: &[&LocalSigner],
        submitter: &dyn Signer,
    ) -> Result<Self, CryptoError> {
        let config_envelope = sign_config(config, signers)?;
        let config_tx = create_signed_envelope(
            HeaderType::ConfigTx,
            &config.chain_id,
            marshal(&config_envelope)?,
            submitter,
        )?;
        Ok(Self::new(config_tx))
    }

    pub fn config_tx(&self) -> &Envelope {
        &self.config_tx
    }

    /// The genesis block. LAST_CONFIGURATION points at itself and is unsigned.
    pub fn block(&self) -> Result<Block, EncodingError> {
        let mut block = Block::new(0, ZERO_HASH, vec![self.config_tx.clone()]);
        block.set_metadata(
            BlockMetadataIndex::LastConfiguration,
            &Metadata {
                value: marshal(&LastConfiguration { index: 0 })?,
                signatures: Vec::new(),
            },
        )?;
        Ok(block)
    }
}
