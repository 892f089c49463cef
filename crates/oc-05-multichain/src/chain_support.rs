//! Per-chain facade.
//!
//! `ChainResources` is what a consenter sees: signer, block cutter, shared
//! configuration and the block write path. `ChainSupport` adds the running
//! `Chain` on top and is what the registry routes to.
//!
//! ## Provenance
//!
//! Every written block gets two signed metadata entries:
//!
//! | Slot | Value | Signed bytes |
//! |------|-------|--------------|
//! | SIGNATURES | empty | `value ‖ signature_header ‖ header.bytes()` |
//! | LAST_CONFIGURATION | `LastConfiguration { index }` | same layout |
//!
//! `index` moves to the block's own number only when the configuration
//! sequence grew since the previous block.

use crate::error::{ChainSupportError, ChainSupportResult};
use crate::metrics;
use crate::ports::{Chain, Consenter, ConsenterSupport};
use oc_01_filter::{Committer, RuleSet};
use oc_02_chain_config::{ChainConfigManager, ConfigTxManager, PolicyManager, SharedConfigManager};
use oc_03_ledger::{create_next_block, ReadWriter, Reader};
use oc_04_blockcutter::{AdmittedEnvelope, BlockCutter, Receiver};
use parking_lot::Mutex;
use shared_crypto::Signer;
use shared_types::{
    marshal, Block, BlockMetadataIndex, Envelope, LastConfiguration, Metadata,
    MetadataSignature, SignatureHeader,
};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Provenance {
    last_configuration: u64,
    last_config_seq: u64,
}

/// Resources backing one chain.
pub struct ChainResources {
    chain_id: String,
    config: Arc<ChainConfigManager>,
    filters: RuleSet,
    cutter: BlockCutter,
    ledger: Arc<dyn ReadWriter>,
    signer: Arc<dyn Signer>,
    provenance: Mutex<Provenance>,
    listener: Option<Weak<dyn AppendListener>>,
}

/// Told the outcome of every append on a chain, while the chain's write
/// lock is still held.
pub(crate) trait AppendListener: Send + Sync {
    fn appended(&self, chain_id: &str, number: u64);

    fn write_failed(&self, chain_id: &str, number: u64, error: &ChainSupportError);
}

impl ChainResources {
    /// Bind the collaborators of one chain.
    ///
    /// Provenance resumes from the ledger tip. A non-empty ledger whose tip
    /// has no readable LAST_CONFIGURATION is refused.
    pub fn new(
        config: Arc<ChainConfigManager>,
        filters: RuleSet,
        ledger: Arc<dyn ReadWriter>,
        signer: Arc<dyn Signer>,
    ) -> ChainSupportResult<Self> {
        let chain_id = ConfigTxManager::chain_id(config.as_ref());
        let sequence = config.sequence();

        let last_configuration = match ledger.height() {
            0 => 0,
            height => ledger
                .get_block(height - 1)
                .map_err(|e| e.to_string())
                .and_then(|tip| tip.last_config_index().map_err(|e| e.to_string()))
                .map_err(|reason| ChainSupportError::Provenance {
                    chain_id: chain_id.clone(),
                    reason: format!("tip block {}: {}", height - 1, reason),
                })?,
        };

        let shared: Arc<dyn SharedConfigManager> = config.clone();
        Ok(Self {
            chain_id,
            cutter: BlockCutter::new(shared),
            config,
            filters,
            ledger,
            signer,
            provenance: Mutex::new(Provenance {
                last_configuration,
                last_config_seq: sequence,
            }),
            listener: None,
        })
    }

    /// Report every append outcome of this chain to `listener`.
    pub(crate) fn with_listener(mut self, listener: Weak<dyn AppendListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    fn listener(&self) -> Option<Arc<dyn AppendListener>> {
        self.listener.as_ref().and_then(Weak::upgrade)
    }

    /// Block number holding the configuration in force.
    pub fn last_configuration(&self) -> u64 {
        self.provenance.lock().last_configuration
    }

    fn sign_metadata(&self, value: Vec<u8>, block: &Block) -> ChainSupportResult<Metadata> {
        let signature_header = marshal(&self.signer.new_signature_header())?;
        let mut signed = Vec::with_capacity(value.len() + signature_header.len() + 72);
        signed.extend_from_slice(&value);
        signed.extend_from_slice(&signature_header);
        signed.extend_from_slice(&block.header.bytes());
        let signature = self.signer.sign(&signed);
        Ok(Metadata {
            value,
            signatures: vec![MetadataSignature {
                signature_header,
                signature,
            }],
        })
    }

    fn add_block_signature(&self, block: &mut Block) -> ChainSupportResult<()> {
        // Only the signature matters for this slot
        let metadata = self.sign_metadata(Vec::new(), block)?;
        block.set_metadata(BlockMetadataIndex::Signatures, &metadata)?;
        Ok(())
    }

    fn add_last_config_signature(
        &self,
        block: &mut Block,
        current: Provenance,
    ) -> ChainSupportResult<Provenance> {
        let sequence = self.config.sequence();
        let next = if sequence > current.last_config_seq {
            Provenance {
                last_configuration: block.number(),
                last_config_seq: sequence,
            }
        } else {
            current
        };

        let value = marshal(&LastConfiguration {
            index: next.last_configuration,
        })?;
        let metadata = self.sign_metadata(value, block)?;
        block.set_metadata(BlockMetadataIndex::LastConfiguration, &metadata)?;
        Ok(next)
    }

    fn seal_and_append(
        &self,
        block: &mut Block,
        current: Provenance,
    ) -> ChainSupportResult<Provenance> {
        self.add_block_signature(block)?;
        let next = self.add_last_config_signature(block, current)?;
        self.ledger
            .append(block.clone())
            .map_err(|source| ChainSupportError::LedgerAppend {
                chain_id: self.chain_id.clone(),
                number: block.number(),
                source,
            })?;
        Ok(next)
    }
}

impl Signer for ChainResources {
    fn new_signature_header(&self) -> SignatureHeader {
        self.signer.new_signature_header()
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signer.sign(message)
    }
}

impl ConsenterSupport for ChainResources {
    fn chain_id(&self) -> &str {
        &self.chain_id
    }

    fn block_cutter(&self) -> &dyn Receiver {
        &self.cutter
    }

    fn shared_config(&self) -> Arc<dyn SharedConfigManager> {
        self.config.clone()
    }

    fn create_next_block(&self, envelopes: Vec<Envelope>) -> Block {
        create_next_block(self.ledger.as_ref(), envelopes)
    }

    fn write_block(
        &self,
        mut block: Block,
        committers: Vec<Box<dyn Committer>>,
    ) -> ChainSupportResult<Block> {
        let mut provenance = self.provenance.lock();

        for committer in committers {
            committer.commit();
        }

        let number = block.number();
        let next = match self.seal_and_append(&mut block, *provenance) {
            Ok(next) => next,
            Err(e) => {
                error!(
                    chain_id = %self.chain_id,
                    block = number,
                    error = %e,
                    "[oc-05] Could not write block"
                );
                if let Some(listener) = self.listener() {
                    listener.write_failed(&self.chain_id, number, &e);
                }
                return Err(e);
            }
        };
        *provenance = next;
        if let Some(listener) = self.listener() {
            listener.appended(&self.chain_id, number);
        }

        metrics::record_block_written(&self.chain_id);
        debug!(
            chain_id = %self.chain_id,
            block = number,
            envelopes = block.data.envelopes.len(),
            last_config = next.last_configuration,
            "[oc-05] Wrote block"
        );
        Ok(block)
    }

    fn height(&self) -> u64 {
        self.ledger.height()
    }
}

/// A chain's resources plus its running consenter chain.
pub struct ChainSupport {
    resources: Arc<ChainResources>,
    chain: Box<dyn Chain>,
}

impl ChainSupport {
    /// Bind `resources` to the consenter named by the chain's consensus type.
    pub fn new(
        resources: ChainResources,
        consenters: &HashMap<String, Arc<dyn Consenter>>,
    ) -> ChainSupportResult<Self> {
        let consensus_type = resources.config.consensus_type();
        let consenter = consenters
            .get(&consensus_type)
            .ok_or_else(|| ChainSupportError::UnknownConsensusType(consensus_type.clone()))?;

        let resources = Arc::new(resources);
        let support: Arc<dyn ConsenterSupport> = resources.clone();
        let chain = consenter.handle_chain(support)?;

        info!(
            chain_id = %resources.chain_id,
            consensus_type = %consensus_type,
            height = resources.ledger.height(),
            "[oc-05] Chain support ready"
        );
        Ok(Self { resources, chain })
    }

    pub fn chain_id(&self) -> &str {
        &self.resources.chain_id
    }

    pub fn start(&self) {
        self.chain.start();
    }

    /// Hand an admitted envelope to the consenter. False once halted.
    pub fn enqueue(&self, admitted: AdmittedEnvelope) -> bool {
        self.chain.enqueue(admitted)
    }

    pub async fn halt(&self) {
        self.chain.halt().await;
    }

    pub fn filters(&self) -> &RuleSet {
        &self.resources.filters
    }

    pub fn reader(&self) -> Arc<dyn Reader> {
        self.resources.ledger.clone().as_reader()
    }

    pub fn config_manager(&self) -> Arc<ChainConfigManager> {
        self.resources.config.clone()
    }

    pub fn policy_manager(&self) -> Arc<dyn PolicyManager> {
        self.resources.config.clone()
    }

    pub fn shared_config(&self) -> Arc<dyn SharedConfigManager> {
        self.resources.config.clone()
    }

    pub fn last_configuration(&self) -> u64 {
        self.resources.last_configuration()
    }

    pub fn support(&self) -> Arc<dyn ConsenterSupport> {
        self.resources.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genesis::GenesisBlockFactory;
    use crate::registry::standard_filters;
    use crate::test_utils::{app_config, ManualConsenter};
    use oc_01_filter::FnCommitter;
    use oc_03_ledger::{RamLedger, Writer};
    use shared_crypto::{verify, LocalSigner};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn resources(admin: &LocalSigner) -> (ChainResources, Arc<RamLedger>, Arc<LocalSigner>) {
        let config = app_config("app", admin);
        let genesis = GenesisBlockFactory::from_config(&config, &[admin], admin)
            .unwrap()
            .block()
            .unwrap();
        let ledger = Arc::new(RamLedger::new(100));
        ledger.append(genesis).unwrap();
        let manager = Arc::new(ChainConfigManager::new(config).unwrap());
        let filters = standard_filters(&manager).unwrap();
        let signer = Arc::new(LocalSigner::generate());
        let res = ChainResources::new(manager, filters, ledger.clone(), signer.clone()).unwrap();
        (res, ledger, signer)
    }

    fn envelope(b: u8) -> Envelope {
        Envelope {
            payload: vec![b; 8],
            signature: vec![],
        }
    }

    #[test]
    fn test_write_block_stamps_verifiable_signatures() {
        let admin = LocalSigner::generate();
        let (res, ledger, signer) = resources(&admin);

        let block = res.create_next_block(vec![envelope(1)]);
        let written = res.write_block(block, vec![]).unwrap();
        assert_eq!(ledger.height(), 2);

        for slot in [
            BlockMetadataIndex::Signatures,
            BlockMetadataIndex::LastConfiguration,
        ] {
            let metadata = written.metadata(slot).unwrap();
            assert_eq!(metadata.signatures.len(), 1);
            let sig = &metadata.signatures[0];
            let mut signed = metadata.value.clone();
            signed.extend_from_slice(&sig.signature_header);
            signed.extend_from_slice(&written.header.bytes());
            verify(&signer.identity(), &signed, &sig.signature).unwrap();
        }
        assert!(written
            .metadata(BlockMetadataIndex::Signatures)
            .unwrap()
            .value
            .is_empty());
        assert_eq!(written.last_config_index().unwrap(), 0);
    }

    #[test]
    fn test_committers_run_in_order_before_append() {
        let admin = LocalSigner::generate();
        let (res, ledger, _) = resources(&admin);
        let order = Arc::new(Mutex::new(Vec::new()));
        let heights = Arc::new(AtomicUsize::new(usize::MAX));

        let mut committers: Vec<Box<dyn Committer>> = Vec::new();
        for i in 0..3 {
            let order = order.clone();
            let heights = heights.clone();
            let ledger = ledger.clone();
            committers.push(Box::new(FnCommitter::new(move || {
                order.lock().push(i);
                heights.store(ledger.height() as usize, Ordering::SeqCst);
            })));
        }

        let block = res.create_next_block(vec![envelope(1), envelope(2), envelope(3)]);
        res.write_block(block, committers).unwrap();

        assert_eq!(*order.lock(), vec![0, 1, 2]);
        assert_eq!(heights.load(Ordering::SeqCst), 1, "committers ran before append");
    }

    #[test]
    fn test_append_failure_is_surfaced_and_counters_kept() {
        let admin = LocalSigner::generate();
        let (res, _, _) = resources(&admin);

        // Stale block number
        let stale = Block::new(0, [0u8; 32], vec![envelope(1)]);
        assert!(matches!(
            res.write_block(stale, vec![]),
            Err(ChainSupportError::LedgerAppend { number: 0, .. })
        ));
        assert_eq!(res.last_configuration(), 0);
    }

    #[test]
    fn test_tip_without_last_configuration_is_refused() {
        let admin = LocalSigner::generate();
        let (res, ledger, signer) = resources(&admin);

        // Appended around the chain support, so no metadata was stamped
        let bare = create_next_block(ledger.as_ref(), vec![envelope(1)]);
        ledger.append(bare).unwrap();

        let manager = res.config.clone();
        let filters = standard_filters(&manager).unwrap();
        let reopened = ChainResources::new(manager, filters, ledger.clone(), signer);
        assert!(matches!(
            reopened,
            Err(ChainSupportError::Provenance { chain_id, .. }) if chain_id == "app"
        ));
    }

    #[test]
    fn test_unknown_consensus_type_is_fatal() {
        let admin = LocalSigner::generate();
        let (res, _, _) = resources(&admin);
        let consenters: HashMap<String, Arc<dyn Consenter>> = HashMap::new();
        assert!(matches!(
            ChainSupport::new(res, &consenters),
            Err(ChainSupportError::UnknownConsensusType(t)) if t == "solo"
        ));
    }

    #[test]
    fn test_chain_support_delegates_enqueue() {
        let admin = LocalSigner::generate();
        let (res, _, _) = resources(&admin);
        let consenter = Arc::new(ManualConsenter::default());
        let mut consenters: HashMap<String, Arc<dyn Consenter>> = HashMap::new();
        consenters.insert("solo".into(), consenter.clone());

        let support = ChainSupport::new(res, &consenters).unwrap();
        assert!(support.enqueue(AdmittedEnvelope::new(envelope(1), None)));
        assert_eq!(consenter.queued(), 1);
    }
}
