//! Replicated consenter.
//!
//! Batches are cut locally first, then each candidate block must be endorsed
//! by a quorum of replicas before it is written.
//!
//! ## Quorum
//!
//! | Replicas (n) | Tolerated faults (f) | Quorum (2f+1) |
//! |--------------|----------------------|---------------|
//! | 1 | 0 | 1 |
//! | 4 | 1 | 3 |
//! | 7 | 2 | 5 |
//!
//! An endorsement is a replica's signature over `BlockHeader::bytes()`.
//! Only distinct, known replicas with a valid signature count. The accepted
//! endorsements are stored in the block's ORDERER metadata slot. A candidate
//! without a quorum is discarded together with its committers.

use crate::worker::{Sequencer, Worker};
use async_trait::async_trait;
use oc_04_blockcutter::{AdmittedEnvelope, Batch};
use oc_05_multichain::{Chain, ChainSupportResult, Consenter, ConsenterError, ConsenterSupport};
use serde::{Deserialize, Serialize};
use shared_crypto::{verify, LocalSigner, Signer};
use shared_types::{marshal, BlockHeader, BlockMetadataIndex, Metadata};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

pub const QUORUM: &str = shared_types::consensus_types::QUORUM;

/// One replica's signature over a candidate header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endorsement {
    pub replica: Vec<u8>,
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgreementError {
    #[error("Only {valid} valid endorsements, {required} required")]
    InsufficientEndorsements { valid: usize, required: usize },

    #[error("Replicas unreachable: {0}")]
    Unavailable(String),
}

/// Collects endorsements for candidate blocks.
#[async_trait]
pub trait Agreement: Send + Sync {
    async fn endorse(
        &self,
        chain_id: &str,
        header: &BlockHeader,
    ) -> Result<Vec<Endorsement>, AgreementError>;
}

/// Identities allowed to endorse.
#[derive(Debug, Clone)]
pub struct ReplicaSet {
    replicas: Vec<Vec<u8>>,
}

impl ReplicaSet {
    pub fn new(replicas: Vec<Vec<u8>>) -> Result<Self, ConsenterError> {
        if replicas.is_empty() {
            return Err(ConsenterError::InvalidConfig("replica set is empty".into()));
        }
        let distinct: HashSet<&Vec<u8>> = replicas.iter().collect();
        if distinct.len() != replicas.len() {
            return Err(ConsenterError::InvalidConfig(
                "replica set has duplicate identities".into(),
            ));
        }
        Ok(Self { replicas })
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    /// Faults tolerated by `n >= 3f + 1` replicas.
    pub fn max_faulty(&self) -> usize {
        self.replicas.len().saturating_sub(1) / 3
    }

    pub fn quorum(&self) -> usize {
        2 * self.max_faulty() + 1
    }

    /// Keep the endorsements that count towards the quorum, or fail if
    /// fewer than a quorum remain.
    pub fn check(
        &self,
        header: &BlockHeader,
        endorsements: Vec<Endorsement>,
    ) -> Result<Vec<Endorsement>, AgreementError> {
        let message = header.bytes();
        let mut seen = HashSet::new();
        let valid: Vec<Endorsement> = endorsements
            .into_iter()
            .filter(|e| {
                self.replicas.contains(&e.replica)
                    && verify(&e.replica, &message, &e.signature).is_ok()
                    && seen.insert(e.replica.clone())
            })
            .collect();

        let required = self.quorum();
        if valid.len() < required {
            return Err(AgreementError::InsufficientEndorsements {
                valid: valid.len(),
                required,
            });
        }
        Ok(valid)
    }
}

/// In-process replicas that endorse every candidate they are asked about.
pub struct LocalQuorum {
    replicas: Vec<LocalSigner>,
    responsive: AtomicUsize,
}

impl LocalQuorum {
    pub fn new(replicas: Vec<LocalSigner>) -> Self {
        let responsive = AtomicUsize::new(replicas.len());
        Self {
            replicas,
            responsive,
        }
    }

    /// `n` freshly generated replicas.
    pub fn generate(n: usize) -> Self {
        Self::new((0..n).map(|_| LocalSigner::generate()).collect())
    }

    pub fn identities(&self) -> Vec<Vec<u8>> {
        self.replicas.iter().map(LocalSigner::identity).collect()
    }

    /// Only the first `n` replicas answer from now on.
    pub fn set_responsive(&self, n: usize) {
        self.responsive.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl Agreement for LocalQuorum {
    async fn endorse(
        &self,
        _chain_id: &str,
        header: &BlockHeader,
    ) -> Result<Vec<Endorsement>, AgreementError> {
        let message = header.bytes();
        let n = self.responsive.load(Ordering::SeqCst);
        Ok(self
            .replicas
            .iter()
            .take(n)
            .map(|replica| Endorsement {
                replica: replica.identity(),
                signature: Signer::sign(replica, &message),
            })
            .collect())
    }
}

pub struct QuorumConsenter {
    agreement: Arc<dyn Agreement>,
    replicas: Arc<ReplicaSet>,
}

impl QuorumConsenter {
    pub fn new(agreement: Arc<dyn Agreement>, replicas: ReplicaSet) -> Self {
        Self {
            agreement,
            replicas: Arc::new(replicas),
        }
    }
}

impl Consenter for QuorumConsenter {
    fn handle_chain(
        &self,
        support: Arc<dyn ConsenterSupport>,
    ) -> Result<Box<dyn Chain>, ConsenterError> {
        if support.shared_config().batch_timeout().is_zero() {
            return Err(ConsenterError::Construction {
                chain_id: support.chain_id().to_string(),
                reason: "batch timeout must be positive".into(),
            });
        }
        let sequencer = Arc::new(Endorse {
            agreement: self.agreement.clone(),
            replicas: self.replicas.clone(),
        });
        Ok(Box::new(QuorumChain {
            worker: Worker::new(QUORUM, support, sequencer),
        }))
    }
}

struct Endorse {
    agreement: Arc<dyn Agreement>,
    replicas: Arc<ReplicaSet>,
}

#[async_trait]
impl Sequencer for Endorse {
    async fn sequence(
        &self,
        support: &dyn ConsenterSupport,
        batch: Batch,
    ) -> ChainSupportResult<()> {
        let (envelopes, committers) = batch.into_parts();
        let mut block = support.create_next_block(envelopes);
        let number = block.number();

        let endorsed = self
            .agreement
            .endorse(support.chain_id(), &block.header)
            .await
            .and_then(|endorsements| self.replicas.check(&block.header, endorsements));
        let endorsements = match endorsed {
            Ok(endorsements) => endorsements,
            Err(e) => {
                warn!(
                    chain_id = %support.chain_id(),
                    block = number,
                    discarded = committers.len(),
                    error = %e,
                    "[oc-06] No agreement, discarding batch"
                );
                return Ok(());
            }
        };

        let endorsed_by = endorsements.len();
        block.set_metadata(
            BlockMetadataIndex::Orderer,
            &Metadata {
                value: marshal(&endorsements)?,
                signatures: Vec::new(),
            },
        )?;
        support.write_block(block, committers)?;
        debug!(chain_id = %support.chain_id(), block = number, endorsed_by, "Quorum block written");
        Ok(())
    }
}

pub struct QuorumChain {
    worker: Worker,
}

#[async_trait]
impl Chain for QuorumChain {
    fn start(&self) {
        self.worker.start();
    }

    fn enqueue(&self, admitted: AdmittedEnvelope) -> bool {
        self.worker.enqueue(admitted)
    }

    async fn halt(&self) {
        self.worker.halt().await;
    }
}
