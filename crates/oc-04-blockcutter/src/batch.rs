use oc_01_filter::Committer;
use shared_types::Envelope;
use std::fmt;

/// An envelope that passed the admission pipeline, with the committer its
/// accepting rule attached.
pub struct AdmittedEnvelope {
    pub envelope: Envelope,
    pub committer: Option<Box<dyn Committer>>,
}

impl AdmittedEnvelope {
    pub fn new(envelope: Envelope, committer: Option<Box<dyn Committer>>) -> Self {
        Self {
            envelope,
            committer,
        }
    }

    /// True if this envelope must be alone in its block.
    pub fn is_isolated(&self) -> bool {
        self.committer.as_ref().is_some_and(|c| c.isolated())
    }

    pub fn size(&self) -> usize {
        self.envelope.size()
    }
}

impl fmt::Debug for AdmittedEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmittedEnvelope")
            .field("size", &self.envelope.size())
            .field("has_committer", &self.committer.is_some())
            .finish()
    }
}

/// Envelopes of one future block and their committers, both in envelope order.
#[derive(Default)]
pub struct Batch {
    pub envelopes: Vec<Envelope>,
    pub committers: Vec<Box<dyn Committer>>,
}

impl Batch {
    pub fn push(&mut self, admitted: AdmittedEnvelope) {
        self.envelopes.push(admitted.envelope);
        if let Some(committer) = admitted.committer {
            self.committers.push(committer);
        }
    }

    pub fn single(admitted: AdmittedEnvelope) -> Self {
        let mut batch = Self::default();
        batch.push(admitted);
        batch
    }

    pub fn len(&self) -> usize {
        self.envelopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }

    /// Total bytes counted against batch limits.
    pub fn size(&self) -> usize {
        self.envelopes.iter().map(Envelope::size).sum()
    }

    pub fn into_parts(self) -> (Vec<Envelope>, Vec<Box<dyn Committer>>) {
        (self.envelopes, self.committers)
    }
}

impl fmt::Debug for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch")
            .field("envelopes", &self.envelopes.len())
            .field("committers", &self.committers.len())
            .finish()
    }
}
