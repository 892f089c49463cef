//! Named signature policies.
//!
//! A policy decides whether a set of `SignedData` triples is sufficient. The
//! identity in each triple is a raw Ed25519 public key; a triple counts only
//! if its signature verifies.

use crate::error::PolicyError;
use crate::ports::PolicyManager;
use shared_crypto::verify;
use shared_types::{PolicyDefinition, PublicKey, SignedData};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Evaluates signed data against a rule.
pub trait Policy: Send + Sync {
    fn evaluate(&self, signed_data: &[SignedData]) -> Result<(), PolicyError>;
}

/// Policy compiled from a `PolicyDefinition`.
#[derive(Debug, Clone)]
pub enum SignaturePolicy {
    NOutOf { n: usize, identities: HashSet<PublicKey> },
    AnySignature,
    RejectAll,
}

impl SignaturePolicy {
    /// Compile a definition, rejecting thresholds that are meaningless.
    pub fn compile(name: &str, definition: &PolicyDefinition) -> Result<Self, PolicyError> {
        match definition {
            PolicyDefinition::NOutOf { n, identities } => {
                if *n == 0 {
                    return Err(PolicyError::InvalidDefinition {
                        name: name.to_string(),
                        reason: "threshold must be at least 1".into(),
                    });
                }
                let identities: HashSet<PublicKey> = identities.iter().copied().collect();
                if *n as usize > identities.len() {
                    return Err(PolicyError::InvalidDefinition {
                        name: name.to_string(),
                        reason: format!(
                            "threshold {} exceeds {} distinct identities",
                            n,
                            identities.len()
                        ),
                    });
                }
                Ok(Self::NOutOf {
                    n: *n as usize,
                    identities,
                })
            }
            PolicyDefinition::AnySignature => Ok(Self::AnySignature),
            PolicyDefinition::RejectAll => Ok(Self::RejectAll),
        }
    }
}

fn is_valid(sd: &SignedData) -> bool {
    verify(&sd.identity, &sd.data, &sd.signature).is_ok()
}

impl Policy for SignaturePolicy {
    fn evaluate(&self, signed_data: &[SignedData]) -> Result<(), PolicyError> {
        match self {
            Self::NOutOf { n, identities } => {
                let signers: HashSet<PublicKey> = signed_data
                    .iter()
                    .filter_map(|sd| {
                        let key: PublicKey = sd.identity.as_slice().try_into().ok()?;
                        (identities.contains(&key) && is_valid(sd)).then_some(key)
                    })
                    .collect();
                if signers.len() >= *n {
                    Ok(())
                } else {
                    Err(PolicyError::Unsatisfied {
                        valid: signers.len(),
                        required: *n,
                    })
                }
            }
            Self::AnySignature => {
                if signed_data.iter().any(is_valid) {
                    Ok(())
                } else {
                    Err(PolicyError::Unsatisfied {
                        valid: 0,
                        required: 1,
                    })
                }
            }
            Self::RejectAll => Err(PolicyError::RejectAll),
        }
    }
}

/// Immutable table of compiled policies.
#[derive(Clone, Default)]
pub struct PolicyRegistry {
    policies: HashMap<String, Arc<dyn Policy>>,
}

impl PolicyRegistry {
    /// Compile every definition of a configuration.
    pub fn from_definitions(
        definitions: &BTreeMap<String, PolicyDefinition>,
    ) -> Result<Self, PolicyError> {
        let mut policies: HashMap<String, Arc<dyn Policy>> = HashMap::new();
        for (name, definition) in definitions {
            let compiled = SignaturePolicy::compile(name, definition)?;
            policies.insert(name.clone(), Arc::new(compiled));
        }
        Ok(Self { policies })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.policies.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl PolicyManager for PolicyRegistry {
    fn get_policy(&self, name: &str) -> Option<Arc<dyn Policy>> {
        self.policies.get(name).cloned()
    }
}
