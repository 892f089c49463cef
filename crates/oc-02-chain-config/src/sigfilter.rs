//! Admission rule enforcing the chain's ingress policy.

use crate::ports::{PolicyManager, SharedConfigManager};
use oc_01_filter::{Action, Committer, Rule};
use shared_types::Envelope;
use std::sync::Arc;
use tracing::debug;

/// Rejects envelopes whose signature does not satisfy the ingress policy.
///
/// The policy name is looked up on every call so a configuration update that
/// changes the ingress policy takes effect for the next envelope.
pub struct SigFilter {
    shared: Arc<dyn SharedConfigManager>,
    policies: Arc<dyn PolicyManager>,
}

impl SigFilter {
    pub fn new(shared: Arc<dyn SharedConfigManager>, policies: Arc<dyn PolicyManager>) -> Self {
        Self { shared, policies }
    }
}

impl Rule for SigFilter {
    fn apply(&self, envelope: &Envelope) -> (Action, Option<Box<dyn Committer>>) {
        let signed_data = match envelope.as_signed_data() {
            Ok(sd) => sd,
            Err(e) => {
                debug!(error = %e, "Rejecting envelope without a signature header");
                return (Action::Reject, None);
            }
        };

        let name = self.shared.ingress_policy();
        let Some(policy) = self.policies.get_policy(&name) else {
            debug!(policy = %name, "Ingress policy not found");
            return (Action::Reject, None);
        };

        match policy.evaluate(&[signed_data]) {
            Ok(()) => (Action::Forward, None),
            Err(e) => {
                debug!(policy = %name, error = %e, "Envelope failed ingress policy");
                (Action::Reject, None)
            }
        }
    }

    fn name(&self) -> &'static str {
        "SigFilter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::tests::base_config;
    use crate::manager::ChainConfigManager;
    use shared_crypto::{create_signed_envelope, LocalSigner};
    use shared_types::{HeaderType, PolicyDefinition};

    fn filter_for(admin: &LocalSigner, writers: PolicyDefinition) -> SigFilter {
        let mut config = base_config(admin);
        config.policies.insert("Writers".into(), writers);
        let manager = Arc::new(ChainConfigManager::new(config).unwrap());
        SigFilter::new(manager.clone(), manager)
    }

    #[test]
    fn test_valid_signature_forwards() {
        let admin = LocalSigner::generate();
        let filter = filter_for(&admin, PolicyDefinition::AnySignature);
        let env =
            create_signed_envelope(HeaderType::Message, "app", b"tx".to_vec(), &admin).unwrap();
        assert_eq!(filter.apply(&env).0, Action::Forward);
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let admin = LocalSigner::generate();
        let filter = filter_for(&admin, PolicyDefinition::AnySignature);
        let mut env =
            create_signed_envelope(HeaderType::Message, "app", b"tx".to_vec(), &admin).unwrap();
        env.signature[0] ^= 0x01;
        assert_eq!(filter.apply(&env).0, Action::Reject);
    }

    #[test]
    fn test_reject_all_policy() {
        let admin = LocalSigner::generate();
        let filter = filter_for(&admin, PolicyDefinition::RejectAll);
        let env =
            create_signed_envelope(HeaderType::Message, "app", b"tx".to_vec(), &admin).unwrap();
        assert_eq!(filter.apply(&env).0, Action::Reject);
    }

    #[test]
    fn test_unsigned_envelope_rejected() {
        let admin = LocalSigner::generate();
        let filter = filter_for(&admin, PolicyDefinition::AnySignature);
        let env = Envelope {
            payload: vec![1, 2, 3],
            signature: vec![],
        };
        assert_eq!(filter.apply(&env).0, Action::Reject);
    }
}
