//! Admission rule for configuration transactions.

use crate::error::ConfigTxError;
use crate::ports::ConfigTxManager;
use oc_01_filter::{Action, Committer, Rule};
use shared_types::{Envelope, HeaderType};
use std::sync::Arc;
use tracing::{debug, error};

/// Validates `ConfigTx` envelopes and defers their application to block write.
pub struct ConfigTxFilter {
    manager: Arc<dyn ConfigTxManager>,
}

impl ConfigTxFilter {
    pub fn new(manager: Arc<dyn ConfigTxManager>) -> Self {
        Self { manager }
    }
}

impl Rule for ConfigTxFilter {
    fn apply(&self, envelope: &Envelope) -> (Action, Option<Box<dyn Committer>>) {
        let header_type = match envelope.payload().and_then(|p| p.header_type()) {
            Ok(t) => t,
            Err(e) => {
                debug!(error = %e, "Rejecting envelope with unreadable header");
                return (Action::Reject, None);
            }
        };
        if header_type != HeaderType::ConfigTx {
            return (Action::Forward, None);
        }

        match self.manager.validate(envelope) {
            Ok(_) => (
                Action::Accept,
                Some(Box::new(ConfigTxCommitter {
                    manager: Arc::clone(&self.manager),
                    envelope: envelope.clone(),
                })),
            ),
            Err(e) => {
                debug!(
                    chain_id = %self.manager.chain_id(),
                    error = %e,
                    "Rejecting configuration transaction"
                );
                (Action::Reject, None)
            }
        }
    }

    fn name(&self) -> &'static str {
        "ConfigTxFilter"
    }
}

/// Applies a validated configuration transaction once its block is written.
pub struct ConfigTxCommitter {
    manager: Arc<dyn ConfigTxManager>,
    envelope: Envelope,
}

impl ConfigTxCommitter {
    pub fn new(manager: Arc<dyn ConfigTxManager>, envelope: Envelope) -> Self {
        Self { manager, envelope }
    }

    fn try_commit(&self) -> Result<(), ConfigTxError> {
        self.manager.apply(&self.envelope)
    }
}

impl Committer for ConfigTxCommitter {
    fn commit(self: Box<Self>) {
        // An update admitted concurrently with another may be stale by now
        if let Err(e) = self.try_commit() {
            error!(
                chain_id = %self.manager.chain_id(),
                error = %e,
                "Configuration transaction was ordered but could not be applied"
            );
        }
    }

    fn isolated(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::tests::{base_config, config_update};
    use crate::manager::ChainConfigManager;
    use shared_crypto::{create_signed_envelope, LocalSigner};

    fn setup() -> (LocalSigner, Arc<ChainConfigManager>, ConfigTxFilter) {
        let admin = LocalSigner::generate();
        let manager = Arc::new(ChainConfigManager::new(base_config(&admin)).unwrap());
        let filter = ConfigTxFilter::new(manager.clone());
        (admin, manager, filter)
    }

    #[test]
    fn test_forwards_normal_messages() {
        let (admin, _, filter) = setup();
        let env =
            create_signed_envelope(HeaderType::Message, "app", b"tx".to_vec(), &admin).unwrap();
        let (action, committer) = filter.apply(&env);
        assert_eq!(action, Action::Forward);
        assert!(committer.is_none());
    }

    #[test]
    fn test_rejects_garbage() {
        let (_, _, filter) = setup();
        let env = Envelope {
            payload: vec![0xff; 3],
            signature: vec![],
        };
        assert_eq!(filter.apply(&env).0, Action::Reject);
    }

    #[test]
    fn test_accepts_valid_update_and_applies_only_on_commit() {
        let (admin, manager, filter) = setup();
        let mut next = base_config(&admin);
        next.sequence = 1;
        let env = config_update(&next, &[&admin], &admin);

        let (action, committer) = filter.apply(&env);
        assert_eq!(action, Action::Accept);
        let committer = committer.expect("config tx carries a committer");
        assert!(committer.isolated());
        assert_eq!(manager.sequence(), 0);

        committer.commit();
        assert_eq!(manager.sequence(), 1);
    }

    #[test]
    fn test_stale_update_commit_leaves_config_unchanged() {
        let (admin, manager, filter) = setup();
        let mut next = base_config(&admin);
        next.sequence = 1;
        let first = config_update(&next, &[&admin], &admin);
        next.batch_timeout_ms = 42;
        let second = config_update(&next, &[&admin], &admin);

        // Both admitted against sequence 0
        let (_, c1) = filter.apply(&first);
        let (_, c2) = filter.apply(&second);
        c1.unwrap().commit();
        c2.unwrap().commit();

        assert_eq!(manager.sequence(), 1);
        assert_eq!(manager.chain_config().batch_timeout_ms, 500);
    }

    #[test]
    fn test_rejects_unauthorized_update() {
        let (admin, _, filter) = setup();
        let intruder = LocalSigner::generate();
        let mut next = base_config(&admin);
        next.sequence = 1;
        let env = config_update(&next, &[&intruder], &intruder);
        assert_eq!(filter.apply(&env).0, Action::Reject);
    }
}
