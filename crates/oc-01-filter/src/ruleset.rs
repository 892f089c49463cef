//! Ordered, immutable rule pipeline.

use crate::error::{FilterError, FilterResult};
use crate::rules::{Action, Committer, Rule};
use shared_types::Envelope;
use std::sync::Arc;
use tracing::debug;

/// Rules evaluated left to right; the first `Accept` or `Reject` wins.
#[derive(Clone)]
pub struct RuleSet {
    rules: Arc<[Arc<dyn Rule>]>,
}

impl RuleSet {
    /// Build a rule set. The last rule must be a catch-all.
    pub fn new(rules: Vec<Arc<dyn Rule>>) -> FilterResult<Self> {
        let last = rules.last().ok_or(FilterError::Empty)?;
        if !last.is_catch_all() {
            return Err(FilterError::MissingCatchAll {
                last: last.name().to_string(),
            });
        }
        Ok(Self { rules: rules.into() })
    }

    /// Evaluate `envelope`.
    ///
    /// Returns the accepting rule's committer (if any) on acceptance, or the
    /// name of the rejecting rule.
    pub fn apply(&self, envelope: &Envelope) -> FilterResult<Option<Box<dyn Committer>>> {
        for rule in self.rules.iter() {
            match rule.apply(envelope) {
                (Action::Accept, committer) => return Ok(committer),
                (Action::Reject, _) => {
                    debug!(rule = rule.name(), "Envelope rejected");
                    return Err(FilterError::Rejected {
                        rule: rule.name().to_string(),
                    });
                }
                (Action::Forward, _) => continue,
            }
        }
        Err(FilterError::NoDecision)
    }

    /// Names of the rules in evaluation order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{AcceptRule, EmptyRejectRule, FnCommitter};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed action and counts invocations.
    struct FixedRule {
        action: Action,
        calls: Arc<AtomicUsize>,
        with_committer: bool,
    }

    impl FixedRule {
        fn new(action: Action) -> (Arc<dyn Rule>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let rule: Arc<dyn Rule> = Arc::new(Self {
                action,
                calls: calls.clone(),
                with_committer: false,
            });
            (rule, calls)
        }
    }

    impl Rule for FixedRule {
        fn apply(&self, _envelope: &Envelope) -> (Action, Option<Box<dyn Committer>>) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let committer: Option<Box<dyn Committer>> = if self.with_committer {
                Some(Box::new(FnCommitter::new(|| {})))
            } else {
                None
            };
            (self.action, committer)
        }

        fn name(&self) -> &'static str {
            "FixedRule"
        }
    }

    fn env() -> Envelope {
        Envelope {
            payload: vec![1, 2, 3],
            signature: vec![],
        }
    }

    #[test]
    fn test_requires_catch_all() {
        let (forward, _) = FixedRule::new(Action::Forward);
        let rules: Vec<Arc<dyn Rule>> = vec![forward];
        let err = RuleSet::new(rules).err().unwrap();
        assert!(matches!(err, FilterError::MissingCatchAll { .. }));
        assert!(matches!(RuleSet::new(vec![]).err().unwrap(), FilterError::Empty));
    }

    #[test]
    fn test_reject_short_circuits() {
        let (reject, _) = FixedRule::new(Action::Reject);
        let (after, after_calls) = FixedRule::new(Action::Forward);
        let rules: Vec<Arc<dyn Rule>> = vec![reject, after, Arc::new(AcceptRule)];
        let rs = RuleSet::new(rules).unwrap();

        let err = rs.apply(&env()).err().unwrap();
        assert_eq!(
            err,
            FilterError::Rejected {
                rule: "FixedRule".into()
            }
        );
        assert_eq!(after_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_accept_is_final() {
        let calls = Arc::new(AtomicUsize::new(0));
        let accept: Arc<dyn Rule> = Arc::new(FixedRule {
            action: Action::Accept,
            calls: Arc::new(AtomicUsize::new(0)),
            with_committer: true,
        });
        let later: Arc<dyn Rule> = Arc::new(FixedRule {
            action: Action::Reject,
            calls: calls.clone(),
            with_committer: false,
        });
        let rules: Vec<Arc<dyn Rule>> = vec![accept, later, Arc::new(AcceptRule)];
        let rs = RuleSet::new(rules).unwrap();

        let committer = rs.apply(&env()).unwrap();
        assert!(committer.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_forward_reaches_catch_all() {
        let (forward, forward_calls) = FixedRule::new(Action::Forward);
        let rules: Vec<Arc<dyn Rule>> = vec![Arc::new(EmptyRejectRule), forward, Arc::new(AcceptRule)];
        let rs = RuleSet::new(rules).unwrap();

        assert!(rs.apply(&env()).unwrap().is_none());
        assert_eq!(forward_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            rs.rule_names(),
            vec!["EmptyRejectRule", "FixedRule", "AcceptRule"]
        );
    }

    #[test]
    fn test_empty_envelope_rejected_first() {
        let (forward, forward_calls) = FixedRule::new(Action::Forward);
        let rules: Vec<Arc<dyn Rule>> = vec![Arc::new(EmptyRejectRule), forward, Arc::new(AcceptRule)];
        let rs = RuleSet::new(rules).unwrap();

        assert!(rs.apply(&Envelope::default()).is_err());
        assert_eq!(forward_calls.load(Ordering::SeqCst), 0);
    }
}
