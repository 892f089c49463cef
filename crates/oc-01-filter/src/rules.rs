//! Rule and committer contracts, plus the two structural rules every
//! pipeline uses.

use shared_types::Envelope;

/// Outcome of evaluating one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Admit the envelope; stop evaluating.
    Accept,
    /// Drop the envelope; stop evaluating.
    Reject,
    /// Not this rule's concern; ask the next rule.
    Forward,
}

/// Side effect deferred until the envelope's block is written.
pub trait Committer: Send {
    /// Run the side effect. Consumes the committer.
    fn commit(self: Box<Self>);

    /// Isolated envelopes must be the only envelope in their block.
    fn isolated(&self) -> bool;
}

/// A single admission check.
pub trait Rule: Send + Sync {
    /// Evaluate `envelope`. A committer is only meaningful with `Action::Accept`.
    fn apply(&self, envelope: &Envelope) -> (Action, Option<Box<dyn Committer>>);

    /// Name used in rejection reasons and logs.
    fn name(&self) -> &'static str;

    /// True for a rule that decides on every envelope.
    fn is_catch_all(&self) -> bool {
        false
    }
}

/// Committer wrapping a closure.
pub struct FnCommitter<F>
where
    F: FnOnce() + Send,
{
    f: F,
    isolated: bool,
}

impl<F> FnCommitter<F>
where
    F: FnOnce() + Send,
{
    pub fn new(f: F) -> Self {
        Self { f, isolated: false }
    }

    pub fn new_isolated(f: F) -> Self {
        Self { f, isolated: true }
    }
}

impl<F> Committer for FnCommitter<F>
where
    F: FnOnce() + Send,
{
    fn commit(self: Box<Self>) {
        (self.f)()
    }

    fn isolated(&self) -> bool {
        self.isolated
    }
}

/// Rejects envelopes without a payload.
pub struct EmptyRejectRule;

impl Rule for EmptyRejectRule {
    fn apply(&self, envelope: &Envelope) -> (Action, Option<Box<dyn Committer>>) {
        if envelope.is_empty() {
            return (Action::Reject, None);
        }
        (Action::Forward, None)
    }

    fn name(&self) -> &'static str {
        "EmptyRejectRule"
    }
}

/// Accepts everything. Terminates every rule set.
pub struct AcceptRule;

impl Rule for AcceptRule {
    fn apply(&self, _envelope: &Envelope) -> (Action, Option<Box<dyn Committer>>) {
        (Action::Accept, None)
    }

    fn name(&self) -> &'static str {
        "AcceptRule"
    }

    fn is_catch_all(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_empty_reject() {
        let (action, committer) = EmptyRejectRule.apply(&Envelope::default());
        assert_eq!(action, Action::Reject);
        assert!(committer.is_none());

        let env = Envelope {
            payload: vec![1],
            signature: vec![],
        };
        assert_eq!(EmptyRejectRule.apply(&env).0, Action::Forward);
    }

    #[test]
    fn test_accept_rule_is_catch_all() {
        assert!(AcceptRule.is_catch_all());
        assert!(!EmptyRejectRule.is_catch_all());
        assert_eq!(AcceptRule.apply(&Envelope::default()).0, Action::Accept);
    }

    #[test]
    fn test_fn_committer_runs_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let committer: Box<dyn Committer> = Box::new(FnCommitter::new_isolated(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(committer.isolated());
        committer.commit();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
