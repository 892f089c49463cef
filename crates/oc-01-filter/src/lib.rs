//! # oc-01-filter
//!
//! Admission pipeline for envelopes entering a chain.
//!
//! ## Architecture
//!
//! A `RuleSet` is an ordered list of `Rule`s. Each rule inspects one envelope
//! and answers `Accept`, `Reject` or `Forward`:
//!
//! ```text
//! envelope ──→ [EmptyReject] ──Forward──→ [SigFilter] ──Forward──→ ... ──→ [Accept]
//!                   │                          │
//!                Reject                     Reject
//!                   ↓                          ↓
//!               (dropped)                  (dropped)
//! ```
//!
//! The first decisive answer wins. A rule that accepts may attach a
//! `Committer`: a side effect that runs only when the envelope's block is
//! actually written, never at admission time.
//!
//! ## Invariants
//!
//! - Every rule set ends with a catch-all rule (enforced at construction).
//! - Rules perform no I/O and never block.
//! - A committer is consumed by value, so it can run at most once.

pub mod error;
pub mod rules;
pub mod ruleset;

pub use error::{FilterError, FilterResult};
pub use rules::{AcceptRule, Action, Committer, EmptyRejectRule, FnCommitter, Rule};
pub use ruleset::RuleSet;
