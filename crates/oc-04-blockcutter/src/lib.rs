//! # oc-04-blockcutter
//!
//! Turns a stream of admitted envelopes into batches, one batch per block.
//!
//! ## Cutting rules
//!
//! ```text
//!  admitted ──→ size > absolute_max_bytes ? ──yes──→ dropped (warn)
//!                   │ no
//!                   ↓
//!              isolated committer or ──yes──→ [cut pending] + [envelope alone]
//!              size > preferred_max_bytes ?
//!                   │ no
//!                   ↓
//!              pending + size > preferred ? ──yes──→ [cut pending]
//!                   │
//!                   ↓
//!              append to pending; count == max_message_count ? ──yes──→ [cut]
//! ```
//!
//! The batch size is read from the chain's shared configuration on every
//! call, so an applied configuration update changes the next decision.
//! The timer-driven cut belongs to the consenter, which calls `cut()`.

pub mod batch;
pub mod cutter;

pub use batch::{AdmittedEnvelope, Batch};
pub use cutter::{BlockCutter, Receiver};
