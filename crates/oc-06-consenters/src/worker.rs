//! Ordering loop shared by the consenters.
//!
//! ```text
//!  enqueue ──→ mpsc ──→ ┌──────────── loop ────────────┐
//!                       │ shutdown? ──→ exit            │
//!                       │ envelope  ──→ cutter.ordered  │──→ Sequencer
//!                       │ deadline  ──→ cutter.cut      │
//!                       └───────────────────────────────┘
//! ```
//!
//! The deadline is armed when the cutter reports a pending batch and cleared
//! whenever a batch is cut. On exit the cutter's pending batch is discarded.

use async_trait::async_trait;
use oc_04_blockcutter::{AdmittedEnvelope, Batch};
use oc_05_multichain::{ChainSupportResult, ConsenterSupport};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

/// Turns one cut batch into a committed block.
#[async_trait]
pub(crate) trait Sequencer: Send + Sync + 'static {
    /// An error stops the chain.
    async fn sequence(&self, support: &dyn ConsenterSupport, batch: Batch)
        -> ChainSupportResult<()>;
}

pub(crate) struct Worker {
    name: &'static str,
    support: Arc<dyn ConsenterSupport>,
    sequencer: Arc<dyn Sequencer>,
    tx: mpsc::UnboundedSender<AdmittedEnvelope>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<AdmittedEnvelope>>>,
    shutdown: watch::Sender<bool>,
    halted: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    pub(crate) fn new(
        name: &'static str,
        support: Arc<dyn ConsenterSupport>,
        sequencer: Arc<dyn Sequencer>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown, _) = watch::channel(false);
        Self {
            name,
            support,
            sequencer,
            tx,
            rx: Mutex::new(Some(rx)),
            shutdown,
            halted: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    pub(crate) fn start(&self) {
        let chain_id = self.support.chain_id();
        if self.halted.load(Ordering::SeqCst) {
            warn!(chain_id = %chain_id, consenter = self.name, "[oc-06] Start after halt ignored");
            return;
        }
        let Some(rx) = self.rx.lock().take() else {
            warn!(chain_id = %chain_id, consenter = self.name, "[oc-06] Chain already started");
            return;
        };
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                error!(chain_id = %chain_id, error = %e, "[oc-06] No runtime to start chain on");
                self.halted.store(true, Ordering::SeqCst);
                return;
            }
        };

        let task = runtime.spawn(run(
            self.support.clone(),
            self.sequencer.clone(),
            rx,
            self.shutdown.subscribe(),
            self.halted.clone(),
        ));
        *self.task.lock() = Some(task);
        info!(chain_id = %chain_id, consenter = self.name, "[oc-06] ▶️ Chain started");
    }

    pub(crate) fn enqueue(&self, admitted: AdmittedEnvelope) -> bool {
        if self.halted.load(Ordering::SeqCst) {
            return false;
        }
        self.tx.send(admitted).is_ok()
    }

    pub(crate) async fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
        self.shutdown.send_replace(true);

        let task = self.task.lock().take();
        match task {
            Some(task) => {
                if let Err(e) = task.await {
                    error!(chain_id = %self.support.chain_id(), error = %e, "[oc-06] Chain loop panicked");
                }
            }
            None => {
                self.rx.lock().take();
                self.support.block_cutter().discard();
            }
        }
        info!(chain_id = %self.support.chain_id(), consenter = self.name, "[oc-06] ⏹️ Chain halted");
    }
}

async fn run(
    support: Arc<dyn ConsenterSupport>,
    sequencer: Arc<dyn Sequencer>,
    mut rx: mpsc::UnboundedReceiver<AdmittedEnvelope>,
    mut shutdown: watch::Receiver<bool>,
    halted: Arc<AtomicBool>,
) {
    let chain_id = support.chain_id().to_string();
    let mut deadline: Option<Instant> = None;

    'run: loop {
        let batches = tokio::select! {
            biased;
            _ = shutdown.changed() => break 'run,
            received = rx.recv() => {
                let Some(admitted) = received else { break 'run };
                let (batches, pending) = support.block_cutter().ordered(admitted);
                if !batches.is_empty() {
                    deadline = None;
                }
                if pending && deadline.is_none() {
                    deadline = Some(Instant::now() + support.shared_config().batch_timeout());
                }
                batches
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                let batch = support.block_cutter().cut();
                if batch.is_empty() {
                    Vec::new()
                } else {
                    debug!(chain_id = %chain_id, envelopes = batch.len(), "Batch timer expired");
                    vec![batch]
                }
            }
        };

        for batch in batches {
            if let Err(e) = sequencer.sequence(support.as_ref(), batch).await {
                error!(chain_id = %chain_id, error = %e, "[oc-06] Stopping chain after failed write");
                halted.store(true, Ordering::SeqCst);
                break 'run;
            }
        }
    }

    let dropped = support.block_cutter().discard();
    if dropped > 0 {
        warn!(chain_id = %chain_id, dropped, "[oc-06] Discarded pending envelopes");
    }
    debug!(chain_id = %chain_id, "Chain loop exited");
}
