//! # Orderer
//!
//! Runs every chain of this node until Ctrl+C.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from `ORDERER_*` variables
//! 2. Open the ledgers
//! 3. Write the system chain genesis block (first start only)
//! 4. Recover every chain whose creation the system chain committed
//! 5. Start one consenter loop per chain
//! 6. Run until Ctrl+C, or exit non-zero once a chain fails to write a block

use anyhow::{anyhow, Context, Result};
use node_runtime::{OrdererConfig, OrdererNode};
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let config = OrdererConfig::from_env().context("Failed to load configuration")?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("===========================================");
    info!("  Orderer v{}", env!("CARGO_PKG_VERSION"));
    info!("  Ledger: {:?}  Consensus: {}", config.ledger_type, config.consensus_type);
    info!("===========================================");

    let node = OrdererNode::start(config).context("Failed to start orderer")?;

    info!("Orderer is running. Press Ctrl+C to stop.");
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            node.shutdown().await;
            Ok(())
        }
        fault = node.fatal() => {
            error!(chain_id = %fault.chain_id, block = fault.number, "💥 {}", fault);
            node.shutdown().await;
            Err(anyhow!(fault)).context("Orderer stopped after a failed block write")
        }
    }
}
