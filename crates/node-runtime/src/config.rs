//! # Node Configuration
//!
//! Defaults with `ORDERER_*` environment overrides.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `ORDERER_LOG_LEVEL` | `info` |
//! | `ORDERER_LEDGER_TYPE` | `file` (`ram` keeps blocks in memory) |
//! | `ORDERER_LEDGER_DIR` | `./data/ledger` |
//! | `ORDERER_RAM_MAX_BLOCKS` | `1000` |
//! | `ORDERER_SYSTEM_CHAIN` | `system-chain` |
//! | `ORDERER_CONSENSUS_TYPE` | `solo` |
//! | `ORDERER_BATCH_MAX_MESSAGES` | `10` |
//! | `ORDERER_BATCH_ABSOLUTE_MAX_BYTES` | `10485760` |
//! | `ORDERER_BATCH_PREFERRED_MAX_BYTES` | `524288` |
//! | `ORDERER_BATCH_TIMEOUT_MS` | `2000` |
//! | `ORDERER_SIGNER_SEED` | unset: ephemeral key |
//! | `ORDERER_ADMINS` | unset: comma separated hex public keys |
//! | `ORDERER_QUORUM_REPLICAS` | `4` |
//!
//! Only the system chain genesis uses the chain settings, and only when the
//! system chain ledger is empty.

use oc_03_ledger::check_chain_id;
use oc_06_consenters::{QUORUM, SOLO};
use shared_types::BatchSize;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::Level;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}={value} is not valid: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Unknown consensus type {0}, expected solo or quorum")]
    UnknownConsensusType(String),

    #[error("Invalid system chain ID: {0}")]
    InvalidChainId(String),

    #[error("Invalid batch settings: {0}")]
    InvalidBatch(String),

    #[error("Quorum consensus needs at least one replica")]
    NoReplicas,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerType {
    Ram,
    File,
}

impl FromStr for LedgerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ram" => Ok(Self::Ram),
            "file" => Ok(Self::File),
            other => Err(format!("unknown ledger type {}", other)),
        }
    }
}

/// Complete orderer configuration.
#[derive(Debug, Clone)]
pub struct OrdererConfig {
    pub log_level: Level,
    pub ledger_type: LedgerType,
    pub ledger_dir: PathBuf,
    pub ram_max_blocks: usize,
    pub system_chain_id: String,
    pub consensus_type: String,
    pub batch_size: BatchSize,
    pub batch_timeout_ms: u64,
    /// Seed of the orderer signing key.
    pub signer_seed: Option<[u8; 32]>,
    /// Extra administrators besides the orderer identity.
    pub admins: Vec<[u8; 32]>,
    pub quorum_replicas: usize,
}

impl Default for OrdererConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            ledger_type: LedgerType::File,
            ledger_dir: PathBuf::from("./data/ledger"),
            ram_max_blocks: 1000,
            system_chain_id: "system-chain".into(),
            consensus_type: SOLO.into(),
            batch_size: BatchSize::default(),
            batch_timeout_ms: 2000,
            signer_seed: None,
            admins: Vec::new(),
            quorum_replicas: 4,
        }
    }
}

fn parse<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        value,
        reason: e.to_string(),
    })
}

fn parse_key(key: &'static str, value: &str) -> Result<[u8; 32], ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason,
    };
    let bytes = hex::decode(value.trim()).map_err(|e| invalid(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| invalid(format!("expected 32 bytes, got {}", b.len())))
}

impl OrdererConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("ORDERER_LOG_LEVEL") {
            config.log_level = parse("ORDERER_LOG_LEVEL", v)?;
        }
        if let Some(v) = lookup("ORDERER_LEDGER_TYPE") {
            config.ledger_type = parse("ORDERER_LEDGER_TYPE", v)?;
        }
        if let Some(v) = lookup("ORDERER_LEDGER_DIR") {
            config.ledger_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("ORDERER_RAM_MAX_BLOCKS") {
            config.ram_max_blocks = parse("ORDERER_RAM_MAX_BLOCKS", v)?;
        }
        if let Some(v) = lookup("ORDERER_SYSTEM_CHAIN") {
            config.system_chain_id = v;
        }
        if let Some(v) = lookup("ORDERER_CONSENSUS_TYPE") {
            config.consensus_type = v.to_ascii_lowercase();
        }
        if let Some(v) = lookup("ORDERER_BATCH_MAX_MESSAGES") {
            config.batch_size.max_message_count = parse("ORDERER_BATCH_MAX_MESSAGES", v)?;
        }
        if let Some(v) = lookup("ORDERER_BATCH_ABSOLUTE_MAX_BYTES") {
            config.batch_size.absolute_max_bytes = parse("ORDERER_BATCH_ABSOLUTE_MAX_BYTES", v)?;
        }
        if let Some(v) = lookup("ORDERER_BATCH_PREFERRED_MAX_BYTES") {
            config.batch_size.preferred_max_bytes =
                parse("ORDERER_BATCH_PREFERRED_MAX_BYTES", v)?;
        }
        if let Some(v) = lookup("ORDERER_BATCH_TIMEOUT_MS") {
            config.batch_timeout_ms = parse("ORDERER_BATCH_TIMEOUT_MS", v)?;
        }
        if let Some(v) = lookup("ORDERER_SIGNER_SEED") {
            config.signer_seed = Some(parse_key("ORDERER_SIGNER_SEED", &v)?);
        }
        if let Some(v) = lookup("ORDERER_ADMINS") {
            config.admins = v
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| parse_key("ORDERER_ADMINS", s))
                .collect::<Result<_, _>>()?;
        }
        if let Some(v) = lookup("ORDERER_QUORUM_REPLICAS") {
            config.quorum_replicas = parse("ORDERER_QUORUM_REPLICAS", v)?;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.consensus_type != SOLO && self.consensus_type != QUORUM {
            return Err(ConfigError::UnknownConsensusType(
                self.consensus_type.clone(),
            ));
        }
        check_chain_id(&self.system_chain_id)
            .map_err(|e| ConfigError::InvalidChainId(e.to_string()))?;

        let batch = &self.batch_size;
        if batch.max_message_count == 0 {
            return Err(ConfigError::InvalidBatch(
                "max message count must be positive".into(),
            ));
        }
        if batch.preferred_max_bytes == 0 || batch.preferred_max_bytes > batch.absolute_max_bytes
        {
            return Err(ConfigError::InvalidBatch(format!(
                "preferred max bytes {} must be in 1..={}",
                batch.preferred_max_bytes, batch.absolute_max_bytes
            )));
        }
        if self.batch_timeout_ms == 0 {
            return Err(ConfigError::InvalidBatch("timeout must be positive".into()));
        }
        if self.quorum_replicas == 0 {
            return Err(ConfigError::NoReplicas);
        }
        Ok(())
    }
}
