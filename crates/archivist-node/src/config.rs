//! Node configuration.

use crate::Args;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Data directory holding the index database.
    pub data_dir: PathBuf,
    /// Height of the root block the index starts from.
    #[serde(default)]
    pub root_height: u64,
    /// Wait interval in milliseconds when upstream data is unavailable.
    #[serde(default = "default_wait_interval_ms")]
    pub wait_interval_ms: u64,
    /// Capacity of the upstream block and trie-update queues.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Maximum concurrent store transactions.
    #[serde(default = "default_concurrent_transactions")]
    pub concurrent_transactions: usize,
    /// Seconds granted to the indexer to wind down on shutdown.
    #[serde(default = "default_shutdown_deadline_secs")]
    pub shutdown_deadline_secs: u64,
    /// Which record kinds to index.
    #[serde(default)]
    pub index: IndexConfig,
}

fn default_wait_interval_ms() -> u64 {
    100
}

fn default_queue_capacity() -> usize {
    256
}

fn default_concurrent_transactions() -> usize {
    16
}

fn default_shutdown_deadline_secs() -> u64 {
    30
}

/// Per-record indexing toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Index state commitments.
    pub commits: bool,
    /// Index block headers.
    pub headers: bool,
    /// Index collections.
    pub collections: bool,
    /// Index collection guarantees.
    pub guarantees: bool,
    /// Index transactions.
    pub transactions: bool,
    /// Index transaction results.
    pub results: bool,
    /// Index events.
    pub events: bool,
    /// Index register payloads.
    pub payloads: bool,
    /// Index seals.
    pub seals: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            commits: true,
            headers: true,
            collections: true,
            guarantees: true,
            transactions: true,
            results: true,
            events: true,
            payloads: true,
            seals: true,
        }
    }
}

impl NodeConfig {
    /// Load configuration from file and CLI args.
    pub fn load(config_path: &Path, args: &Args) -> Result<Self> {
        let mut config = if config_path.exists() {
            let content =
                std::fs::read_to_string(config_path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            Self::default()
        };

        // Override with CLI args
        if let Some(ref data_dir) = args.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(root_height) = args.root_height {
            config.root_height = root_height;
        }
        if let Some(wait_interval_ms) = args.wait_interval_ms {
            config.wait_interval_ms = wait_interval_ms;
        }
        if let Some(concurrent) = args.concurrent_transactions {
            config.concurrent_transactions = concurrent;
        }
        if args.skip_registers {
            config.index.payloads = false;
        }

        Ok(config)
    }

    /// Save configuration to file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".archivist"),
            root_height: 0,
            wait_interval_ms: default_wait_interval_ms(),
            queue_capacity: default_queue_capacity(),
            concurrent_transactions: default_concurrent_transactions(),
            shutdown_deadline_secs: default_shutdown_deadline_secs(),
            index: IndexConfig::default(),
        }
    }
}
