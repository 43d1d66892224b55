//! Mapper configuration.

use std::time::Duration;

use archivist_state::Trie;

/// Optional parameters of the indexing state machine.
#[derive(Clone)]
pub struct Config {
    /// Checkpoint trie to bootstrap from; without one the mapper resumes
    /// from the existing index.
    pub root_trie: Option<Trie>,
    /// Skip indexing the registers of the checkpoint itself.
    pub skip_bootstrap: bool,
    /// Skip register collection and payload indexing entirely.
    pub skip_registers: bool,
    /// How long to sleep when an upstream record is unavailable.
    pub wait_interval: Duration,
    /// Maximum registers flushed per mapping pass.
    pub map_batch: usize,
    /// Index state commitments.
    pub index_commit: bool,
    /// Index block headers and the block-id-to-height mapping.
    pub index_header: bool,
    /// Index collections.
    pub index_collections: bool,
    /// Index collection guarantees.
    pub index_guarantees: bool,
    /// Index transactions.
    pub index_transactions: bool,
    /// Index transaction results.
    pub index_results: bool,
    /// Index events.
    pub index_events: bool,
    /// Index register payloads.
    pub index_payloads: bool,
    /// Index seals.
    pub index_seals: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_trie: None,
            skip_bootstrap: false,
            skip_registers: false,
            wait_interval: Duration::from_millis(100),
            map_batch: 1000,
            index_commit: true,
            index_header: true,
            index_collections: true,
            index_guarantees: true,
            index_transactions: true,
            index_results: true,
            index_events: true,
            index_payloads: true,
            index_seals: true,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("root_trie", &self.root_trie.is_some())
            .field("skip_bootstrap", &self.skip_bootstrap)
            .field("skip_registers", &self.skip_registers)
            .field("wait_interval", &self.wait_interval)
            .field("map_batch", &self.map_batch)
            .finish()
    }
}
