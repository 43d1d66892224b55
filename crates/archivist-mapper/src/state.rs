//! Mapper state.

use std::collections::HashMap;

use archivist_state::Forest;
use archivist_types::{Commit, Height, Path, Payload, DUMMY_COMMIT};

/// The step the state machine is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Decide between bootstrapping and resuming.
    Initialize,
    /// Seed the forest from the checkpoint trie.
    Bootstrap,
    /// Re-read the progress of a previous run.
    Resume,
    /// Fetch and persist the chain data of the current height.
    Index,
    /// Consume trie updates until the finalized commitment is matched.
    Update,
    /// Collect the register deltas between the last two finalized blocks.
    Collect,
    /// Persist collected registers in batches.
    Map,
    /// Record progress and advance to the next height.
    Forward,
}

/// Mutable state of the indexing state machine.
pub struct State {
    /// Current step.
    pub status: Status,
    /// Height currently being indexed.
    pub height: Height,
    /// Commitment of the previously indexed finalized block.
    pub last: Commit,
    /// Commitment of the finalized block being indexed.
    pub next: Commit,
    /// Cached trie snapshots between `last` and `next`.
    pub forest: Forest,
    /// Registers collected for the current height, by path.
    pub registers: HashMap<Path, Payload>,
    /// Whether the first indexed height has been persisted.
    pub first_flushed: bool,
}

impl State {
    /// Fresh state, ready for initialization.
    pub fn new() -> Self {
        Self {
            status: Status::Initialize,
            height: 0,
            last: DUMMY_COMMIT,
            next: DUMMY_COMMIT,
            forest: Forest::new(),
            registers: HashMap::new(),
            first_flushed: false,
        }
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}
