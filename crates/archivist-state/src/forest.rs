//! Forest of trie snapshots between two finalized blocks.

use std::collections::HashMap;

use tracing::debug;

use archivist_types::{Commit, Path};

use crate::Trie;

/// A snapshot and the edge that produced it.
struct Snapshot {
    /// The trie at this commit.
    trie: Trie,
    /// Paths touched on the edge from `parent` to this commit.
    paths: Vec<Path>,
    /// Commit of the snapshot this one was derived from.
    parent: Commit,
}

/// The in-memory DAG of cached trie snapshots, keyed by state commitment.
///
/// The forest always holds a chain of commits from the last indexed block to
/// the trie currently being extended; everything else is pruned when the
/// state machine forwards to the next height.
#[derive(Default)]
pub struct Forest {
    snapshots: HashMap<Commit, Snapshot>,
}

impl Forest {
    /// Create an empty forest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a snapshot under its root hash.
    ///
    /// Saving a commit that is already present is a no-op: several execution
    /// chunks can legitimately produce the same commit.
    pub fn save(&mut self, trie: Trie, paths: Vec<Path>, parent: Commit) {
        let commit = trie.root_hash();
        self.save_as(commit, trie, paths, parent);
    }

    /// Record a snapshot under an explicit commit instead of the trie's own
    /// root hash.
    ///
    /// Used when resuming from a stored commitment whose trie contents are
    /// not materialized; the registers of later blocks are reconstructed
    /// from the trie updates applied on top of it.
    pub fn save_as(&mut self, commit: Commit, trie: Trie, paths: Vec<Path>, parent: Commit) {
        if self.snapshots.contains_key(&commit) {
            return;
        }
        debug!(
            commit = %hex::encode(commit),
            parent = %hex::encode(parent),
            paths = paths.len(),
            "saved snapshot to forest"
        );
        self.snapshots.insert(
            commit,
            Snapshot {
                trie,
                paths,
                parent,
            },
        );
    }

    /// Whether a snapshot exists for the commit.
    pub fn has(&self, commit: &Commit) -> bool {
        self.snapshots.contains_key(commit)
    }

    /// The trie stored at the commit.
    pub fn tree(&self, commit: &Commit) -> Option<&Trie> {
        self.snapshots.get(commit).map(|snapshot| &snapshot.trie)
    }

    /// The paths touched on the edge leading to the commit.
    pub fn paths(&self, commit: &Commit) -> Option<&[Path]> {
        self.snapshots
            .get(commit)
            .map(|snapshot| snapshot.paths.as_slice())
    }

    /// The parent commit of the snapshot at the commit.
    pub fn parent(&self, commit: &Commit) -> Option<Commit> {
        self.snapshots.get(commit).map(|snapshot| snapshot.parent)
    }

    /// Drop every snapshot except `keep`, which becomes the new root.
    ///
    /// This discards abandoned branches as well as `keep`'s own ancestors;
    /// their registers have been indexed and the tries are no longer needed.
    pub fn reset(&mut self, keep: Commit) {
        let kept = self.snapshots.remove(&keep);
        let dropped = self.snapshots.len();
        self.snapshots.clear();
        if let Some(snapshot) = kept {
            self.snapshots.insert(keep, snapshot);
        }
        debug!(
            keep = %hex::encode(keep),
            dropped,
            "reset forest"
        );
    }

    /// Number of cached snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether the forest holds no snapshots.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
