//! Transition functions of the indexing state machine.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use archivist_chain::{Chain, Feeder};
use archivist_state::Trie;
use archivist_storage::{Reader, Writer};
use archivist_types::{IndexError, IndexResult, Path, DUMMY_COMMIT};

use crate::config::Config;
use crate::state::{State, Status};

/// Applies transitions onto the mapper state.
pub struct Transitions {
    cfg: Config,
    chain: Arc<dyn Chain>,
    feed: Arc<dyn Feeder>,
    index: Writer,
    reader: Reader,
    shutdown: watch::Receiver<bool>,
}

impl Transitions {
    /// Create the transition set from its collaborators.
    pub fn new(
        cfg: Config,
        chain: Arc<dyn Chain>,
        feed: Arc<dyn Feeder>,
        index: Writer,
        reader: Reader,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            cfg,
            chain,
            feed,
            index,
            reader,
            shutdown,
        }
    }

    /// Close the underlying writer, committing the final transaction and
    /// draining in-flight commits.
    pub async fn close(self) -> IndexResult<()> {
        self.index.close().await
    }

    /// Sleep for the configured wait interval, or until shutdown.
    async fn wait(&mut self) {
        let sleep = tokio::time::sleep(self.cfg.wait_interval);
        tokio::select! {
            _ = sleep => {}
            _ = self.shutdown.changed() => {}
        }
    }

    /// Decide whether to bootstrap a fresh index or resume a previous one.
    pub fn initialize(&mut self, s: &mut State) -> IndexResult<()> {
        if s.status != Status::Initialize {
            return Err(IndexError::Internal(format!(
                "invalid status for initializing mapper ({:?})",
                s.status
            )));
        }

        if self.cfg.root_trie.is_some() {
            info!("root trie found, bootstrapping index");
            s.status = Status::Bootstrap;
            return Ok(());
        }

        info!("no root trie found, resuming indexing");
        s.status = Status::Resume;
        Ok(())
    }

    /// Seed the forest from the checkpoint trie.
    pub fn bootstrap(&mut self, s: &mut State) -> IndexResult<()> {
        if s.status != Status::Bootstrap {
            return Err(IndexError::Internal(format!(
                "invalid status for bootstrapping state ({:?})",
                s.status
            )));
        }

        let tree = self.cfg.root_trie.clone().ok_or_else(|| {
            IndexError::Internal("no root trie available for bootstrapping index".to_string())
        })?;

        // The forest always needs one snapshot past the first finalized
        // block, used as the stopping point when collecting registers. An
        // empty trie with a sentinel parent plays that role.
        let empty = Trie::empty();
        let empty_commit = empty.root_hash();
        s.forest.save(empty, Vec::new(), DUMMY_COMMIT);
        s.last = DUMMY_COMMIT;
        s.next = empty_commit;

        info!(commit = %hex::encode(empty_commit), "added empty tree to forest");

        s.height = self.chain.root()?;

        // Recording every leaf path on the checkpoint edge makes the root
        // block index all checkpoint registers, unless that is skipped.
        let paths: Vec<Path> = if self.cfg.skip_bootstrap {
            Vec::new()
        } else {
            tree.leaves().into_iter().map(|(path, _)| path).collect()
        };
        let commit = tree.root_hash();
        let registers = paths.len();
        s.forest.save(tree, paths, empty_commit);

        info!(
            height = s.height,
            commit = %hex::encode(commit),
            registers,
            "added checkpoint tree to forest"
        );

        // No chain data for the root block has been indexed yet; proceed as
        // if the state had just forwarded to this height, so the chain data
        // indexing picks it up next.
        s.status = Status::Index;
        Ok(())
    }

    /// Resume indexing from the progress of a previous run.
    pub fn resume(&mut self, s: &mut State) -> IndexResult<()> {
        if s.status != Status::Resume {
            return Err(IndexError::Internal(format!(
                "invalid status for resuming indexing ({:?})",
                s.status
            )));
        }

        let last_height = match self.reader.last() {
            Ok(height) => height,
            Err(IndexError::NotFound(_)) => {
                return Err(IndexError::SchemaMismatch(
                    "no root trie and no previous index to resume from".to_string(),
                ));
            }
            Err(err) => return Err(err),
        };
        let commit = self.reader.commit(last_height)?;

        // The stored commitment becomes the forest root; register contents
        // of later blocks are reconstructed from the trie updates applied
        // on top of it.
        s.forest
            .save_as(commit, Trie::empty(), Vec::new(), DUMMY_COMMIT);
        s.last = DUMMY_COMMIT;
        s.next = commit;
        s.height = last_height + 1;
        s.first_flushed = self.reader.first().is_ok();

        info!(
            height = s.height,
            commit = %hex::encode(commit),
            "resuming indexing from previous run"
        );

        s.status = Status::Index;
        Ok(())
    }

    /// Fetch and persist the chain data of the current height.
    pub async fn index_chain(&mut self, s: &mut State) -> IndexResult<()> {
        if s.status != Status::Index {
            return Err(IndexError::Internal(format!(
                "invalid status for indexing chain ({:?})",
                s.status
            )));
        }

        // Retry until the next header becomes available; all data from the
        // protocol state is available after this point.
        let header = match self.chain.header(s.height) {
            Err(IndexError::Unavailable) => {
                debug!(height = s.height, "waiting for next header");
                self.wait().await;
                return Ok(());
            }
            result => result?,
        };
        let guarantees = self.chain.guarantees(s.height)?;
        let seals = self.chain.seals(s.height)?;

        // Index the consensus-side data right away; this can happen before
        // the full execution data becomes available.
        let block_id = header.id()?;
        if self.cfg.index_header {
            self.index.height_for_block(&block_id, s.height).await?;
            self.index.header(s.height, &header).await?;
        }
        if self.cfg.index_guarantees {
            self.index.guarantees(&guarantees).await?;
        }
        if self.cfg.index_seals {
            self.index.seals(s.height, &seals).await?;
        }

        // Retry until the commitment becomes available, at which point all
        // data from the execution state is available too.
        let commit = match self.chain.commit(s.height) {
            Err(IndexError::Unavailable) => {
                debug!(height = s.height, "waiting for next state commitment");
                self.wait().await;
                return Ok(());
            }
            result => result?,
        };
        let collections = self.chain.collections(s.height)?;
        let transactions = self.chain.transactions(s.height)?;
        let results = self.chain.results(s.height)?;
        let events = self.chain.events(s.height)?;

        if self.cfg.index_commit {
            self.index.commit(s.height, &commit).await?;
        }
        if self.cfg.index_collections {
            self.index.collections(s.height, &collections).await?;
        }
        if self.cfg.index_transactions {
            self.index.transactions(s.height, &transactions).await?;
        }
        if self.cfg.index_results {
            self.index.results(&results).await?;
        }
        if self.cfg.index_events {
            self.index.events(s.height, &events).await?;
        }

        // Forward `last` to the commitment of the previously indexed block
        // and make the just-retrieved commitment the new target; it tells
        // the update step when enough trie updates have been consumed.
        s.last = s.next;
        s.next = commit;

        info!(height = s.height, "indexed blockchain data for finalized block");

        s.status = Status::Update;
        Ok(())
    }

    /// Apply trie updates until the target commitment is in the forest.
    pub async fn update_tree(&mut self, s: &mut State) -> IndexResult<()> {
        if s.status != Status::Update {
            return Err(IndexError::Internal(format!(
                "invalid status for updating tree ({:?})",
                s.status
            )));
        }

        // Once the forest holds a trie for the target commitment, register
        // collection can start.
        if s.forest.has(&s.next) {
            info!(
                height = s.height,
                commit = %hex::encode(s.next),
                "matched commit of finalized block"
            );
            s.status = Status::Collect;
            return Ok(());
        }

        let update = match self.feed.update() {
            Err(IndexError::Unavailable) => {
                debug!(height = s.height, "waiting for next trie update");
                self.wait().await;
                return Ok(());
            }
            result => result?,
        };

        // Updates whose parent is unknown belong to a pruned branch of the
        // execution forest and are skipped.
        let parent = update.root;
        let tree = match s.forest.tree(&parent) {
            Some(tree) => tree.clone(),
            None => {
                warn!(
                    commit = %hex::encode(parent),
                    "state commitment mismatch, discarding trie update"
                );
                return Ok(());
            }
        };

        let child = tree.with_updates(&update.paths, &update.payloads)?;
        let commit = child.root_hash();
        s.forest.save(child, update.paths.clone(), parent);

        info!(
            commit = %hex::encode(commit),
            registers = update.paths.len(),
            "updated tree with register payloads"
        );
        Ok(())
    }

    /// Collect the registers touched between the last two finalized blocks.
    pub fn collect_registers(&mut self, s: &mut State) -> IndexResult<()> {
        if s.status != Status::Collect {
            return Err(IndexError::Internal(format!(
                "invalid status for collecting registers ({:?})",
                s.status
            )));
        }

        if self.cfg.skip_registers || !self.cfg.index_payloads {
            s.status = Status::Forward;
            return Ok(());
        }

        // Step back from the tree of the block being indexed up to the tree
        // of the last indexed block. Iterating backwards, the first payload
        // seen for a path is the most recent one, so later (older)
        // occurrences are skipped.
        let mut commit = s.next;
        while commit != s.last {
            let tree = s.forest.tree(&commit).ok_or_else(|| {
                IndexError::Internal(format!(
                    "could not load tree (commit: {})",
                    hex::encode(commit)
                ))
            })?;
            let paths = s.forest.paths(&commit).unwrap_or_default().to_vec();
            let batch = paths.len();
            for path in paths {
                if s.registers.contains_key(&path) {
                    continue;
                }
                let payload = tree.read(&path).ok_or_else(|| {
                    IndexError::Internal(format!(
                        "could not read path from tree (path: {})",
                        hex::encode(path)
                    ))
                })?;
                s.registers.insert(path, payload.clone());
            }

            debug!(height = s.height, batch, "collected register batch for finalized block");

            commit = s.forest.parent(&commit).ok_or_else(|| {
                IndexError::Internal(format!(
                    "could not load parent (commit: {})",
                    hex::encode(commit)
                ))
            })?;
        }

        info!(
            height = s.height,
            registers = s.registers.len(),
            "collected all registers for finalized block"
        );

        s.status = Status::Map;
        Ok(())
    }

    /// Persist one batch of collected registers.
    pub async fn map_registers(&mut self, s: &mut State) -> IndexResult<()> {
        if s.status != Status::Map {
            return Err(IndexError::Internal(format!(
                "invalid status for mapping registers ({:?})",
                s.status
            )));
        }

        if s.registers.is_empty() {
            info!(height = s.height, "indexed all registers for finalized block");
            s.status = Status::Forward;
            return Ok(());
        }

        // Flush a bounded batch per pass, so the state machine loop stays
        // responsive between flushes.
        let batch: Vec<Path> = s
            .registers
            .keys()
            .take(self.cfg.map_batch)
            .copied()
            .collect();
        let mut paths = Vec::with_capacity(batch.len());
        let mut payloads = Vec::with_capacity(batch.len());
        for path in batch {
            if let Some(payload) = s.registers.remove(&path) {
                paths.push(path);
                payloads.push(payload);
            }
        }
        self.index.payloads(s.height, &paths, &payloads).await?;

        debug!(
            height = s.height,
            batch = paths.len(),
            remaining = s.registers.len(),
            "indexed register batch for finalized block"
        );
        Ok(())
    }

    /// Record progress and advance to the next height.
    pub async fn forward_height(&mut self, s: &mut State) -> IndexResult<()> {
        if s.status != Status::Forward {
            return Err(IndexError::Internal(format!(
                "invalid status for forwarding height ({:?})",
                s.status
            )));
        }

        if !s.first_flushed {
            self.index.first(s.height).await?;
            s.first_flushed = true;
        }
        self.index.last(s.height).await?;

        // The forest only needs the tree of the block just indexed from
        // here on; everything else is released.
        s.height += 1;
        s.forest.reset(s.next);

        info!(height = s.height, "forwarded finalized block to next height");

        s.status = Status::Index;
        Ok(())
    }
}
