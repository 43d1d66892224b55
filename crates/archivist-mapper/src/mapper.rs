//! Driver of the indexing state machine.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use archivist_chain::{Chain, Feeder};
use archivist_storage::{Reader, Writer};
use archivist_types::{IndexError, IndexResult};

use crate::config::Config;
use crate::state::{State, Status};
use crate::transitions::Transitions;

/// The indexing state machine, ready to run.
pub struct Mapper {
    transitions: Transitions,
    state: State,
    shutdown: watch::Receiver<bool>,
}

/// Handle to a running mapper.
pub struct MapperHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<IndexResult<()>>,
}

impl Mapper {
    /// Assemble a mapper from its collaborators.
    pub fn new(
        cfg: Config,
        chain: Arc<dyn Chain>,
        feed: Arc<dyn Feeder>,
        index: Writer,
        reader: Reader,
    ) -> (Self, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let transitions = Transitions::new(
            cfg,
            chain,
            feed,
            index,
            reader,
            shutdown_rx.clone(),
        );
        let mapper = Self {
            transitions,
            state: State::new(),
            shutdown: shutdown_rx,
        };
        (mapper, shutdown_tx)
    }

    /// Spawn the mapper onto the runtime and return its handle.
    pub fn spawn(
        cfg: Config,
        chain: Arc<dyn Chain>,
        feed: Arc<dyn Feeder>,
        index: Writer,
        reader: Reader,
    ) -> MapperHandle {
        let (mapper, shutdown) = Self::new(cfg, chain, feed, index, reader);
        let join = tokio::spawn(mapper.run());
        MapperHandle { shutdown, join }
    }

    /// Run the state machine until shutdown or a fatal error.
    ///
    /// On either outcome the writer is closed, committing the transaction
    /// being built and draining in-flight commits, so the last height
    /// reported by the index is an honest bound of what is durable.
    pub async fn run(mut self) -> IndexResult<()> {
        let result = self.run_inner().await;
        let closed = self.transitions.close().await;
        match result {
            Err(err) => {
                // The writer may hold more detail about the failure; it is
                // logged, the original error is what callers act on.
                if let Err(close_err) = closed {
                    error!(error = %close_err, "could not close index writer");
                }
                Err(err)
            }
            Ok(()) => closed,
        }
    }

    async fn run_inner(&mut self) -> IndexResult<()> {
        loop {
            if *self.shutdown.borrow() {
                info!("stopping indexing state machine");
                return Ok(());
            }
            let status = self.state.status;
            let result = match status {
                Status::Initialize => self.transitions.initialize(&mut self.state),
                Status::Bootstrap => self.transitions.bootstrap(&mut self.state),
                Status::Resume => self.transitions.resume(&mut self.state),
                Status::Index => self.transitions.index_chain(&mut self.state).await,
                Status::Update => self.transitions.update_tree(&mut self.state).await,
                Status::Collect => self.transitions.collect_registers(&mut self.state),
                Status::Map => self.transitions.map_registers(&mut self.state).await,
                Status::Forward => self.transitions.forward_height(&mut self.state).await,
            };
            match result {
                Ok(()) => continue,
                Err(err) => {
                    error!(status = ?status, error = %err, "state machine failed");
                    return Err(err);
                }
            }
        }
    }
}

impl MapperHandle {
    /// Signal the mapper to stop and wait for it to wind down.
    ///
    /// If the mapper does not finish within the deadline an error is
    /// logged and returned; heights reported as indexed before the call
    /// remain a valid upper bound of what is durable.
    pub async fn stop(self, deadline: Duration) -> IndexResult<()> {
        let _ = self.shutdown.send(true);
        match tokio::time::timeout(deadline, self.join).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(IndexError::Internal(format!(
                "indexer task panicked: {}",
                join_err
            ))),
            Err(_) => {
                error!(
                    deadline_ms = deadline.as_millis() as u64,
                    "indexer did not stop within deadline"
                );
                Err(IndexError::Internal(
                    "indexer did not stop within deadline".to_string(),
                ))
            }
        }
    }
}
