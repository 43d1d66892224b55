//! # archivist-mapper
//!
//! The indexing state machine of the archivist pipeline.
//!
//! The mapper correlates two asynchronous streams, the finalized protocol
//! data from the chain source and the execution-state trie updates from the
//! feeder, and turns them into index writes. It drives one height at a
//! time: fetch chain data, consume trie updates until the finalized
//! commitment is matched in the forest, collect the register deltas,
//! persist them, forward.

mod config;
mod mapper;
mod state;
mod transitions;

pub use config::Config;
pub use mapper::{Mapper, MapperHandle};
pub use state::{State, Status};
pub use transitions::Transitions;
