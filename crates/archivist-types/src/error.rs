//! Unified error taxonomy for the indexing engine.

use thiserror::Error;

/// Errors surfaced by the indexing engine.
///
/// Every component of the engine reports through this single sum so that
/// callers can branch on the category rather than on wrapped concrete types.
/// Facades translate these variants to transport codes with a pure mapping.
#[derive(Error, Debug)]
pub enum IndexError {
    /// The upstream source has no record for the request yet. Always
    /// retriable; the state machine sleeps and retries on this variant.
    #[error("record not yet available upstream")]
    Unavailable,

    /// A malformed upstream or stored record (wrong-length digest,
    /// undecodable frame). Fatal.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The requested key is absent from the index.
    #[error("not found: {0}")]
    NotFound(String),

    /// An underlying store I/O or transaction failure. Fatal for the
    /// writer; returned to the caller for queries.
    #[error("store error: {0}")]
    Store(String),

    /// An engine invariant was violated. Fatal; includes context.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IndexError {
    /// Wrap a store-level failure.
    pub fn store(err: impl std::fmt::Display) -> Self {
        IndexError::Store(err.to_string())
    }

    /// Whether the error only signals that data has not arrived yet.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, IndexError::Unavailable)
    }
}

/// Result type for engine operations.
pub type IndexResult<T> = Result<T, IndexError>;
