//! Error types for the dispatch module.

use thiserror::Error;

use crate::cache::CacheError;
use crate::resolver::ResolveError;

use super::{MAX_CHUNK_SIZE, MAX_WORKERS, MIN_CHUNK_SIZE, MIN_WORKERS};

/// Operational errors that abort a whole expansion run.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Invalid worker count provided.
    #[error("invalid worker count {value}: must be between {MIN_WORKERS} and {MAX_WORKERS}")]
    InvalidWorkerCount {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Invalid chunk size provided.
    #[error("invalid chunk size {value}: must be between {MIN_CHUNK_SIZE} and {MAX_CHUNK_SIZE}")]
    InvalidChunkSize {
        /// The invalid value that was provided.
        value: usize,
    },

    /// The cache file exists but could not be read.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Why a single work item produced no result.
#[derive(Debug, Clone, Error)]
pub enum DroppedReason {
    /// The resolver returned an error.
    #[error("resolver error: {0}")]
    Failed(#[source] ResolveError),

    /// The resolver panicked.
    #[error("resolver panicked: {0}")]
    Panicked(String),
}
