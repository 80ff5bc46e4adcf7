//! Work Queue Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A work queue error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for work queue operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A pool needs at least one worker to make progress.
    #[display("worker count must be at least 1")]
    NoWorkers,
    /// The operating system refused to start a worker thread.
    #[display("could not spawn worker thread")]
    Spawn,
    /// Every worker has already stopped; the task was not accepted.
    #[display("work queue has been shut down")]
    ShutDown,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Spawn)
    }
}
