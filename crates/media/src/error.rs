//! Media Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A media error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for media operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// No `ffmpeg` executable on `PATH`.
    #[display("ffmpeg executable not found")]
    TranscoderNotFound,
    /// The transcoder process could not be started or waited on.
    #[display("could not run transcoder: {}", _0.display())]
    Spawn(#[error(not(source))] PathBuf),
    /// Reading the source or writing the destination failed.
    #[display("I/O error: {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Spawn(_) | Self::Io(_))
    }
}
