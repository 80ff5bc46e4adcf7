//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// ### Precondition Errors
/// - [`ErrorKind::Unnumbered`]
/// - [`ErrorKind::AlreadyNumbered`]
///
/// ### Operational Errors
/// - [`ErrorKind::Unexpected`]
/// - [`ErrorKind::Io`]
/// - [`ErrorKind::Transcode`]
/// - [`ErrorKind::Queue`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A destination was requested before the owning disc was numbered.
    #[display("track has no destination yet: {}", _0.display())]
    Unnumbered(#[error(not(source))] PathBuf),
    /// Numbering is one-shot per folder and per disc.
    #[display("already numbered: {_0}")]
    AlreadyNumbered(#[error(not(source))] String),
    /// Something other than a regular file, symlink or expected directory
    /// sits where cdman manages output.
    #[display("unexpected filesystem entry: {}", _0.display())]
    Unexpected(#[error(not(source))] PathBuf),
    #[display("I/O error: {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    /// The transcoder could not be run at all.
    #[display("could not transcode: {}", _0.display())]
    Transcode(#[error(not(source))] PathBuf),
    /// Work could not be handed to the queue.
    #[display("could not schedule work")]
    Queue,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Transcode(_))
    }
}
