//! Error types for the [`source`](super) module.
//!
//! Uses [`exn`] for automatic location tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A track source error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for track source operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// No `beet` executable on `PATH`.
    #[display("beet executable not found")]
    QueryToolNotFound,
    /// The query tool could not be started.
    #[display("could not run query tool: {}", _0.display())]
    Spawn(#[error(not(source))] PathBuf),
    /// The query tool ran but reported failure.
    #[display("query `{_0}` failed: {_1}")]
    QueryFailed(#[error(not(source))] String, #[error(not(source))] String),
    /// A query string with unbalanced quotes or a dangling escape.
    #[display("malformed query: {_0}")]
    QuerySyntax(#[error(not(source))] String),
    /// Only `.m3u` and `.m3u8` playlists are understood.
    #[display("unsupported playlist format: {}", _0.display())]
    UnsupportedPlaylist(#[error(not(source))] PathBuf),
    #[display("could not read playlist: {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Spawn(_) | Self::Io(_))
    }
}
