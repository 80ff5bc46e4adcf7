//! Config Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Merging or extracting configuration sources failed.
    #[display("could not load configuration")]
    Load,
    /// A value parsed but is out of range.
    #[display("invalid configuration value for `{_0}`: {_1}")]
    Invalid(#[error(not(source))] &'static str, #[error(not(source))] String),
    /// A disc definition file could not be read or parsed.
    #[display("invalid disc definition file: {}", _0.display())]
    DiscFile(#[error(not(source))] PathBuf),
    /// A single disc definition is malformed.
    #[display("invalid definition for disc `{_0}`")]
    Disc(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
