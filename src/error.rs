//! Application Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An application error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for application operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("configuration error")]
    Config,
    /// MP3 discs need a transcoder and none is installed.
    #[display("no transcoder available")]
    Transcoder,
    #[display("could not start workers")]
    Workers,
    /// A disc failed a lifecycle step.
    #[display("disc `{_0}` failed")]
    Disc(#[error(not(source))] String),
}
