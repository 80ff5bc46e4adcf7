//! Where tracks come from: library queries and playlists.
//!
//! Both resolve to an ordered list of source file paths; order matters
//! because it becomes the numbering on disc.

mod beets;
pub mod error;
mod playlist;

pub use self::beets::{Beets, split_terms};
pub use self::error::{ErrorKind, Result};
pub use self::playlist::read_playlist;
use std::path::PathBuf;

/// Resolves a query string to source paths, in library order.
pub trait Query: Send + Sync {
    /// # Errors
    /// When the query cannot be run or is rejected. An empty result is not
    /// an error.
    fn query(&self, query: &str) -> Result<Vec<PathBuf>>;
}
