//! Disc definitions.
//!
//! Each entry under `cds` (or in a disc definition file) is parsed on its
//! own so one malformed disc does not prevent the others from loading.

use cdman_library::PopulateMode;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Track references for one folder or one slot of an audio disc.
///
/// Resolved in field order: `query`, then `queries`, then `playlist`, then
/// `playlists`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct Sources {
    pub query: Option<String>,
    #[serde(default)]
    pub queries: Vec<String>,
    pub playlist: Option<PathBuf>,
    #[serde(default)]
    pub playlists: Vec<PathBuf>,
}

/// One reference to a list of tracks.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Source {
    /// A library query string.
    Query(String),
    /// An absolute path to an M3U playlist.
    Playlist(PathBuf),
}

impl Sources {
    /// Flatten into ordered references, resolving relative playlist paths
    /// against `base`.
    pub fn resolve(&self, base: &Path) -> Vec<Source> {
        let queries = self.query.iter().chain(&self.queries).cloned().map(Source::Query);
        let playlists =
            self.playlist.iter().chain(&self.playlists).map(|p| Source::Playlist(base.join(crate::expand_home(p))));
        queries.chain(playlists).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.query.is_none() && self.queries.is_empty() && self.playlist.is_none() && self.playlists.is_empty()
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct FolderDefinition {
    /// Folder name on disc; `__root__` puts the tracks in the disc root.
    pub name: String,
    #[serde(flatten)]
    pub sources: Sources,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct Mp3Definition {
    /// Overrides the default capacity in bytes; `-1` for no limit.
    pub capacity: Option<i64>,
    /// Overrides the global bitrate (kbps).
    pub bitrate: Option<u32>,
    #[serde(default)]
    pub folders: Vec<FolderDefinition>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct AudioDefinition {
    /// Overrides the default capacity in seconds; `-1` for no limit.
    pub capacity: Option<i64>,
    /// Overrides the global population mode.
    pub population_mode: Option<PopulateMode>,
    #[serde(default)]
    pub tracks: Vec<Sources>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DiscDefinition {
    Mp3(Mp3Definition),
    Audio(AudioDefinition),
}

/// A named, successfully parsed disc definition.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiscEntry {
    pub name: String,
    /// Directory that relative playlist paths resolve against: that of the
    /// file the definition came from.
    pub base: PathBuf,
    pub definition: DiscDefinition,
}
