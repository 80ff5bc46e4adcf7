use crate::error::{ErrorKind, Result};
use crate::naming;
use crate::track::Track;
use std::path::{Path, PathBuf};

/// Folder name that places a folder's tracks directly in the disc root.
pub const ROOT_FOLDER: &str = "__root__";

/// A named, ordered group of tracks inside an MP3 disc.
#[derive(Clone, Debug)]
pub struct Folder {
    path: PathBuf,
    name: String,
    tracks: Vec<Track>,
    numbered: bool,
    root: bool,
}

impl Folder {
    /// A folder called `name` inside `disc_path`. The name [`ROOT_FOLDER`]
    /// makes it the root sentinel.
    pub fn new(disc_path: &Path, name: impl Into<String>, tracks: Vec<Track>) -> Self {
        let name = name.into();
        let root = name == ROOT_FOLDER;
        let path = if root { disc_path.to_path_buf() } else { disc_path.join(&name) };
        Self { path, name, tracks, numbered: false, root }
    }

    /// Current directory; gains its numeric prefix once numbered.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Declared name, unaffected by numbering.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn is_root(&self) -> bool {
        self.root
    }

    pub fn is_numbered(&self) -> bool {
        self.numbered
    }

    /// Give the folder position `ordinal` (1-based) among `count` siblings
    /// and number its tracks.
    ///
    /// The root sentinel ignores both arguments: it has no prefix and stays
    /// at the disc path.
    ///
    /// # Errors
    /// [`ErrorKind::AlreadyNumbered`] on a second call.
    pub fn numberize(&mut self, ordinal: usize, count: usize) -> Result<()> {
        if self.numbered {
            exn::bail!(ErrorKind::AlreadyNumbered(self.name.clone()));
        }
        if !self.root {
            let parent = self.path.parent().map(Path::to_path_buf).unwrap_or_default();
            self.path = parent.join(naming::numbered(ordinal, count, &self.name));
        }
        let track_count = self.tracks.len();
        for (index, track) in self.tracks.iter_mut().enumerate() {
            track.set_dst_dir(&self.path);
            track.set_destination(index + 1, track_count);
        }
        self.numbered = true;
        Ok(())
    }
}
