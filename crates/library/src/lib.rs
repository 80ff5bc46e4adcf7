mod context;
pub mod disc;
pub mod error;
mod folder;
pub mod naming;
pub mod source;
pub mod split;
pub mod stats;
mod track;

pub use crate::context::{Context, OnUnexpected, PopulateMode};
pub use crate::disc::{Disc, DiscKind, Layout};
pub use crate::folder::{Folder, ROOT_FOLDER};
pub use crate::split::{Capacity, Split};
pub use crate::stats::{Counter, Snapshot, Stats};
pub use crate::track::{AudioTrack, Mp3Track, Outcome, Track};
