//! Turns configuration into discs.
//!
//! Sources that cannot be resolved (a failing query, a missing playlist)
//! are reported and contribute no tracks; they never stop the run.

use cdman_config::{AudioDefinition, Config, DiscDefinition, DiscEntry, Mp3Definition, Source, Sources};
use cdman_library::source::{ErrorKind as SourceErrorKind, Query, Result as SourceResult, read_playlist};
use cdman_library::{Capacity, Disc, DiscKind, Folder, Layout, PopulateMode, Track};
use std::path::{Path, PathBuf};

/// Command-line values that win over both disc and global settings.
#[derive(Clone, Copy, Debug, Default)]
pub struct Overrides {
    pub bitrate: Option<u32>,
    pub population_mode: Option<PopulateMode>,
}

/// Used when no query tool is installed, so query sources fail one by one
/// while playlist sources keep working.
pub struct NoQuery;

impl Query for NoQuery {
    fn query(&self, _query: &str) -> SourceResult<Vec<PathBuf>> {
        exn::bail!(SourceErrorKind::QueryToolNotFound);
    }
}

/// Build every configured disc, restricted to `only` when it is not empty.
pub fn discs(config: &Config, query: &dyn Query, overrides: Overrides, only: &[String]) -> Vec<Disc> {
    let entries = config.discs();
    for name in only {
        if !entries.iter().any(|e| &e.name == name) {
            tracing::warn!(disc = %name, "Requested disc is not configured");
        }
    }
    entries
        .iter()
        .filter(|e| only.is_empty() || only.contains(&e.name))
        .map(|entry| disc(config, entry, query, overrides))
        .collect()
}

pub fn disc(config: &Config, entry: &DiscEntry, query: &dyn Query, overrides: Overrides) -> Disc {
    let path = config.path.join(&entry.name);
    let disc = match &entry.definition {
        DiscDefinition::Mp3(definition) => mp3(config, entry, definition, &path, query, overrides),
        DiscDefinition::Audio(definition) => audio(config, entry, definition, &path, query, overrides),
    };
    let capacity = match &entry.definition {
        DiscDefinition::Mp3(d) => d.capacity,
        DiscDefinition::Audio(d) => d.capacity,
    };
    let disc = match capacity {
        Some(capacity) => disc.with_capacity(Capacity::from_signed(capacity)),
        None => disc,
    };
    tracing::debug!(disc = %entry.name, kind = %disc.kind(), tracks = disc.tracks().count(), "Loaded disc");
    disc
}

fn mp3(
    config: &Config,
    entry: &DiscEntry,
    definition: &Mp3Definition,
    path: &Path,
    query: &dyn Query,
    overrides: Overrides,
) -> Disc {
    let bitrate = overrides.bitrate.or(definition.bitrate).unwrap_or(config.bitrate);
    let folders = definition
        .folders
        .iter()
        .map(|folder| {
            let tracks = resolve(&entry.name, &folder.sources, &entry.base, query)
                .into_iter()
                .map(|src| Track::mp3(src, path, bitrate))
                .collect();
            Folder::new(path, folder.name.clone(), tracks)
        })
        .collect();
    Disc::new(&entry.name, path, DiscKind::Mp3, Layout::Folders(folders))
}

fn audio(
    config: &Config,
    entry: &DiscEntry,
    definition: &AudioDefinition,
    path: &Path,
    query: &dyn Query,
    overrides: Overrides,
) -> Disc {
    let mode = overrides.population_mode.or(definition.population_mode).unwrap_or(config.population_mode);
    let tracks = definition
        .tracks
        .iter()
        .flat_map(|sources| resolve(&entry.name, sources, &entry.base, query))
        .map(|src| Track::audio(src, path, mode))
        .collect();
    Disc::new(&entry.name, path, DiscKind::Audio, Layout::Tracks(tracks))
}

fn resolve(disc: &str, sources: &Sources, base: &Path, query: &dyn Query) -> Vec<PathBuf> {
    if sources.is_empty() {
        tracing::warn!(disc, "Track entry has no query or playlist");
    }
    let mut tracks = Vec::new();
    for source in sources.resolve(base) {
        let resolved = match &source {
            Source::Query(q) => query.query(q),
            Source::Playlist(p) => read_playlist(p),
        };
        match resolved {
            Ok(found) => {
                if found.is_empty() {
                    tracing::warn!(disc, source = ?source, "Source matched no tracks");
                }
                tracks.extend(found);
            },
            Err(e) => tracing::warn!(disc, source = ?source, error = ?e, "Skipping unresolvable source"),
        }
    }
    tracks
}
