//! Directory reconciliation.
//!
//! Brings what is already on disk in line with the declared layout before
//! anything new is written, so reordering a disc renames existing output
//! instead of producing it again. Decisions are made on the calling thread;
//! only the filesystem operations run on the work queue.

use crate::context::Context;
use crate::error::{ErrorKind, Result};
use crate::folder::Folder;
use crate::naming;
use crate::stats::Counter;
use crate::track::Track;
use cdman_media::is_audio_file;
use cdman_workqueue::WorkQueue;
use exn::ResultExt;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What reconciliation decided for one existing entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Action {
    /// Entry is already at a declared destination.
    AlreadyCorrect(PathBuf),
    /// Entry holds equivalent content for a declared destination that is
    /// still free, and will be moved there.
    Renamed { from: PathBuf, to: PathBuf },
    /// Entry is no longer declared, or holds stale content for a declared
    /// name.
    Removed(PathBuf),
    /// Entry is equivalent to a declared track whose destinations are all
    /// occupied; it is left in place.
    Duplicate(PathBuf),
}

/// Entries directly inside a directory, split by type.
#[derive(Debug, Default)]
struct Listing {
    files: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
}

/// List `dir`, treating symlinks as files. A missing directory is empty.
fn list(ctx: &Context, dir: &Path) -> Result<Listing> {
    let mut listing = Listing::default();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(listing),
        Err(e) => return Err(e).or_raise(|| ErrorKind::Io(dir.to_path_buf())),
    };
    for entry in entries {
        let entry = entry.or_raise(|| ErrorKind::Io(dir.to_path_buf()))?;
        let path = entry.path();
        let file_type = entry.file_type().or_raise(|| ErrorKind::Io(path.clone()))?;
        if file_type.is_dir() {
            listing.dirs.push(path);
        } else if file_type.is_file() || file_type.is_symlink() {
            listing.files.push(path);
        } else {
            ctx.unexpected(&path, "special file")?;
        }
    }
    listing.files.sort();
    listing.dirs.sort();
    Ok(listing)
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Decide what to do with each audio file found in a directory.
///
/// `entries` pairs each file's real location with where it would be if
/// pending folder renames had happened (they differ only in dry runs).
fn plan(ctx: &Context, entries: &[(PathBuf, PathBuf)], tracks: &[&Track]) -> Vec<Action> {
    let mut claimed: HashSet<&Path> = HashSet::new();
    let mut actions = Vec::with_capacity(entries.len());
    for (actual, effective) in entries {
        let name = file_name(effective);
        let canonical = naming::unnumber(&name);
        let matches: Vec<(&Track, &Path)> = tracks
            .iter()
            .filter(|t| t.file_name() == canonical)
            .filter_map(|t| t.dst_path().ok().map(|dst| (*t, dst)))
            .collect();

        if matches.is_empty() {
            actions.push(Action::Removed(actual.clone()));
            continue;
        }
        if matches.iter().any(|(_, dst)| *dst == effective.as_path()) {
            claimed.insert(effective.as_path());
            actions.push(Action::AlreadyCorrect(actual.clone()));
            continue;
        }

        let similar: Vec<&Path> =
            matches.iter().filter(|(t, _)| t.is_similar(ctx, actual)).map(|(_, dst)| *dst).collect();
        if similar.is_empty() {
            actions.push(Action::Removed(actual.clone()));
            continue;
        }
        match similar.into_iter().find(|dst| !claimed.contains(dst) && !dst.exists()) {
            Some(dst) => {
                claimed.insert(dst);
                actions.push(Action::Renamed { from: actual.clone(), to: dst.to_path_buf() });
            },
            None => actions.push(Action::Duplicate(actual.clone())),
        }
    }
    actions
}

/// Hand the filesystem side of each action to the queue.
fn schedule(actions: Vec<Action>, queue: &WorkQueue, ctx: &Arc<Context>) -> Result<()> {
    for action in actions {
        match action {
            Action::AlreadyCorrect(path) => tracing::trace!(path = %path.display(), "Track in place"),
            Action::Duplicate(path) => {
                tracing::warn!(path = %path.display(), "Leaving duplicate track untouched; every destination is taken")
            },
            Action::Renamed { from, to } => {
                let ctx = Arc::clone(ctx);
                queue
                    .submit(move || {
                        tracing::info!(from = %from.display(), to = %to.display(), "Moving track");
                        if ctx.dry {
                            ctx.record_move(&from, &to);
                        } else if let Err(e) = fs::rename(&from, &to) {
                            tracing::error!(from = %from.display(), to = %to.display(), error = %e, "Could not move track");
                            return;
                        }
                        ctx.stats.increment(Counter::TracksMoved);
                    })
                    .or_raise(|| ErrorKind::Queue)?;
            },
            Action::Removed(path) => {
                let ctx = Arc::clone(ctx);
                queue
                    .submit(move || {
                        tracing::info!(path = %path.display(), "Removing track no longer on disc");
                        if !ctx.dry
                            && let Err(e) = fs::remove_file(&path)
                        {
                            tracing::error!(path = %path.display(), error = %e, "Could not remove track");
                            return;
                        }
                        ctx.stats.increment(Counter::TracksRemoved);
                    })
                    .or_raise(|| ErrorKind::Queue)?;
            },
        }
    }
    Ok(())
}

/// Reconcile the audio files of `scan_dir` against `tracks`, whose
/// destinations live in `target_dir`.
///
/// Subdirectories are only expected where folders live (`allow_dirs`).
pub(crate) fn reconcile_tracks(
    scan_dir: &Path,
    target_dir: &Path,
    tracks: &[&Track],
    allow_dirs: bool,
    queue: &WorkQueue,
    ctx: &Arc<Context>,
) -> Result<()> {
    let listing = list(ctx, scan_dir)?;
    if !allow_dirs {
        for dir in &listing.dirs {
            ctx.unexpected(dir, "directory")?;
        }
    }
    let entries: Vec<(PathBuf, PathBuf)> = listing
        .files
        .into_iter()
        .filter(|path| {
            let audio = is_audio_file(path);
            if !audio {
                tracing::trace!(path = %path.display(), "Ignoring non-audio file");
            }
            audio
        })
        .map(|path| {
            let effective = target_dir.join(file_name(&path));
            (path, effective)
        })
        .collect();
    schedule(plan(ctx, &entries, tracks), queue, ctx)
}

/// Reconcile folder directories directly inside `disc_path`, then the tracks
/// within each folder (and any in the disc root).
///
/// Folder renames happen immediately so the track pass sees the final
/// layout; folder removals are queued.
pub(crate) fn reconcile_folders(disc_path: &Path, folders: &[Folder], queue: &WorkQueue, ctx: &Arc<Context>) -> Result<()> {
    let listing = list(ctx, disc_path)?;
    let named: Vec<&Folder> = folders.iter().filter(|f| !f.is_root()).collect();
    let mut claimed: HashSet<&Path> = HashSet::new();

    for dir in &listing.dirs {
        let name = file_name(dir);
        let canonical = naming::unnumber(&name);
        let Some(folder) = named.iter().find(|f| f.name() == canonical) else {
            let ctx = Arc::clone(ctx);
            let dir = dir.clone();
            queue
                .submit(move || {
                    tracing::info!(path = %dir.display(), "Removing folder no longer on disc");
                    if !ctx.dry
                        && let Err(e) = fs::remove_dir_all(&dir)
                    {
                        tracing::error!(path = %dir.display(), error = %e, "Could not remove folder");
                        return;
                    }
                    ctx.stats.increment(Counter::FoldersRemoved);
                })
                .or_raise(|| ErrorKind::Queue)?;
            continue;
        };
        if folder.path() == dir.as_path() {
            claimed.insert(folder.path());
            continue;
        }
        if claimed.contains(folder.path()) || folder.path().exists() {
            tracing::warn!(
                path = %dir.display(),
                target = %folder.path().display(),
                "Leaving duplicate folder untouched; destination is taken"
            );
            continue;
        }

        tracing::info!(from = %dir.display(), to = %folder.path().display(), "Moving folder");
        if ctx.dry {
            ctx.record_move(dir, folder.path());
        } else {
            fs::rename(dir, folder.path()).or_raise(|| ErrorKind::Io(dir.clone()))?;
        }
        claimed.insert(folder.path());
        ctx.stats.increment(Counter::FoldersMoved);
    }

    for folder in &named {
        // Dry runs leave the folder under its old name.
        let scan_dir = ctx.current_location(folder.path());
        let folder_tracks: Vec<&Track> = folder.tracks().iter().collect();
        reconcile_tracks(&scan_dir, folder.path(), &folder_tracks, false, queue, ctx)?;
    }
    let root_tracks: Vec<&Track> = folders.iter().filter(|f| f.is_root()).flat_map(|f| f.tracks()).collect();
    reconcile_tracks(disc_path, disc_path, &root_tracks, true, queue, ctx)
}
