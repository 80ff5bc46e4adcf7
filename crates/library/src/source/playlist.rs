use super::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fs;
use std::path::{Path, PathBuf};

/// Read an M3U/M3U8 playlist into source paths, in playlist order.
///
/// Comment and directive lines (`#...`) and blank lines are ignored.
/// Relative entries resolve against the playlist's own directory. Entries
/// that do not exist are reported and left out.
///
/// # Errors
/// - [`ErrorKind::UnsupportedPlaylist`] for any other extension.
/// - [`ErrorKind::Io`] if the playlist cannot be read.
pub fn read_playlist(path: &Path) -> Result<Vec<PathBuf>> {
    let supported = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("m3u") || e.eq_ignore_ascii_case("m3u8"));
    if !supported {
        exn::bail!(ErrorKind::UnsupportedPlaylist(path.to_path_buf()));
    }
    let content = fs::read(path).or_raise(|| ErrorKind::Io(path.to_path_buf()))?;
    let content = String::from_utf8_lossy(&content);
    let base = path.parent().unwrap_or(Path::new(""));

    let mut tracks = Vec::new();
    for line in content.lines() {
        let line = line.trim_start_matches('\u{feff}').trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let entry = base.join(line);
        if !entry.exists() {
            tracing::warn!(playlist = %path.display(), entry = %entry.display(), "Playlist entry not found; skipping");
            continue;
        }
        tracks.push(entry);
    }
    tracing::debug!(playlist = %path.display(), tracks = tracks.len(), "Read playlist");
    Ok(tracks)
}
