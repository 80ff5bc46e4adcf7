//! Tracks and how they are materialized on a disc.

use crate::context::{Context, PopulateMode};
use crate::error::{ErrorKind, Result};
use crate::naming;
use crate::stats::Counter;
use exn::{OptionExt, ResultExt};
use std::fs;
use std::io;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// The outcome of (successfully attempting to) populate a single track.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// Output was written (or would have been, in a dry run).
    Populated,
    /// The destination already held equivalent content; nothing was done.
    Skipped,
    /// The track could not be produced; the run carries on.
    Failed,
}

impl Outcome {
    fn counter(self) -> Counter {
        match self {
            Self::Populated => Counter::TracksPopulated,
            Self::Skipped => Counter::TracksSkipped,
            Self::Failed => Counter::TracksFailed,
        }
    }
}

/// State shared by every kind of track.
#[derive(Clone, Debug)]
pub struct TrackInfo {
    src: PathBuf,
    name: String,
    dst_dir: PathBuf,
    dst: Option<PathBuf>,
    size: OnceLock<u64>,
}

impl TrackInfo {
    fn new(src: PathBuf, dst_dir: PathBuf) -> Self {
        let stem = src.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let name = naming::unnumber(&stem).to_string();
        Self { src, name, dst_dir, dst: None, size: OnceLock::new() }
    }
}

/// A track copied or linked verbatim.
#[derive(Clone, Debug)]
pub struct AudioTrack {
    info: TrackInfo,
    pub mode: PopulateMode,
}

/// A track transcoded to MP3.
#[derive(Clone, Debug)]
pub struct Mp3Track {
    info: TrackInfo,
    /// Target bitrate in kbps.
    pub bitrate: u32,
}

#[derive(Clone, Debug)]
pub enum Track {
    Audio(AudioTrack),
    Mp3(Mp3Track),
}

impl Track {
    pub fn audio(src: impl Into<PathBuf>, dst_dir: impl Into<PathBuf>, mode: PopulateMode) -> Self {
        Self::Audio(AudioTrack { info: TrackInfo::new(src.into(), dst_dir.into()), mode })
    }

    pub fn mp3(src: impl Into<PathBuf>, dst_dir: impl Into<PathBuf>, bitrate: u32) -> Self {
        Self::Mp3(Mp3Track { info: TrackInfo::new(src.into(), dst_dir.into()), bitrate })
    }

    fn info(&self) -> &TrackInfo {
        match self {
            Self::Audio(t) => &t.info,
            Self::Mp3(t) => &t.info,
        }
    }

    fn info_mut(&mut self) -> &mut TrackInfo {
        match self {
            Self::Audio(t) => &mut t.info,
            Self::Mp3(t) => &mut t.info,
        }
    }

    pub fn src(&self) -> &Path {
        &self.info().src
    }

    /// Source file stem with any numbering prefix removed.
    pub fn name(&self) -> &str {
        &self.info().name
    }

    /// Destination extension including the leading dot, or empty.
    pub fn extension(&self) -> String {
        match self {
            Self::Audio(t) => t.info.src.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default(),
            Self::Mp3(_) => ".mp3".to_string(),
        }
    }

    /// The name a destination file has once its numbering is stripped.
    pub fn file_name(&self) -> String {
        format!("{}{}", self.name(), self.extension())
    }

    pub fn dst_dir(&self) -> &Path {
        &self.info().dst_dir
    }

    pub(crate) fn set_dst_dir(&mut self, dst_dir: impl Into<PathBuf>) {
        self.info_mut().dst_dir = dst_dir.into();
    }

    /// Assign the numbered destination path. Later calls overwrite earlier
    /// ones.
    pub fn set_destination(&mut self, ordinal: usize, count: usize) {
        let file_name = naming::numbered(ordinal, count, &self.file_name());
        let info = self.info_mut();
        info.dst = Some(info.dst_dir.join(file_name));
    }

    /// # Errors
    /// [`ErrorKind::Unnumbered`] before [`Track::set_destination`].
    pub fn dst_path(&self) -> Result<&Path> {
        self.info().dst.as_deref().ok_or_raise(|| ErrorKind::Unnumbered(self.src().to_path_buf()))
    }

    /// Whether `candidate` plays for the same whole number of seconds as the
    /// source. Missing or unreadable files count as zero seconds.
    pub fn is_similar(&self, ctx: &Context, candidate: &Path) -> bool {
        ctx.probe.seconds(self.src()) == ctx.probe.seconds(candidate)
    }

    /// Size used for capacity planning: seconds of play time for audio
    /// tracks, bytes on disk for MP3 tracks. Computed once.
    pub fn size(&self, ctx: &Context) -> u64 {
        *self.info().size.get_or_init(|| match self {
            Self::Audio(t) => match t.info.dst.as_deref() {
                Some(dst) if dst.exists() => ctx.probe.seconds(dst),
                _ => ctx.probe.seconds(&t.info.src),
            },
            Self::Mp3(t) => t.info.dst.as_deref().and_then(|d| fs::metadata(d).ok()).map(|m| m.len()).unwrap_or(0),
        })
    }

    /// Bring the destination up to date and record the outcome in the run
    /// statistics.
    ///
    /// Per-track failures (I/O, transcoder errors) are logged and reported as
    /// [`Outcome::Failed`] rather than returned.
    ///
    /// # Errors
    /// - [`ErrorKind::Unnumbered`] before [`Track::set_destination`].
    /// - [`ErrorKind::Unexpected`] when a directory occupies the destination
    ///   and the run is configured to abort on unexpected entries.
    pub fn populate(&self, ctx: &Context) -> Result<Outcome> {
        let dst = self.dst_path()?;
        let outcome = match self.populate_inner(ctx, dst) {
            Ok(outcome) => outcome,
            Err(e) if matches!(e.deref(), ErrorKind::Unexpected(_)) => {
                ctx.stats.increment(Counter::TracksFailed);
                return Err(e);
            },
            Err(e) => {
                tracing::error!(path = %dst.display(), error = ?e, "Failed to populate track");
                Outcome::Failed
            },
        };
        ctx.stats.increment(outcome.counter());
        Ok(outcome)
    }

    fn populate_inner(&self, ctx: &Context, dst: &Path) -> Result<Outcome> {
        // A dry run judges what a real run would find after cleanup's moves.
        let current = if ctx.dry { ctx.current_location(dst) } else { dst.to_path_buf() };
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.is_dir() => {
                ctx.unexpected(&current, "directory")?;
                return Ok(Outcome::Failed);
            },
            Ok(_) if self.is_similar(ctx, &current) => {
                tracing::debug!(path = %dst.display(), "Track already up to date");
                return Ok(Outcome::Skipped);
            },
            Ok(_) => {
                // Leftover from an older source or an interrupted run.
                tracing::info!(path = %dst.display(), "Replacing outdated track");
                if !ctx.dry {
                    fs::remove_file(dst).or_raise(|| ErrorKind::Io(dst.to_path_buf()))?;
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => (),
            Err(e) => return Err(e).or_raise(|| ErrorKind::Io(current.clone())),
        }

        if ctx.dry {
            tracing::info!(src = %self.src().display(), dst = %dst.display(), "Would populate track");
            return Ok(Outcome::Populated);
        }
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).or_raise(|| ErrorKind::Io(parent.to_path_buf()))?;
        }
        match self {
            Self::Audio(t) => t.materialize(dst),
            Self::Mp3(t) => t.transcode(ctx, dst),
        }
    }
}

impl AudioTrack {
    fn materialize(&self, dst: &Path) -> Result<Outcome> {
        let src = &self.info.src;
        match self.mode {
            PopulateMode::Copy => fs::copy(src, dst).map(|_| ()),
            PopulateMode::HardLink => fs::hard_link(src, dst),
            PopulateMode::SoftLink => std::path::absolute(src).and_then(|target| symlink(&target, dst)),
        }
        .or_raise(|| ErrorKind::Io(dst.to_path_buf()))?;
        tracing::info!(src = %src.display(), dst = %dst.display(), mode = %self.mode, "Populated track");
        Ok(Outcome::Populated)
    }
}

impl Mp3Track {
    fn transcode(&self, ctx: &Context, dst: &Path) -> Result<Outcome> {
        let src = &self.info.src;
        let output =
            ctx.transcoder.transcode(src, dst, self.bitrate).or_raise(|| ErrorKind::Transcode(src.to_path_buf()))?;
        if output.success {
            tracing::info!(src = %src.display(), dst = %dst.display(), bitrate = self.bitrate, "Transcoded track");
            return Ok(Outcome::Populated);
        }

        let stdout_log = dst.with_extension("stdout.log");
        let stderr_log = dst.with_extension("stderr.log");
        for (path, content) in [(&stdout_log, &output.stdout), (&stderr_log, &output.stderr)] {
            if let Err(e) = fs::write(path, content) {
                tracing::warn!(path = %path.display(), error = %e, "Could not write transcoder log");
            }
        }
        tracing::warn!(
            src = %src.display(),
            stderr = %stderr_log.display(),
            "Transcoder failed; output saved alongside the destination"
        );
        Ok(Outcome::Failed)
    }
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
