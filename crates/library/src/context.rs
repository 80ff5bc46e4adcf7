use crate::error::{ErrorKind, Result};
use crate::stats::Stats;
use cdman_media::{Probe, Transcoder};
use derive_more::Display;
use std::fmt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};

/// How an audio track is materialized at its destination.
#[derive(Clone, Copy, Debug, Default, Display, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize), serde(rename_all = "snake_case"))]
pub enum PopulateMode {
    #[default]
    #[display("copy")]
    Copy,
    #[display("hard_link")]
    HardLink,
    #[display("soft_link")]
    SoftLink,
}

impl FromStr for PopulateMode {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "copy" => Ok(Self::Copy),
            "hard_link" | "hardlink" => Ok(Self::HardLink),
            "soft_link" | "softlink" | "symlink" => Ok(Self::SoftLink),
            other => Err(format!("unknown population mode `{other}` (expected copy, hard_link or soft_link)")),
        }
    }
}

/// What to do on finding something cdman did not create and cannot
/// classify: a directory where a track belongs, a socket in a disc folder...
#[derive(Clone, Copy, Debug, Default, Display, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize), serde(rename_all = "snake_case"))]
pub enum OnUnexpected {
    /// Log a warning and leave the entry alone.
    #[default]
    #[display("skip")]
    Skip,
    /// Stop the run.
    #[display("abort")]
    Abort,
}

/// Shared per-run state handed to every task.
pub struct Context {
    pub dry: bool,
    pub on_unexpected: OnUnexpected,
    pub stats: Arc<Stats>,
    pub probe: Arc<dyn Probe>,
    pub transcoder: Arc<dyn Transcoder>,
    aborted: AtomicBool,
    /// Moves a dry run counted but did not make: destination to where the
    /// content still is.
    pending: Mutex<HashMap<PathBuf, PathBuf>>,
}

impl Context {
    pub fn new(probe: Arc<dyn Probe>, transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            dry: false,
            on_unexpected: OnUnexpected::default(),
            stats: Arc::new(Stats::new()),
            probe,
            transcoder,
            aborted: AtomicBool::new(false),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_dry(mut self, dry: bool) -> Self {
        self.dry = dry;
        self
    }

    pub fn with_on_unexpected(mut self, on_unexpected: OnUnexpected) -> Self {
        self.on_unexpected = on_unexpected;
        self
    }

    pub fn with_stats(mut self, stats: Arc<Stats>) -> Self {
        self.stats = stats;
        self
    }

    /// Whether an earlier unexpected entry asked for the run to stop.
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Remember a move that was counted without being made. Only dry runs
    /// record anything.
    pub(crate) fn record_move(&self, from: &Path, to: &Path) {
        if self.dry {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            pending.insert(to.to_path_buf(), from.to_path_buf());
        }
    }

    /// Where the content destined for `dst` is right now.
    ///
    /// Follows a recorded move of `dst` itself first, then one of its parent
    /// directory; otherwise `dst` is its own location.
    pub(crate) fn current_location(&self, dst: &Path) -> PathBuf {
        let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(from) = pending.get(dst) {
            return from.clone();
        }
        if let (Some(parent), Some(name)) = (dst.parent(), dst.file_name())
            && let Some(dir) = pending.get(parent)
        {
            return dir.join(name);
        }
        dst.to_path_buf()
    }

    /// Report an unexpected filesystem entry according to
    /// [`Context::on_unexpected`].
    ///
    /// # Errors
    /// [`ErrorKind::Unexpected`] when the policy is [`OnUnexpected::Abort`];
    /// the context is marked aborted as well so other workers wind down.
    pub fn unexpected(&self, path: &Path, what: &str) -> Result<()> {
        match self.on_unexpected {
            OnUnexpected::Skip => {
                tracing::warn!(path = %path.display(), kind = what, "Skipping unexpected entry");
                Ok(())
            },
            OnUnexpected::Abort => {
                tracing::error!(path = %path.display(), kind = what, "Unexpected entry; aborting run");
                self.aborted.store(true, Ordering::SeqCst);
                exn::bail!(ErrorKind::Unexpected(path.to_path_buf()));
            },
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("dry", &self.dry)
            .field("on_unexpected", &self.on_unexpected)
            .field("aborted", &self.is_aborted())
            .finish_non_exhaustive()
    }
}
