use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Captured result of one transcoder run.
#[derive(Debug, Default)]
pub struct Output {
    /// Whether the process exited successfully.
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Converts a source audio file into an MP3 at the given bitrate.
pub trait Transcoder: Send + Sync {
    /// Write an MP3 rendition of `src` to `dst`.
    ///
    /// A transcoder that ran but failed is reported through
    /// [`Output::success`], not as an error.
    ///
    /// # Errors
    /// Only when the conversion could not be attempted at all.
    fn transcode(&self, src: &Path, dst: &Path, bitrate: u32) -> Result<Output>;
}

/// Runs the `ffmpeg` binary with the LAME encoder.
#[derive(Clone, Debug)]
pub struct Ffmpeg {
    path: PathBuf,
}

impl Ffmpeg {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Locate `ffmpeg` on `PATH`.
    pub fn discover() -> Result<Self> {
        match which::which("ffmpeg") {
            Ok(path) => {
                tracing::debug!(ffmpeg = %path.display(), "Discovered transcoder");
                Ok(Self { path })
            },
            Err(_) => {
                tracing::info!("ffmpeg executable not found in PATH");
                exn::bail!(ErrorKind::TranscoderNotFound);
            },
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn args(src: &Path, dst: &Path, bitrate: u32) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-nostdin", "-hide_banner", "-y", "-i"].into_iter().map(OsString::from).collect();
        args.push(src.as_os_str().to_owned());
        args.extend(
            ["-vn", "-acodec", "libmp3lame", "-ar", "44100", "-b:a"].into_iter().map(OsString::from),
        );
        args.push(format!("{bitrate}k").into());
        args.push(dst.as_os_str().to_owned());
        args
    }
}

impl Transcoder for Ffmpeg {
    #[tracing::instrument(level = "trace", skip(self))]
    fn transcode(&self, src: &Path, dst: &Path, bitrate: u32) -> Result<Output> {
        let output = Command::new(&self.path)
            .args(Self::args(src, dst, bitrate))
            .stdin(Stdio::null())
            .output()
            .or_raise(|| ErrorKind::Spawn(self.path.clone()))?;
        Ok(Output { success: output.status.success(), stdout: output.stdout, stderr: output.stderr })
    }
}

/// Stand-in used when no transcoder is installed; every call fails.
///
/// Lets runs without MP3 work (or dry runs) proceed on machines without
/// `ffmpeg`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unavailable;

impl Transcoder for Unavailable {
    fn transcode(&self, _src: &Path, _dst: &Path, _bitrate: u32) -> Result<Output> {
        exn::bail!(ErrorKind::TranscoderNotFound);
    }
}
