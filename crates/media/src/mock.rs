//! Deterministic media doubles for tests.
//!
//! Fixture "audio" files are plain text: their content is the play time in
//! seconds. A fixture whose content starts with `fail` makes
//! [`MockTranscoder`] report a failed conversion.

use crate::error::{ErrorKind, Result};
use crate::{Output, Probe, Transcoder};
use exn::ResultExt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// Reads a file's text content as its duration in seconds.
#[derive(Clone, Copy, Debug, Default)]
pub struct MockProbe;

impl Probe for MockProbe {
    fn duration(&self, path: &Path) -> Option<Duration> {
        let content = fs::read_to_string(path).ok()?;
        let seconds: f64 = content.trim().parse().ok()?;
        Duration::try_from_secs_f64(seconds).ok()
    }
}

/// Copies the source to the destination and records every call.
#[derive(Debug, Default)]
pub struct MockTranscoder {
    calls: Mutex<Vec<(PathBuf, PathBuf, u32)>>,
}

impl MockTranscoder {
    /// Every `(src, dst, bitrate)` passed to [`Transcoder::transcode`] so far.
    pub fn calls(&self) -> Vec<(PathBuf, PathBuf, u32)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Transcoder for MockTranscoder {
    fn transcode(&self, src: &Path, dst: &Path, bitrate: u32) -> Result<Output> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((src.to_path_buf(), dst.to_path_buf(), bitrate));
        }
        let content = fs::read(src).or_raise(|| ErrorKind::Io(src.to_path_buf()))?;
        if content.starts_with(b"fail") {
            return Ok(Output {
                success: false,
                stdout: b"mock transcoder output".to_vec(),
                stderr: format!("mock transcoder refused {}", src.display()).into_bytes(),
            });
        }
        fs::write(dst, &content).or_raise(|| ErrorKind::Io(dst.to_path_buf()))?;
        Ok(Output { success: true, ..Output::default() })
    }
}
