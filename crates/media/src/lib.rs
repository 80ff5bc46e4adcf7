//! Audio file inspection and conversion.
//!
//! Both concerns sit behind traits ([`Probe`], [`Transcoder`]) so the disc
//! logic can run against deterministic doubles in tests; enable the `mock`
//! feature to get them.

pub mod error;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod probe;
mod transcode;

#[cfg(any(test, feature = "mock"))]
pub use self::mock::{MockProbe, MockTranscoder};
pub use self::probe::{LoftyProbe, Probe, ceil_seconds};
pub use self::transcode::{Ffmpeg, Output, Transcoder, Unavailable};
use std::path::Path;

/// Extensions (lowercase, no dot) treated as audio tracks when scanning disc
/// directories.
pub const AUDIO_EXTENSIONS: &[&str] =
    &["aac", "aif", "aiff", "alac", "ape", "flac", "m4a", "mp3", "mp4", "ogg", "opus", "wav", "wma", "wv"];

/// Whether `path` looks like an audio file, judged by extension alone.
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            AUDIO_EXTENSIONS.iter().any(|e| *e == ext)
        })
        .unwrap_or(false)
}
