use lofty::prelude::*;
use std::path::Path;
use std::time::Duration;

/// Reads the play time of an audio file.
pub trait Probe: Send + Sync {
    /// Play time of the file at `path`; `None` if it is missing or cannot be
    /// parsed as audio.
    fn duration(&self, path: &Path) -> Option<Duration>;

    /// Whole seconds of play time, rounded up. Unmeasurable files are `0`.
    fn seconds(&self, path: &Path) -> u64 {
        self.duration(path).map(ceil_seconds).unwrap_or(0)
    }
}

/// Round a duration up to whole seconds.
pub fn ceil_seconds(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

/// [`Probe`] backed by `lofty`'s container parsers.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoftyProbe;

impl Probe for LoftyProbe {
    #[tracing::instrument(level = "trace", skip(self))]
    fn duration(&self, path: &Path) -> Option<Duration> {
        if !path.exists() {
            return None;
        }
        match lofty::read_from_path(path) {
            Ok(tagged) => Some(tagged.properties().duration()),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Could not read audio properties");
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Duration::ZERO, 0)]
    #[case(Duration::from_secs(208), 208)]
    #[case(Duration::from_millis(208_001), 209)]
    #[case(Duration::from_nanos(1), 1)]
    #[case(Duration::from_millis(999), 1)]
    fn test_ceil_seconds(#[case] duration: Duration, #[case] expected: u64) {
        assert_eq!(ceil_seconds(duration), expected);
    }

    #[test]
    fn test_lofty_missing_and_garbage() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("missing.mp3");
        assert_eq!(LoftyProbe.duration(&missing), None);
        assert_eq!(LoftyProbe.seconds(&missing), 0);

        let garbage = temp_dir.path().join("garbage.mp3");
        std::fs::write(&garbage, b"definitely not an mp3 stream").unwrap();
        assert_eq!(LoftyProbe.seconds(&garbage), 0);
    }
}
