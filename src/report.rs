//! Progress and overflow reporting.

use cdman_library::{Capacity, Context, Disc, DiscKind, Snapshot, Split, Stats, Track};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Minimum time between two progress lines.
const DEBOUNCE: Duration = Duration::from_millis(500);

/// Background thread that logs counter changes while the run is in
/// progress.
pub struct StatusReporter {
    stats: Arc<Stats>,
    handle: Option<JoinHandle<()>>,
}

impl StatusReporter {
    pub fn start(stats: Arc<Stats>) -> Self {
        let watched = Arc::clone(&stats);
        let handle = thread::Builder::new()
            .name("cdman-status".to_string())
            .spawn(move || watch(&watched))
            .map_err(|e| tracing::warn!(error = ?e, "Could not start status reporter; progress will not be shown"))
            .ok();
        Self { stats, handle }
    }

    /// Stop the reporter and return the final counters.
    pub fn finish(mut self) -> Snapshot {
        self.stop();
        self.stats.snapshot()
    }

    fn stop(&mut self) {
        self.stats.finish();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::warn!("Status reporter panicked");
        }
    }
}

impl Drop for StatusReporter {
    fn drop(&mut self) {
        self.stop();
    }
}

fn watch(stats: &Stats) {
    let mut seen = stats.snapshot().generation;
    let mut last_report = Instant::now();
    loop {
        let snapshot = stats.wait_for_change(seen, DEBOUNCE);
        if snapshot.finished {
            return;
        }
        if snapshot.generation == seen {
            continue;
        }
        if let Some(remaining) = DEBOUNCE.checked_sub(last_report.elapsed()) {
            thread::sleep(remaining);
            continue;
        }
        seen = snapshot.generation;
        last_report = Instant::now();
        tracing::info!("{snapshot}");
    }
}

/// Describe how an oversized disc would have to be split.
///
/// Returns `None` when the disc fits its capacity.
pub fn overflow(disc: &Disc, ctx: &Context) -> Option<String> {
    let splits = match disc.calculate_splits(ctx) {
        Ok(splits) => splits,
        Err(e) => {
            tracing::warn!(disc = disc.name(), error = ?e, "Could not calculate splits");
            return None;
        },
    };
    let size = splits.iter().map(|s| s.size).sum();
    if !disc.capacity().is_exceeded_by(size) {
        return None;
    }
    Some(describe(disc.name(), disc.kind(), disc.capacity(), size, &splits))
}

fn describe(name: &str, kind: DiscKind, capacity: Capacity, size: u64, splits: &[Split<&Track>]) -> String {
    let limit = match capacity {
        Capacity::Limited(limit) => human(kind, limit),
        Capacity::Unbounded => capacity.to_string(),
    };
    let mut out = format!(
        "{name} is {}, over its {limit} capacity, and needs {} discs:",
        human(kind, size),
        splits.len()
    );
    for (i, split) in splits.iter().enumerate() {
        out.push_str(&format!(
            "\n  {}: {} .. {} ({})",
            i + 1,
            destination(split.first),
            destination(split.last),
            human(kind, split.size)
        ));
    }
    out
}

fn destination(track: &Track) -> String {
    match track.dst_path() {
        Ok(path) => path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
        Err(_) => track.file_name(),
    }
}

/// Audio sizes are seconds, MP3 sizes are bytes.
fn human(kind: DiscKind, size: u64) -> String {
    match kind {
        DiscKind::Audio => format!("{}:{:02}", size / 60, size % 60),
        DiscKind::Mp3 => format!("{:.1} MiB", size as f64 / (1024.0 * 1024.0)),
    }
}
