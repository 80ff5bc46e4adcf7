//! Run statistics.
//!
//! A single mutex guards every counter so a [`Snapshot`] is always
//! internally consistent. Each change bumps a generation number and wakes
//! anyone blocked in [`Stats::wait_for_change`]; the status reporter uses
//! that to refresh without polling.

use derive_more::Display;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// The individual counters tracked during a run.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Counter {
    #[display("tracks populated")]
    TracksPopulated,
    #[display("tracks skipped")]
    TracksSkipped,
    #[display("tracks moved")]
    TracksMoved,
    #[display("tracks removed")]
    TracksRemoved,
    #[display("tracks failed")]
    TracksFailed,
    #[display("folders moved")]
    FoldersMoved,
    #[display("folders removed")]
    FoldersRemoved,
}

/// Point-in-time copy of every counter.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Snapshot {
    pub tracks_populated: u64,
    pub tracks_skipped: u64,
    pub tracks_moved: u64,
    pub tracks_removed: u64,
    pub tracks_failed: u64,
    pub folders_moved: u64,
    pub folders_removed: u64,
    /// Incremented on every change.
    pub generation: u64,
    /// Set once by [`Stats::finish`].
    pub finished: bool,
}

impl Snapshot {
    pub fn get(&self, counter: Counter) -> u64 {
        match counter {
            Counter::TracksPopulated => self.tracks_populated,
            Counter::TracksSkipped => self.tracks_skipped,
            Counter::TracksMoved => self.tracks_moved,
            Counter::TracksRemoved => self.tracks_removed,
            Counter::TracksFailed => self.tracks_failed,
            Counter::FoldersMoved => self.folders_moved,
            Counter::FoldersRemoved => self.folders_removed,
        }
    }

    fn slot(&mut self, counter: Counter) -> &mut u64 {
        match counter {
            Counter::TracksPopulated => &mut self.tracks_populated,
            Counter::TracksSkipped => &mut self.tracks_skipped,
            Counter::TracksMoved => &mut self.tracks_moved,
            Counter::TracksRemoved => &mut self.tracks_removed,
            Counter::TracksFailed => &mut self.tracks_failed,
            Counter::FoldersMoved => &mut self.folders_moved,
            Counter::FoldersRemoved => &mut self.folders_removed,
        }
    }
}

impl std::fmt::Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "tracks: {} populated, {} skipped, {} moved, {} removed, {} failed; folders: {} moved, {} removed",
            self.tracks_populated,
            self.tracks_skipped,
            self.tracks_moved,
            self.tracks_removed,
            self.tracks_failed,
            self.folders_moved,
            self.folders_removed,
        )
    }
}

#[derive(Debug, Default)]
pub struct Stats {
    inner: Mutex<Snapshot>,
    changed: Condvar,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, counter: Counter) {
        self.update(|s| *s.slot(counter) += 1);
    }

    /// Marks the run as complete and wakes every waiter one last time.
    pub fn finish(&self) {
        self.update(|s| s.finished = true);
    }

    pub fn snapshot(&self) -> Snapshot {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the generation moves past `seen` or `timeout` elapses,
    /// returning the latest snapshot either way.
    pub fn wait_for_change(&self, seen: u64, timeout: Duration) -> Snapshot {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |s| s.generation == seen && !s.finished)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    fn update(&self, change: impl FnOnce(&mut Snapshot)) {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        change(&mut guard);
        guard.generation += 1;
        self.changed.notify_all();
    }
}
