//! Discs: numbering, reconciliation, population and capacity planning.
//!
//! A disc moves through its lifecycle in a fixed order:
//!
//! 1. [`Disc::numberize`] assigns every folder and track its numbered
//!    destination.
//! 2. [`Disc::cleanup`] reconciles what is already on disk with those
//!    destinations (see [`reconcile`]). Callers must
//!    [`wait`](WorkQueue::wait) for the queue before going on.
//! 3. [`Disc::populate`] writes whatever is still missing.
//! 4. [`Disc::calculate_splits`] measures the result against capacity.

mod reconcile;

pub use self::reconcile::Action;
use crate::context::Context;
use crate::error::{ErrorKind, Result};
use crate::folder::Folder;
use crate::split::{Capacity, Split, partition};
use crate::track::Track;
use cdman_workqueue::WorkQueue;
use derive_more::Display;
use exn::ResultExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Play time of an audio CD, in seconds.
pub const AUDIO_CAPACITY: u64 = 4_800;
/// Usable bytes on a data CD.
pub const MP3_CAPACITY: u64 = 700_000_000;

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize), serde(rename_all = "lowercase"))]
pub enum DiscKind {
    /// Tracks copied or linked as-is; measured in seconds.
    #[display("audio")]
    Audio,
    /// Tracks transcoded to MP3; measured in bytes.
    #[display("mp3")]
    Mp3,
}

impl DiscKind {
    pub fn capacity(&self) -> Capacity {
        match self {
            Self::Audio => Capacity::Limited(AUDIO_CAPACITY),
            Self::Mp3 => Capacity::Limited(MP3_CAPACITY),
        }
    }
}

#[derive(Clone, Debug)]
pub enum Layout {
    /// Tracks grouped into (numbered) folders.
    Folders(Vec<Folder>),
    /// Tracks directly in the disc directory.
    Tracks(Vec<Track>),
}

#[derive(Clone, Debug)]
pub struct Disc {
    name: String,
    path: PathBuf,
    kind: DiscKind,
    layout: Layout,
    capacity: Option<Capacity>,
    numbered: bool,
}

impl Disc {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, kind: DiscKind, layout: Layout) -> Self {
        Self { name: name.into(), path: path.into(), kind, layout, capacity: None, numbered: false }
    }

    /// Override the kind's default capacity.
    pub fn with_capacity(mut self, capacity: Capacity) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> DiscKind {
        self.kind
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity.unwrap_or_else(|| self.kind.capacity())
    }

    /// Every track in declared order, folders flattened.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> + '_ {
        let (folders, tracks): (&[Folder], &[Track]) = match &self.layout {
            Layout::Folders(folders) => (folders, &[]),
            Layout::Tracks(tracks) => (&[], tracks),
        };
        folders.iter().flat_map(|f| f.tracks()).chain(tracks)
    }

    /// Number folders (root sentinels excepted) and tracks in declared
    /// order.
    ///
    /// # Errors
    /// [`ErrorKind::AlreadyNumbered`] on a second call.
    pub fn numberize(&mut self) -> Result<()> {
        if self.numbered {
            exn::bail!(ErrorKind::AlreadyNumbered(self.name.clone()));
        }
        match &mut self.layout {
            Layout::Folders(folders) => {
                let count = folders.iter().filter(|f| !f.is_root()).count();
                let mut ordinal = 0;
                for folder in folders.iter_mut() {
                    if !folder.is_root() {
                        ordinal += 1;
                    }
                    folder.numberize(ordinal, count)?;
                }
            },
            Layout::Tracks(tracks) => {
                let count = tracks.len();
                for (index, track) in tracks.iter_mut().enumerate() {
                    track.set_destination(index + 1, count);
                }
            },
        }
        self.numbered = true;
        Ok(())
    }

    fn ensure_numbered(&self) -> Result<()> {
        if !self.numbered {
            exn::bail!(ErrorKind::Unnumbered(self.path.clone()));
        }
        Ok(())
    }

    /// Schedule the renames and removals that bring the disc directory in
    /// line with the declared layout. Returns once everything is queued.
    ///
    /// # Errors
    /// - [`ErrorKind::Unnumbered`] before [`Disc::numberize`].
    /// - [`ErrorKind::Io`] if a directory cannot be listed or a folder
    ///   cannot be renamed.
    /// - [`ErrorKind::Unexpected`] for unexpected entries when aborting.
    #[tracing::instrument(skip_all, fields(disc = %self.name))]
    pub fn cleanup(&self, queue: &WorkQueue, ctx: &Arc<Context>) -> Result<()> {
        self.ensure_numbered()?;
        match &self.layout {
            Layout::Folders(folders) => reconcile::reconcile_folders(&self.path, folders, queue, ctx),
            Layout::Tracks(tracks) => {
                let tracks: Vec<&Track> = tracks.iter().collect();
                reconcile::reconcile_tracks(&self.path, &self.path, &tracks, false, queue, ctx)
            },
        }
    }

    /// Queue population of every track, split into one contiguous chunk per
    /// worker.
    ///
    /// # Errors
    /// [`ErrorKind::Unnumbered`] before [`Disc::numberize`].
    #[tracing::instrument(skip_all, fields(disc = %self.name))]
    pub fn populate(&self, queue: &WorkQueue, ctx: &Arc<Context>) -> Result<()> {
        self.ensure_numbered()?;
        let tracks: Vec<Track> = self.tracks().cloned().collect();
        tracing::debug!(tracks = tracks.len(), workers = queue.workers(), "Queueing population");
        for chunk in divide(tracks, queue.workers()) {
            if chunk.is_empty() {
                continue;
            }
            let ctx = Arc::clone(ctx);
            queue.submit(move || populate_chunk(&ctx, &chunk)).or_raise(|| ErrorKind::Queue)?;
        }
        Ok(())
    }

    /// Split the disc's tracks into runs that each fit [`Disc::capacity`].
    ///
    /// # Errors
    /// [`ErrorKind::Unnumbered`] before [`Disc::numberize`].
    pub fn calculate_splits(&self, ctx: &Context) -> Result<Vec<Split<&Track>>> {
        self.ensure_numbered()?;
        Ok(partition(self.tracks(), self.capacity(), |t| t.size(ctx)))
    }

    /// Total measured size of every track.
    pub fn size(&self, ctx: &Context) -> u64 {
        self.tracks().map(|t| t.size(ctx)).sum()
    }
}

fn populate_chunk(ctx: &Context, chunk: &[Track]) {
    for track in chunk {
        if ctx.is_aborted() {
            tracing::debug!("Run aborted; abandoning remaining tracks");
            return;
        }
        if let Err(e) = track.populate(ctx) {
            tracing::error!(src = %track.src().display(), error = ?e, "Could not populate track");
        }
    }
}

/// Split `items` into `parts` contiguous, order-preserving chunks whose
/// lengths differ by at most one (longer chunks first).
fn divide<T>(items: Vec<T>, parts: usize) -> Vec<Vec<T>> {
    let parts = parts.max(1);
    let (base, extra) = (items.len() / parts, items.len() % parts);
    let mut items = items.into_iter();
    (0..parts).map(|index| items.by_ref().take(base + usize::from(index < extra)).collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::mock_context;
    use crate::context::{OnUnexpected, PopulateMode};
    use crate::folder::ROOT_FOLDER;
    use crate::stats::Snapshot;
    use rstest::rstest;
    use std::fs;
    use std::ops::Deref;
    use tempfile::TempDir;

    /// Durations (seconds) of the sample library.
    const SAMPLES: [(&str, &str); 6] = [
        ("Alpha.flac", "208"),
        ("Bravo.flac", "249"),
        ("Charlie.flac", "278"),
        ("Delta.flac", "343"),
        ("Echo.flac", "274"),
        ("Foxtrot.flac", "294"),
    ];

    struct Fixture {
        library: TempDir,
        output: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let library = tempfile::tempdir().unwrap();
            for (name, seconds) in SAMPLES {
                fs::write(library.path().join(name), seconds).unwrap();
            }
            Self { library, output: tempfile::tempdir().unwrap() }
        }

        fn src(&self, name: &str) -> PathBuf {
            self.library.path().join(name)
        }

        fn disc_path(&self) -> PathBuf {
            self.output.path().join("cd")
        }

        fn audio(&self, names: &[&str]) -> Disc {
            let tracks = names.iter().map(|n| Track::audio(self.src(n), self.disc_path(), PopulateMode::Copy)).collect();
            Disc::new("cd", self.disc_path(), DiscKind::Audio, Layout::Tracks(tracks))
        }

        fn mp3(&self, folders: &[(&str, &[&str])]) -> Disc {
            let folders = folders
                .iter()
                .map(|(folder, names)| {
                    let tracks = names.iter().map(|n| Track::mp3(self.src(n), self.disc_path(), 128)).collect();
                    Folder::new(&self.disc_path(), *folder, tracks)
                })
                .collect();
            Disc::new("cd", self.disc_path(), DiscKind::Mp3, Layout::Folders(folders))
        }

        fn listing(&self) -> Vec<String> {
            fn walk(base: &Path, dir: &Path, out: &mut Vec<String>) {
                let Ok(entries) = fs::read_dir(dir) else { return };
                for entry in entries {
                    let path = entry.unwrap().path();
                    let relative = path.strip_prefix(base).unwrap().to_string_lossy().into_owned();
                    if path.is_dir() {
                        out.push(format!("{relative}/"));
                        walk(base, &path, out);
                    } else {
                        out.push(relative);
                    }
                }
            }
            let mut out = Vec::new();
            walk(&self.disc_path(), &self.disc_path(), &mut out);
            out.sort();
            out
        }
    }

    /// Run one full cycle the way the binary does.
    fn run(disc: &mut Disc, ctx: &Arc<Context>) {
        let queue = WorkQueue::new(3).unwrap();
        disc.numberize().unwrap();
        disc.cleanup(&queue, ctx).unwrap();
        queue.wait();
        disc.populate(&queue, ctx).unwrap();
        queue.shutdown();
    }

    #[rstest]
    #[case(7, 3, vec![3, 2, 2])]
    #[case(2, 4, vec![1, 1, 0, 0])]
    #[case(0, 2, vec![0, 0])]
    #[case(6, 1, vec![6])]
    fn test_divide(#[case] len: usize, #[case] parts: usize, #[case] expected: Vec<usize>) {
        let items: Vec<usize> = (0..len).collect();
        let chunks = divide(items.clone(), parts);
        assert_eq!(chunks.iter().map(Vec::len).collect::<Vec<_>>(), expected);
        assert_eq!(chunks.concat(), items);
    }

    #[test]
    fn test_operations_require_numbering() {
        let fixture = Fixture::new();
        let disc = fixture.audio(&["Alpha.flac"]);
        let ctx = Arc::new(mock_context());
        let queue = WorkQueue::new(1).unwrap();
        for result in [disc.cleanup(&queue, &ctx), disc.populate(&queue, &ctx), disc.calculate_splits(&ctx).map(|_| ())] {
            assert!(matches!(result.unwrap_err().deref(), ErrorKind::Unnumbered(_)));
        }
    }

    #[test]
    fn test_numberize_twice_fails() {
        let fixture = Fixture::new();
        let mut disc = fixture.mp3(&[("Rock", &["Alpha.flac"])]);
        disc.numberize().unwrap();
        assert!(matches!(disc.numberize().unwrap_err().deref(), ErrorKind::AlreadyNumbered(_)));
    }

    #[test]
    fn test_numberize_skips_root_folder_ordinal() {
        let fixture = Fixture::new();
        let mut disc = fixture.mp3(&[
            ("Rock", &["Alpha.flac"]),
            (ROOT_FOLDER, &["Bravo.flac"]),
            ("Jazz", &["Charlie.flac", "Delta.flac"]),
        ]);
        disc.numberize().unwrap();
        let dsts: Vec<PathBuf> = disc.tracks().map(|t| t.dst_path().unwrap().to_path_buf()).collect();
        let cd = fixture.disc_path();
        assert_eq!(
            dsts,
            [
                cd.join("01 Rock/01 Alpha.mp3"),
                cd.join("01 Bravo.mp3"),
                cd.join("02 Jazz/01 Charlie.mp3"),
                cd.join("02 Jazz/02 Delta.mp3"),
            ]
        );
    }

    #[test]
    fn test_populate_audio_disc() {
        let fixture = Fixture::new();
        let ctx = Arc::new(mock_context());
        let mut disc = fixture.audio(&["Alpha.flac", "Bravo.flac", "Charlie.flac"]);
        run(&mut disc, &ctx);

        assert_eq!(fixture.listing(), ["01 Alpha.flac", "02 Bravo.flac", "03 Charlie.flac"]);
        assert_eq!(ctx.stats.snapshot().tracks_populated, 3);
        assert_eq!(disc.size(&ctx), 208 + 249 + 278);
    }

    #[test]
    fn test_second_run_skips_everything() {
        let fixture = Fixture::new();
        let first = Arc::new(mock_context());
        run(&mut fixture.audio(&["Alpha.flac", "Bravo.flac"]), &first);

        let second = Arc::new(mock_context());
        run(&mut fixture.audio(&["Alpha.flac", "Bravo.flac"]), &second);
        let snapshot = second.stats.snapshot();
        assert_eq!(snapshot.tracks_skipped, 2);
        assert_eq!(snapshot.tracks_populated + snapshot.tracks_moved + snapshot.tracks_removed, 0);
    }

    #[test]
    fn test_reorder_renames_instead_of_rebuilding() {
        let fixture = Fixture::new();
        run(&mut fixture.audio(&["Alpha.flac", "Bravo.flac", "Charlie.flac"]), &Arc::new(mock_context()));

        let ctx = Arc::new(mock_context());
        run(&mut fixture.audio(&["Charlie.flac", "Alpha.flac", "Bravo.flac"]), &ctx);
        assert_eq!(fixture.listing(), ["01 Charlie.flac", "02 Alpha.flac", "03 Bravo.flac"]);
        let snapshot = ctx.stats.snapshot();
        assert_eq!(snapshot.tracks_moved, 3);
        assert_eq!(snapshot.tracks_skipped, 3);
        assert_eq!(snapshot.tracks_populated, 0);
    }

    #[test]
    fn test_renamed_entry_moves_back() {
        let fixture = Fixture::new();
        run(&mut fixture.audio(&["Alpha.flac", "Bravo.flac"]), &Arc::new(mock_context()));
        let cd = fixture.disc_path();
        fs::rename(cd.join("02 Bravo.flac"), cd.join("17 Bravo.flac")).unwrap();

        let ctx = Arc::new(mock_context());
        run(&mut fixture.audio(&["Alpha.flac", "Bravo.flac"]), &ctx);
        assert_eq!(fixture.listing(), ["01 Alpha.flac", "02 Bravo.flac"]);
        assert_eq!(ctx.stats.snapshot().tracks_moved, 1);
    }

    #[test]
    fn test_orphans_are_removed() {
        let fixture = Fixture::new();
        run(
            &mut fixture.mp3(&[("Rock", &["Alpha.flac", "Bravo.flac"]), ("Jazz", &["Charlie.flac"])]),
            &Arc::new(mock_context()),
        );

        let ctx = Arc::new(mock_context());
        run(&mut fixture.mp3(&[("Rock", &["Alpha.flac"])]), &ctx);
        assert_eq!(fixture.listing(), ["01 Rock/", "01 Rock/01 Alpha.mp3"]);
        let snapshot = ctx.stats.snapshot();
        assert_eq!(snapshot.folders_removed, 1);
        assert_eq!(snapshot.tracks_removed, 1);
    }

    #[test]
    fn test_folder_reorder_renames_folders() {
        let fixture = Fixture::new();
        run(
            &mut fixture.mp3(&[("Rock", &["Alpha.flac"]), ("Jazz", &["Bravo.flac", "Charlie.flac"])]),
            &Arc::new(mock_context()),
        );

        let ctx = Arc::new(mock_context());
        run(&mut fixture.mp3(&[("Jazz", &["Charlie.flac", "Bravo.flac"]), ("Rock", &["Alpha.flac"])]), &ctx);
        assert_eq!(
            fixture.listing(),
            ["01 Jazz/", "01 Jazz/01 Charlie.mp3", "01 Jazz/02 Bravo.mp3", "02 Rock/", "02 Rock/01 Alpha.mp3"]
        );
        let snapshot = ctx.stats.snapshot();
        assert_eq!(snapshot.folders_moved, 2);
        assert_eq!(snapshot.tracks_moved, 2);
        assert_eq!(snapshot.tracks_populated, 0);
    }

    #[test]
    fn test_duplicates_in_place_are_kept() {
        let fixture = Fixture::new();
        let ctx = Arc::new(mock_context());
        run(&mut fixture.audio(&["Alpha.flac", "Bravo.flac", "Alpha.flac"]), &ctx);
        assert_eq!(fixture.listing(), ["01 Alpha.flac", "02 Bravo.flac", "03 Alpha.flac"]);

        let ctx = Arc::new(mock_context());
        run(&mut fixture.audio(&["Alpha.flac", "Bravo.flac", "Alpha.flac"]), &ctx);
        let snapshot = ctx.stats.snapshot();
        assert_eq!((snapshot.tracks_moved, snapshot.tracks_removed), (0, 0));
        assert_eq!(snapshot.tracks_skipped, 3);
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let fixture = Fixture::new();
        run(&mut fixture.audio(&["Alpha.flac", "Bravo.flac"]), &Arc::new(mock_context()));
        let before = fixture.listing();

        let ctx = Arc::new(mock_context().with_dry(true));
        run(&mut fixture.audio(&["Bravo.flac", "Charlie.flac"]), &ctx);
        assert_eq!(fixture.listing(), before);
        let snapshot = ctx.stats.snapshot();
        assert_eq!(snapshot.tracks_moved, 1);
        assert_eq!(snapshot.tracks_removed, 1);
        assert_eq!(snapshot.tracks_populated, 1);
        assert_eq!(snapshot.tracks_skipped, 1);
    }

    /// Counters of a dry run followed by the same run for real.
    fn dry_then_real(fixture: &Fixture, disc: impl Fn() -> Disc) -> (Snapshot, Snapshot) {
        let dry = Arc::new(mock_context().with_dry(true));
        let before = fixture.listing();
        run(&mut disc(), &dry);
        assert_eq!(fixture.listing(), before);

        let real = Arc::new(mock_context());
        run(&mut disc(), &real);
        (dry.stats.snapshot(), real.stats.snapshot())
    }

    #[test]
    fn test_dry_run_predicts_reorder() {
        let fixture = Fixture::new();
        run(&mut fixture.audio(&["Alpha.flac", "Bravo.flac", "Charlie.flac"]), &Arc::new(mock_context()));

        let (dry, real) = dry_then_real(&fixture, || fixture.audio(&["Charlie.flac", "Alpha.flac", "Bravo.flac"]));
        assert_eq!(dry, real);
        assert_eq!((dry.tracks_populated, dry.tracks_skipped, dry.tracks_moved), (0, 3, 3));
    }

    #[test]
    fn test_dry_run_predicts_folder_reorder() {
        let fixture = Fixture::new();
        run(
            &mut fixture.mp3(&[("Rock", &["Alpha.flac"]), ("Jazz", &["Bravo.flac", "Charlie.flac"])]),
            &Arc::new(mock_context()),
        );

        let (dry, real) = dry_then_real(&fixture, || {
            fixture.mp3(&[("Jazz", &["Charlie.flac", "Bravo.flac", "Delta.flac"]), ("Rock", &["Alpha.flac"])])
        });
        assert_eq!(dry, real);
        assert_eq!((dry.folders_moved, dry.tracks_moved), (2, 2));
        assert_eq!((dry.tracks_populated, dry.tracks_skipped), (1, 3));
    }

    #[test]
    fn test_unexpected_directory_in_audio_disc() {
        let fixture = Fixture::new();
        fs::create_dir_all(fixture.disc_path().join("stray")).unwrap();
        let mut disc = fixture.audio(&["Alpha.flac"]);
        disc.numberize().unwrap();
        let queue = WorkQueue::new(1).unwrap();

        let ctx = Arc::new(mock_context());
        disc.cleanup(&queue, &ctx).unwrap();

        let ctx = Arc::new(mock_context().with_on_unexpected(OnUnexpected::Abort));
        let err = disc.cleanup(&queue, &ctx).unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Unexpected(_)));
    }

    #[test]
    fn test_splits_over_capacity() {
        let fixture = Fixture::new();
        let ctx = Arc::new(mock_context());
        let names = ["Alpha.flac", "Charlie.flac", "Echo.flac"];
        let mut disc = fixture.audio(&names).with_capacity(Capacity::Limited(486));
        run(&mut disc, &ctx);

        let splits = disc.calculate_splits(&ctx).unwrap();
        let shape: Vec<(usize, u64, &str, &str)> =
            splits.iter().map(|s| (s.range.len(), s.size, s.first.name(), s.last.name())).collect();
        assert_eq!(shape, [(2, 486, "Alpha", "Charlie"), (1, 274, "Echo", "Echo")]);
    }

    #[rstest]
    #[case(DiscKind::Audio, Capacity::Limited(4_800))]
    #[case(DiscKind::Mp3, Capacity::Limited(700_000_000))]
    fn test_default_capacity(#[case] kind: DiscKind, #[case] expected: Capacity) {
        let disc = Disc::new("cd", "/cd", kind, Layout::Tracks(vec![]));
        assert_eq!(disc.capacity(), expected);
        assert_eq!(disc.with_capacity(Capacity::Unbounded).capacity(), Capacity::Unbounded);
    }
}
