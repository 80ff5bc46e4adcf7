mod cli;
mod error;
mod load;
mod report;

use crate::cli::Cli;
use crate::error::{ErrorKind, Result};
use crate::load::{NoQuery, Overrides};
use crate::report::StatusReporter;
use cdman_config::Config;
use cdman_library::source::{Beets, Query};
use cdman_library::{Context, Disc, DiscKind, Snapshot};
use cdman_media::{Ffmpeg, LoftyProbe, Transcoder, Unavailable};
use cdman_workqueue::WorkQueue;
use clap::Parser;
use exn::ResultExt;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())))
        .init();

    match run(&cli) {
        Ok(summary) if summary.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = ?e, "cdman failed");
            ExitCode::FAILURE
        },
    }
}

fn run(cli: &Cli) -> Result<Summary> {
    let mut config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    config.dry |= cli.dry;
    if let Some(threads) = cli.threads {
        config.threads = threads;
    }
    config.validate().or_raise(|| ErrorKind::Config)?;
    if config.dry {
        tracing::info!("Dry run; nothing will be written");
    }

    let query: Box<dyn Query> = match Beets::discover(config.beets_library.clone()) {
        Ok(beets) => Box::new(beets),
        Err(e) => {
            tracing::warn!(error = ?e, "Library queries are unavailable; only playlists will be read");
            Box::new(NoQuery)
        },
    };
    let overrides = Overrides { bitrate: cli.bitrate, population_mode: cli.population_mode };
    let mut discs = load::discs(&config, query.as_ref(), overrides, &cli.only);
    if discs.is_empty() {
        tracing::warn!("No discs to process");
    }

    let transcoder = transcoder(config.dry, &discs)?;
    let ctx = Arc::new(
        Context::new(Arc::new(LoftyProbe), transcoder)
            .with_dry(config.dry)
            .with_on_unexpected(config.on_unexpected),
    );

    let summary = sync(&mut discs, &ctx, config.threads)?;
    for overflow in &summary.overflows {
        tracing::warn!("{overflow}");
    }
    for disc in &summary.failed {
        tracing::error!(disc = %disc, "Disc was not fully processed");
    }
    if summary.aborted {
        tracing::error!("Run aborted on an unexpected filesystem entry");
    }
    tracing::info!("Done. {}", summary.stats);
    Ok(summary)
}

/// A missing transcoder only matters when MP3 tracks will actually be
/// written.
fn transcoder(dry: bool, discs: &[Disc]) -> Result<Arc<dyn Transcoder>> {
    match Ffmpeg::discover() {
        Ok(ffmpeg) => {
            tracing::debug!(path = %ffmpeg.path().display(), "Using ffmpeg");
            Ok(Arc::new(ffmpeg))
        },
        Err(e) => {
            let needed = !dry && discs.iter().any(|d| d.kind() == DiscKind::Mp3 && d.tracks().next().is_some());
            if needed {
                return Err(e).or_raise(|| ErrorKind::Transcoder);
            }
            Ok(Arc::new(Unavailable))
        },
    }
}

#[derive(Debug)]
struct Summary {
    stats: Snapshot,
    /// Discs whose cleanup or population could not be started.
    failed: Vec<String>,
    aborted: bool,
    /// One description per disc that exceeds its capacity.
    overflows: Vec<String>,
}

impl Summary {
    fn is_success(&self) -> bool {
        !self.aborted && self.failed.is_empty()
    }
}

/// Bring every disc directory in line with its definition.
///
/// All discs are numbered first, then every directory is cleaned up, and
/// only once that work has drained are tracks populated.
fn sync(discs: &mut [Disc], ctx: &Arc<Context>, threads: usize) -> Result<Summary> {
    for disc in discs.iter_mut() {
        disc.numberize().or_raise(|| ErrorKind::Disc(disc.name().to_string()))?;
    }

    let reporter = StatusReporter::start(Arc::clone(&ctx.stats));
    let queue = WorkQueue::new(threads).or_raise(|| ErrorKind::Workers)?;
    let mut failed = Vec::new();

    for disc in discs.iter() {
        if ctx.is_aborted() {
            break;
        }
        tracing::info!(disc = disc.name(), path = %disc.path().display(), "Cleaning up");
        if let Err(e) = disc.cleanup(&queue, ctx) {
            tracing::error!(disc = disc.name(), error = ?e, "Cleanup failed; disc will not be populated");
            failed.push(disc.name().to_string());
        }
    }
    queue.wait();

    if ctx.is_aborted() {
        tracing::warn!("Skipping population");
    } else {
        for disc in discs.iter() {
            if failed.iter().any(|f| f == disc.name()) {
                continue;
            }
            tracing::info!(disc = disc.name(), tracks = disc.tracks().count(), "Populating");
            if let Err(e) = disc.populate(&queue, ctx) {
                tracing::error!(disc = disc.name(), error = ?e, "Could not queue population");
                failed.push(disc.name().to_string());
            }
        }
    }
    queue.shutdown();
    let stats = reporter.finish();

    let overflows = discs.iter().filter_map(|d| report::overflow(d, ctx)).collect();
    Ok(Summary { stats, failed, aborted: ctx.is_aborted(), overflows })
}
