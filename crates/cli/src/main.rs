mod args;
mod scan;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transonic_core::queue::{ConvertTask, DiscoverTask, TaskQueue};
use transonic_core::{
    load_config, validate_config, Config, FfmpegEngine, NameGenerator, SoundFile, Task,
    TranscodeEngine,
};

use args::{apply_overrides, Args};

/// Engine teardown needs a short grace period before the process exits.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration, apply command line overrides, validate before
    // anything is queued.
    let mut config = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => {
            let default_path = PathBuf::from("transonic.toml");
            if default_path.exists() {
                info!("loading transonic.toml from current directory");
                load_config(&default_path).context("failed to load transonic.toml")?
            } else {
                Config::default()
            }
        }
    };
    apply_overrides(&mut config, &args);
    validate_config(&config).context("configuration validation failed")?;

    let format = config.output.format;
    let engine: Arc<dyn TranscodeEngine> = Arc::new(FfmpegEngine::new(config.engine.clone()));
    engine
        .validate(&[format])
        .await
        .context("transcoding engine validation failed")?;

    let mut sound_files = scan::collect_sound_files(&args.inputs);
    if sound_files.is_empty() {
        bail!("no audio files found in the given inputs");
    }
    info!(files = sound_files.len(), "starting conversion to {format:?}");

    discover(&engine, &config, &mut sound_files).await;

    let unreadable = sound_files.iter().filter(|sf| !sf.readable).count();
    if unreadable > 0 {
        warn!("{unreadable} file(s) are not readable and will be skipped");
    }

    // Freeze the per-job snapshots; configuration edits from here on cannot
    // affect the batch.
    let options = config.output.convert_options();
    let generator = NameGenerator::new(config.naming.naming_options(format.extension()))
        .context("invalid naming pattern")?;

    let mut queue = TaskQueue::new(config.queue.queue_config());
    for sound_file in sound_files.iter().filter(|sf| sf.readable) {
        let task = ConvertTask::new(
            sound_file.clone(),
            Arc::clone(&engine),
            generator.clone(),
            options.clone(),
        );
        queue.add(task).await;
    }
    queue.run().await;

    let bar = progress_bar(queue.total() as u64);
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        // The step future is dropped before the queue is touched again.
        let stepped = tokio::select! {
            finished = queue.step() => Some(finished),
            _ = &mut ctrl_c => None,
        };

        match stepped {
            Some(finished) => {
                bar.set_position((queue.weighted_progress() * 1000.0) as u64);
                let eta = queue
                    .eta()
                    .map(|d| format!("{}s left", d.as_secs()))
                    .unwrap_or_default();
                bar.set_message(format!("{}/{} {eta}", queue.done_len(), queue.total()));
                if finished {
                    break;
                }
            }
            None => {
                bar.abandon();
                warn!("interrupted, cancelling {} running job(s)", queue.running_len());
                queue.cancel().await;
                tokio::time::sleep(SHUTDOWN_GRACE).await;
                bail!("interrupted");
            }
        }
    }
    bar.finish_and_clear();

    report(&queue, unreadable)
}

/// Runs the discovery pass and applies the results to the sound files.
async fn discover(
    engine: &Arc<dyn TranscodeEngine>,
    config: &Config,
    sound_files: &mut [SoundFile],
) {
    let mut queue = TaskQueue::new(config.queue.queue_config());
    for sound_file in sound_files.iter() {
        queue
            .add(DiscoverTask::new(Arc::clone(engine), &sound_file.path))
            .await;
    }
    queue.run().await;
    queue.drive().await;

    let mut by_path: HashMap<PathBuf, &mut SoundFile> = sound_files
        .iter_mut()
        .map(|sf| (sf.path.clone(), sf))
        .collect();
    for task in queue.done_tasks() {
        if let Some(sound_file) = by_path.get_mut(task.path()) {
            sound_file.apply(task.discovery());
        }
    }
}

fn progress_bar(total_tasks: u64) -> ProgressBar {
    let bar = ProgressBar::new(1000);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {percent:>3}% {msg}")
            .expect("valid template"),
    );
    bar.set_message(format!("0/{total_tasks}"));
    bar
}

/// Logs the outcome of the batch; non-zero exit when anything failed.
fn report(queue: &TaskQueue<ConvertTask>, unreadable: usize) -> Result<()> {
    let mut converted = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;

    for task in queue.done_tasks() {
        match task.error() {
            Some(error) => {
                failed += 1;
                error!(
                    source = %task.source().path.display(),
                    "conversion failed: {error}"
                );
            }
            None if task.skipped() => skipped += 1,
            None => converted += 1,
        }
    }

    info!("{converted} converted, {skipped} skipped, {failed} failed");

    if failed + unreadable > 0 {
        bail!("{} file(s) were not converted", failed + unreadable);
    }
    Ok(())
}
