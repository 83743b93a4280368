//! Download command - fetch a collection with parallel workers.

use std::path::PathBuf;

use archivefetch::config::ConfigFile;
use archivefetch::download::{DownloadOrchestrator, RunProgressCallback, RunReport};
use archivefetch::job::DownloadJob;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::common::{
    build_client, load_config, resolve_destination, resolve_worker_timeout, resolve_workers,
    ClientArgs,
};
use crate::error::CliError;

/// Arguments for the download command.
pub struct DownloadArgs {
    pub identifier: String,
    pub destination: Option<PathBuf>,
    pub glob: Option<String>,
    pub workers: Option<usize>,
    pub worker_timeout: Option<u64>,
    pub client: ClientArgs,
    pub no_progress: bool,
}

/// Run the download command.
pub fn run(args: DownloadArgs) -> Result<(), CliError> {
    let config = load_config()?;
    let job = build_job(&args, &config)?;
    let client = build_client(args.client.resolve(&config))?;

    println!("Collection:  {}", job.identifier());
    println!("Destination: {}", job.destination().display());
    if let Some(filter) = job.filter() {
        println!("Filter:      {}", filter);
    }
    println!("Workers:     {}", job.workers());
    println!();

    // Set up signal handler for graceful shutdown
    let token = CancellationToken::new();
    let token_clone = token.clone();
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Received interrupt, finishing running workers...");
        token_clone.cancel();
    })
    .map_err(|e| CliError::Signal(e.to_string()))?;

    let mut orchestrator = DownloadOrchestrator::with_client(client).with_cancellation(token);
    let bar = (!args.no_progress).then(progress_bar);
    if let Some(bar) = &bar {
        orchestrator = orchestrator.with_progress(progress_callback(bar.clone()));
    }

    let result = orchestrator.run(&job);
    if let Some(bar) = &bar {
        bar.finish_and_clear();
    }
    let report = result?;

    print_report(&report);
    info!(
        identifier = %report.identifier,
        succeeded = report.succeeded(),
        failed = report.failed(),
        "Download finished"
    );

    if report.is_success() {
        Ok(())
    } else {
        Err(CliError::IncompleteRun {
            failed: report.failed(),
            requested: report.requested,
        })
    }
}

/// Build the job from CLI args and config.
fn build_job(args: &DownloadArgs, config: &ConfigFile) -> Result<DownloadJob, CliError> {
    let destination = resolve_destination(args.destination.clone(), config)?;
    let mut builder = DownloadJob::builder(args.identifier.as_str(), destination)
        .with_workers(resolve_workers(args.workers, config));
    if let Some(glob) = &args.glob {
        builder = builder.with_filter(glob.as_str());
    }
    if let Some(timeout) = resolve_worker_timeout(args.worker_timeout, config) {
        builder = builder.with_worker_timeout(timeout);
    }
    Ok(builder.build()?)
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({msg})",
    )
    .map(|s| s.progress_chars("=> "))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}

fn progress_callback(bar: ProgressBar) -> RunProgressCallback {
    Box::new(move |workers_done, workers_total, files_done, files_total| {
        bar.set_length(files_total as u64);
        bar.set_position(files_done as u64);
        bar.set_message(format!("{}/{} workers", workers_done, workers_total));
    })
}

fn print_report(report: &RunReport) {
    println!("Run Summary");
    println!("───────────");
    println!("  Requested: {}", report.requested);
    println!("  Succeeded: {}", style(report.succeeded()).green());
    if report.is_success() {
        println!("  Failed:    {}", report.failed());
    } else {
        println!("  Failed:    {}", style(report.failed()).red().bold());
    }
    println!(
        "  Workers:   {} ({:.1}s)",
        report.workers,
        report.elapsed.as_secs_f64()
    );

    if !report.is_success() {
        println!();
        println!("Failed files:");
        for failure in &report.failures {
            println!("  {} {}", style("✗").red(), failure);
        }
    }
}
