//! Download run orchestration.
//!
//! Coordinates one run: resolve the manifest, split it into partitions, fan
//! the partitions out to the worker pool and aggregate the outcomes.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn};

use super::executor::WorkerPool;
use super::progress::RunProgressCallback;
use super::report::RunReport;
use crate::archive::{ArchiveCatalog, ArchiveTransport};
use crate::error::{FetchError, FetchResult};
use crate::job::DownloadJob;
use crate::manifest::ManifestResolver;
use crate::partition::partition;

/// Top-level coordinator for download runs.
///
/// The orchestrator holds no per-run state; every run gets a fresh worker
/// pool that lives exactly as long as the run.
pub struct DownloadOrchestrator {
    catalog: Arc<dyn ArchiveCatalog>,
    transport: Arc<dyn ArchiveTransport>,
    cancellation: Option<CancellationToken>,
    on_progress: Option<RunProgressCallback>,
}

impl DownloadOrchestrator {
    /// Create an orchestrator over separate catalog and transport collaborators.
    pub fn new(catalog: Arc<dyn ArchiveCatalog>, transport: Arc<dyn ArchiveTransport>) -> Self {
        Self {
            catalog,
            transport,
            cancellation: None,
            on_progress: None,
        }
    }

    /// Create an orchestrator over a client implementing both collaborators.
    pub fn with_client<C>(client: Arc<C>) -> Self
    where
        C: ArchiveCatalog + ArchiveTransport + 'static,
    {
        let catalog: Arc<dyn ArchiveCatalog> = client.clone();
        Self::new(catalog, client)
    }

    /// Attach a cancellation token checked before and during dispatch.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Invoke `callback` each time a worker finishes.
    pub fn with_progress(mut self, callback: RunProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Run `job` to completion.
    ///
    /// Fails only for configuration errors, an unavailable manifest, or
    /// cancellation before dispatch. File and worker failures are recorded in
    /// the returned report.
    pub fn run(&self, job: &DownloadJob) -> FetchResult<RunReport> {
        let span = info_span!("run", identifier = job.identifier());
        let _entered = span.enter();
        let started = Instant::now();

        job.prepare_destination()?;
        self.ensure_not_cancelled()?;

        let manifest = ManifestResolver::new(self.catalog.as_ref())
            .resolve(job.identifier(), job.filter())?;

        if manifest.is_empty() {
            info!("Manifest is empty, nothing to download");
            return Ok(RunReport::empty(job.identifier()));
        }

        self.ensure_not_cancelled()?;

        let requested = manifest.len();
        let partitions = partition(manifest.names(), job.workers());
        info!(
            files = requested,
            workers = partitions.len(),
            destination = %job.destination().display(),
            "Dispatching partitions"
        );

        let mut pool = WorkerPool::new(Arc::clone(&self.transport));
        if let Some(token) = &self.cancellation {
            pool = pool.with_cancellation(token);
        }
        if let Some(callback) = &self.on_progress {
            pool = pool.with_progress(callback);
        }
        let outcomes = pool.execute(job, partitions);

        let report =
            RunReport::aggregate(job.identifier(), requested, outcomes, started.elapsed());
        if report.is_success() {
            info!(succeeded = report.succeeded(), "Run complete");
        } else {
            warn!(
                succeeded = report.succeeded(),
                failed = report.failed(),
                "Run complete with failures"
            );
        }

        Ok(report)
    }

    fn ensure_not_cancelled(&self) -> FetchResult<()> {
        match &self.cancellation {
            Some(token) if token.is_cancelled() => Err(FetchError::Cancelled),
            _ => Ok(()),
        }
    }
}
