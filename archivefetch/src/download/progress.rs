//! Progress reporting for download runs.

/// Progress callback invoked each time a worker finishes.
///
/// # Arguments
///
/// * `workers_done` - Number of workers that have produced an outcome
/// * `workers_total` - Number of partitions in the run
/// * `files_done` - Files accounted for so far (succeeded or failed)
/// * `files_total` - Total number of files in the run
pub type RunProgressCallback = Box<dyn Fn(usize, usize, usize, usize) + Send + Sync>;

/// Running totals for one run, owned by the executor's join loop.
#[derive(Debug, Default)]
pub(crate) struct ProgressTracker {
    workers_done: usize,
    workers_total: usize,
    files_done: usize,
    files_total: usize,
}

impl ProgressTracker {
    /// Start tracking a run of `workers_total` partitions and `files_total` files.
    pub(crate) fn new(workers_total: usize, files_total: usize) -> Self {
        Self {
            workers_total,
            files_total,
            ..Default::default()
        }
    }

    /// Record a finished worker and notify the callback, if any.
    pub(crate) fn worker_finished(&mut self, files: usize, callback: Option<&RunProgressCallback>) {
        self.workers_done += 1;
        self.files_done += files;

        if let Some(cb) = callback {
            cb(
                self.workers_done,
                self.workers_total,
                self.files_done,
                self.files_total,
            );
        }
    }

    /// Number of workers that have finished.
    pub(crate) fn workers_done(&self) -> usize {
        self.workers_done
    }
}
