//! Worker pool executor.
//!
//! Runs one worker thread per partition, at most `job.workers()` at a time,
//! and collects exactly one [`WorkerOutcome`] per partition. Workers report
//! through a channel; the join loop is the only place the executor blocks.
//!
//! A panicking worker is caught and reported as [`WorkerFailure::Crashed`].
//! A worker that exceeds the job's worker timeout is reported as
//! [`WorkerFailure::TimedOut`] and its thread is left to finish on its own.

use std::collections::{BTreeMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Span};

use super::outcome::{WorkerFailure, WorkerOutcome, WorkerTask, CANCELLED_REASON};
use super::progress::{ProgressTracker, RunProgressCallback};
use crate::archive::ArchiveTransport;
use crate::job::DownloadJob;
use crate::partition::Partition;

/// A dispatched worker the join loop is still waiting on.
struct RunningWorker {
    task: WorkerTask,
    deadline: Option<Instant>,
    timeout: Duration,
}

/// Executes partitions on a pool of worker threads scoped to one run.
pub struct WorkerPool<'a> {
    transport: Arc<dyn ArchiveTransport>,
    cancellation: Option<&'a CancellationToken>,
    on_progress: Option<&'a RunProgressCallback>,
}

impl<'a> WorkerPool<'a> {
    /// Create an executor dispatching to `transport`.
    pub fn new(transport: Arc<dyn ArchiveTransport>) -> Self {
        Self {
            transport,
            cancellation: None,
            on_progress: None,
        }
    }

    /// Stop dispatching further partitions once `token` is cancelled.
    pub fn with_cancellation(mut self, token: &'a CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Invoke `callback` each time a worker finishes.
    pub fn with_progress(mut self, callback: &'a RunProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Run every partition and return one outcome per partition.
    ///
    /// Outcomes are returned in completion order.
    pub fn execute(&self, job: &DownloadJob, partitions: Vec<Partition>) -> Vec<WorkerOutcome> {
        let files_total = partitions.iter().map(Partition::len).sum();
        let mut tracker = ProgressTracker::new(partitions.len(), files_total);
        let mut queue: VecDeque<WorkerTask> = partitions
            .into_iter()
            .map(|p| WorkerTask::new(job, p))
            .collect();

        let (tx, rx) = mpsc::channel();
        let mut running: BTreeMap<usize, RunningWorker> = BTreeMap::new();
        let mut outcomes = Vec::with_capacity(queue.len());

        loop {
            while running.len() < job.workers() && !self.is_cancelled() {
                let Some(task) = queue.pop_front() else {
                    break;
                };
                match self.spawn_worker(task.clone(), tx.clone()) {
                    Ok(()) => {
                        let timeout = job.worker_timeout().unwrap_or(Duration::MAX);
                        running.insert(
                            task.id(),
                            RunningWorker {
                                deadline: Instant::now().checked_add(timeout),
                                timeout,
                                task,
                            },
                        );
                    }
                    Err(failure) => {
                        warn!(task = task.id(), error = %failure, "Worker failed to start");
                        let outcome = WorkerOutcome::from_failure(&task, &failure);
                        tracker.worker_finished(outcome.file_count(), self.on_progress);
                        outcomes.push(outcome);
                    }
                }
            }

            if running.is_empty() {
                break;
            }

            for outcome in self.wait_for_next(&rx, &mut running) {
                tracker.worker_finished(outcome.file_count(), self.on_progress);
                outcomes.push(outcome);
            }
        }

        if !queue.is_empty() {
            warn!(
                skipped = queue.len(),
                "Run cancelled, remaining partitions not dispatched"
            );
            for task in queue {
                let outcome = WorkerOutcome::all_failed(&task, CANCELLED_REASON);
                tracker.worker_finished(outcome.file_count(), self.on_progress);
                outcomes.push(outcome);
            }
        }

        debug!(workers = tracker.workers_done(), "All workers joined");
        outcomes
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation.is_some_and(CancellationToken::is_cancelled)
    }

    /// Start a worker thread for `task`.
    ///
    /// The thread always sends exactly one outcome unless the receiver is gone.
    fn spawn_worker(
        &self,
        task: WorkerTask,
        tx: Sender<WorkerOutcome>,
    ) -> Result<(), WorkerFailure> {
        let transport = Arc::clone(&self.transport);
        let span = info_span!("worker", id = task.id(), files = task.names().len());

        thread::Builder::new()
            .name(format!("archivefetch-worker-{}", task.id()))
            .spawn(move || run_worker(&*transport, task, tx, span))
            .map(|_| ())
            .map_err(|e| WorkerFailure::SpawnFailed(e.to_string()))
    }

    /// Block until at least one running worker reports or times out.
    fn wait_for_next(
        &self,
        rx: &Receiver<WorkerOutcome>,
        running: &mut BTreeMap<usize, RunningWorker>,
    ) -> Vec<WorkerOutcome> {
        let next_deadline = running.values().filter_map(|w| w.deadline).min();

        let received = match next_deadline {
            Some(deadline) => {
                rx.recv_timeout(deadline.saturating_duration_since(Instant::now()))
            }
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(outcome) => {
                // A worker declared timed out may still report later.
                if running.remove(&outcome.task_id).is_some() {
                    debug!(
                        task = outcome.task_id,
                        failed = outcome.failed.len(),
                        "Worker joined"
                    );
                    vec![outcome]
                } else {
                    debug!(task = outcome.task_id, "Ignoring late outcome");
                    Vec::new()
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                let now = Instant::now();
                let expired: Vec<usize> = running
                    .iter()
                    .filter(|(_, w)| w.deadline.is_some_and(|d| d <= now))
                    .map(|(id, _)| *id)
                    .collect();

                expired
                    .into_iter()
                    .filter_map(|id| running.remove(&id))
                    .map(|worker| {
                        let failure = WorkerFailure::TimedOut(worker.timeout);
                        warn!(
                            task = worker.task.id(),
                            error = %failure,
                            "Worker did not report in time"
                        );
                        WorkerOutcome::from_failure(&worker.task, &failure)
                    })
                    .collect()
            }
            Err(RecvTimeoutError::Disconnected) => {
                // Unreachable while the executor holds a sender; fail what is left.
                std::mem::take(running)
                    .into_values()
                    .map(|worker| {
                        WorkerOutcome::from_failure(&worker.task, &WorkerFailure::Crashed)
                    })
                    .collect()
            }
        }
    }
}

/// Body of a worker thread.
fn run_worker(
    transport: &dyn ArchiveTransport,
    task: WorkerTask,
    tx: Sender<WorkerOutcome>,
    span: Span,
) {
    let _entered = span.enter();
    debug!(identifier = task.identifier(), "Worker started");

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        transport.download(task.identifier(), task.destination(), task.names())
    }));

    let outcome = match result {
        Ok(results) => WorkerOutcome::from_transport(&task, results),
        Err(_) => {
            warn!("Worker crashed during transfer");
            WorkerOutcome::from_failure(&task, &WorkerFailure::Crashed)
        }
    };

    debug!(
        succeeded = outcome.succeeded.len(),
        failed = outcome.failed.len(),
        "Worker finished"
    );
    tx.send(outcome).ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::FileOutcome;
    use crate::partition::partition;
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Transport that reports every file downloaded and tracks concurrency.
    #[derive(Default)]
    struct CountingTransport {
        active: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl ArchiveTransport for CountingTransport {
        fn download(
            &self,
            _identifier: &str,
            _destination: &Path,
            names: &[String],
        ) -> Vec<(String, FileOutcome)> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(self.delay);
            self.active.fetch_sub(1, Ordering::SeqCst);
            names
                .iter()
                .map(|n| (n.clone(), FileOutcome::Downloaded(1)))
                .collect()
        }
    }

    /// Transport that panics for one named file and hangs for another.
    struct MisbehavingTransport {
        panic_on: &'static str,
        hang_on: &'static str,
    }

    impl ArchiveTransport for MisbehavingTransport {
        fn download(
            &self,
            _identifier: &str,
            _destination: &Path,
            names: &[String],
        ) -> Vec<(String, FileOutcome)> {
            if names.iter().any(|n| n == self.panic_on) {
                panic!("simulated worker crash");
            }
            if names.iter().any(|n| n == self.hang_on) {
                thread::sleep(Duration::from_secs(5));
            }
            names
                .iter()
                .map(|n| (n.clone(), FileOutcome::Downloaded(1)))
                .collect()
        }
    }

    /// Transport that cancels the run during its first call.
    struct CancellingTransport {
        token: CancellationToken,
        seen: Mutex<Vec<String>>,
    }

    impl ArchiveTransport for CancellingTransport {
        fn download(
            &self,
            _identifier: &str,
            _destination: &Path,
            names: &[String],
        ) -> Vec<(String, FileOutcome)> {
            self.token.cancel();
            self.seen.lock().unwrap().extend(names.iter().cloned());
            names
                .iter()
                .map(|n| (n.clone(), FileOutcome::AlreadyPresent))
                .collect()
        }
    }

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("file-{:02}.txt", i)).collect()
    }

    fn job(workers: usize) -> DownloadJob {
        DownloadJob::builder("demo", "/tmp/archivefetch-test")
            .with_workers(workers)
            .build()
            .unwrap()
    }

    #[test]
    fn test_one_outcome_per_partition() {
        let transport = Arc::new(CountingTransport::default());
        let pool = WorkerPool::new(transport.clone());

        let outcomes = pool.execute(&job(4), partition(&names(10), 4));

        assert_eq!(outcomes.len(), 4);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 4);
        let ids: HashSet<usize> = outcomes.iter().map(|o| o.task_id).collect();
        assert_eq!(ids, (0..4).collect::<HashSet<usize>>());
        assert!(outcomes.iter().all(WorkerOutcome::is_success));
    }

    #[test]
    fn test_concurrency_bounded_by_worker_count() {
        let transport = Arc::new(CountingTransport {
            delay: Duration::from_millis(30),
            ..Default::default()
        });
        let pool = WorkerPool::new(transport.clone());

        // Six partitions, but the job allows only two at a time.
        let outcomes = pool.execute(&job(2), partition(&names(12), 6));

        assert_eq!(outcomes.len(), 6);
        assert!(transport.peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_crashed_worker_is_isolated() {
        let transport = Arc::new(MisbehavingTransport {
            panic_on: "file-04.txt",
            hang_on: "never",
        });
        let pool = WorkerPool::new(transport);

        let outcomes = pool.execute(&job(3), partition(&names(10), 3));

        assert_eq!(outcomes.len(), 3);
        let crashed: Vec<&WorkerOutcome> = outcomes.iter().filter(|o| !o.is_success()).collect();
        assert_eq!(crashed.len(), 1);
        assert_eq!(crashed[0].task_id, 1);
        assert_eq!(crashed[0].failed.len(), 3);
        assert!(crashed[0].failed.values().all(|r| r == "worker crashed"));
    }

    #[test]
    fn test_unresponsive_worker_times_out() {
        let transport = Arc::new(MisbehavingTransport {
            panic_on: "never",
            hang_on: "file-00.txt",
        });
        let pool = WorkerPool::new(transport);
        let job = DownloadJob::builder("demo", "/tmp/archivefetch-test")
            .with_workers(2)
            .with_worker_timeout(Duration::from_millis(200))
            .build()
            .unwrap();

        let started = Instant::now();
        let outcomes = pool.execute(&job, partition(&names(4), 2));

        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(outcomes.len(), 2);
        let timed_out = outcomes.iter().find(|o| o.task_id == 0).unwrap();
        assert!(timed_out.failed.values().all(|r| r.starts_with("worker timed out")));
        let healthy = outcomes.iter().find(|o| o.task_id == 1).unwrap();
        assert!(healthy.is_success());
    }

    #[test]
    fn test_cancelled_before_dispatch() {
        let transport = Arc::new(CountingTransport::default());
        let token = CancellationToken::new();
        token.cancel();
        let pool = WorkerPool::new(transport.clone()).with_cancellation(&token);

        let outcomes = pool.execute(&job(2), partition(&names(4), 2));

        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes
            .iter()
            .flat_map(|o| o.failed.values())
            .all(|r| r == CANCELLED_REASON));
    }

    #[test]
    fn test_cancellation_stops_further_dispatch() {
        let token = CancellationToken::new();
        let transport = Arc::new(CancellingTransport {
            token: token.clone(),
            seen: Mutex::new(Vec::new()),
        });
        let pool = WorkerPool::new(transport.clone()).with_cancellation(&token);

        // One worker at a time: the first partition cancels the rest.
        let outcomes = pool.execute(&job(1), partition(&names(6), 3));

        assert_eq!(outcomes.len(), 3);
        assert_eq!(*transport.seen.lock().unwrap(), vec!["file-00.txt", "file-01.txt"]);
        assert!(outcomes[0].is_success());
        assert_eq!(outcomes[1].failed.len() + outcomes[2].failed.len(), 4);
    }

    #[test]
    fn test_progress_callback_per_worker() {
        let transport = Arc::new(CountingTransport::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let callback: RunProgressCallback = Box::new(move |done, total, files, files_total| {
            seen_clone.lock().unwrap().push((done, total, files, files_total));
        });
        let pool = WorkerPool::new(transport).with_progress(&callback);

        pool.execute(&job(3), partition(&names(5), 3));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen.last().copied(), Some((3, 3, 5, 5)));
    }
}
