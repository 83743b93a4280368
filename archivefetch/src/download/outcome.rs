//! Worker tasks and their outcomes.
//!
//! A [`WorkerTask`] is the unit handed to a single worker thread. Whatever
//! happens to that thread, the executor ends up with exactly one
//! [`WorkerOutcome`] for it, in which every file of the task is either
//! succeeded or failed with a reason.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::archive::FileOutcome;
use crate::job::DownloadJob;
use crate::partition::Partition;

/// Reason recorded for files the transport never reported on.
pub const UNREPORTED_REASON: &str = "no result reported by transport";

/// Reason recorded for files of partitions never dispatched.
pub const CANCELLED_REASON: &str = "cancelled before dispatch";

/// Abnormal termination of a worker, as opposed to individual file failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerFailure {
    /// The worker panicked before producing an outcome.
    #[error("worker crashed")]
    Crashed,

    /// The worker did not report within the job's worker timeout.
    #[error("worker timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    /// The worker thread could not be started.
    #[error("worker could not be started: {0}")]
    SpawnFailed(String),
}

/// Work assigned to one worker.
#[derive(Debug, Clone)]
pub struct WorkerTask {
    id: usize,
    identifier: String,
    destination: PathBuf,
    names: Vec<String>,
}

impl WorkerTask {
    /// Bind a partition to the job's identifier and destination.
    pub fn new(job: &DownloadJob, partition: Partition) -> Self {
        Self {
            id: partition.index(),
            identifier: job.identifier().to_string(),
            destination: job.destination().to_path_buf(),
            names: partition.into_names(),
        }
    }

    /// Task identifier, equal to the partition index.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Collection identifier.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Destination directory.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// File names assigned to this task.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Result of one worker task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerOutcome {
    /// Identifier of the task this outcome belongs to.
    pub task_id: usize,
    /// Files available locally after the task.
    pub succeeded: BTreeSet<String>,
    /// Files that could not be fetched, with their failure reasons.
    pub failed: BTreeMap<String, String>,
    /// False if the task never ran on a worker thread.
    pub dispatched: bool,
}

impl WorkerOutcome {
    /// Build an outcome from the transport's per-file results.
    ///
    /// Results for names outside the task are ignored. Names of the task the
    /// transport did not report on are marked failed.
    pub fn from_transport(task: &WorkerTask, results: Vec<(String, FileOutcome)>) -> Self {
        let mut reported: BTreeMap<String, FileOutcome> = results.into_iter().collect();
        let mut outcome = Self {
            task_id: task.id,
            dispatched: true,
            ..Default::default()
        };

        for name in &task.names {
            match reported.remove(name) {
                Some(FileOutcome::Downloaded(_)) | Some(FileOutcome::AlreadyPresent) => {
                    outcome.succeeded.insert(name.clone());
                }
                Some(FileOutcome::Failed(reason)) => {
                    outcome.failed.insert(name.clone(), reason);
                }
                None => {
                    outcome
                        .failed
                        .insert(name.clone(), UNREPORTED_REASON.to_string());
                }
            }
        }

        outcome
    }

    /// Build an outcome for a task that was never dispatched, marking every
    /// file failed with `reason`.
    pub fn all_failed(task: &WorkerTask, reason: &str) -> Self {
        Self {
            task_id: task.id,
            succeeded: BTreeSet::new(),
            failed: task
                .names
                .iter()
                .map(|name| (name.clone(), reason.to_string()))
                .collect(),
            dispatched: false,
        }
    }

    /// Build the outcome of a worker that terminated abnormally.
    ///
    /// A worker that could not be started counts as not dispatched.
    pub fn from_failure(task: &WorkerTask, failure: &WorkerFailure) -> Self {
        Self {
            dispatched: !matches!(failure, WorkerFailure::SpawnFailed(_)),
            ..Self::all_failed(task, &failure.to_string())
        }
    }

    /// Number of files covered by this outcome.
    pub fn file_count(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Returns true if no file of the task failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::partition;

    fn task(names: &[&str]) -> WorkerTask {
        let job = DownloadJob::builder("demo", "/tmp/out").build().unwrap();
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        let mut partitions = partition(&names, 1);
        WorkerTask::new(&job, partitions.remove(0))
    }

    #[test]
    fn test_task_carries_job_fields() {
        let task = task(&["a.txt"]);

        assert_eq!(task.id(), 0);
        assert_eq!(task.identifier(), "demo");
        assert_eq!(task.destination(), Path::new("/tmp/out"));
        assert_eq!(task.names(), &["a.txt"]);
    }

    #[test]
    fn test_from_transport_sorts_results() {
        let task = task(&["a.txt", "b.txt", "c.txt"]);
        let outcome = WorkerOutcome::from_transport(
            &task,
            vec![
                ("a.txt".to_string(), FileOutcome::Downloaded(10)),
                ("b.txt".to_string(), FileOutcome::AlreadyPresent),
                ("c.txt".to_string(), FileOutcome::Failed("HTTP 404".to_string())),
            ],
        );

        assert_eq!(outcome.succeeded.len(), 2);
        assert_eq!(outcome.failed.get("c.txt").map(String::as_str), Some("HTTP 404"));
        assert_eq!(outcome.file_count(), 3);
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_from_transport_marks_unreported_files() {
        let task = task(&["a.txt", "b.txt"]);
        let outcome = WorkerOutcome::from_transport(
            &task,
            vec![("a.txt".to_string(), FileOutcome::Downloaded(1))],
        );

        assert_eq!(
            outcome.failed.get("b.txt").map(String::as_str),
            Some(UNREPORTED_REASON)
        );
    }

    #[test]
    fn test_from_transport_ignores_foreign_names() {
        let task = task(&["a.txt"]);
        let outcome = WorkerOutcome::from_transport(
            &task,
            vec![
                ("a.txt".to_string(), FileOutcome::Downloaded(1)),
                ("zzz.txt".to_string(), FileOutcome::Downloaded(1)),
            ],
        );

        assert_eq!(outcome.file_count(), 1);
        assert!(outcome.is_success());
    }

    #[test]
    fn test_from_failure_marks_every_file() {
        let task = task(&["a.txt", "b.txt"]);
        let outcome = WorkerOutcome::from_failure(&task, &WorkerFailure::Crashed);

        assert!(outcome.succeeded.is_empty());
        assert_eq!(outcome.failed.len(), 2);
        assert!(outcome.failed.values().all(|r| r == "worker crashed"));
        assert!(outcome.dispatched);
    }

    #[test]
    fn test_undispatched_outcomes() {
        let task = task(&["a.txt"]);

        assert!(!WorkerOutcome::all_failed(&task, CANCELLED_REASON).dispatched);
        let spawn_failed = WorkerFailure::SpawnFailed("no threads".to_string());
        assert!(!WorkerOutcome::from_failure(&task, &spawn_failed).dispatched);
        assert!(WorkerOutcome::from_transport(&task, Vec::new()).dispatched);
    }

    #[test]
    fn test_worker_failure_display() {
        assert_eq!(WorkerFailure::Crashed.to_string(), "worker crashed");
        assert_eq!(
            WorkerFailure::TimedOut(Duration::from_secs(90)).to_string(),
            "worker timed out after 90s"
        );
    }
}
