//! Aggregated result of a download run.

use std::fmt;
use std::time::Duration;

use super::outcome::WorkerOutcome;
use crate::archive::TransferFailure;

/// Summary of one complete download run.
///
/// Every requested file is counted exactly once, either as succeeded or as
/// failed with a reason. A run with failures still produces a report; use
/// [`RunReport::is_success`] to decide whether the result is acceptable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Collection identifier the run fetched from.
    pub identifier: String,
    /// Number of files in the manifest.
    pub requested: usize,
    /// Names of files available locally after the run, sorted.
    pub succeeded_files: Vec<String>,
    /// Files that could not be fetched, sorted by name.
    pub failures: Vec<TransferFailure>,
    /// Number of workers dispatched. Partitions skipped by cancellation or
    /// whose thread could not be started are not counted.
    pub workers: usize,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl RunReport {
    /// Report for a run whose manifest was empty.
    pub fn empty(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Default::default()
        }
    }

    /// Aggregate worker outcomes into a report.
    pub fn aggregate(
        identifier: impl Into<String>,
        requested: usize,
        outcomes: Vec<WorkerOutcome>,
        elapsed: Duration,
    ) -> Self {
        let workers = outcomes.iter().filter(|o| o.dispatched).count();
        let mut succeeded_files = Vec::new();
        let mut failures = Vec::new();

        for outcome in outcomes {
            succeeded_files.extend(outcome.succeeded);
            failures.extend(
                outcome
                    .failed
                    .into_iter()
                    .map(|(name, reason)| TransferFailure { name, reason }),
            );
        }

        succeeded_files.sort();
        failures.sort_by(|a, b| a.name.cmp(&b.name));

        debug_assert_eq!(succeeded_files.len() + failures.len(), requested);

        Self {
            identifier: identifier.into(),
            requested,
            succeeded_files,
            failures,
            workers,
            elapsed,
        }
    }

    /// Number of files available locally after the run.
    pub fn succeeded(&self) -> usize {
        self.succeeded_files.len()
    }

    /// Number of files that could not be fetched.
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Returns true if no file failed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Collection: {}", self.identifier)?;
        writeln!(f, "Requested:  {}", self.requested)?;
        writeln!(f, "Succeeded:  {}", self.succeeded())?;
        writeln!(f, "Failed:     {}", self.failed())?;
        write!(
            f,
            "Workers:    {} ({:.1}s)",
            self.workers,
            self.elapsed.as_secs_f64()
        )?;

        if !self.failures.is_empty() {
            writeln!(f)?;
            writeln!(f)?;
            write!(f, "Failures:")?;
            for failure in &self.failures {
                writeln!(f)?;
                write!(f, "  - {}", failure)?;
            }
        }

        Ok(())
    }
}
