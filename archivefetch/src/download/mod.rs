//! Fan-out download orchestration.
//!
//! This module turns a [`DownloadJob`](crate::job::DownloadJob) into a
//! [`RunReport`], including:
//! - Worker task and outcome types (`outcome`)
//! - Bounded, isolated worker threads (`executor`)
//! - Per-worker progress callbacks (`progress`)
//! - Run-level aggregation (`report`)
//! - High-level run coordination (`orchestrator`)
//!
//! # Architecture
//!
//! ```text
//! DownloadOrchestrator
//!         │
//!         ├── ManifestResolver ──► ArchiveCatalog (trait)
//!         │
//!         ├── partition()
//!         │
//!         ├── WorkerPool ──► worker thread × N ──► ArchiveTransport (trait)
//!         │
//!         └── RunReport (aggregated outcomes)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use archivefetch::archive::ArchiveOrgClient;
//! use archivefetch::download::DownloadOrchestrator;
//! use archivefetch::job::DownloadJob;
//!
//! let client = Arc::new(ArchiveOrgClient::new()?);
//! let job = DownloadJob::builder("demo-collection", "./downloads")
//!     .with_filter("*.pdf")
//!     .with_workers(4)
//!     .build()?;
//!
//! let report = DownloadOrchestrator::with_client(client).run(&job)?;
//! println!("{}", report);
//! ```

mod executor;
mod orchestrator;
mod outcome;
mod progress;
mod report;

pub use executor::WorkerPool;
pub use orchestrator::DownloadOrchestrator;
pub use outcome::{WorkerFailure, WorkerOutcome, WorkerTask, CANCELLED_REASON, UNREPORTED_REASON};
pub use progress::RunProgressCallback;
pub use report::RunReport;
