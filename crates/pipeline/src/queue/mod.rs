//! Durable work queue with a single active job.
//!
//! Jobs move `Waiting -> Active -> (Completed | Failed)`. Both terminal
//! states remove the job; there is no queue-level retry because both
//! passes re-query their pending work on the next run anyway. At most one
//! job is active at any time, which is what keeps the scanner and the
//! validator from overlapping with themselves.
//!
//! Recurring work is registered as a named [`RepeatSpec`]. Registration is
//! de-duplicated by name, so restarting the process never stacks a second
//! schedule. The [`scheduler::Scheduler`] turns due schedules into jobs and
//! the [`worker::Worker`] consumes them.

mod memory;
mod pg;
pub mod scheduler;
pub mod worker;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use sitewatch_core::types::{DbId, Timestamp};

use crate::error::StoreError;

pub use memory::MemoryJobQueue;
pub use pg::PgJobQueue;

/// Name of the standing hourly scan schedule.
pub const SCAN_SCHEDULE_NAME: &str = "process-unlabeled-images";

// ---------------------------------------------------------------------------
// Job kinds
// ---------------------------------------------------------------------------

/// The units of work the pipeline knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Classify every image that has not been scanned yet.
    ScanUnlabeled,
    /// Validate every annotation with pending details.
    ValidateAnnotations,
}

impl JobKind {
    /// Stored form in `pipeline_jobs.job_kind`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ScanUnlabeled => "scan_unlabeled",
            Self::ValidateAnnotations => "validate_annotations",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scan_unlabeled" => Some(Self::ScanUnlabeled),
            "validate_annotations" => Some(Self::ValidateAnnotations),
            _ => None,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Queue types
// ---------------------------------------------------------------------------

/// A named recurring job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatSpec {
    pub name: String,
    pub kind: JobKind,
    pub every: Duration,
}

impl RepeatSpec {
    pub fn new(name: impl Into<String>, kind: JobKind, every: Duration) -> Self {
        Self {
            name: name.into(),
            kind,
            every,
        }
    }

    /// Period in whole seconds; sub-second and zero periods are rejected.
    pub fn every_secs(&self) -> Result<i64, StoreError> {
        let secs = self.every.as_secs();
        if secs == 0 {
            return Err(StoreError::Invalid(format!(
                "schedule '{}' must repeat at least every second",
                self.name
            )));
        }
        i64::try_from(secs)
            .map_err(|_| StoreError::Invalid(format!("schedule '{}' period is too long", self.name)))
    }
}

/// A job handed out by [`JobQueue::claim_next`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedJob {
    pub id: DbId,
    pub kind: JobKind,
    /// Set when the job was materialized from a recurring schedule.
    pub schedule_name: Option<String>,
}

/// How an active job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed(String),
}

// ---------------------------------------------------------------------------
// JobQueue
// ---------------------------------------------------------------------------

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Append a one-off job.
    async fn enqueue(&self, kind: JobKind) -> Result<DbId, StoreError>;

    /// Register or update a recurring schedule, de-duplicated by name.
    async fn enqueue_recurring(&self, spec: &RepeatSpec) -> Result<(), StoreError>;

    /// Turn every schedule due at `now` into a waiting job.
    ///
    /// Returns the number of jobs enqueued.
    async fn enqueue_due(&self, now: Timestamp) -> Result<usize, StoreError>;

    /// Move the oldest waiting job to active.
    ///
    /// Returns `None` when nothing waits or a job is already active.
    async fn claim_next(&self) -> Result<Option<QueuedJob>, StoreError>;

    /// Close out an active job. The job is removed in either outcome.
    async fn finish(&self, id: DbId, outcome: &JobOutcome) -> Result<(), StoreError>;

    /// Drop jobs left active by a process that died mid-run.
    async fn recover_abandoned(&self) -> Result<u64, StoreError>;
}
