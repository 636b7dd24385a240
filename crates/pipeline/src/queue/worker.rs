//! Queue consumer.
//!
//! A single long-lived task claims one job at a time, runs it through a
//! [`JobHandler`] and closes it out. A failing job is logged and removed;
//! the pass it belonged to runs again on the next schedule.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sitewatch_core::types::DbId;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::{JobKind, JobOutcome, JobQueue, QueuedJob};
use crate::error::{PipelineError, StoreError};
use crate::scanner::{ScanReport, Scanner};
use crate::validator::{ValidationReport, Validator};

/// Default interval between queue polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Result of one executed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSummary {
    Scan(ScanReport),
    Validation(ValidationReport),
}

impl fmt::Display for JobSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scan(r) => write!(f, "processed {} images", r.processed),
            Self::Validation(r) => write!(
                f,
                "validated {} annotations, {} details resolved",
                r.records, r.resolved_details
            ),
        }
    }
}

/// Executes one claimed job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &QueuedJob) -> Result<JobSummary, PipelineError>;
}

/// Routes jobs to the scanner and the validator.
pub struct PipelineJobHandler {
    scanner: Arc<Scanner>,
    validator: Arc<Validator>,
}

impl PipelineJobHandler {
    pub fn new(scanner: Arc<Scanner>, validator: Arc<Validator>) -> Self {
        Self { scanner, validator }
    }
}

#[async_trait]
impl JobHandler for PipelineJobHandler {
    async fn handle(&self, job: &QueuedJob) -> Result<JobSummary, PipelineError> {
        match job.kind {
            JobKind::ScanUnlabeled => Ok(JobSummary::Scan(self.scanner.scan().await?)),
            JobKind::ValidateAnnotations => Ok(JobSummary::Validation(
                self.validator.validate_pending().await?,
            )),
        }
    }
}

pub struct Worker {
    queue: Arc<dyn JobQueue>,
    handler: Arc<dyn JobHandler>,
    poll_interval: Duration,
    /// A job whose outcome could not be recorded. It still holds the
    /// active slot, so it must be finished before anything else is claimed.
    unfinished: Mutex<Option<(DbId, JobOutcome)>>,
}

impl Worker {
    pub fn new(queue: Arc<dyn JobQueue>, handler: Arc<dyn JobHandler>) -> Self {
        Self {
            queue,
            handler,
            poll_interval: DEFAULT_POLL_INTERVAL,
            unfinished: Mutex::new(None),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Claim and execute at most one job.
    ///
    /// Returns the finished job, or `None` when nothing was claimable.
    /// If recording the outcome fails, the job is retried for closing on
    /// the next call before another job is claimed.
    pub async fn run_once(&self) -> Result<Option<(QueuedJob, JobOutcome)>, StoreError> {
        self.finish_unfinished().await?;

        let Some(job) = self.queue.claim_next().await? else {
            return Ok(None);
        };

        tracing::info!(
            job_id = job.id,
            kind = %job.kind,
            schedule = job.schedule_name.as_deref().unwrap_or("-"),
            "Job started",
        );

        let outcome = match self.handler.handle(&job).await {
            Ok(summary) => {
                tracing::info!(job_id = job.id, kind = %job.kind, "Job completed: {summary}");
                JobOutcome::Completed
            }
            Err(e) => {
                tracing::error!(job_id = job.id, kind = %job.kind, error = %e, "Job failed");
                JobOutcome::Failed(e.to_string())
            }
        };

        if let Err(e) = self.queue.finish(job.id, &outcome).await {
            tracing::warn!(job_id = job.id, error = %e, "Failed to record job outcome, will retry");
            *self.unfinished.lock().await = Some((job.id, outcome));
            return Err(e);
        }
        Ok(Some((job, outcome)))
    }

    /// Close out a job left active by an earlier failed `finish`.
    async fn finish_unfinished(&self) -> Result<(), StoreError> {
        let mut unfinished = self.unfinished.lock().await;
        if let Some((job_id, outcome)) = unfinished.as_ref() {
            self.queue.finish(*job_id, outcome).await?;
            tracing::info!(job_id, "Recorded outcome of earlier job");
            *unfinished = None;
        }
        Ok(())
    }

    /// Run the consume loop until `cancel` fires.
    ///
    /// The job in progress is allowed to finish; cancellation is only
    /// observed between jobs.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Pipeline worker started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Pipeline worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.drain().await {
                        tracing::error!(error = %e, "Queue poll failed");
                    }
                }
            }
        }
    }

    /// Run jobs back to back until the queue has nothing claimable.
    async fn drain(&self) -> Result<(), StoreError> {
        while self.run_once().await?.is_some() {}
        Ok(())
    }
}
