use async_trait::async_trait;
use sitewatch_core::types::{DbId, Timestamp};
use sitewatch_db::repositories::{JobRepo, JobScheduleRepo};
use sitewatch_db::DbPool;

use super::{JobKind, JobOutcome, JobQueue, QueuedJob, RepeatSpec};
use crate::error::StoreError;

/// [`JobQueue`] over the `pipeline_jobs` and `job_schedules` tables.
#[derive(Clone)]
pub struct PgJobQueue {
    pool: DbPool,
}

impl PgJobQueue {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn enqueue(&self, kind: JobKind) -> Result<DbId, StoreError> {
        let job = JobRepo::enqueue(&self.pool, kind.as_str(), None).await?;
        tracing::debug!(job_id = job.id, kind = %kind, "Job enqueued");
        Ok(job.id)
    }

    async fn enqueue_recurring(&self, spec: &RepeatSpec) -> Result<(), StoreError> {
        let every_secs = spec.every_secs()?;
        let schedule =
            JobScheduleRepo::upsert(&self.pool, &spec.name, spec.kind.as_str(), every_secs).await?;
        tracing::info!(
            schedule = %schedule.name,
            kind = %spec.kind,
            every_secs,
            next_run_at = %schedule.next_run_at,
            "Recurring job registered",
        );
        Ok(())
    }

    async fn enqueue_due(&self, now: Timestamp) -> Result<usize, StoreError> {
        let due = JobScheduleRepo::claim_due(&self.pool, now).await?;
        let mut enqueued = 0;

        for schedule in &due {
            let Some(kind) = JobKind::parse(&schedule.job_kind) else {
                tracing::warn!(
                    schedule = %schedule.name,
                    job_kind = %schedule.job_kind,
                    "Schedule has unknown job kind, skipping",
                );
                continue;
            };
            let job = JobRepo::enqueue(&self.pool, kind.as_str(), Some(&schedule.name)).await?;
            tracing::debug!(job_id = job.id, schedule = %schedule.name, "Scheduled job enqueued");
            enqueued += 1;
        }

        Ok(enqueued)
    }

    async fn claim_next(&self) -> Result<Option<QueuedJob>, StoreError> {
        loop {
            let Some(job) = JobRepo::claim_next(&self.pool).await? else {
                return Ok(None);
            };

            match JobKind::parse(&job.job_kind) {
                Some(kind) => {
                    return Ok(Some(QueuedJob {
                        id: job.id,
                        kind,
                        schedule_name: job.schedule_name,
                    }))
                }
                None => {
                    tracing::warn!(
                        job_id = job.id,
                        job_kind = %job.job_kind,
                        "Discarding job of unknown kind",
                    );
                    JobRepo::discard(&self.pool, job.id).await?;
                }
            }
        }
    }

    async fn finish(&self, id: DbId, outcome: &JobOutcome) -> Result<(), StoreError> {
        if !JobRepo::discard(&self.pool, id).await? {
            tracing::warn!(job_id = id, ?outcome, "Finished job was already gone");
        }
        Ok(())
    }

    async fn recover_abandoned(&self) -> Result<u64, StoreError> {
        Ok(JobRepo::discard_active(&self.pool).await?)
    }
}
