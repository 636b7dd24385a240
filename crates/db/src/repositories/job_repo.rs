//! Repository for the `pipeline_jobs` table.
//!
//! Only live jobs are stored. Completing or failing a job deletes its row,
//! so no job history is retained.

use sitewatch_core::types::DbId;
use sqlx::PgPool;

use crate::models::job::PipelineJob;
use crate::models::status::PipelineJobStatus;

/// Column list for `pipeline_jobs` queries.
const COLUMNS: &str = "id, job_kind, status_id, schedule_name, enqueued_at, started_at";

/// Provides queue operations over background pipeline jobs.
pub struct JobRepo;

impl JobRepo {
    /// Append a waiting job.
    pub async fn enqueue(
        pool: &PgPool,
        job_kind: &str,
        schedule_name: Option<&str>,
    ) -> Result<PipelineJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO pipeline_jobs (job_kind, status_id, schedule_name)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PipelineJob>(&query)
            .bind(job_kind)
            .bind(PipelineJobStatus::Waiting.id())
            .bind(schedule_name)
            .fetch_one(pool)
            .await
    }

    /// Atomically move the oldest waiting job to active.
    ///
    /// Returns `None` when nothing is waiting or another job is already
    /// active. The partial unique index on active rows backs this up if
    /// two claimers race.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<PipelineJob>, sqlx::Error> {
        let query = format!(
            "UPDATE pipeline_jobs
             SET status_id = $1, started_at = NOW()
             WHERE id = (
                 SELECT id FROM pipeline_jobs
                 WHERE status_id = $2
                   AND NOT EXISTS (SELECT 1 FROM pipeline_jobs WHERE status_id = $1)
                 ORDER BY enqueued_at ASC, id ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PipelineJob>(&query)
            .bind(PipelineJobStatus::Active.id())
            .bind(PipelineJobStatus::Waiting.id())
            .fetch_optional(pool)
            .await
    }

    /// Remove a finished job. Returns `true` if a row was removed.
    pub async fn discard(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM pipeline_jobs WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove jobs left active by a worker that died mid-run.
    pub async fn discard_active(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM pipeline_jobs WHERE status_id = $1")
            .bind(PipelineJobStatus::Active.id())
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Number of jobs currently waiting.
    pub async fn count_waiting(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM pipeline_jobs WHERE status_id = $1")
            .bind(PipelineJobStatus::Waiting.id())
            .fetch_one(pool)
            .await
    }
}
