//! Repository for the `job_schedules` table.

use sitewatch_core::types::Timestamp;
use sqlx::PgPool;

use crate::models::job::JobSchedule;

/// Column list for `job_schedules` queries.
const COLUMNS: &str = "name, job_kind, every_secs, next_run_at, created_at, updated_at";

/// Provides registration and firing of recurring job schedules.
pub struct JobScheduleRepo;

impl JobScheduleRepo {
    /// Register a recurring schedule, de-duplicated by name.
    ///
    /// A new schedule first fires one period from now. Re-registering an
    /// existing name updates its kind and period but keeps its next run.
    pub async fn upsert(
        pool: &PgPool,
        name: &str,
        job_kind: &str,
        every_secs: i64,
    ) -> Result<JobSchedule, sqlx::Error> {
        let query = format!(
            "INSERT INTO job_schedules (name, job_kind, every_secs, next_run_at)
             VALUES ($1, $2, $3, NOW() + $3 * INTERVAL '1 second')
             ON CONFLICT (name) DO UPDATE
             SET job_kind = EXCLUDED.job_kind,
                 every_secs = EXCLUDED.every_secs,
                 updated_at = NOW()
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobSchedule>(&query)
            .bind(name)
            .bind(job_kind)
            .bind(every_secs)
            .fetch_one(pool)
            .await
    }

    /// Claim every schedule due at `now`, advancing each by one period.
    ///
    /// Runs missed while nothing was polling collapse into a single firing.
    pub async fn claim_due(pool: &PgPool, now: Timestamp) -> Result<Vec<JobSchedule>, sqlx::Error> {
        let query = format!(
            "UPDATE job_schedules
             SET next_run_at = $1 + every_secs * INTERVAL '1 second',
                 updated_at = NOW()
             WHERE next_run_at <= $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobSchedule>(&query)
            .bind(now)
            .fetch_all(pool)
            .await
    }

    /// List all registered schedules.
    pub async fn list(pool: &PgPool) -> Result<Vec<JobSchedule>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM job_schedules ORDER BY name");
        sqlx::query_as::<_, JobSchedule>(&query)
            .fetch_all(pool)
            .await
    }
}
