//! Pipeline work-queue rows and recurring schedules.

use serde::Serialize;
use sitewatch_core::types::{DbId, Timestamp};
use sqlx::FromRow;

use crate::models::status::StatusId;

/// A row from the `pipeline_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PipelineJob {
    pub id: DbId,
    pub job_kind: String,
    pub status_id: StatusId,
    pub schedule_name: Option<String>,
    pub enqueued_at: Timestamp,
    pub started_at: Option<Timestamp>,
}

/// A row from the `job_schedules` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobSchedule {
    pub name: String,
    pub job_kind: String,
    pub every_secs: i64,
    pub next_run_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
