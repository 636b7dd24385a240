use std::collections::{BTreeMap, VecDeque};

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use sitewatch_core::types::{DbId, Timestamp};
use tokio::sync::Mutex;

use super::{JobKind, JobOutcome, JobQueue, QueuedJob, RepeatSpec};
use crate::error::StoreError;

struct Schedule {
    spec: RepeatSpec,
    next_run_at: Timestamp,
}

#[derive(Default)]
struct State {
    next_id: DbId,
    waiting: VecDeque<QueuedJob>,
    active: Option<QueuedJob>,
    schedules: BTreeMap<String, Schedule>,
    finished: Vec<(QueuedJob, JobOutcome)>,
}

/// In-memory [`JobQueue`] with the same single-active-job rule as the
/// database queue. Used as a test double.
///
/// Unlike the database queue, finished jobs are kept in an unbounded log
/// so tests can inspect outcomes. Do not run it in a long-lived process.
#[derive(Default)]
pub struct MemoryJobQueue {
    state: Mutex<State>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kinds of the waiting jobs, oldest first.
    pub async fn waiting(&self) -> Vec<JobKind> {
        self.state.lock().await.waiting.iter().map(|j| j.kind).collect()
    }

    pub async fn active(&self) -> Option<QueuedJob> {
        self.state.lock().await.active.clone()
    }

    /// Every job finished so far with its outcome.
    pub async fn finished(&self) -> Vec<(QueuedJob, JobOutcome)> {
        self.state.lock().await.finished.clone()
    }

    /// Registered schedule and its next firing time.
    pub async fn schedule(&self, name: &str) -> Option<(RepeatSpec, Timestamp)> {
        self.state
            .lock()
            .await
            .schedules
            .get(name)
            .map(|s| (s.spec.clone(), s.next_run_at))
    }

    pub async fn schedule_count(&self) -> usize {
        self.state.lock().await.schedules.len()
    }
}

fn period(spec: &RepeatSpec) -> Result<TimeDelta, StoreError> {
    TimeDelta::try_seconds(spec.every_secs()?)
        .ok_or_else(|| StoreError::Invalid(format!("schedule '{}' period is too long", spec.name)))
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, kind: JobKind) -> Result<DbId, StoreError> {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let id = state.next_id;
        state.waiting.push_back(QueuedJob {
            id,
            kind,
            schedule_name: None,
        });
        Ok(id)
    }

    async fn enqueue_recurring(&self, spec: &RepeatSpec) -> Result<(), StoreError> {
        let every = period(spec)?;
        let mut state = self.state.lock().await;
        state
            .schedules
            .entry(spec.name.clone())
            .and_modify(|existing| existing.spec = spec.clone())
            .or_insert_with(|| Schedule {
                spec: spec.clone(),
                next_run_at: Utc::now() + every,
            });
        Ok(())
    }

    async fn enqueue_due(&self, now: Timestamp) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        let mut due = Vec::new();

        for schedule in state.schedules.values_mut() {
            if schedule.next_run_at <= now {
                schedule.next_run_at = now + period(&schedule.spec)?;
                due.push((schedule.spec.name.clone(), schedule.spec.kind));
            }
        }

        let count = due.len();
        for (name, kind) in due {
            state.next_id += 1;
            let id = state.next_id;
            state.waiting.push_back(QueuedJob {
                id,
                kind,
                schedule_name: Some(name),
            });
        }
        Ok(count)
    }

    async fn claim_next(&self) -> Result<Option<QueuedJob>, StoreError> {
        let mut state = self.state.lock().await;
        if state.active.is_some() {
            return Ok(None);
        }
        let next = state.waiting.pop_front();
        state.active = next.clone();
        Ok(next)
    }

    async fn finish(&self, id: DbId, outcome: &JobOutcome) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        match state.active.take() {
            Some(job) if job.id == id => {
                state.finished.push((job, outcome.clone()));
                Ok(())
            }
            other => {
                state.active = other;
                Err(StoreError::Invalid(format!("job {id} is not active")))
            }
        }
    }

    async fn recover_abandoned(&self) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        Ok(u64::from(state.active.take().is_some()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn only_one_job_is_active() {
        let queue = MemoryJobQueue::new();
        queue.enqueue(JobKind::ScanUnlabeled).await.unwrap();
        queue.enqueue(JobKind::ValidateAnnotations).await.unwrap();

        let first = queue.claim_next().await.unwrap().unwrap();
        assert_eq!(first.kind, JobKind::ScanUnlabeled);
        assert!(queue.claim_next().await.unwrap().is_none());

        queue.finish(first.id, &JobOutcome::Completed).await.unwrap();
        let second = queue.claim_next().await.unwrap().unwrap();
        assert_eq!(second.kind, JobKind::ValidateAnnotations);
    }

    #[tokio::test]
    async fn finishing_a_job_that_is_not_active_fails() {
        let queue = MemoryJobQueue::new();
        let id = queue.enqueue(JobKind::ScanUnlabeled).await.unwrap();
        assert_matches!(
            queue.finish(id, &JobOutcome::Completed).await,
            Err(StoreError::Invalid(_))
        );
    }

    #[tokio::test]
    async fn recurring_registration_is_deduplicated_by_name() {
        let queue = MemoryJobQueue::new();
        let hourly = RepeatSpec::new("scan", JobKind::ScanUnlabeled, Duration::from_secs(3600));
        queue.enqueue_recurring(&hourly).await.unwrap();
        let (_, first_run) = queue.schedule("scan").await.unwrap();

        let faster = RepeatSpec::new("scan", JobKind::ScanUnlabeled, Duration::from_secs(60));
        queue.enqueue_recurring(&faster).await.unwrap();

        assert_eq!(queue.schedule_count().await, 1);
        let (spec, next_run) = queue.schedule("scan").await.unwrap();
        assert_eq!(spec.every, Duration::from_secs(60));
        assert_eq!(next_run, first_run);
    }

    #[tokio::test]
    async fn due_schedules_fire_once_per_period() {
        let queue = MemoryJobQueue::new();
        let spec = RepeatSpec::new("scan", JobKind::ScanUnlabeled, Duration::from_secs(3600));
        queue.enqueue_recurring(&spec).await.unwrap();

        assert_eq!(queue.enqueue_due(Utc::now()).await.unwrap(), 0);

        let later = Utc::now() + TimeDelta::hours(5);
        assert_eq!(queue.enqueue_due(later).await.unwrap(), 1);
        assert_eq!(queue.enqueue_due(later).await.unwrap(), 0);

        let job = queue.claim_next().await.unwrap().unwrap();
        assert_eq!(job.schedule_name.as_deref(), Some("scan"));
    }

    #[tokio::test]
    async fn abandoned_active_job_is_recovered() {
        let queue = MemoryJobQueue::new();
        queue.enqueue(JobKind::ScanUnlabeled).await.unwrap();
        queue.claim_next().await.unwrap();

        assert_eq!(queue.recover_abandoned().await.unwrap(), 1);
        assert!(queue.active().await.is_none());
        assert_eq!(queue.recover_abandoned().await.unwrap(), 0);
    }
}
