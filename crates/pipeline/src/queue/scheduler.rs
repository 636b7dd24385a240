//! Recurring job scheduler.
//!
//! [`Scheduler`] runs as a background task, periodically asking the queue
//! to materialize every due schedule into a waiting job.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use super::JobQueue;
use crate::error::StoreError;

/// Default interval between schedule checks.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

pub struct Scheduler {
    queue: Arc<dyn JobQueue>,
    tick: Duration,
}

impl Scheduler {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self {
            queue,
            tick: DEFAULT_TICK,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Enqueue every schedule due now. Returns the number of jobs added.
    pub async fn tick(&self) -> Result<usize, StoreError> {
        let enqueued = self.queue.enqueue_due(Utc::now()).await?;
        if enqueued > 0 {
            tracing::info!(count = enqueued, "Scheduled jobs enqueued");
        }
        Ok(enqueued)
    }

    /// Run the scheduler loop until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.tick);
        tracing::info!(tick_ms = self.tick.as_millis() as u64, "Job scheduler started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Job scheduler shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        tracing::error!(error = %e, "Failed to enqueue scheduled jobs");
                    }
                }
            }
        }
    }
}
