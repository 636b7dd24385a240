//! Builds the pipeline from configuration and runs its background tasks.

use std::sync::Arc;
use std::time::Duration;

use sitewatch_db::DbPool;
use sitewatch_pipeline::queue::scheduler::Scheduler;
use sitewatch_pipeline::queue::worker::{PipelineJobHandler, Worker};
use sitewatch_pipeline::queue::{JobKind, JobQueue, PgJobQueue, RepeatSpec, SCAN_SCHEDULE_NAME};
use sitewatch_pipeline::store::PgStore;
use sitewatch_pipeline::{Scanner, StoreError, Validator};
use sitewatch_vision::api::VisionApi;
use sitewatch_vision::session::AssistantSession;
use sitewatch_vision::{AssistantBatchValidator, AssistantClassifier, VisionError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{PipelineConfig, VISION_API_REVISION};

/// How long shutdown waits for each background task.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// The assembled pipeline, ready to start.
pub struct Pipeline {
    queue: Arc<dyn JobQueue>,
    scheduler: Scheduler,
    worker: Worker,
    scan_interval: Duration,
}

impl Pipeline {
    /// Wire stores, vision clients, passes, scheduler and worker.
    pub fn build(config: &PipelineConfig, pool: DbPool) -> Result<Self, VisionError> {
        let store = Arc::new(PgStore::new(pool.clone()));
        let queue: Arc<dyn JobQueue> = Arc::new(PgJobQueue::new(pool));

        let api = VisionApi::with_timeout(
            config.vision_api_url.clone(),
            config.vision_api_key.clone(),
            config.vision_request_timeout,
        )?
        .with_api_revision(VISION_API_REVISION);
        let classifier = AssistantClassifier::new(AssistantSession::new(
            api.clone(),
            config.classifier_assistant_id.clone(),
            config.classifier_poll(),
        ));
        let batch = AssistantBatchValidator::new(AssistantSession::new(
            api,
            config.validator_assistant_id.clone(),
            config.validator_poll(),
        ));

        let scanner = Scanner::new(store.clone(), Arc::new(classifier), &config.image_root)
            .with_max_in_flight(config.max_in_flight);
        let validator = Validator::new(store, Arc::new(batch), &config.image_root, &config.crop_dir)
            .with_max_in_flight(config.max_in_flight);
        let handler = PipelineJobHandler::new(Arc::new(scanner), Arc::new(validator));

        Ok(Self {
            scheduler: Scheduler::new(Arc::clone(&queue)).with_tick(config.queue_poll_interval),
            worker: Worker::new(Arc::clone(&queue), Arc::new(handler))
                .with_poll_interval(config.queue_poll_interval),
            queue,
            scan_interval: config.scan_interval,
        })
    }

    /// Prepare the queue for a fresh process.
    ///
    /// Drops jobs a previous process left active, registers the recurring
    /// scan, and queues one scan and one validation pass right away.
    pub async fn prepare(&self) -> Result<(), StoreError> {
        let recovered = self.queue.recover_abandoned().await?;
        if recovered > 0 {
            tracing::warn!(count = recovered, "Discarded jobs abandoned by a previous run");
        }

        self.queue
            .enqueue_recurring(&RepeatSpec::new(
                SCAN_SCHEDULE_NAME,
                JobKind::ScanUnlabeled,
                self.scan_interval,
            ))
            .await?;

        self.queue.enqueue(JobKind::ScanUnlabeled).await?;
        self.queue.enqueue(JobKind::ValidateAnnotations).await?;
        tracing::info!("Startup scan and validation queued");
        Ok(())
    }

    /// Spawn the scheduler and worker loops.
    pub fn spawn(self, cancel: &CancellationToken) -> RunningPipeline {
        let scheduler = self.scheduler;
        let scheduler_cancel = cancel.clone();
        let scheduler_handle = tokio::spawn(async move {
            scheduler.run(scheduler_cancel).await;
        });

        let worker = self.worker;
        let worker_cancel = cancel.clone();
        let worker_handle = tokio::spawn(async move {
            worker.run(worker_cancel).await;
        });

        RunningPipeline {
            scheduler: scheduler_handle,
            worker: worker_handle,
        }
    }
}

/// Handles of the spawned background loops.
pub struct RunningPipeline {
    scheduler: JoinHandle<()>,
    worker: JoinHandle<()>,
}

impl RunningPipeline {
    /// Wait for both loops to stop after cancellation.
    ///
    /// A job in progress may take a while; after the grace period the
    /// worker is abandoned and its job is recovered on the next start.
    pub async fn join(self) {
        if tokio::time::timeout(SHUTDOWN_GRACE, self.scheduler).await.is_err() {
            tracing::warn!("Scheduler did not stop in time");
        }
        tracing::info!("Scheduler stopped");

        if tokio::time::timeout(SHUTDOWN_GRACE, self.worker).await.is_err() {
            tracing::warn!("Worker did not stop in time, active job will be recovered on restart");
        }
        tracing::info!("Worker stopped");
    }
}
