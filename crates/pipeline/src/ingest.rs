//! Entry points that feed new work into the pipeline.
//!
//! Both functions store records and then enqueue the pass that processes
//! them, so uploads and annotations do not wait for the next scheduled run.

use sitewatch_core::annotation::{validate_image_size, validate_submission_key};
use sitewatch_db::models::annotated_image::CreateAnnotatedImage;
use sitewatch_db::models::image_result::{CreateImageResult, ImageResult};

use crate::error::PipelineError;
use crate::queue::{JobKind, JobQueue};
use crate::store::{AnnotationStore, ImageStore};

/// Counts from one annotation submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub created: usize,
    /// Already annotated by the same owner.
    pub skipped: usize,
    /// Missing key fields or a non-positive image size.
    pub invalid: usize,
}

/// Register uploaded images as unscanned and queue a scan.
pub async fn register_images(
    images: &dyn ImageStore,
    queue: &dyn JobQueue,
    inputs: &[CreateImageResult],
) -> Result<Vec<ImageResult>, PipelineError> {
    let mut created = Vec::with_capacity(inputs.len());
    for input in inputs {
        created.push(images.insert_image(input).await?);
    }

    if !created.is_empty() {
        let job_id = queue.enqueue(JobKind::ScanUnlabeled).await?;
        tracing::info!(count = created.len(), job_id, "Images registered, scan queued");
    }
    Ok(created)
}

/// Store annotation submissions and queue a validation pass.
///
/// Entries that fail the key or size checks are counted as invalid and
/// entries already stored for the same owner, image name and path are
/// counted as skipped. Details are stored as submitted.
pub async fn ingest_annotations(
    annotations: &dyn AnnotationStore,
    queue: &dyn JobQueue,
    inputs: &[CreateAnnotatedImage],
) -> Result<IngestReport, PipelineError> {
    let mut report = IngestReport::default();

    for input in inputs {
        let checked = validate_submission_key(&input.owner_id, &input.image_name, &input.image_path)
            .and_then(|()| validate_image_size(input.image_width, input.image_height));
        if let Err(e) = checked {
            tracing::debug!(image_path = %input.image_path, error = %e, "Rejecting annotation");
            report.invalid += 1;
            continue;
        }

        if annotations
            .exists_by_key(&input.owner_id, &input.image_name, &input.image_path)
            .await?
        {
            tracing::debug!(
                owner_id = %input.owner_id,
                image_path = %input.image_path,
                "Annotation already exists, skipping",
            );
            report.skipped += 1;
            continue;
        }

        annotations.insert_annotation(input).await?;
        report.created += 1;
    }

    if report.created > 0 {
        let job_id = queue.enqueue(JobKind::ValidateAnnotations).await?;
        tracing::info!(
            created = report.created,
            skipped = report.skipped,
            invalid = report.invalid,
            job_id,
            "Annotations stored, validation queued",
        );
    }
    Ok(report)
}
