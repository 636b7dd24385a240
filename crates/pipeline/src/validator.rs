//! Annotation validator.
//!
//! For each annotation with pending details the source image is put on
//! the 800x600 annotation canvas, every pending box is cropped and
//! labelled, and all crops of the record go to the batch validator in one
//! call. Verdicts are merged back by detail index and saved with a version
//! check. Crop files never outlive the record that produced them.

use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use sitewatch_core::annotation::{pending_indices, AnnotationDetail};
use sitewatch_core::error::CoreError;
use sitewatch_core::region::{load_canvas, render_labeled_crop, CANVAS_HEIGHT, CANVAS_WIDTH};
use sitewatch_core::types::DetailIndex;
use sitewatch_core::violation::DEFAULT_SEVERITY;
use sitewatch_db::models::annotated_image::AnnotatedImage;
use sitewatch_vision::{BatchItem, BatchValidator};

use crate::artifacts::ArtifactSet;
use crate::error::{PipelineError, StoreError};
use crate::reconcile::reconcile;
use crate::scanner::DEFAULT_MAX_IN_FLIGHT;
use crate::store::AnnotationStore;

/// Totals for one validation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Records selected as pending at the start of the pass.
    pub records: usize,
    /// Details that received a verdict and were saved.
    pub resolved_details: usize,
    /// Records left pending without an error: missing image, no usable
    /// box, no verdict, or a concurrent edit.
    pub skipped_records: usize,
    /// Records that hit an error and stay pending.
    pub failed_records: usize,
}

/// How one record ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordOutcome {
    Resolved(usize),
    Skipped,
}

/// A labelled crop ready to be written out.
struct RenderedCrop {
    detail_index: DetailIndex,
    jpeg: Vec<u8>,
}

pub struct Validator {
    annotations: Arc<dyn AnnotationStore>,
    batch: Arc<dyn BatchValidator>,
    image_root: PathBuf,
    crop_dir: PathBuf,
    max_in_flight: usize,
}

impl Validator {
    pub fn new(
        annotations: Arc<dyn AnnotationStore>,
        batch: Arc<dyn BatchValidator>,
        image_root: impl Into<PathBuf>,
        crop_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            annotations,
            batch,
            image_root: image_root.into(),
            crop_dir: crop_dir.into(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    /// Cap on records validated concurrently; `1` handles them in order.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Run one pass over every annotation with pending details.
    pub async fn validate_pending(&self) -> Result<ValidationReport, PipelineError> {
        let pending = self.annotations.list_pending().await?;
        let mut report = ValidationReport {
            records: pending.len(),
            ..ValidationReport::default()
        };

        if pending.is_empty() {
            tracing::debug!("No annotations pending validation");
            return Ok(report);
        }

        tokio::fs::create_dir_all(&self.crop_dir)
            .await
            .map_err(|source| PipelineError::Artifact {
                path: self.crop_dir.clone(),
                source,
            })?;

        tracing::info!(count = pending.len(), "Validating annotations");

        let validations: Vec<_> = pending
            .iter()
            .map(|record| async move { (record.id, self.validate_record(record).await) })
            .collect();
        let mut outcomes = stream::iter(validations).buffer_unordered(self.max_in_flight);

        while let Some((annotation_id, outcome)) = outcomes.next().await {
            match outcome {
                Ok(RecordOutcome::Resolved(n)) => report.resolved_details += n,
                Ok(RecordOutcome::Skipped) => report.skipped_records += 1,
                Err(e) if e.is_skip() => {
                    tracing::warn!(annotation_id, error = %e, "Skipping annotation");
                    report.skipped_records += 1;
                }
                Err(e) => {
                    tracing::error!(annotation_id, error = %e, "Annotation validation failed");
                    report.failed_records += 1;
                }
            }
        }

        tracing::info!(
            records = report.records,
            resolved_details = report.resolved_details,
            skipped_records = report.skipped_records,
            failed_records = report.failed_records,
            "Validation pass finished",
        );
        Ok(report)
    }

    async fn validate_record(&self, record: &AnnotatedImage) -> Result<RecordOutcome, PipelineError> {
        let path = self.image_root.join(&record.image_path);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| PipelineError::ImageMissing {
                path: path.clone(),
                source,
            })?;

        let details = record.details.0.clone();
        let crops = tokio::task::spawn_blocking(move || render_pending_crops(&bytes, &details))
            .await??;

        let mut artifacts = ArtifactSet::new(&self.crop_dir);
        let mut items = Vec::with_capacity(crops.len());
        for crop in crops {
            let artifact = artifacts.write(&crop.jpeg).await?;
            let detail = &record.details[crop.detail_index];
            items.push(BatchItem {
                image_path: artifact,
                violation_name: detail.violation_name.clone(),
                description: detail.description.clone(),
                detail_index: crop.detail_index,
                severity: DEFAULT_SEVERITY.to_string(),
            });
        }

        if items.is_empty() {
            tracing::warn!(annotation_id = record.id, "No usable bounding boxes");
            return Ok(RecordOutcome::Skipped);
        }

        let verdicts = self.batch.validate_batch(&items).await;
        artifacts.cleanup().await;
        let verdicts = verdicts?;

        let mut details = record.details.0.clone();
        let applied = reconcile(&mut details, &verdicts);
        if applied == 0 {
            tracing::warn!(annotation_id = record.id, crops = items.len(), "No verdicts returned");
            return Ok(RecordOutcome::Skipped);
        }

        match self
            .annotations
            .update_details(record.id, record.version, &details)
            .await
        {
            Ok(updated) => {
                tracing::debug!(
                    annotation_id = record.id,
                    applied,
                    version = updated.version,
                    "Annotation details updated",
                );
                Ok(RecordOutcome::Resolved(applied))
            }
            Err(StoreError::Conflict { id, .. }) => Err(PipelineError::StaleRecord { id }),
            Err(e) => Err(e.into()),
        }
    }
}

/// Decode the source image and render a labelled crop for every pending
/// detail with a usable box.
///
/// An undecodable image fails the whole record. A bad box only drops its
/// own detail, which stays pending.
fn render_pending_crops(
    bytes: &[u8],
    details: &[AnnotationDetail],
) -> Result<Vec<RenderedCrop>, CoreError> {
    let canvas = load_canvas(bytes)?;
    let mut crops = Vec::new();

    for index in pending_indices(details) {
        let detail = &details[index];

        let bounding_box = match detail.bounding_box() {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(detail_index = index, error = %e, "Skipping invalid bounding box");
                continue;
            }
        };

        let Some(region) = bounding_box.to_pixel_region(CANVAS_WIDTH, CANVAS_HEIGHT) else {
            tracing::warn!(detail_index = index, ?bounding_box, "Skipping empty bounding box");
            continue;
        };

        match render_labeled_crop(&canvas, region, &detail.violation_name) {
            Ok(jpeg) => crops.push(RenderedCrop {
                detail_index: index,
                jpeg,
            }),
            Err(e) => {
                tracing::warn!(detail_index = index, error = %e, "Failed to render crop");
            }
        }
    }

    Ok(crops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitewatch_core::geometry::BoundingBox;
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([40, 120, 200]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn detail(bounding_box: serde_json::Value, is_valid: Option<bool>) -> AnnotationDetail {
        AnnotationDetail {
            violation_name: "no-helmet".into(),
            description: String::new(),
            bounding_box,
            is_valid,
        }
    }

    #[test]
    fn only_pending_usable_boxes_are_rendered() {
        let ok = serde_json::json!({"x": 10, "y": 10, "width": 50, "height": 40});
        let details = vec![
            detail(ok.clone(), None),
            detail(ok.clone(), Some(true)),
            detail(serde_json::json!({"x": 1}), None),
            detail(serde_json::json!({"x": 5, "y": 5, "width": 0, "height": 9}), None),
            detail(ok, None),
        ];

        let crops = render_pending_crops(&png(1600, 1200), &details).unwrap();
        let indices: Vec<_> = crops.iter().map(|c| c.detail_index).collect();
        assert_eq!(indices, vec![0, 4]);

        let decoded = image::load_from_memory(&crops[0].jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (50, 40));
    }

    #[test]
    fn box_dragged_past_origin_keeps_its_size() {
        let b = BoundingBox::new(0.0, 0.0, -10.0, 20.0);
        let details = vec![AnnotationDetail::new("no-helmet", "", b)];

        let crops = render_pending_crops(&png(400, 300), &details).unwrap();
        assert_eq!(crops.len(), 1);
        let decoded = image::load_from_memory(&crops[0].jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (10, 20));
    }

    #[test]
    fn far_off_canvas_box_does_not_disturb_its_neighbours() {
        let details = vec![
            AnnotationDetail::new("no-helmet", "", BoundingBox::new(-1e300, 0.0, 10.0, 10.0)),
            AnnotationDetail::new("no-vest", "", BoundingBox::new(10.0, 10.0, 10.0, 10.0)),
        ];

        let crops = render_pending_crops(&png(800, 600), &details).unwrap();
        let indices: Vec<_> = crops.iter().map(|c| c.detail_index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn undecodable_image_fails_record() {
        let details = vec![detail(serde_json::json!({"x": 0, "y": 0, "width": 5, "height": 5}), None)];
        assert!(matches!(
            render_pending_crops(b"definitely not an image", &details),
            Err(CoreError::Image(_))
        ));
    }
}
