//! Unlabeled image scanner.
//!
//! Classifies every image that has not been scanned yet. Only a non-empty
//! list of well-formed violations is stored; any other outcome leaves the
//! image unscanned so the next pass tries it again.

use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use sitewatch_core::violation::accept_classification;
use sitewatch_db::models::image_result::ImageResult;
use sitewatch_vision::Classifier;

use crate::error::PipelineError;
use crate::store::ImageStore;

/// Default number of images classified concurrently.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;

/// Totals for one scan pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Images selected as unscanned at the start of the pass.
    pub processed: usize,
    /// Images whose violations were stored.
    pub classified: usize,
    /// Images left unscanned for the next pass.
    pub unresolved: usize,
}

pub struct Scanner {
    images: Arc<dyn ImageStore>,
    classifier: Arc<dyn Classifier>,
    image_root: PathBuf,
    max_in_flight: usize,
}

impl Scanner {
    pub fn new(
        images: Arc<dyn ImageStore>,
        classifier: Arc<dyn Classifier>,
        image_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            images,
            classifier,
            image_root: image_root.into(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    /// Cap on concurrent classifier calls; `1` scans strictly in order.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Run one pass over every unscanned image.
    ///
    /// Only listing the pending images can fail the pass; per-image faults
    /// are logged and counted as unresolved.
    pub async fn scan(&self) -> Result<ScanReport, PipelineError> {
        let pending = self.images.list_unscanned().await?;
        let mut report = ScanReport {
            processed: pending.len(),
            ..ScanReport::default()
        };

        if pending.is_empty() {
            tracing::debug!("No unscanned images");
            return Ok(report);
        }

        tracing::info!(count = pending.len(), "Scanning unlabeled images");

        let scans: Vec<_> = pending.iter().map(|image| self.scan_one(image)).collect();
        let mut outcomes = stream::iter(scans).buffer_unordered(self.max_in_flight);

        while let Some(classified) = outcomes.next().await {
            if classified {
                report.classified += 1;
            } else {
                report.unresolved += 1;
            }
        }

        tracing::info!(
            processed = report.processed,
            classified = report.classified,
            unresolved = report.unresolved,
            "Scan pass finished",
        );
        Ok(report)
    }

    /// Classify one image and store the result. Returns `true` if the
    /// image is now scanned.
    async fn scan_one(&self, image: &ImageResult) -> bool {
        let path = self.image_root.join(&image.image_path);

        let items = match self.classifier.classify(&path).await {
            Ok(Some(items)) => items,
            Ok(None) => {
                tracing::warn!(image_id = image.id, path = %path.display(), "No classification, will retry");
                return false;
            }
            Err(e) => {
                tracing::error!(image_id = image.id, path = %path.display(), error = %e, "Classifier call failed");
                return false;
            }
        };

        let Some(violations) = accept_classification(items) else {
            tracing::warn!(image_id = image.id, "Empty or malformed classification, will retry");
            return false;
        };

        match self.images.mark_scanned(image.id, &violations).await {
            Ok(true) => {
                tracing::debug!(image_id = image.id, violations = violations.len(), "Image scanned");
                true
            }
            Ok(false) => {
                tracing::warn!(image_id = image.id, "Image was no longer unscanned");
                false
            }
            Err(e) => {
                tracing::error!(image_id = image.id, error = %e, "Failed to store classification");
                false
            }
        }
    }
}
