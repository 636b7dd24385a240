//! Uploaded image records and their scan state.

use serde::{Deserialize, Serialize};
use sitewatch_core::types::{DbId, Timestamp};
use sitewatch_core::violation::{ScanState, ViolationSummary};
use sqlx::types::Json;
use sqlx::FromRow;

use crate::models::status::{ImageScanStatus, StatusId};

/// A row from the `image_results` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ImageResult {
    pub id: DbId,
    pub image_path: String,
    pub image_name: String,
    pub scan_status_id: StatusId,
    pub violation_details: Option<Json<Vec<ViolationSummary>>>,
    pub scanned_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ImageResult {
    /// Tagged view over `scan_status_id` + `violation_details`.
    pub fn scan_state(&self) -> ScanState {
        match (
            ImageScanStatus::from_id(self.scan_status_id),
            &self.violation_details,
        ) {
            (Some(ImageScanStatus::Scanned), Some(Json(list))) => ScanState::Scanned(list.clone()),
            _ => ScanState::Unscanned,
        }
    }
}

/// DTO for registering a newly uploaded image.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateImageResult {
    pub image_path: String,
    pub image_name: String,
}
