//! Annotated image records: ordered detail lists awaiting validation.

use serde::{Deserialize, Serialize};
use sitewatch_core::annotation::AnnotationDetail;
use sitewatch_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `annotated_images` table.
///
/// `version` is the optimistic-concurrency token: every detail update
/// must present the version it read and bumps it on success.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AnnotatedImage {
    pub id: DbId,
    pub owner_id: String,
    pub image_name: String,
    pub image_path: String,
    pub image_width: i32,
    pub image_height: i32,
    pub details: Json<Vec<AnnotationDetail>>,
    pub version: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl AnnotatedImage {
    /// Whether any detail still awaits a verdict.
    pub fn has_pending_details(&self) -> bool {
        self.details.iter().any(AnnotationDetail::is_pending)
    }
}

/// DTO for creating an annotated image.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAnnotatedImage {
    pub owner_id: String,
    pub image_name: String,
    pub image_path: String,
    pub image_width: i32,
    pub image_height: i32,
    pub details: Vec<AnnotationDetail>,
}

/// Per-owner tally of annotations holding confirmed / rejected details.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow, Serialize)]
pub struct ValidationCounts {
    pub confirmed: i64,
    pub rejected: i64,
}
