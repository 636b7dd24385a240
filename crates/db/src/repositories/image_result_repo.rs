//! Repository for the `image_results` table.

use sitewatch_core::types::DbId;
use sitewatch_core::violation::ViolationSummary;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::image_result::{CreateImageResult, ImageResult};
use crate::models::status::ImageScanStatus;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, image_path, image_name, scan_status_id, violation_details, \
                       scanned_at, created_at, updated_at";

/// Default number of images offered to an annotator at once.
pub const DEFAULT_UNANNOTATED_LIMIT: i64 = 30;

/// Provides query, insert and scan-state updates for uploaded images.
pub struct ImageResultRepo;

impl ImageResultRepo {
    /// Register an uploaded image. New rows always start unscanned.
    pub async fn create(
        pool: &PgPool,
        input: &CreateImageResult,
    ) -> Result<ImageResult, sqlx::Error> {
        let query = format!(
            "INSERT INTO image_results (image_path, image_name, scan_status_id)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImageResult>(&query)
            .bind(&input.image_path)
            .bind(&input.image_name)
            .bind(ImageScanStatus::Unscanned.id())
            .fetch_one(pool)
            .await
    }

    /// Find an image by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ImageResult>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM image_results WHERE id = $1");
        sqlx::query_as::<_, ImageResult>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List every image that has not been classified yet, oldest first.
    pub async fn list_unscanned(pool: &PgPool) -> Result<Vec<ImageResult>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM image_results
             WHERE scan_status_id = $1
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, ImageResult>(&query)
            .bind(ImageScanStatus::Unscanned.id())
            .fetch_all(pool)
            .await
    }

    /// Store the classifier result and flip the row to scanned.
    ///
    /// Only an unscanned row is updated, so a second writer racing on the
    /// same image is a no-op. Returns `true` if this call did the write.
    pub async fn mark_scanned(
        pool: &PgPool,
        id: DbId,
        violations: &[ViolationSummary],
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE image_results
             SET scan_status_id = $2, violation_details = $3,
                 scanned_at = NOW(), updated_at = NOW()
             WHERE id = $1 AND scan_status_id = $4",
        )
        .bind(id)
        .bind(ImageScanStatus::Scanned.id())
        .bind(Json(violations))
        .bind(ImageScanStatus::Unscanned.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Most recent images the owner has not annotated yet.
    ///
    /// An annotation with an empty detail list does not count as annotated.
    /// `limit` defaults to [`DEFAULT_UNANNOTATED_LIMIT`].
    pub async fn list_unannotated_for_owner(
        pool: &PgPool,
        owner_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<ImageResult>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM image_results i
             WHERE NOT EXISTS (
                 SELECT 1 FROM annotated_images a
                 WHERE a.owner_id = $1
                   AND a.image_name = i.image_name
                   AND a.image_path = i.image_path
                   AND jsonb_array_length(a.details) > 0
             )
             ORDER BY created_at DESC, id DESC
             LIMIT $2"
        );
        sqlx::query_as::<_, ImageResult>(&query)
            .bind(owner_id)
            .bind(limit.unwrap_or(DEFAULT_UNANNOTATED_LIMIT))
            .fetch_all(pool)
            .await
    }
}
