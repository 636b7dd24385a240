//! Repository for the `annotated_images` table.

use sitewatch_core::annotation::{AnnotationDetail, DetailValidation};
use sitewatch_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::annotated_image::{AnnotatedImage, CreateAnnotatedImage, ValidationCounts};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, owner_id, image_name, image_path, image_width, image_height, \
                       details, version, created_at, updated_at";

/// Predicate: the row holds at least one detail still awaiting a verdict.
///
/// A detail whose `is_valid` key is missing counts as unknown.
const HAS_UNKNOWN_DETAIL: &str = "EXISTS (
    SELECT 1 FROM jsonb_array_elements(details) AS d
    WHERE COALESCE(d -> 'is_valid', 'null'::jsonb) = 'null'::jsonb
)";

const HAS_CONFIRMED_DETAIL: &str = "EXISTS (
    SELECT 1 FROM jsonb_array_elements(details) AS d
    WHERE d -> 'is_valid' = 'true'::jsonb
)";

const HAS_REJECTED_DETAIL: &str = "EXISTS (
    SELECT 1 FROM jsonb_array_elements(details) AS d
    WHERE d -> 'is_valid' = 'false'::jsonb
)";

fn detail_predicate(state: DetailValidation) -> &'static str {
    match state {
        DetailValidation::Unknown => HAS_UNKNOWN_DETAIL,
        DetailValidation::Confirmed => HAS_CONFIRMED_DETAIL,
        DetailValidation::Rejected => HAS_REJECTED_DETAIL,
    }
}

/// Provides CRUD-style operations for annotated images.
pub struct AnnotatedImageRepo;

impl AnnotatedImageRepo {
    /// Insert a new annotated image, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateAnnotatedImage,
    ) -> Result<AnnotatedImage, sqlx::Error> {
        let query = format!(
            "INSERT INTO annotated_images
                (owner_id, image_name, image_path, image_width, image_height, details)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AnnotatedImage>(&query)
            .bind(&input.owner_id)
            .bind(&input.image_name)
            .bind(&input.image_path)
            .bind(input.image_width)
            .bind(input.image_height)
            .bind(Json(&input.details))
            .fetch_one(pool)
            .await
    }

    /// Find an annotated image by its internal ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<AnnotatedImage>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM annotated_images WHERE id = $1");
        sqlx::query_as::<_, AnnotatedImage>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Whether the owner already annotated this image.
    pub async fn exists_by_key(
        pool: &PgPool,
        owner_id: &str,
        image_name: &str,
        image_path: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                 SELECT 1 FROM annotated_images
                 WHERE owner_id = $1 AND image_name = $2 AND image_path = $3
             )",
        )
        .bind(owner_id)
        .bind(image_name)
        .bind(image_path)
        .fetch_one(pool)
        .await
    }

    /// List every annotated image with at least one unknown detail.
    pub async fn list_pending(pool: &PgPool) -> Result<Vec<AnnotatedImage>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM annotated_images
             WHERE {HAS_UNKNOWN_DETAIL}
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, AnnotatedImage>(&query)
            .fetch_all(pool)
            .await
    }

    /// Replace the detail list if the row is still at `expected_version`.
    ///
    /// Returns the updated row, or `None` when the row is gone or another
    /// writer bumped the version first.
    pub async fn update_details(
        pool: &PgPool,
        id: DbId,
        expected_version: i32,
        details: &[AnnotationDetail],
    ) -> Result<Option<AnnotatedImage>, sqlx::Error> {
        let query = format!(
            "UPDATE annotated_images
             SET details = $3, version = version + 1, updated_at = NOW()
             WHERE id = $1 AND version = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AnnotatedImage>(&query)
            .bind(id)
            .bind(expected_version)
            .bind(Json(details))
            .fetch_optional(pool)
            .await
    }

    /// List an owner's annotated images holding a detail in `state`.
    pub async fn list_by_validation(
        pool: &PgPool,
        owner_id: &str,
        state: DetailValidation,
    ) -> Result<Vec<AnnotatedImage>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM annotated_images
             WHERE owner_id = $1 AND {}
             ORDER BY created_at DESC, id DESC",
            detail_predicate(state)
        );
        sqlx::query_as::<_, AnnotatedImage>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// Count an owner's annotated images with confirmed / rejected details.
    pub async fn validation_counts(
        pool: &PgPool,
        owner_id: &str,
    ) -> Result<ValidationCounts, sqlx::Error> {
        let query = format!(
            "SELECT
                 COUNT(*) FILTER (WHERE {HAS_CONFIRMED_DETAIL}) AS confirmed,
                 COUNT(*) FILTER (WHERE {HAS_REJECTED_DETAIL}) AS rejected
             FROM annotated_images
             WHERE owner_id = $1"
        );
        sqlx::query_as::<_, ValidationCounts>(&query)
            .bind(owner_id)
            .fetch_one(pool)
            .await
    }
}
