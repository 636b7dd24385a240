//! Persistence seams used by the pipeline.
//!
//! The pipeline only needs find-by-predicate, exists-by-key, insert and
//! update-by-id over two collections. [`PgStore`] maps them onto the
//! `sitewatch-db` repositories; [`MemoryStore`] keeps everything in memory
//! for tests and local runs.

mod memory;
mod pg;

use async_trait::async_trait;
use sitewatch_core::annotation::AnnotationDetail;
use sitewatch_core::types::DbId;
use sitewatch_core::violation::ViolationSummary;
use sitewatch_db::models::annotated_image::{AnnotatedImage, CreateAnnotatedImage};
use sitewatch_db::models::image_result::{CreateImageResult, ImageResult};

use crate::error::StoreError;

pub use memory::MemoryStore;
pub use pg::PgStore;

/// Uploaded images and their scan state.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Every image still waiting for classification.
    async fn list_unscanned(&self) -> Result<Vec<ImageResult>, StoreError>;

    /// Store a classification and flip the image to scanned.
    ///
    /// Returns `false` when the image was already scanned (or is gone), in
    /// which case nothing is written.
    async fn mark_scanned(
        &self,
        id: DbId,
        violations: &[ViolationSummary],
    ) -> Result<bool, StoreError>;

    /// Register a new image in the unscanned state.
    async fn insert_image(&self, input: &CreateImageResult) -> Result<ImageResult, StoreError>;
}

/// Annotated images and their ordered detail lists.
#[async_trait]
pub trait AnnotationStore: Send + Sync {
    /// Every record holding at least one detail with unknown validation.
    async fn list_pending(&self) -> Result<Vec<AnnotatedImage>, StoreError>;

    /// Whether `owner_id` already annotated this image.
    async fn exists_by_key(
        &self,
        owner_id: &str,
        image_name: &str,
        image_path: &str,
    ) -> Result<bool, StoreError>;

    async fn insert_annotation(
        &self,
        input: &CreateAnnotatedImage,
    ) -> Result<AnnotatedImage, StoreError>;

    /// Replace the detail list of a record read at `expected_version`.
    ///
    /// Fails with [`StoreError::Conflict`] when the record moved on.
    async fn update_details(
        &self,
        id: DbId,
        expected_version: i32,
        details: &[AnnotationDetail],
    ) -> Result<AnnotatedImage, StoreError>;
}
