use async_trait::async_trait;
use sitewatch_core::annotation::AnnotationDetail;
use sitewatch_core::types::DbId;
use sitewatch_core::violation::ViolationSummary;
use sitewatch_db::models::annotated_image::{AnnotatedImage, CreateAnnotatedImage};
use sitewatch_db::models::image_result::{CreateImageResult, ImageResult};
use sitewatch_db::repositories::{AnnotatedImageRepo, ImageResultRepo};
use sitewatch_db::DbPool;

use super::{AnnotationStore, ImageStore};
use crate::error::StoreError;

/// Both stores backed by PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImageStore for PgStore {
    async fn list_unscanned(&self) -> Result<Vec<ImageResult>, StoreError> {
        Ok(ImageResultRepo::list_unscanned(&self.pool).await?)
    }

    async fn mark_scanned(
        &self,
        id: DbId,
        violations: &[ViolationSummary],
    ) -> Result<bool, StoreError> {
        Ok(ImageResultRepo::mark_scanned(&self.pool, id, violations).await?)
    }

    async fn insert_image(&self, input: &CreateImageResult) -> Result<ImageResult, StoreError> {
        Ok(ImageResultRepo::create(&self.pool, input).await?)
    }
}

#[async_trait]
impl AnnotationStore for PgStore {
    async fn list_pending(&self) -> Result<Vec<AnnotatedImage>, StoreError> {
        Ok(AnnotatedImageRepo::list_pending(&self.pool).await?)
    }

    async fn exists_by_key(
        &self,
        owner_id: &str,
        image_name: &str,
        image_path: &str,
    ) -> Result<bool, StoreError> {
        Ok(AnnotatedImageRepo::exists_by_key(&self.pool, owner_id, image_name, image_path).await?)
    }

    async fn insert_annotation(
        &self,
        input: &CreateAnnotatedImage,
    ) -> Result<AnnotatedImage, StoreError> {
        Ok(AnnotatedImageRepo::create(&self.pool, input).await?)
    }

    async fn update_details(
        &self,
        id: DbId,
        expected_version: i32,
        details: &[AnnotationDetail],
    ) -> Result<AnnotatedImage, StoreError> {
        AnnotatedImageRepo::update_details(&self.pool, id, expected_version, details)
            .await?
            .ok_or(StoreError::Conflict {
                id,
                expected_version,
            })
    }
}
