use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use sitewatch_core::annotation::AnnotationDetail;
use sitewatch_core::types::DbId;
use sitewatch_core::violation::ViolationSummary;
use sitewatch_db::models::annotated_image::{AnnotatedImage, CreateAnnotatedImage};
use sitewatch_db::models::image_result::{CreateImageResult, ImageResult};
use sitewatch_db::models::status::ImageScanStatus;
use sqlx::types::Json;
use tokio::sync::Mutex;

use super::{AnnotationStore, ImageStore};
use crate::error::StoreError;

#[derive(Default)]
struct State {
    next_id: DbId,
    images: BTreeMap<DbId, ImageResult>,
    annotations: BTreeMap<DbId, AnnotatedImage>,
    writes: usize,
}

impl State {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory implementation of both stores.
///
/// Mirrors the PostgreSQL semantics that matter to the pipeline: scans
/// only apply to unscanned rows, detail updates check and bump the
/// version, and the annotation key is unique per owner. Every applied
/// scan or detail update counts as one write.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn image(&self, id: DbId) -> Option<ImageResult> {
        self.state.lock().await.images.get(&id).cloned()
    }

    pub async fn annotation(&self, id: DbId) -> Option<AnnotatedImage> {
        self.state.lock().await.annotations.get(&id).cloned()
    }

    pub async fn annotations(&self) -> Vec<AnnotatedImage> {
        self.state.lock().await.annotations.values().cloned().collect()
    }

    /// Number of scan and detail updates applied so far.
    pub async fn writes(&self) -> usize {
        self.state.lock().await.writes
    }

    /// Simulate a concurrent edit by bumping a record's version.
    pub async fn touch_annotation(&self, id: DbId) -> bool {
        let mut state = self.state.lock().await;
        match state.annotations.get_mut(&id) {
            Some(record) => {
                record.version += 1;
                record.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl ImageStore for MemoryStore {
    async fn list_unscanned(&self) -> Result<Vec<ImageResult>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .images
            .values()
            .filter(|img| img.scan_state().is_unscanned())
            .cloned()
            .collect())
    }

    async fn mark_scanned(
        &self,
        id: DbId,
        violations: &[ViolationSummary],
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let Some(image) = state.images.get_mut(&id) else {
            return Ok(false);
        };
        if !image.scan_state().is_unscanned() {
            return Ok(false);
        }

        let now = Utc::now();
        image.scan_status_id = ImageScanStatus::Scanned.id();
        image.violation_details = Some(Json(violations.to_vec()));
        image.scanned_at = Some(now);
        image.updated_at = now;
        state.writes += 1;
        Ok(true)
    }

    async fn insert_image(&self, input: &CreateImageResult) -> Result<ImageResult, StoreError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let image = ImageResult {
            id: state.next_id(),
            image_path: input.image_path.clone(),
            image_name: input.image_name.clone(),
            scan_status_id: ImageScanStatus::Unscanned.id(),
            violation_details: None,
            scanned_at: None,
            created_at: now,
            updated_at: now,
        };
        state.images.insert(image.id, image.clone());
        Ok(image)
    }
}

#[async_trait]
impl AnnotationStore for MemoryStore {
    async fn list_pending(&self) -> Result<Vec<AnnotatedImage>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .annotations
            .values()
            .filter(|a| a.has_pending_details())
            .cloned()
            .collect())
    }

    async fn exists_by_key(
        &self,
        owner_id: &str,
        image_name: &str,
        image_path: &str,
    ) -> Result<bool, StoreError> {
        let state = self.state.lock().await;
        Ok(state.annotations.values().any(|a| {
            a.owner_id == owner_id && a.image_name == image_name && a.image_path == image_path
        }))
    }

    async fn insert_annotation(
        &self,
        input: &CreateAnnotatedImage,
    ) -> Result<AnnotatedImage, StoreError> {
        let mut state = self.state.lock().await;
        let duplicate = state.annotations.values().any(|a| {
            a.owner_id == input.owner_id
                && a.image_name == input.image_name
                && a.image_path == input.image_path
        });
        if duplicate {
            return Err(StoreError::Invalid(format!(
                "annotation for {} by {} already exists",
                input.image_path, input.owner_id
            )));
        }

        let now = Utc::now();
        let record = AnnotatedImage {
            id: state.next_id(),
            owner_id: input.owner_id.clone(),
            image_name: input.image_name.clone(),
            image_path: input.image_path.clone(),
            image_width: input.image_width,
            image_height: input.image_height,
            details: Json(input.details.clone()),
            version: 1,
            created_at: now,
            updated_at: now,
        };
        state.annotations.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_details(
        &self,
        id: DbId,
        expected_version: i32,
        details: &[AnnotationDetail],
    ) -> Result<AnnotatedImage, StoreError> {
        let mut state = self.state.lock().await;
        let conflict = StoreError::Conflict {
            id,
            expected_version,
        };
        let Some(record) = state.annotations.get_mut(&id) else {
            return Err(conflict);
        };
        if record.version != expected_version {
            return Err(conflict);
        }

        record.details = Json(details.to_vec());
        record.version += 1;
        record.updated_at = Utc::now();
        let updated = record.clone();
        state.writes += 1;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use sitewatch_core::geometry::BoundingBox;

    fn annotation(owner: &str, name: &str) -> CreateAnnotatedImage {
        CreateAnnotatedImage {
            owner_id: owner.into(),
            image_name: name.into(),
            image_path: format!("images/{name}"),
            image_width: 1920,
            image_height: 1080,
            details: vec![AnnotationDetail::new(
                "no-helmet",
                "",
                BoundingBox::new(1.0, 1.0, 5.0, 5.0),
            )],
        }
    }

    #[tokio::test]
    async fn scan_applies_once() {
        let store = MemoryStore::new();
        let image = store
            .insert_image(&CreateImageResult {
                image_path: "images/a.jpg".into(),
                image_name: "a.jpg".into(),
            })
            .await
            .unwrap();

        let items = vec![ViolationSummary::new("no-helmet")];
        assert!(store.mark_scanned(image.id, &items).await.unwrap());
        assert!(!store.mark_scanned(image.id, &items).await.unwrap());
        assert_eq!(store.writes().await, 1);
        assert!(store.list_unscanned().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stale_version_is_conflict() {
        let store = MemoryStore::new();
        let record = store.insert_annotation(&annotation("emp-1", "a.jpg")).await.unwrap();
        assert!(store.touch_annotation(record.id).await);

        let result = store.update_details(record.id, record.version, &[]).await;
        assert_matches!(result, Err(StoreError::Conflict { expected_version: 1, .. }));
        assert_eq!(store.writes().await, 0);
    }

    #[tokio::test]
    async fn update_bumps_version() {
        let store = MemoryStore::new();
        let record = store.insert_annotation(&annotation("emp-1", "a.jpg")).await.unwrap();
        let updated = store.update_details(record.id, 1, &[]).await.unwrap();
        assert_eq!(updated.version, 2);
        assert!(store.list_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn annotation_key_is_unique_per_owner() {
        let store = MemoryStore::new();
        store.insert_annotation(&annotation("emp-1", "a.jpg")).await.unwrap();
        store.insert_annotation(&annotation("emp-2", "a.jpg")).await.unwrap();

        assert!(store.exists_by_key("emp-1", "a.jpg", "images/a.jpg").await.unwrap());
        assert!(!store.exists_by_key("emp-3", "a.jpg", "images/a.jpg").await.unwrap());
        assert_matches!(
            store.insert_annotation(&annotation("emp-1", "a.jpg")).await,
            Err(StoreError::Invalid(_))
        );
    }
}
