//! Whole-image violation classification.

use std::path::Path;

use async_trait::async_trait;
use sitewatch_core::violation::ViolationSummary;

use crate::error::VisionError;
use crate::messages::ContentBlock;
use crate::session::AssistantSession;

/// Field of the classifier reply holding the violation list.
const ITEMS_FIELD: &str = "items";

/// Classifies one image into a list of violations.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// `Ok(None)` when the service gave no usable answer; the image should
    /// be retried on a later pass.
    async fn classify(&self, image_path: &Path) -> Result<Option<Vec<ViolationSummary>>, VisionError>;
}

/// [`Classifier`] backed by an assistant that answers `{"items": [...]}`.
pub struct AssistantClassifier {
    session: AssistantSession,
}

impl AssistantClassifier {
    pub fn new(session: AssistantSession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Classifier for AssistantClassifier {
    async fn classify(&self, image_path: &Path) -> Result<Option<Vec<ViolationSummary>>, VisionError> {
        let file_id = self.session.api().upload_file(image_path).await?;

        let Some(payload) = self.session.request(&[ContentBlock::image(file_id)]).await? else {
            return Ok(None);
        };

        match parse_items(&payload) {
            Ok(items) => Ok(Some(items)),
            Err(e) => {
                tracing::warn!(path = %image_path.display(), error = %e, "Malformed classifier reply");
                Ok(None)
            }
        }
    }
}

/// Extract the `items` list from a classifier reply.
pub fn parse_items(payload: &serde_json::Value) -> Result<Vec<ViolationSummary>, VisionError> {
    let items = payload
        .get(ITEMS_FIELD)
        .filter(|v| v.is_array())
        .ok_or_else(|| VisionError::Parse(format!("reply has no '{ITEMS_FIELD}' array")))?;

    serde_json::from_value(items.clone()).map_err(|e| VisionError::Parse(e.to_string()))
}
