//! Batch validation of annotated regions cropped from one image.
//!
//! All crops of a record go out in a single message: one image block and
//! one text block per crop. The text carries the caller's detail index and
//! the assistant answers per index, possibly for only some of the crops.

use std::path::PathBuf;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use sitewatch_core::types::DetailIndex;

use crate::error::VisionError;
use crate::messages::ContentBlock;
use crate::session::AssistantSession;

/// Field of the validator reply holding the verdict list.
const VIOLATIONS_FIELD: &str = "violations";

/// One cropped region to validate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub image_path: PathBuf,
    pub violation_name: String,
    pub description: String,
    pub detail_index: DetailIndex,
    pub severity: String,
}

impl BatchItem {
    /// Prompt text sent next to the crop.
    pub fn prompt(&self) -> String {
        format!(
            "Violation: \"{}\"\nDescription: {}\nSeverity: {}\nDetailIndex: {}",
            self.violation_name, self.description, self.severity, self.detail_index
        )
    }
}

/// The assistant's judgement for one detail index.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchVerdict {
    #[serde(alias = "detail_index")]
    pub detail_index: DetailIndex,
    #[serde(alias = "is_valid")]
    pub is_valid: bool,
    /// Corrected violation name; `None` keeps the annotator's name.
    #[serde(default, alias = "violation_name")]
    pub violation_name: Option<String>,
}

/// Validates several crops of one image in a single round trip.
#[async_trait]
pub trait BatchValidator: Send + Sync {
    /// Verdicts may cover any subset of `items`. An empty list means no
    /// answer yet.
    async fn validate_batch(&self, items: &[BatchItem]) -> Result<Vec<BatchVerdict>, VisionError>;
}

/// [`BatchValidator`] backed by an assistant that answers
/// `{"violations": [{"detailIndex", "isValid", "violationName"}]}`.
pub struct AssistantBatchValidator {
    session: AssistantSession,
}

impl AssistantBatchValidator {
    pub fn new(session: AssistantSession) -> Self {
        Self { session }
    }

    /// Upload every crop; a failed upload drops that crop from the message.
    async fn build_content(&self, items: &[BatchItem]) -> Vec<ContentBlock> {
        let api = self.session.api();
        let uploads = join_all(items.iter().map(|item| api.upload_file(&item.image_path))).await;

        items
            .iter()
            .zip(uploads)
            .flat_map(|(item, upload)| match upload {
                Ok(file_id) => vec![ContentBlock::image(file_id), ContentBlock::text(item.prompt())],
                Err(e) => {
                    tracing::error!(
                        path = %item.image_path.display(),
                        detail_index = item.detail_index,
                        error = %e,
                        "Failed to upload crop",
                    );
                    Vec::new()
                }
            })
            .collect()
    }
}

#[async_trait]
impl BatchValidator for AssistantBatchValidator {
    async fn validate_batch(&self, items: &[BatchItem]) -> Result<Vec<BatchVerdict>, VisionError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let content = self.build_content(items).await;
        if content.is_empty() {
            tracing::warn!(items = items.len(), "No crops could be uploaded, skipping batch");
            return Ok(Vec::new());
        }

        let Some(payload) = self.session.request(&content).await? else {
            return Ok(Vec::new());
        };

        match parse_verdicts(&payload) {
            Ok(verdicts) => Ok(verdicts),
            Err(e) => {
                tracing::warn!(error = %e, "Malformed batch validation reply");
                Ok(Vec::new())
            }
        }
    }
}

/// Extract verdicts from a validator reply.
///
/// Individual malformed entries are skipped; only a reply without a
/// `violations` array is an error.
pub fn parse_verdicts(payload: &serde_json::Value) -> Result<Vec<BatchVerdict>, VisionError> {
    let entries = payload
        .get(VIOLATIONS_FIELD)
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| VisionError::Parse(format!("reply has no '{VIOLATIONS_FIELD}' array")))?;

    Ok(entries
        .iter()
        .filter_map(|entry| match BatchVerdict::deserialize(entry) {
            Ok(verdict) => Some(verdict),
            Err(e) => {
                tracing::warn!(error = %e, entry = %entry, "Skipping malformed verdict");
                None
            }
        })
        .collect())
}
