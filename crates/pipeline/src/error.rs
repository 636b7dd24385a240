use std::path::PathBuf;

use sitewatch_core::error::CoreError;
use sitewatch_core::types::DbId;
use sitewatch_vision::VisionError;

/// Errors from the store and queue seams.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An optimistic update found the row at a newer version.
    #[error("Record {id} changed since version {expected_version} was read")]
    Conflict { id: DbId, expected_version: i32 },

    #[error("Invalid input: {0}")]
    Invalid(String),
}

/// Errors from a pipeline pass or from one unit of a pass.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Vision(#[from] VisionError),

    #[error(transparent)]
    Core(#[from] CoreError),

    /// The source image of a record could not be read.
    #[error("Image {path} is unavailable: {source}")]
    ImageMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A crop artifact could not be written.
    #[error("Failed to write artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Another writer updated the record while it was being validated.
    #[error("Annotation {id} was modified during validation")]
    StaleRecord { id: DbId },

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl PipelineError {
    /// Whether the unit should count as skipped rather than failed.
    ///
    /// Both cases leave the record pending for the next pass.
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::ImageMissing { .. } | Self::StaleRecord { .. })
    }
}
