//! Temporary crop files for one validation record.
//!
//! Every file written through an [`ArtifactSet`] is deleted again: by
//! [`ArtifactSet::cleanup`] on the normal path, and by `Drop` when the
//! record bails out early through `?` or a panic.

use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// Prefix of every crop artifact file name.
pub const ARTIFACT_PREFIX: &str = "cropped_";

/// Extension of every crop artifact file name.
pub const ARTIFACT_EXTENSION: &str = "jpeg";

/// Owns the crop files written for one record.
#[derive(Debug)]
pub struct ArtifactSet {
    dir: PathBuf,
    paths: Vec<PathBuf>,
}

impl ArtifactSet {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            paths: Vec::new(),
        }
    }

    /// Write `bytes` to a fresh `cropped_<uuid>.jpeg` and take ownership of
    /// the file.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<PathBuf, PipelineError> {
        let path = self.dir.join(format!(
            "{ARTIFACT_PREFIX}{}.{ARTIFACT_EXTENSION}",
            uuid::Uuid::new_v4()
        ));

        // Tracked before writing so a partial file is removed as well.
        self.paths.push(path.clone());
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| PipelineError::Artifact {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    /// Delete every owned file. Returns how many were removed.
    pub async fn cleanup(&mut self) -> usize {
        let mut removed = 0;
        for path in std::mem::take(&mut self.paths) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to delete crop artifact");
                }
            }
        }
        removed
    }
}

impl Drop for ArtifactSet {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            remove_quietly(&path);
        }
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to delete crop artifact");
        }
    }
}
