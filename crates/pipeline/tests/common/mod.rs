#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use sitewatch_core::annotation::AnnotationDetail;
use sitewatch_core::violation::ViolationSummary;
use sitewatch_db::models::annotated_image::CreateAnnotatedImage;
use sitewatch_vision::{BatchItem, BatchValidator, BatchVerdict, Classifier, VisionError};
use tokio::sync::Mutex;

/// What the scripted classifier answers for one file name.
#[derive(Clone)]
pub enum Reply {
    Items(Vec<ViolationSummary>),
    NoResult,
    Error,
}

/// Classifier stand-in keyed by file name; unknown names get no result.
#[derive(Default)]
pub struct ScriptedClassifier {
    replies: HashMap<String, Reply>,
    pub calls: AtomicUsize,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, file_name: &str, reply: Reply) -> Self {
        self.replies.insert(file_name.to_string(), reply);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, image_path: &Path) -> Result<Option<Vec<ViolationSummary>>, VisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match self.replies.get(&name) {
            Some(Reply::Items(items)) => Ok(Some(items.clone())),
            Some(Reply::Error) => Err(VisionError::Api {
                status: 500,
                body: "scripted failure".into(),
            }),
            Some(Reply::NoResult) | None => Ok(None),
        }
    }
}

/// One batch call as seen by [`ScriptedBatchValidator`].
#[derive(Debug, Clone)]
pub struct SeenBatch {
    pub items: Vec<BatchItem>,
    /// Whether every crop file existed while the call was in flight.
    pub files_present: bool,
}

/// Batch validator stand-in that returns fixed verdicts (or fails).
#[derive(Default)]
pub struct ScriptedBatchValidator {
    verdicts: Vec<BatchVerdict>,
    fail: bool,
    pub seen: Mutex<Vec<SeenBatch>>,
}

impl ScriptedBatchValidator {
    pub fn answering(verdicts: Vec<BatchVerdict>) -> Self {
        Self {
            verdicts,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub async fn seen(&self) -> Vec<SeenBatch> {
        self.seen.lock().await.clone()
    }
}

#[async_trait]
impl BatchValidator for ScriptedBatchValidator {
    async fn validate_batch(&self, items: &[BatchItem]) -> Result<Vec<BatchVerdict>, VisionError> {
        let files_present = items.iter().all(|i| i.image_path.exists());
        self.seen.lock().await.push(SeenBatch {
            items: items.to_vec(),
            files_present,
        });

        if self.fail {
            return Err(VisionError::Api {
                status: 502,
                body: "scripted failure".into(),
            });
        }
        Ok(self.verdicts.clone())
    }
}

pub fn verdict(detail_index: usize, is_valid: bool, name: &str) -> BatchVerdict {
    BatchVerdict {
        detail_index,
        is_valid,
        violation_name: Some(name.to_string()),
    }
}

/// Write a solid-color PNG under `root/rel` and return its full path.
pub fn write_png(root: &Path, rel: &str, width: u32, height: u32) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([120, 90, 30]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    std::fs::write(&path, buf.into_inner()).unwrap();
    path
}

pub fn annotation(owner: &str, rel: &str, details: Vec<AnnotationDetail>) -> CreateAnnotatedImage {
    CreateAnnotatedImage {
        owner_id: owner.to_string(),
        image_name: Path::new(rel)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        image_path: rel.to_string(),
        image_width: 1920,
        image_height: 1080,
        details,
    }
}

/// Number of files in `dir`; a missing directory counts as empty.
pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
