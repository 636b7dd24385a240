//! Annotation detail entries and their tri-state validation.
//!
//! Details are kept in an ordered list per annotated image. Position is the
//! only identity a detail has: the batch validator answers by index, so
//! nothing here may reorder or drop entries.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::geometry::BoundingBox;
use crate::types::DetailIndex;

// ---------------------------------------------------------------------------
// DetailValidation
// ---------------------------------------------------------------------------

/// Outcome of validating one annotated detail against the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailValidation {
    Unknown,
    Confirmed,
    Rejected,
}

/// All valid validation-state strings, as accepted by [`DetailValidation::from_str`].
const VALID_STATE_STRINGS: &[&str] = &["null", "true", "false"];

impl DetailValidation {
    /// The persisted flag: `None` while unknown.
    pub fn as_flag(self) -> Option<bool> {
        match self {
            Self::Unknown => None,
            Self::Confirmed => Some(true),
            Self::Rejected => Some(false),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
        }
    }

    /// Parse the query form used by owners listing their annotations:
    /// `"true"`, `"false"` or `"null"`.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "true" => Ok(Self::Confirmed),
            "false" => Ok(Self::Rejected),
            "null" => Ok(Self::Unknown),
            _ => Err(CoreError::Validation(format!(
                "Invalid validation state '{s}'. Must be one of: {}",
                VALID_STATE_STRINGS.join(", ")
            ))),
        }
    }
}

impl From<Option<bool>> for DetailValidation {
    fn from(flag: Option<bool>) -> Self {
        match flag {
            None => Self::Unknown,
            Some(true) => Self::Confirmed,
            Some(false) => Self::Rejected,
        }
    }
}

// ---------------------------------------------------------------------------
// AnnotationDetail
// ---------------------------------------------------------------------------

/// One human-drawn violation box on an annotated image.
///
/// `bounding_box` stays raw JSON so that a malformed box survives storage
/// and is rejected per detail at validation time instead of failing the
/// whole record on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationDetail {
    pub violation_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub bounding_box: serde_json::Value,
    #[serde(default)]
    pub is_valid: Option<bool>,
}

impl AnnotationDetail {
    pub fn new(
        violation_name: impl Into<String>,
        description: impl Into<String>,
        bounding_box: BoundingBox,
    ) -> Self {
        Self {
            violation_name: violation_name.into(),
            description: description.into(),
            bounding_box: serde_json::json!({
                "x": bounding_box.x,
                "y": bounding_box.y,
                "width": bounding_box.width,
                "height": bounding_box.height,
            }),
            is_valid: None,
        }
    }

    pub fn validation(&self) -> DetailValidation {
        self.is_valid.into()
    }

    pub fn is_pending(&self) -> bool {
        self.validation() == DetailValidation::Unknown
    }

    pub fn bounding_box(&self) -> Result<BoundingBox, CoreError> {
        BoundingBox::from_json(&self.bounding_box)
    }
}

/// Indices of every detail still awaiting a verdict, in list order.
pub fn pending_indices(details: &[AnnotationDetail]) -> Vec<DetailIndex> {
    details
        .iter()
        .enumerate()
        .filter(|(_, d)| d.is_pending())
        .map(|(i, _)| i)
        .collect()
}

// ---------------------------------------------------------------------------
// Submission validation
// ---------------------------------------------------------------------------

/// Check the identifying fields of an annotation submission.
///
/// Owner, image name and image path are all required and form the
/// de-duplication key, so blank values are rejected.
pub fn validate_submission_key(
    owner_id: &str,
    image_name: &str,
    image_path: &str,
) -> Result<(), CoreError> {
    for (field, value) in [
        ("owner_id", owner_id),
        ("image_name", image_name),
        ("image_path", image_path),
    ] {
        if value.trim().is_empty() {
            return Err(CoreError::Validation(format!("{field} must not be empty")));
        }
    }
    Ok(())
}

/// Check the recorded original image dimensions.
pub fn validate_image_size(width: i32, height: i32) -> Result<(), CoreError> {
    if width <= 0 || height <= 0 {
        return Err(CoreError::Validation(format!(
            "image size must be positive, got {width}x{height}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn detail(is_valid: Option<bool>) -> AnnotationDetail {
        AnnotationDetail {
            is_valid,
            ..AnnotationDetail::new("no-helmet", "", BoundingBox::new(0.0, 0.0, 1.0, 1.0))
        }
    }

    #[test]
    fn validation_from_flag() {
        assert_eq!(DetailValidation::from(None), DetailValidation::Unknown);
        assert_eq!(DetailValidation::from(Some(true)), DetailValidation::Confirmed);
        assert_eq!(DetailValidation::from(Some(false)), DetailValidation::Rejected);
    }

    #[test]
    fn validation_flag_roundtrip() {
        for state in [
            DetailValidation::Unknown,
            DetailValidation::Confirmed,
            DetailValidation::Rejected,
        ] {
            assert_eq!(DetailValidation::from(state.as_flag()), state);
        }
    }

    #[test]
    fn validation_from_query_string() {
        assert_eq!(DetailValidation::from_str("null").unwrap(), DetailValidation::Unknown);
        assert_eq!(DetailValidation::from_str("true").unwrap(), DetailValidation::Confirmed);
        assert_matches!(DetailValidation::from_str("maybe"), Err(CoreError::Validation(_)));
    }

    #[test]
    fn missing_fields_deserialize_as_unknown() {
        let d: AnnotationDetail = serde_json::from_str(r#"{"violation_name":"no-vest"}"#).unwrap();
        assert!(d.is_pending());
        assert_eq!(d.description, "");
        assert_matches!(d.bounding_box(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn new_detail_box_parses_back() {
        let b = BoundingBox::new(1.0, 2.0, -3.0, 4.0);
        let d = AnnotationDetail::new("no-helmet", "worker at gate", b);
        assert_eq!(d.bounding_box().unwrap(), b);
    }

    #[test]
    fn pending_indices_keep_order() {
        let details = vec![detail(None), detail(Some(true)), detail(None), detail(Some(false))];
        assert_eq!(pending_indices(&details), vec![0, 2]);
    }

    #[test]
    fn submission_key_rejects_blank_fields() {
        assert!(validate_submission_key("emp-1", "a.jpg", "images/1/a.jpg").is_ok());
        assert_matches!(
            validate_submission_key("emp-1", " ", "images/1/a.jpg"),
            Err(CoreError::Validation(msg)) if msg.contains("image_name")
        );
    }

    #[test]
    fn image_size_must_be_positive() {
        assert!(validate_image_size(800, 600).is_ok());
        assert!(validate_image_size(0, 600).is_err());
    }
}
