//! Classifier output and the per-image scan state.

use serde::{Deserialize, Serialize};

/// Severity used when neither the annotator nor the classifier supplied one.
pub const DEFAULT_SEVERITY: &str = "High";

/// One violation the classifier reported for a whole image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationSummary {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_severity")]
    pub severity: String,
}

fn default_severity() -> String {
    DEFAULT_SEVERITY.to_string()
}

impl ViolationSummary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            severity: default_severity(),
        }
    }

    /// A summary is only worth persisting if it names the violation.
    pub fn is_well_formed(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

/// Whether an image has been through the classifier yet.
///
/// `Scanned` with an empty list is representable, so "not yet classified"
/// never has to share a sentinel with "classified, nothing found".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    Unscanned,
    Scanned(Vec<ViolationSummary>),
}

impl ScanState {
    pub fn is_unscanned(&self) -> bool {
        matches!(self, Self::Unscanned)
    }
}

/// Decide whether a classifier result may be persisted.
///
/// Only a non-empty list of well-formed items qualifies; anything else
/// leaves the image unscanned for the next pass.
pub fn accept_classification(items: Vec<ViolationSummary>) -> Option<Vec<ViolationSummary>> {
    if items.is_empty() || !items.iter().all(ViolationSummary::is_well_formed) {
        return None;
    }
    Some(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_fills_defaults() {
        let v: ViolationSummary = serde_json::from_str(r#"{"name":"no-helmet"}"#).unwrap();
        assert_eq!(v, ViolationSummary::new("no-helmet"));
        assert_eq!(v.severity, "High");
    }

    #[test]
    fn deserialize_requires_name() {
        assert!(serde_json::from_str::<ViolationSummary>(r#"{"severity":"Low"}"#).is_err());
    }

    #[test]
    fn accept_rejects_empty_list() {
        assert!(accept_classification(vec![]).is_none());
    }

    #[test]
    fn accept_rejects_blank_names() {
        let items = vec![ViolationSummary::new("no-vest"), ViolationSummary::new("  ")];
        assert!(accept_classification(items).is_none());
    }

    #[test]
    fn accept_keeps_well_formed_list() {
        let items = vec![ViolationSummary::new("no-helmet")];
        assert_eq!(accept_classification(items.clone()), Some(items));
    }

    #[test]
    fn scan_state_accessors() {
        assert!(ScanState::Unscanned.is_unscanned());
        let scanned = ScanState::Scanned(vec![ViolationSummary::new("no-helmet")]);
        assert!(!scanned.is_unscanned());
    }
}
