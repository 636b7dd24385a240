//! Wire types for the assistant API and reply parsing.
//!
//! Responses are deserialized leniently: unknown run states and content
//! block types map to catch-all variants so a new server-side value never
//! turns into a hard failure.

use serde::{Deserialize, Serialize};

use crate::error::VisionError;

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Any response that only matters for its identifier (file, session,
/// message).
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectRef {
    pub id: String,
}

/// Lifecycle of an assistant run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Whether polling can stop.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Expired | Self::Incomplete
        )
    }

    pub fn is_success(self) -> bool {
        self == Self::Completed
    }
}

/// A run as returned by the start and poll endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub last_error: Option<serde_json::Value>,
}

/// Page of messages in a session, newest first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageList {
    #[serde(default)]
    pub data: Vec<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: TextValue },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextValue {
    pub value: String,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// One block of an outgoing user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    ImageFile { image_file: FileRef },
    Text { text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRef {
    pub file_id: String,
}

impl ContentBlock {
    pub fn image(file_id: impl Into<String>) -> Self {
        Self::ImageFile {
            image_file: FileRef {
                file_id: file_id.into(),
            },
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

// ---------------------------------------------------------------------------
// Reply parsing
// ---------------------------------------------------------------------------

/// Find the first text block from the assistant that parses as JSON.
///
/// Messages without a role are treated as assistant messages. Text that
/// is not JSON is skipped (the session also holds the user's own prompt
/// text). Returns [`VisionError::Parse`] when no block qualifies.
pub fn first_json_payload(list: &MessageList) -> Result<serde_json::Value, VisionError> {
    let mut last_failure = None;

    for message in &list.data {
        if message.role.as_deref().is_some_and(|r| r != "assistant") {
            continue;
        }
        for content in &message.content {
            let MessageContent::Text { text } = content else {
                continue;
            };
            match serde_json::from_str(strip_code_fence(&text.value)) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::warn!(error = %e, raw = %text.value, "Failed to parse assistant reply");
                    last_failure = Some(e.to_string());
                }
            }
        }
    }

    Err(VisionError::Parse(
        last_failure.unwrap_or_else(|| "no text reply from assistant".to_string()),
    ))
}

/// Drop a surrounding Markdown code fence (```json ... ```), if any.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn list(value: serde_json::Value) -> MessageList {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn run_status_parses_known_and_unknown() {
        let run: Run = serde_json::from_str(r#"{"id":"run_1","status":"in_progress"}"#).unwrap();
        assert_eq!(run.status, RunStatus::InProgress);
        assert!(!run.status.is_terminal());

        let run: Run = serde_json::from_str(r#"{"id":"run_1","status":"paused_forever"}"#).unwrap();
        assert_eq!(run.status, RunStatus::Unknown);
        assert!(!run.status.is_terminal());
    }

    #[test]
    fn terminal_states() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Completed.is_success());
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Failed.is_success());
        assert!(RunStatus::Expired.is_terminal());
        assert!(!RunStatus::Queued.is_terminal());
    }

    #[test]
    fn content_blocks_serialize_to_wire_shape() {
        let blocks = vec![ContentBlock::image("file-1"), ContentBlock::text("hello")];
        assert_eq!(
            serde_json::to_value(&blocks).unwrap(),
            json!([
                {"type": "image_file", "image_file": {"file_id": "file-1"}},
                {"type": "text", "text": "hello"}
            ])
        );
    }

    #[test]
    fn payload_from_first_assistant_text() {
        let messages = list(json!({"data": [
            {"role": "assistant", "content": [
                {"type": "image_file", "image_file": {"file_id": "x"}},
                {"type": "text", "text": {"value": "{\"items\": []}"}}
            ]},
            {"role": "user", "content": [{"type": "text", "text": {"value": "{\"items\": [1]}"}}]}
        ]}));
        assert_eq!(first_json_payload(&messages).unwrap(), json!({"items": []}));
    }

    #[test]
    fn payload_skips_user_prompt_text() {
        let messages = list(json!({"data": [
            {"role": "user", "content": [{"type": "text", "text": {"value": "{\"violations\": [1]}"}}]}
        ]}));
        assert_matches!(first_json_payload(&messages), Err(VisionError::Parse(_)));
    }

    #[test]
    fn payload_skips_unparseable_text() {
        let messages = list(json!({"data": [
            {"role": "assistant", "content": [
                {"type": "text", "text": {"value": "Here you go:"}},
                {"type": "text", "text": {"value": "```json\n{\"violations\": []}\n```"}}
            ]}
        ]}));
        assert_eq!(first_json_payload(&messages).unwrap(), json!({"violations": []}));
    }

    #[test]
    fn empty_list_is_parse_error() {
        assert_matches!(
            first_json_payload(&MessageList::default()),
            Err(VisionError::Parse(msg)) if msg.contains("no text reply")
        );
    }
}
