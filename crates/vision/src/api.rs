//! REST client for the assistant HTTP endpoints.
//!
//! Wraps file upload, session (thread) creation, message posting, run
//! start/poll and message listing using [`reqwest`]. Every call is a
//! single request; the protocol order lives in [`crate::session`].

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;

use crate::error::VisionError;
use crate::messages::{ContentBlock, MessageList, ObjectRef, Run};

/// Header carrying the API revision the assistant endpoints require.
const API_REVISION_HEADER: &str = "OpenAI-Beta";

/// Upload purpose for images attached to messages.
const UPLOAD_PURPOSE: &str = "vision";

/// HTTP client for one assistant service endpoint.
#[derive(Clone)]
pub struct VisionApi {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    api_revision: Option<String>,
}

impl VisionApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base URL without trailing slash, e.g. `https://host/v1`.
    pub fn new(api_url: String, api_key: String) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, api_key)
    }

    /// Create an API client whose every request is cut off after
    /// `request_timeout`.
    pub fn with_timeout(
        api_url: String,
        api_key: String,
        request_timeout: Duration,
    ) -> Result<Self, VisionError> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self::with_client(client, api_url, api_key))
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (shares its connection pool).
    pub fn with_client(client: reqwest::Client, api_url: String, api_key: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            api_revision: None,
        }
    }

    /// Send an API revision header (e.g. `assistants=v2`) on JSON calls.
    pub fn with_api_revision(mut self, revision: impl Into<String>) -> Self {
        self.api_revision = Some(revision.into());
        self
    }

    /// Upload a local file and return its handle.
    pub async fn upload_file(&self, path: &Path) -> Result<String, VisionError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| VisionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime_for(path))?;
        let form = Form::new()
            .part("file", part)
            .text("purpose", UPLOAD_PURPOSE);

        // Multipart sets its own content type; only auth is added here.
        let response = self
            .client
            .post(self.url("/files"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let file: ObjectRef = Self::parse_response(response).await?;
        Ok(file.id)
    }

    /// Open a new, empty session.
    pub async fn create_session(&self) -> Result<String, VisionError> {
        let response = self
            .json_request(self.client.post(self.url("/threads")))
            .json(&serde_json::json!({}))
            .send()
            .await?;

        let session: ObjectRef = Self::parse_response(response).await?;
        Ok(session.id)
    }

    /// Post one user message made of `content` blocks.
    pub async fn post_message(
        &self,
        session_id: &str,
        content: &[ContentBlock],
    ) -> Result<(), VisionError> {
        let body = serde_json::json!({
            "role": "user",
            "content": content,
        });

        let response = self
            .json_request(
                self.client
                    .post(self.url(&format!("/threads/{session_id}/messages"))),
            )
            .json(&body)
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Start processing the session with the given assistant.
    pub async fn start_run(&self, session_id: &str, assistant_id: &str) -> Result<Run, VisionError> {
        let body = serde_json::json!({ "assistant_id": assistant_id });

        let response = self
            .json_request(self.client.post(self.url(&format!("/threads/{session_id}/runs"))))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the current state of a run.
    pub async fn get_run(&self, session_id: &str, run_id: &str) -> Result<Run, VisionError> {
        let response = self
            .json_request(
                self.client
                    .get(self.url(&format!("/threads/{session_id}/runs/{run_id}"))),
            )
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// List the messages of a session (newest first).
    pub async fn list_messages(&self, session_id: &str) -> Result<MessageList, VisionError> {
        let response = self
            .json_request(
                self.client
                    .get(self.url(&format!("/threads/{session_id}/messages"))),
            )
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }

    fn json_request(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.bearer_auth(&self.api_key);
        match &self.api_revision {
            Some(revision) => builder.header(API_REVISION_HEADER, revision),
            None => builder,
        }
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`VisionError::Api`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, VisionError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(VisionError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, VisionError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), VisionError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

/// Content type for an upload, from its extension.
fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_from_extension() {
        assert_eq!(mime_for(Path::new("a/b.PNG")), "image/png");
        assert_eq!(mime_for(Path::new("cropped_1.jpeg")), "image/jpeg");
        assert_eq!(mime_for(Path::new("noext")), "image/jpeg");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let api = VisionApi::new("http://localhost:9999/v1/".into(), "key".into());
        assert_eq!(api.url("/files"), "http://localhost:9999/v1/files");
    }
}
