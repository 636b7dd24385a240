//! One request/response round trip with an assistant.

use crate::api::VisionApi;
use crate::error::VisionError;
use crate::messages::{first_json_payload, ContentBlock};
use crate::poll::{poll_until_terminal, PollConfig};

/// Binds an API client to one assistant and a polling policy.
#[derive(Clone)]
pub struct AssistantSession {
    api: VisionApi,
    assistant_id: String,
    poll: PollConfig,
}

impl AssistantSession {
    pub fn new(api: VisionApi, assistant_id: String, poll: PollConfig) -> Self {
        Self {
            api,
            assistant_id,
            poll,
        }
    }

    pub fn api(&self) -> &VisionApi {
        &self.api
    }

    /// Send `content` as one message in a fresh session and return the
    /// assistant's JSON reply.
    ///
    /// `Ok(None)` means the run ended without success or the reply was not
    /// JSON; both are ordinary "no answer yet" outcomes.
    pub async fn request(
        &self,
        content: &[ContentBlock],
    ) -> Result<Option<serde_json::Value>, VisionError> {
        let session_id = self.api.create_session().await?;
        self.api.post_message(&session_id, content).await?;

        let started = self.api.start_run(&session_id, &self.assistant_id).await?;
        let run = if started.status.is_terminal() {
            started
        } else {
            poll_until_terminal(&self.poll, &started.id, || {
                self.api.get_run(&session_id, &started.id)
            })
            .await?
        };

        if !run.status.is_success() {
            tracing::warn!(
                session_id = %session_id,
                run_id = %run.id,
                status = ?run.status,
                last_error = ?run.last_error,
                "Assistant run did not complete",
            );
            return Ok(None);
        }

        let messages = self.api.list_messages(&session_id).await?;
        match first_json_payload(&messages) {
            Ok(payload) => Ok(Some(payload)),
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "No usable assistant reply");
                Ok(None)
            }
        }
    }
}
