use std::path::PathBuf;
use std::time::Duration;

/// Errors from the vision assistant client.
///
/// A run that ends `failed`, or a reply that cannot be parsed, is not an
/// error at this level: callers get an empty result and retry later.
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Vision API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// Reading a local file for upload failed.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The run did not reach a terminal state in time.
    #[error("Run {run_id} still pending after {attempts} polls ({elapsed:?})")]
    Timeout {
        run_id: String,
        attempts: u32,
        elapsed: Duration,
    },

    /// The assistant's reply did not have the expected shape.
    #[error("Unexpected assistant reply: {0}")]
    Parse(String),
}
