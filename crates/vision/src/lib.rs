//! Client library for the external vision assistant.
//!
//! The service is session oriented: content is uploaded for a file handle,
//! a session receives one message referencing the handles, a run is
//! started and polled until it reaches a terminal state, and the reply is
//! read back from the session's messages. [`session::AssistantSession`]
//! drives that protocol; [`classifier`] and [`batch`] build the two
//! request shapes the pipeline needs on top of it.

pub mod api;
pub mod batch;
pub mod classifier;
pub mod error;
pub mod messages;
pub mod poll;
pub mod session;

pub use batch::{AssistantBatchValidator, BatchItem, BatchValidator, BatchVerdict};
pub use classifier::{AssistantClassifier, Classifier};
pub use error::VisionError;
