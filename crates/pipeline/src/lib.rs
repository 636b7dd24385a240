//! The background validation pipeline.
//!
//! Two passes share one work queue: the [`scanner`] classifies images that
//! have never been scanned, and the [`validator`] crops every pending
//! annotation box, asks the batch validator about the crops and writes the
//! verdicts back by detail index. Both passes re-query their pending set on
//! every run, so a unit that fails is simply picked up again next time.
//!
//! Storage and the queue are reached through traits ([`store`], [`queue`])
//! with PostgreSQL and in-memory implementations.

pub mod artifacts;
pub mod error;
pub mod ingest;
pub mod queue;
pub mod reconcile;
pub mod scanner;
pub mod store;
pub mod validator;

pub use error::{PipelineError, StoreError};
pub use scanner::{ScanReport, Scanner};
pub use validator::{ValidationReport, Validator};
