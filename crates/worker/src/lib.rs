//! Process wiring for the background pipeline worker.

pub mod app;
pub mod config;
