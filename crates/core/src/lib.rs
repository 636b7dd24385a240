//! Domain types shared by the sitewatch crates.
//!
//! Nothing in here touches the database or the network: bounding-box
//! geometry, detail validation state, violation summaries and the pure
//! image operations used to build crop artifacts.

pub mod annotation;
pub mod error;
pub mod geometry;
pub mod region;
pub mod types;
pub mod violation;
