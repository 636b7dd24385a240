//! Row models and DTOs, one module per table group.

pub mod annotated_image;
pub mod image_result;
pub mod job;
pub mod status;
