#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Image processing failed: {0}")]
    Image(String),
}

impl From<image::ImageError> for CoreError {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err.to_string())
    }
}
