use thiserror::Error;

#[derive(Debug, Error)]
pub enum StudioError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Request error: {0}")]
    RequestError(String),
    #[error("Response error: {0}")]
    ResponseError(String),
    #[error("Image error: {0}")]
    ImageError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("A generation request is already in flight")]
    Busy,
}

impl From<image::ImageError> for StudioError {
    fn from(e: image::ImageError) -> Self {
        StudioError::ImageError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StudioError>;
