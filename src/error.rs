// Tab Tint Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TabTintError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Invalid color: {0}")]
    InvalidColor(String),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for TabTintError {
    fn from(err: anyhow::Error) -> Self {
        TabTintError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TabTintError>;
