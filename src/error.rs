// Stockshelf error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShelfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("FFprobe error: {0}")]
    FFprobe(String),

    #[error("Root directory not found: {0}")]
    RootNotFound(PathBuf),

    #[error("Malformed sidecar metadata: {0}")]
    Sidecar(String),

    #[error("Malformed annotation document: {0}")]
    Annotation(String),

    #[error("Catalog persist failed: {0}")]
    Persist(String),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for ShelfError {
    fn from(err: anyhow::Error) -> Self {
        ShelfError::Other(err.to_string())
    }
}

impl From<notify::Error> for ShelfError {
    fn from(err: notify::Error) -> Self {
        ShelfError::Watch(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ShelfError>;
