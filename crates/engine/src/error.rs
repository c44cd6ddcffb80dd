use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Bookmark source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Bookmark source did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Bookmark node not found: {0}")]
    NotFound(String),

    #[error("Bookmark node {0} cannot be modified")]
    Immutable(String),

    #[error("Bookmark node {0} is not a folder")]
    NotAFolder(String),

    #[error("Folder {0} is not empty")]
    FolderNotEmpty(String),

    #[error("Invalid url: {0}")]
    InvalidUrl(String),

    #[error("Bookmark file is read-only: {}", .0.display())]
    ReadOnly(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Watcher error: {0}")]
    Watch(String),

    #[error("Change coalescer is shut down")]
    Closed,

    #[error("{0}")]
    Other(String),
}
