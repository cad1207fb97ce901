use thiserror::Error;

use crate::tasks::conflict::SpanConflict;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to read {rel_path}: {source}")]
    DocumentRead {
        rel_path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("task cache is corrupt: {0}")]
    CacheCorrupt(String),

    #[error("task {} in {} changed on disk", .0.task_id, .0.rel_path)]
    SpanConflict(Box<SpanConflict>),

    #[error("task not found: {0}")]
    TaskNotFound(u64),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("edit rejected: {0}")]
    InvalidEdit(String),

    #[error("a queue drain is already running")]
    ScanInProgress,

    #[error("watcher error: {0}")]
    Watcher(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<notify::Error> for EngineError {
    fn from(error: notify::Error) -> Self {
        EngineError::Watcher(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
