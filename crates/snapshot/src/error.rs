use thiserror::Error;

pub type Result<T> = std::result::Result<T, SnapshotError>;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Snapshot is not valid UTF-8: {0}")]
    ParseError(String),

    #[error("File not found in snapshot: {0}")]
    FileNotFound(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Watcher error: {0}")]
    WatcherError(String),

    #[error("{0}")]
    Other(String),
}

impl SnapshotError {
    pub fn file_not_found(file: impl Into<String>) -> Self {
        Self::FileNotFound(file.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::FileNotFound(_))
    }
}
