use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("File not analyzed: {0}")]
    FileNotFound(String),

    #[error("Unsupported source file: {0}")]
    UnsupportedFile(String),
}
