use crate::provider::ProviderError;
use nucleus_snapshot::SnapshotError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalyzeError>;

/// Errors that end an analysis session before it reaches a result.
///
/// Interpreter failures never show up here: they are fed back to the
/// provider as that turn's result.
#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Snapshot error: {0}")]
    Document(#[from] SnapshotError),
}
