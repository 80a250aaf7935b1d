use docstyle_core::AnalysisError;
use thiserror::Error;

/// Failures of a text encoder backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncoderError {
    #[error("failed to initialize text encoder: {0}")]
    Init(String),

    #[error("text encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, Error)]
pub enum MatchError {
    #[error(transparent)]
    Encoder(#[from] EncoderError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("encoder returned {found} vectors or dimensions where {expected} were expected")]
    DimensionMismatch { expected: usize, found: usize },
}
