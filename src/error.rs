//! Error handling for the relevance engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelevanceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("PDF extraction error: {0}")]
    PdfExtraction(String),

    #[error("Embedding backend unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Reasoning call failed transiently: {0}")]
    ReasoningTransientFailure(String),

    #[error("Reasoning response malformed: {0}")]
    ReasoningMalformedResponse(String),

    #[error("Reasoning backend error: {0}")]
    Reasoning(String),

    #[error("No signals available to aggregate")]
    AggregationInputEmpty,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("File format not supported: {0}")]
    UnsupportedFormat(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl RelevanceError {
    /// Whether the reasoning retry policy should try again after this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RelevanceError::ReasoningTransientFailure(_)
                | RelevanceError::ReasoningMalformedResponse(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RelevanceError>;

/// Convert anyhow errors to our custom error type
impl From<anyhow::Error> for RelevanceError {
    fn from(err: anyhow::Error) -> Self {
        RelevanceError::Processing(err.to_string())
    }
}
