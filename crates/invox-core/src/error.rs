//! Error types for the invox-core library.

use thiserror::Error;

/// Main error type for the invox library.
#[derive(Error, Debug)]
pub enum InvoxError {
    /// OCR stage error. Always fatal for the job: OCR has no fallback.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// LLM stage error. Never fatal; the orchestrator degrades to the
    /// fallback parser instead of surfacing this.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Metadata store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// No job exists under the given key.
    #[error("no extraction job found for key {0}")]
    JobNotFound(String),

    /// An illegal job state transition was attempted.
    #[error("illegal job transition: job {key} is already {status}")]
    InvalidTransition { key: String, status: String },

    /// A retry was requested for a job with no stored OCR text.
    #[error("job {0} cannot be retried: no stored OCR text; resubmit the document as a new job")]
    RetryUnavailable(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the OCR engine adapter.
///
/// Every variant here is a terminal failure condition for the job.
#[derive(Error, Debug)]
pub enum OcrError {
    /// The bytes could not be read as a document (corrupt or unsupported).
    #[error("file unreadable: {0}")]
    FileUnreadable(String),

    /// The OCR engine itself is not usable (missing model, library failure).
    #[error("OCR engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The OCR call exceeded its time budget.
    #[error("OCR timed out after {0}s")]
    Timeout(u64),
}

/// Errors from the LLM extraction adapter.
///
/// All variants are treated as "unavailable for this call" by the
/// orchestrator and trigger the fallback parser.
#[derive(Error, Debug)]
pub enum LlmError {
    /// The adapter is not configured or the service is unreachable.
    #[error("LLM unavailable: {0}")]
    Unavailable(String),

    /// The LLM call exceeded its time budget.
    #[error("LLM timed out after {0}s")]
    Timeout(u64),

    /// The model response did not match the expected schema.
    #[error("malformed LLM response: {0}")]
    Malformed(String),

    /// The provider rejected the call due to rate limiting.
    #[error("LLM rate limited")]
    RateLimited,

    /// The model returned a field set with no economically meaningful field.
    #[error("LLM result contains no meaningful field")]
    NoMeaningfulFields,
}

/// Errors from the metadata store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying storage failure.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// Failed to serialize or deserialize a stored record.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for the invox library.
pub type Result<T> = std::result::Result<T, InvoxError>;
