//! Extraction job model and its terminal state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::InvoxError;

/// Lifecycle status of an extraction job.
///
/// The only legal transitions are PROCESSING -> COMPLETED and
/// PROCESSING -> FAILED; a terminal state is never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// True for COMPLETED and FAILED.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Which path supplied the structured fields for a completed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    /// The LLM adapter returned a valid field set.
    Llm,
    /// The deterministic fallback parser supplied the fields.
    Fallback,
}

/// Identifies the extraction path that produced a job's result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineUsed {
    /// Name of the OCR engine that produced the text.
    pub ocr_engine: String,
    /// Whether the LLM or the fallback parser supplied the fields.
    pub field_source: FieldSource,
}

impl std::fmt::Display for EngineUsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match self.field_source {
            FieldSource::Llm => "llm",
            FieldSource::Fallback => "fallback",
        };
        write!(f, "{}+{}", self.ocr_engine, source)
    }
}

/// Opaque extraction detail stored on the job for audit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionPayload {
    /// Raw OCR text the fields were derived from.
    pub raw_text: String,
    /// Engine version string reported by the OCR adapter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_version: Option<String>,
    /// Confidence reported for the OCR pass.
    pub ocr_confidence: f32,
    /// Number of pages processed.
    pub page_count: u32,
}

/// One tracked attempt to derive invoice fields from an uploaded document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionJob {
    /// Unique identifier, generated at submission, immutable.
    pub key: String,

    /// Original file name, kept for audit only.
    pub source_file_name: String,

    /// Current lifecycle status.
    pub status: JobStatus,

    /// Aggregate confidence (0.0 - 1.0), meaningful only when COMPLETED.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f32>,

    /// Extraction path that produced the result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_used: Option<EngineUsed>,

    /// Audit payload (raw OCR text + engine metadata).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<ExtractionPayload>,

    /// Human-readable failure description, present only when FAILED.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Key of the produced invoice, set only when COMPLETED.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_key: Option<String>,

    /// When the job was submitted.
    pub created_at: DateTime<Utc>,

    /// When the job reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExtractionJob {
    /// Creates a new job in PROCESSING state with a fresh key.
    pub fn new(source_file_name: impl Into<String>) -> Self {
        Self {
            key: uuid::Uuid::new_v4().to_string(),
            source_file_name: source_file_name.into(),
            status: JobStatus::Processing,
            confidence_score: None,
            engine_used: None,
            payload: None,
            error_message: None,
            invoice_key: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Resets a previously terminal job for a retry run.
    ///
    /// The key is kept (same job identity). Any prior invoice key is
    /// returned to the caller and cleared from the record: while the job
    /// is PROCESSING the persisted state must not reference an invoice,
    /// but the re-run still needs the key to upsert the same invoice
    /// instead of creating a second one.
    pub fn reset_for_retry(&mut self) -> Option<String> {
        self.status = JobStatus::Processing;
        self.confidence_score = None;
        self.engine_used = None;
        self.payload = None;
        self.error_message = None;
        self.completed_at = None;
        self.invoice_key.take()
    }

    /// Transitions the job to COMPLETED.
    ///
    /// Errors if the job is already terminal; a job transitions exactly once.
    pub fn complete(
        &mut self,
        invoice_key: String,
        confidence: f32,
        engine_used: EngineUsed,
    ) -> Result<(), InvoxError> {
        self.check_processing()?;
        self.status = JobStatus::Completed;
        self.confidence_score = Some(confidence.clamp(0.0, 1.0));
        self.engine_used = Some(engine_used);
        self.invoice_key = Some(invoice_key);
        self.error_message = None;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Transitions the job to FAILED with a human-readable message.
    ///
    /// No invoice reference is retained on failure.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), InvoxError> {
        self.check_processing()?;
        self.status = JobStatus::Failed;
        self.error_message = Some(message.into());
        self.invoice_key = None;
        self.confidence_score = None;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    fn check_processing(&self) -> Result<(), InvoxError> {
        if self.status.is_terminal() {
            return Err(InvoxError::InvalidTransition {
                key: self.key.clone(),
                status: self.status.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> EngineUsed {
        EngineUsed {
            ocr_engine: "embedded-text".to_string(),
            field_source: FieldSource::Fallback,
        }
    }

    #[test]
    fn test_new_job_is_processing() {
        let job = ExtractionJob::new("invoice.pdf");
        assert_eq!(job.status, JobStatus::Processing);
        assert!(!job.key.is_empty());
        assert!(job.invoice_key.is_none());
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn test_complete_sets_invoice_and_confidence() {
        let mut job = ExtractionJob::new("invoice.pdf");
        job.complete("inv-1".to_string(), 0.87, engine()).unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.invoice_key.as_deref(), Some("inv-1"));
        assert_eq!(job.confidence_score, Some(0.87));
        assert!(job.completed_at.is_some());
        assert!(job.error_message.is_none());
    }

    #[test]
    fn test_confidence_is_clamped() {
        let mut job = ExtractionJob::new("invoice.pdf");
        job.complete("inv-1".to_string(), 1.7, engine()).unwrap();
        assert_eq!(job.confidence_score, Some(1.0));
    }

    #[test]
    fn test_fail_clears_invoice_reference() {
        let mut job = ExtractionJob::new("invoice.pdf");
        job.fail("OCR produced no usable text").unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.invoice_key.is_none());
        assert_eq!(
            job.error_message.as_deref(),
            Some("OCR produced no usable text")
        );
    }

    #[test]
    fn test_terminal_state_is_final() {
        let mut job = ExtractionJob::new("invoice.pdf");
        job.complete("inv-1".to_string(), 0.9, engine()).unwrap();

        assert!(job.fail("too late").is_err());
        assert!(job.complete("inv-2".to_string(), 0.5, engine()).is_err());
        // The original outcome is untouched.
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.invoice_key.as_deref(), Some("inv-1"));
    }

    #[test]
    fn test_reset_for_retry_keeps_identity() {
        let mut job = ExtractionJob::new("invoice.pdf");
        let key = job.key.clone();
        job.complete("inv-1".to_string(), 0.9, engine()).unwrap();

        let prior = job.reset_for_retry();
        assert_eq!(job.key, key);
        assert_eq!(job.status, JobStatus::Processing);
        // The invoice reference moves out of the record: a PROCESSING job
        // must not point at an invoice, but the caller keeps the key so
        // the re-run upserts the same invoice.
        assert_eq!(prior.as_deref(), Some("inv-1"));
        assert!(job.invoice_key.is_none());
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn test_engine_used_display() {
        assert_eq!(engine().to_string(), "embedded-text+fallback");
    }
}
