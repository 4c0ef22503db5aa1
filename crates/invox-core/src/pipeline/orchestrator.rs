//! Extraction orchestrator.
//!
//! Drives one document through OCR, structured extraction, and
//! persistence, recording every outcome on the job. The orchestrator is
//! the boundary that converts all failure into a terminal job state:
//! fatal conditions end the job FAILED with a readable message, LLM
//! trouble degrades silently to the fallback parser.

use std::sync::Arc;
use std::time::Duration;

use tokio::task;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::{InvoxError, LlmError, OcrError, Result};
use crate::fallback::FallbackFieldParser;
use crate::llm::LlmExtractionAdapter;
use crate::models::{
    EngineUsed, ExtractedFields, ExtractionJob, ExtractionPayload, FieldSource, InvoiceRecord,
    InvoiceStatus, PipelineConfig, UNKNOWN_SENTINEL,
};
use crate::ocr::{OcrEngineAdapter, OcrOutcome};
use crate::store::MetadataStore;

use super::events::{EventSink, ExtractionEvent};

/// The invoice extraction pipeline.
///
/// Adapters are supplied at construction; the pipeline owns no I/O of
/// its own. Jobs are independent units of work sharing state only
/// through the metadata store.
pub struct ExtractionPipeline {
    ocr: Arc<dyn OcrEngineAdapter>,
    llm: Option<Arc<dyn LlmExtractionAdapter>>,
    store: Arc<dyn MetadataStore>,
    events: Arc<dyn EventSink>,
    fallback: FallbackFieldParser,
    config: PipelineConfig,
}

impl ExtractionPipeline {
    pub fn new(
        ocr: Arc<dyn OcrEngineAdapter>,
        llm: Option<Arc<dyn LlmExtractionAdapter>>,
        store: Arc<dyn MetadataStore>,
        events: Arc<dyn EventSink>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            ocr,
            llm,
            store,
            events,
            fallback: FallbackFieldParser::new(),
            config,
        }
    }

    /// Run the full pipeline for one uploaded document.
    ///
    /// Always returns the job in a terminal state; an `Err` here means
    /// the metadata store itself is unusable, not that extraction failed.
    pub async fn extract_and_save(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        mime_type: &str,
    ) -> Result<ExtractionJob> {
        let job = ExtractionJob::new(file_name);
        self.store.upsert_job(&job)?;
        self.publish(ExtractionEvent::Started {
            job_key: job.key.clone(),
            file_name: file_name.to_string(),
        });
        info!("Job {} started for {}", job.key, file_name);

        match self.run_ocr(bytes, file_name, mime_type).await {
            Ok(outcome) => self.finish_from_text(job, outcome, None).await,
            Err(e) => self.fail_job(job, e.to_string()),
        }
    }

    /// Look up a job by key.
    pub fn metadata(&self, key: &str) -> Result<ExtractionJob> {
        self.store
            .find_job(key)?
            .ok_or_else(|| InvoxError::JobNotFound(key.to_string()))
    }

    /// Re-run extraction for an existing job, reusing its identity.
    ///
    /// The stored OCR text from the previous run is re-processed. The
    /// prior invoice key (if any) is carried outside the persisted record
    /// while the job is PROCESSING, then reused at the terminal write so
    /// the same invoice is upserted instead of a second one created.
    pub async fn retry(&self, key: &str) -> Result<ExtractionJob> {
        let mut job = self.metadata(key)?;

        let payload = job
            .payload
            .clone()
            .ok_or_else(|| InvoxError::RetryUnavailable(key.to_string()))?;

        let prior_invoice_key = job.reset_for_retry();
        self.store.upsert_job(&job)?;
        self.publish(ExtractionEvent::Started {
            job_key: job.key.clone(),
            file_name: job.source_file_name.clone(),
        });
        info!("Job {} retrying", job.key);

        let outcome = OcrOutcome {
            text: payload.raw_text,
            confidence: payload.ocr_confidence,
            page_count: payload.page_count,
            engine_version: payload
                .engine_version
                .unwrap_or_else(|| self.ocr.engine_name().to_string()),
        };
        self.finish_from_text(job, outcome, prior_invoice_key).await
    }

    /// Steps 2-6 of the pipeline, once OCR text is in hand.
    async fn finish_from_text(
        &self,
        mut job: ExtractionJob,
        outcome: OcrOutcome,
        prior_invoice_key: Option<String>,
    ) -> Result<ExtractionJob> {
        if outcome.is_blank() {
            return self.fail_job(job, "no text could be extracted from the document");
        }

        job.payload = Some(ExtractionPayload {
            raw_text: outcome.text.clone(),
            engine_version: Some(outcome.engine_version.clone()),
            ocr_confidence: outcome.confidence,
            page_count: outcome.page_count,
        });
        self.publish(ExtractionEvent::OcrCompleted {
            job_key: job.key.clone(),
            confidence: outcome.confidence,
            page_count: outcome.page_count,
            text_len: outcome.text.len(),
        });

        let (fields, field_source) = self.select_fields(&job.key, &outcome.text).await;
        // Extraction-path confidence: LLM-reported when the LLM supplied
        // the fields, OCR-derived otherwise.
        let confidence = match field_source {
            FieldSource::Llm => fields.confidence,
            FieldSource::Fallback => outcome.confidence,
        };

        let invoice = self.merge_invoice(&job, prior_invoice_key, fields);
        let invoice_key = invoice.key.clone();

        if let Err(e) = self.store.upsert_invoice(&invoice) {
            return self.fail_job(job, format!("failed to persist invoice: {e}"));
        }
        self.publish(ExtractionEvent::InvoiceSaved {
            job_key: job.key.clone(),
            invoice_key: invoice_key.clone(),
        });

        let engine_used = EngineUsed {
            ocr_engine: outcome.engine_version,
            field_source,
        };
        job.complete(invoice_key, confidence, engine_used)?;
        self.store.upsert_job(&job)?;

        self.publish(ExtractionEvent::Completed {
            job_key: job.key.clone(),
            confidence,
        });
        info!(
            "Job {} completed via {} (confidence {:.2})",
            job.key,
            job.engine_used.as_ref().map(|e| e.to_string()).unwrap_or_default(),
            confidence
        );
        Ok(job)
    }

    /// Run the OCR adapter on a blocking thread with the configured
    /// time budget. A timeout here is terminal.
    async fn run_ocr(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        mime_type: &str,
    ) -> std::result::Result<OcrOutcome, OcrError> {
        let ocr = Arc::clone(&self.ocr);
        let file_name = file_name.to_string();
        let mime_type = mime_type.to_string();
        let budget = Duration::from_secs(self.config.ocr_timeout_secs);

        let handle =
            task::spawn_blocking(move || ocr.extract_text(&bytes, &file_name, &mime_type));

        match timeout(budget, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(OcrError::EngineUnavailable(format!(
                "OCR task aborted: {join_err}"
            ))),
            Err(_) => Err(OcrError::Timeout(self.config.ocr_timeout_secs)),
        }
    }

    /// Choose the field set: LLM when available and valid, the fallback
    /// parser otherwise. Never fails.
    async fn select_fields(&self, job_key: &str, text: &str) -> (ExtractedFields, FieldSource) {
        match self.try_llm(text).await {
            Ok(fields) => {
                debug!("Job {}: LLM supplied {} field(s)", job_key, fields.matched_count());
                self.publish(ExtractionEvent::LlmCompleted {
                    job_key: job_key.to_string(),
                    confidence: fields.confidence,
                });
                (fields, FieldSource::Llm)
            }
            Err(reason) => {
                warn!("Job {}: LLM path skipped: {}", job_key, reason);
                self.publish(ExtractionEvent::LlmSkipped {
                    job_key: job_key.to_string(),
                    reason: reason.to_string(),
                });
                (self.fallback.parse(text), FieldSource::Fallback)
            }
        }
    }

    /// Run the LLM adapter on a blocking thread with the configured time
    /// budget. Every failure mode maps to an `LlmError` so the caller
    /// degrades to the fallback parser.
    async fn try_llm(&self, text: &str) -> std::result::Result<ExtractedFields, LlmError> {
        let Some(llm) = &self.llm else {
            return Err(LlmError::Unavailable("no LLM adapter configured".to_string()));
        };
        if !llm.is_available() {
            return Err(LlmError::Unavailable("provider reports unavailable".to_string()));
        }

        let llm = Arc::clone(llm);
        let text = text.to_string();
        let budget = Duration::from_secs(self.config.llm_timeout_secs);

        let handle = task::spawn_blocking(move || llm.extract_invoice_data(&text));
        match timeout(budget, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(LlmError::Unavailable(format!(
                "LLM task aborted: {join_err}"
            ))),
            Err(_) => Err(LlmError::Timeout(self.config.llm_timeout_secs)),
        }
    }

    /// Merge extracted fields into an invoice record, applying sentinel
    /// defaults for absent required fields. The address stays optional:
    /// null distinguishes "not found" from "found empty".
    fn merge_invoice(
        &self,
        job: &ExtractionJob,
        prior_invoice_key: Option<String>,
        fields: ExtractedFields,
    ) -> InvoiceRecord {
        let status = if fields.has_meaningful_field() {
            InvoiceStatus::Extracted
        } else {
            InvoiceStatus::ExtractionFailed
        };

        InvoiceRecord {
            // A retried job reuses its prior invoice key so the write is
            // an upsert, never a second invoice for the same job.
            key: prior_invoice_key.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            invoice_number: fields
                .invoice_number
                .unwrap_or_else(|| UNKNOWN_SENTINEL.to_string()),
            amount: fields.amount.unwrap_or_default(),
            client_name: fields
                .client_name
                .unwrap_or_else(|| UNKNOWN_SENTINEL.to_string()),
            client_address: fields.client_address,
            currency: self.config.default_currency.clone(),
            status,
            source_file_name: job.source_file_name.clone(),
        }
    }

    /// Record a terminal failure on the job. The job write is best
    /// effort: if the store is down too, the failure is logged and the
    /// in-memory job still reflects the outcome.
    fn fail_job(
        &self,
        mut job: ExtractionJob,
        message: impl Into<String>,
    ) -> Result<ExtractionJob> {
        let message = message.into();
        job.fail(message.clone())?;
        if let Err(e) = self.store.upsert_job(&job) {
            error!("Job {}: failed to persist FAILED state: {}", job.key, e);
        }
        self.publish(ExtractionEvent::Failed {
            job_key: job.key.clone(),
            error: message.clone(),
        });
        warn!("Job {} failed: {}", job.key, message);
        Ok(job)
    }

    fn publish(&self, event: ExtractionEvent) {
        self.events.publish(&event);
    }
}
