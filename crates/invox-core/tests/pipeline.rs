//! End-to-end pipeline tests with stub adapters.

use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use rust_decimal::Decimal;

use invox_core::{
    EventSink, ExtractedFields, ExtractionEvent, ExtractionJob, ExtractionPipeline, FieldSource,
    InvoiceRecord, InvoiceStatus, JobStatus, LlmError, LlmExtractionAdapter, MemoryMetadataStore,
    MetadataStore, OcrEngineAdapter, OcrError, OcrOutcome, PipelineConfig, PipelineMetrics,
    StoreError, UNKNOWN_SENTINEL,
};

const SAMPLE_TEXT: &str =
    "INVOICE #INV-2024-001\nBill To: ACME Corporation\n123 Main Street\nTotal Amount: $1,250.00";

struct FailingOcr {
    error: fn() -> OcrError,
}

impl OcrEngineAdapter for FailingOcr {
    fn engine_name(&self) -> &str {
        "stub"
    }

    fn extract_text(&self, _: &[u8], _: &str, _: &str) -> Result<OcrOutcome, OcrError> {
        Err((self.error)())
    }
}

struct FixedTextOcr {
    text: &'static str,
    confidence: f32,
}

impl OcrEngineAdapter for FixedTextOcr {
    fn engine_name(&self) -> &str {
        "stub"
    }

    fn extract_text(&self, _: &[u8], _: &str, _: &str) -> Result<OcrOutcome, OcrError> {
        Ok(OcrOutcome {
            text: self.text.to_string(),
            confidence: self.confidence,
            page_count: 1,
            engine_version: "stub".to_string(),
        })
    }
}

struct SlowOcr {
    delay: Duration,
}

impl OcrEngineAdapter for SlowOcr {
    fn engine_name(&self) -> &str {
        "stub"
    }

    fn extract_text(&self, _: &[u8], _: &str, _: &str) -> Result<OcrOutcome, OcrError> {
        std::thread::sleep(self.delay);
        Ok(OcrOutcome {
            text: SAMPLE_TEXT.to_string(),
            confidence: 0.9,
            page_count: 1,
            engine_version: "stub".to_string(),
        })
    }
}

enum StubLlmBehavior {
    Unavailable,
    AllAbsent,
    Valid,
    Slow(Duration),
}

struct StubLlm {
    behavior: StubLlmBehavior,
}

impl LlmExtractionAdapter for StubLlm {
    fn is_available(&self) -> bool {
        !matches!(self.behavior, StubLlmBehavior::Unavailable)
    }

    fn extract_invoice_data(&self, _: &str) -> Result<ExtractedFields, LlmError> {
        match &self.behavior {
            StubLlmBehavior::Unavailable => {
                Err(LlmError::Unavailable("stubbed offline".to_string()))
            }
            StubLlmBehavior::AllAbsent => Err(LlmError::NoMeaningfulFields),
            StubLlmBehavior::Valid => Ok(ExtractedFields {
                invoice_number: Some("LLM-42".to_string()),
                amount: Some(Decimal::from_str("900.00").unwrap()),
                client_name: Some("Llm Client".to_string()),
                client_address: Some("1 Model Way".to_string()),
                confidence: 0.93,
            }),
            StubLlmBehavior::Slow(delay) => {
                std::thread::sleep(*delay);
                Err(LlmError::Unavailable("too slow".to_string()))
            }
        }
    }
}

/// Store whose invoice writes always fail.
struct BrokenInvoiceStore {
    inner: MemoryMetadataStore,
}

impl MetadataStore for BrokenInvoiceStore {
    fn upsert_job(&self, job: &ExtractionJob) -> Result<(), StoreError> {
        self.inner.upsert_job(job)
    }

    fn find_job(&self, key: &str) -> Result<Option<ExtractionJob>, StoreError> {
        self.inner.find_job(key)
    }

    fn upsert_invoice(&self, _: &InvoiceRecord) -> Result<(), StoreError> {
        Err(StoreError::Backend("disk full".to_string()))
    }

    fn find_invoice(&self, key: &str) -> Result<Option<InvoiceRecord>, StoreError> {
        self.inner.find_invoice(key)
    }

    fn jobs(&self) -> Result<Vec<ExtractionJob>, StoreError> {
        self.inner.jobs()
    }

    fn invoices(&self) -> Result<Vec<InvoiceRecord>, StoreError> {
        self.inner.invoices()
    }
}

/// Snapshots the persisted job each time a run starts.
struct SnapshotOnStart {
    store: Arc<MemoryMetadataStore>,
    seen: Mutex<Vec<ExtractionJob>>,
}

impl EventSink for SnapshotOnStart {
    fn publish(&self, event: &ExtractionEvent) {
        if let ExtractionEvent::Started { job_key, .. } = event {
            if let Ok(Some(job)) = self.store.find_job(job_key) {
                self.seen.lock().unwrap().push(job);
            }
        }
    }
}

struct Harness {
    pipeline: ExtractionPipeline,
    store: Arc<MemoryMetadataStore>,
    metrics: Arc<PipelineMetrics>,
}

fn harness(ocr: Arc<dyn OcrEngineAdapter>, llm: Option<StubLlmBehavior>) -> Harness {
    harness_with_config(ocr, llm, PipelineConfig::default())
}

fn harness_with_config(
    ocr: Arc<dyn OcrEngineAdapter>,
    llm: Option<StubLlmBehavior>,
    config: PipelineConfig,
) -> Harness {
    let store = Arc::new(MemoryMetadataStore::new());
    let metrics = Arc::new(PipelineMetrics::new());
    let llm_adapter: Option<Arc<dyn LlmExtractionAdapter>> =
        llm.map(|behavior| Arc::new(StubLlm { behavior }) as Arc<dyn LlmExtractionAdapter>);

    let pipeline = ExtractionPipeline::new(
        ocr,
        llm_adapter,
        Arc::clone(&store) as Arc<dyn MetadataStore>,
        Arc::clone(&metrics) as Arc<dyn EventSink>,
        config,
    );

    Harness {
        pipeline,
        store,
        metrics,
    }
}

fn sample_ocr() -> Arc<dyn OcrEngineAdapter> {
    Arc::new(FixedTextOcr {
        text: SAMPLE_TEXT,
        confidence: 0.75,
    })
}

#[tokio::test]
async fn fallback_path_produces_invoice_with_ocr_confidence() {
    let h = harness(sample_ocr(), None);
    let job = h
        .pipeline
        .extract_and_save(vec![1], "invoice.pdf", "application/pdf")
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.confidence_score, Some(0.75));
    assert_eq!(
        job.engine_used.as_ref().unwrap().field_source,
        FieldSource::Fallback
    );

    let invoice = h
        .store
        .find_invoice(job.invoice_key.as_ref().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(invoice.invoice_number, "INV-2024-001");
    assert_eq!(invoice.amount, Decimal::from_str("1250.00").unwrap());
    assert_eq!(invoice.client_name, "ACME Corporation");
    assert_eq!(invoice.client_address, None);
    assert_eq!(invoice.status, InvoiceStatus::Extracted);
}

#[tokio::test]
async fn llm_path_wins_when_available_and_valid() {
    let h = harness(sample_ocr(), Some(StubLlmBehavior::Valid));
    let job = h
        .pipeline
        .extract_and_save(vec![1], "invoice.pdf", "application/pdf")
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.confidence_score, Some(0.93));
    assert_eq!(
        job.engine_used.as_ref().unwrap().field_source,
        FieldSource::Llm
    );

    let invoice = h
        .store
        .find_invoice(job.invoice_key.as_ref().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(invoice.invoice_number, "LLM-42");
    assert_eq!(invoice.client_address.as_deref(), Some("1 Model Way"));

    assert_eq!(h.metrics.llm_extractions(), 1);
    assert_eq!(h.metrics.fallback_extractions(), 0);
}

#[tokio::test]
async fn all_absent_llm_result_triggers_fallback() {
    let h = harness(sample_ocr(), Some(StubLlmBehavior::AllAbsent));
    let job = h
        .pipeline
        .extract_and_save(vec![1], "invoice.pdf", "application/pdf")
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(
        job.engine_used.as_ref().unwrap().field_source,
        FieldSource::Fallback
    );
    assert_eq!(h.metrics.fallback_extractions(), 1);
    assert_eq!(h.metrics.llm_extractions(), 0);
}

#[tokio::test]
async fn unavailable_llm_triggers_fallback() {
    let h = harness(sample_ocr(), Some(StubLlmBehavior::Unavailable));
    let job = h
        .pipeline
        .extract_and_save(vec![1], "invoice.pdf", "application/pdf")
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(
        job.engine_used.as_ref().unwrap().field_source,
        FieldSource::Fallback
    );
}

#[tokio::test]
async fn slow_llm_times_out_into_fallback() {
    let config = PipelineConfig {
        llm_timeout_secs: 1,
        ..Default::default()
    };
    let h = harness_with_config(
        sample_ocr(),
        Some(StubLlmBehavior::Slow(Duration::from_secs(5))),
        config,
    );
    let job = h
        .pipeline
        .extract_and_save(vec![1], "invoice.pdf", "application/pdf")
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(
        job.engine_used.as_ref().unwrap().field_source,
        FieldSource::Fallback
    );
}

#[tokio::test]
async fn slow_ocr_times_out_into_failure() {
    let config = PipelineConfig {
        ocr_timeout_secs: 1,
        ..Default::default()
    };
    let ocr = Arc::new(SlowOcr {
        delay: Duration::from_secs(5),
    });
    let h = harness_with_config(ocr, None, config);
    let job = h
        .pipeline
        .extract_and_save(vec![1], "slow.pdf", "application/pdf")
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.invoice_key.is_none());
    assert!(job.error_message.as_ref().unwrap().contains("timed out"));
    assert!(h.store.invoices().unwrap().is_empty());
    assert_eq!(h.metrics.jobs_failed(), 1);
}

#[tokio::test]
async fn blank_ocr_text_fails_without_invoice() {
    let ocr = Arc::new(FixedTextOcr {
        text: "   \n\t  ",
        confidence: 0.9,
    });
    let h = harness(ocr, None);
    let job = h
        .pipeline
        .extract_and_save(vec![1], "blank.pdf", "application/pdf")
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.invoice_key.is_none());
    assert!(
        job.error_message
            .as_ref()
            .unwrap()
            .contains("no text could be extracted")
    );
    assert!(h.store.invoices().unwrap().is_empty());
    assert_eq!(h.metrics.jobs_failed(), 1);
}

#[tokio::test]
async fn unreadable_bytes_fail_without_invoice() {
    let ocr = Arc::new(FailingOcr {
        error: || OcrError::FileUnreadable("PDF parse failed".to_string()),
    });
    let h = harness(ocr, None);
    let job = h
        .pipeline
        .extract_and_save(vec![0xde, 0xad], "junk.pdf", "application/pdf")
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.invoice_key.is_none());
    assert!(job.error_message.as_ref().unwrap().contains("file unreadable"));

    // The failure is observable through the store as well.
    let stored = h.store.find_job(&job.key).unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
}

#[tokio::test]
async fn engine_unavailable_is_terminal() {
    let ocr = Arc::new(FailingOcr {
        error: || OcrError::EngineUnavailable("no OCR models loaded".to_string()),
    });
    let h = harness(ocr, None);
    let job = h
        .pipeline
        .extract_and_save(vec![1], "scan.png", "image/png")
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert!(h.store.invoices().unwrap().is_empty());
}

#[tokio::test]
async fn invoice_persistence_failure_fails_job_without_reference() {
    let store = Arc::new(BrokenInvoiceStore {
        inner: MemoryMetadataStore::new(),
    });
    let pipeline = ExtractionPipeline::new(
        sample_ocr(),
        None,
        Arc::clone(&store) as Arc<dyn MetadataStore>,
        Arc::new(invox_core::NoopSink),
        PipelineConfig::default(),
    );

    let job = pipeline
        .extract_and_save(vec![1], "invoice.pdf", "application/pdf")
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.invoice_key.is_none());
    assert!(
        job.error_message
            .as_ref()
            .unwrap()
            .contains("failed to persist invoice")
    );
}

#[tokio::test]
async fn retry_reuses_job_and_invoice_identity() {
    let h = harness(sample_ocr(), None);
    let job = h
        .pipeline
        .extract_and_save(vec![1], "invoice.pdf", "application/pdf")
        .await
        .unwrap();
    let first_invoice_key = job.invoice_key.clone().unwrap();

    let retried = h.pipeline.retry(&job.key).await.unwrap();

    assert_eq!(retried.key, job.key);
    assert_eq!(retried.status, JobStatus::Completed);
    assert_eq!(retried.invoice_key.as_deref(), Some(first_invoice_key.as_str()));

    // Idempotent terminal write: still exactly one invoice and one job.
    assert_eq!(h.store.invoices().unwrap().len(), 1);
    assert_eq!(h.store.jobs().unwrap().len(), 1);
}

#[tokio::test]
async fn retry_in_flight_state_holds_no_invoice_reference() {
    let store = Arc::new(MemoryMetadataStore::new());
    let sink = Arc::new(SnapshotOnStart {
        store: Arc::clone(&store),
        seen: Mutex::new(Vec::new()),
    });
    let pipeline = ExtractionPipeline::new(
        sample_ocr(),
        None,
        Arc::clone(&store) as Arc<dyn MetadataStore>,
        Arc::clone(&sink) as Arc<dyn EventSink>,
        PipelineConfig::default(),
    );

    let job = pipeline
        .extract_and_save(vec![1], "invoice.pdf", "application/pdf")
        .await
        .unwrap();
    let first_invoice_key = job.invoice_key.clone().unwrap();

    let retried = pipeline.retry(&job.key).await.unwrap();

    // While the retry was PROCESSING, the persisted job must not point
    // at an invoice; the reference reappears only at the terminal write.
    let seen = sink.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].status, JobStatus::Processing);
    assert!(seen[1].invoice_key.is_none());
    assert_eq!(retried.invoice_key.as_deref(), Some(first_invoice_key.as_str()));
}

#[tokio::test]
async fn retry_of_unknown_job_is_an_error() {
    let h = harness(sample_ocr(), None);
    let err = h.pipeline.retry("missing-key").await.unwrap_err();
    assert!(matches!(err, invox_core::InvoxError::JobNotFound(_)));
}

#[tokio::test]
async fn retry_without_stored_text_is_an_error() {
    let ocr = Arc::new(FailingOcr {
        error: || OcrError::FileUnreadable("corrupt".to_string()),
    });
    let h = harness(ocr, None);
    let job = h
        .pipeline
        .extract_and_save(vec![1], "junk.pdf", "application/pdf")
        .await
        .unwrap();

    let err = h.pipeline.retry(&job.key).await.unwrap_err();
    assert!(matches!(err, invox_core::InvoxError::RetryUnavailable(_)));
}

#[tokio::test]
async fn metadata_returns_persisted_job() {
    let h = harness(sample_ocr(), None);
    let job = h
        .pipeline
        .extract_and_save(vec![1], "invoice.pdf", "application/pdf")
        .await
        .unwrap();

    let fetched = h.pipeline.metadata(&job.key).unwrap();
    assert_eq!(fetched.key, job.key);
    assert_eq!(fetched.status, JobStatus::Completed);
    assert!(fetched.payload.is_some());
}

#[tokio::test]
async fn completed_confidence_is_in_unit_interval() {
    let h = harness(sample_ocr(), Some(StubLlmBehavior::Valid));
    let job = h
        .pipeline
        .extract_and_save(vec![1], "invoice.pdf", "application/pdf")
        .await
        .unwrap();

    let confidence = job.confidence_score.unwrap();
    assert!((0.0..=1.0).contains(&confidence));
}

#[tokio::test]
async fn unmatched_text_completes_with_sentinels() {
    let ocr = Arc::new(FixedTextOcr {
        text: "completely unrelated text about gardening",
        confidence: 0.6,
    });
    let h = harness(ocr, None);
    let job = h
        .pipeline
        .extract_and_save(vec![1], "notes.pdf", "application/pdf")
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    let invoice = h
        .store
        .find_invoice(job.invoice_key.as_ref().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(invoice.invoice_number, UNKNOWN_SENTINEL);
    assert_eq!(invoice.amount, Decimal::ZERO);
    assert_eq!(invoice.client_name, UNKNOWN_SENTINEL);
    assert_eq!(invoice.status, InvoiceStatus::ExtractionFailed);
}
