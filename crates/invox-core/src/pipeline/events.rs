//! Lifecycle events and the metrics listener.
//!
//! The event set is closed: every phase of the pipeline maps to exactly
//! one variant, and subscribers match exhaustively so a new phase cannot
//! be added without every listener handling it.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::debug;

/// One lifecycle event emitted by the extraction pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExtractionEvent {
    Started {
        job_key: String,
        file_name: String,
    },
    OcrCompleted {
        job_key: String,
        confidence: f32,
        page_count: u32,
        text_len: usize,
    },
    LlmCompleted {
        job_key: String,
        confidence: f32,
    },
    /// The LLM path was not used; the fallback parser supplied the fields.
    LlmSkipped {
        job_key: String,
        reason: String,
    },
    InvoiceSaved {
        job_key: String,
        invoice_key: String,
    },
    Completed {
        job_key: String,
        confidence: f32,
    },
    Failed {
        job_key: String,
        error: String,
    },
}

impl ExtractionEvent {
    /// Key of the job this event belongs to.
    pub fn job_key(&self) -> &str {
        match self {
            ExtractionEvent::Started { job_key, .. }
            | ExtractionEvent::OcrCompleted { job_key, .. }
            | ExtractionEvent::LlmCompleted { job_key, .. }
            | ExtractionEvent::LlmSkipped { job_key, .. }
            | ExtractionEvent::InvoiceSaved { job_key, .. }
            | ExtractionEvent::Completed { job_key, .. }
            | ExtractionEvent::Failed { job_key, .. } => job_key,
        }
    }
}

/// Best-effort event subscriber.
///
/// Publication is fire-and-forget: the signature is infallible so a
/// misbehaving sink can never abort the pipeline. Implementations that
/// can fail internally must swallow and log.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &ExtractionEvent);
}

/// Sink that discards every event.
#[derive(Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn publish(&self, _event: &ExtractionEvent) {}
}

/// Aggregate pipeline counters, fed only through the event stream.
#[derive(Default)]
pub struct PipelineMetrics {
    jobs_started: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    llm_extractions: AtomicU64,
    fallback_extractions: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs_started(&self) -> u64 {
        self.jobs_started.load(Ordering::Relaxed)
    }

    pub fn jobs_completed(&self) -> u64 {
        self.jobs_completed.load(Ordering::Relaxed)
    }

    pub fn jobs_failed(&self) -> u64 {
        self.jobs_failed.load(Ordering::Relaxed)
    }

    pub fn llm_extractions(&self) -> u64 {
        self.llm_extractions.load(Ordering::Relaxed)
    }

    pub fn fallback_extractions(&self) -> u64 {
        self.fallback_extractions.load(Ordering::Relaxed)
    }
}

impl EventSink for PipelineMetrics {
    fn publish(&self, event: &ExtractionEvent) {
        debug!("event: {:?}", event);
        match event {
            ExtractionEvent::Started { .. } => {
                self.jobs_started.fetch_add(1, Ordering::Relaxed);
            }
            ExtractionEvent::Completed { .. } => {
                self.jobs_completed.fetch_add(1, Ordering::Relaxed);
            }
            ExtractionEvent::Failed { .. } => {
                self.jobs_failed.fetch_add(1, Ordering::Relaxed);
            }
            ExtractionEvent::LlmCompleted { .. } => {
                self.llm_extractions.fetch_add(1, Ordering::Relaxed);
            }
            ExtractionEvent::LlmSkipped { .. } => {
                self.fallback_extractions.fetch_add(1, Ordering::Relaxed);
            }
            ExtractionEvent::OcrCompleted { .. } | ExtractionEvent::InvoiceSaved { .. } => {}
        }
    }
}
