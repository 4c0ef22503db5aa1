//! Core library for invoice extraction.
//!
//! This crate provides:
//! - OCR over PDF and image documents (embedded text layer or raster recognition)
//! - LLM-backed structured field extraction with a deterministic fallback parser
//! - A per-job extraction state machine (PROCESSING -> COMPLETED | FAILED)
//! - Pluggable metadata persistence and lifecycle event sinks

pub mod error;
pub mod fallback;
pub mod llm;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod store;

pub use error::{InvoxError, LlmError, OcrError, Result, StoreError};
pub use fallback::FallbackFieldParser;
pub use llm::{LivenessTracker, LlmExtractionAdapter};
pub use models::{
    EngineUsed, ExtractedFields, ExtractionJob, ExtractionPayload, FieldSource, InvoiceRecord,
    InvoiceStatus, JobStatus, PipelineConfig, UNKNOWN_SENTINEL,
};
pub use ocr::{DocumentOcrEngine, OcrEngineAdapter, OcrOutcome, PdfPreflight, PdfType};
pub use pipeline::{EventSink, ExtractionEvent, ExtractionPipeline, NoopSink, PipelineMetrics};
pub use store::{MemoryMetadataStore, MetadataStore};
