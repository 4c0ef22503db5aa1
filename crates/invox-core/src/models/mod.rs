//! Data models for extraction jobs, invoices, and pipeline configuration.

pub mod config;
pub mod fields;
pub mod invoice;
pub mod job;

pub use config::PipelineConfig;
pub use fields::{ExtractedFields, UNKNOWN_SENTINEL};
pub use invoice::{InvoiceRecord, InvoiceStatus};
pub use job::{EngineUsed, ExtractionJob, ExtractionPayload, FieldSource, JobStatus};
