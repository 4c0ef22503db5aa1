//! Extraction pipeline: orchestrator, lifecycle events, and metrics.

mod events;
mod orchestrator;

pub use events::{EventSink, ExtractionEvent, NoopSink, PipelineMetrics};
pub use orchestrator::ExtractionPipeline;
