//! CLI command implementations.

pub mod batch;
pub mod config;
pub mod process;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::debug;

use invox_core::{
    DocumentOcrEngine, EventSink, ExtractionPipeline, LlmExtractionAdapter, MemoryMetadataStore,
    MetadataStore, PipelineConfig,
};

use crate::llm::OllamaLlmAdapter;

/// Shared flags for commands that run the extraction pipeline.
#[derive(clap::Args)]
pub struct PipelineArgs {
    /// OCR model directory (omit to process text PDFs only)
    #[arg(short, long)]
    pub model_dir: Option<std::path::PathBuf>,

    /// Ollama base URL for LLM extraction
    #[arg(long, default_value = "http://localhost:11434")]
    pub llm_url: String,

    /// Ollama model name for LLM extraction
    #[arg(long)]
    pub llm_model: Option<String>,

    /// Skip the LLM and always use the pattern fallback
    #[arg(long)]
    pub no_llm: bool,
}

/// Load pipeline configuration, falling back to defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<PipelineConfig> {
    match config_path {
        Some(path) => PipelineConfig::from_file(Path::new(path))
            .with_context(|| format!("failed to load config from {path}")),
        None => Ok(PipelineConfig::default()),
    }
}

/// Assemble the pipeline from CLI flags.
pub fn build_pipeline(
    args: &PipelineArgs,
    config: PipelineConfig,
    store: Arc<dyn MetadataStore>,
    events: Arc<dyn EventSink>,
) -> anyhow::Result<ExtractionPipeline> {
    let ocr = match &args.model_dir {
        Some(dir) => Arc::new(
            DocumentOcrEngine::with_models(config.clone(), dir)
                .with_context(|| format!("failed to load OCR models from {}", dir.display()))?,
        ),
        None => {
            debug!("No model directory given, text-layer extraction only");
            Arc::new(DocumentOcrEngine::text_only(config.clone()))
        }
    };

    let llm: Option<Arc<dyn LlmExtractionAdapter>> = match (&args.llm_model, args.no_llm) {
        (Some(model), false) => {
            let adapter =
                OllamaLlmAdapter::new(&args.llm_url, model, config.llm_timeout_secs)?;
            Some(Arc::new(adapter))
        }
        _ => None,
    };

    Ok(ExtractionPipeline::new(ocr, llm, store, events, config))
}

/// Fresh in-memory store for one CLI invocation.
pub fn memory_store() -> Arc<MemoryMetadataStore> {
    Arc::new(MemoryMetadataStore::new())
}

/// MIME type from a file extension, matching the upload-boundary set.
pub fn mime_for(path: &Path) -> anyhow::Result<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "pdf" => Ok("application/pdf"),
        "png" => Ok("image/png"),
        "jpg" | "jpeg" => Ok("image/jpeg"),
        _ => anyhow::bail!("unsupported file format: {ext}"),
    }
}
