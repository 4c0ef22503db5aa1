//! Batch command - extract data from multiple invoice files.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, warn};

use invox_core::{InvoiceRecord, JobStatus, MetadataStore, PipelineMetrics};

use super::{PipelineArgs, build_pipeline, load_config, memory_store, mime_for};
use super::process::{OutputFormat, format_csv, format_invoice};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory for per-file results
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Stop at the first failed file
    #[arg(long)]
    fail_fast: bool,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| mime_for(p).is_ok())
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }
    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let store = memory_store();
    let metrics = Arc::new(PipelineMetrics::new());
    let pipeline = build_pipeline(
        &args.pipeline,
        config,
        Arc::clone(&store) as Arc<dyn MetadataStore>,
        Arc::clone(&metrics) as _,
    )?;

    let bar = ProgressBar::new(files.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
            .unwrap()
            .progress_chars("=>-"),
    );

    let mut invoices: Vec<InvoiceRecord> = Vec::new();
    let mut failures: Vec<(PathBuf, String)> = Vec::new();

    for path in &files {
        let result = process_one(&pipeline, store.as_ref(), path).await;
        bar.inc(1);

        match result {
            Ok(invoice) => {
                if let Some(ref output_dir) = args.output_dir {
                    write_result(output_dir, path, &invoice, args.format)?;
                }
                invoices.push(invoice);
            }
            Err(e) => {
                error!("{}: {}", path.display(), e);
                failures.push((path.clone(), e.to_string()));
                if args.fail_fast {
                    bar.abandon();
                    anyhow::bail!("Stopping after failure on {}", path.display());
                }
            }
        }
    }
    bar.finish();

    if args.summary {
        let summary_path = args
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("summary.csv");
        fs::write(&summary_path, format_csv(&invoices)?)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    println!();
    println!(
        "{} {} completed ({} via LLM, {} via fallback), {} failed in {:.1}s",
        style("ℹ").blue(),
        metrics.jobs_completed(),
        metrics.llm_extractions(),
        metrics.fallback_extractions(),
        metrics.jobs_failed(),
        start.elapsed().as_secs_f64()
    );
    for (path, message) in &failures {
        println!("  {} {}: {}", style("✗").red(), path.display(), message);
    }

    if !failures.is_empty() && invoices.is_empty() {
        anyhow::bail!("All files failed");
    }
    Ok(())
}

async fn process_one(
    pipeline: &invox_core::ExtractionPipeline,
    store: &dyn MetadataStore,
    path: &PathBuf,
) -> anyhow::Result<InvoiceRecord> {
    let mime_type = mime_for(path)?;
    let bytes = fs::read(path)?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document")
        .to_string();

    let job = pipeline
        .extract_and_save(bytes, &file_name, mime_type)
        .await?;

    if job.status == JobStatus::Failed {
        anyhow::bail!(
            "{}",
            job.error_message.unwrap_or_else(|| "unknown error".to_string())
        );
    }

    store
        .find_invoice(job.invoice_key.as_deref().unwrap_or_default())?
        .ok_or_else(|| anyhow::anyhow!("completed job has no stored invoice"))
}

fn write_result(
    output_dir: &PathBuf,
    input: &PathBuf,
    invoice: &InvoiceRecord,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let extension = match format {
        OutputFormat::Json => "json",
        OutputFormat::Csv => "csv",
        OutputFormat::Text => "txt",
    };
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let out_path = output_dir.join(format!("{stem}.{extension}"));

    if out_path.exists() {
        warn!("Overwriting {}", out_path.display());
    }
    fs::write(out_path, format_invoice(invoice, format)?)?;
    Ok(())
}
