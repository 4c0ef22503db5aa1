//! Process command - extract data from a single invoice file.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::debug;

use invox_core::{ExtractionJob, InvoiceRecord, JobStatus, MetadataStore};

use crate::progress::ProgressSink;

use super::{PipelineArgs, build_pipeline, load_config, memory_store, mime_for};

/// Maximum accepted file size, enforced at this boundary.
const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (PDF, PNG, or JPG)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Show extraction confidence and timing
    #[arg(long)]
    show_confidence: bool,

    /// Validate the extracted invoice and report issues
    #[arg(long)]
    validate: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    let size = fs::metadata(&args.input)?.len();
    if size > MAX_FILE_SIZE {
        anyhow::bail!(
            "File too large: {} bytes (maximum {} bytes)",
            size,
            MAX_FILE_SIZE
        );
    }

    let mime_type = mime_for(&args.input)?;
    let bytes = fs::read(&args.input)?;
    let file_name = args
        .input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document")
        .to_string();

    let store = memory_store();
    let progress = Arc::new(ProgressSink::new());
    let pipeline = build_pipeline(
        &args.pipeline,
        config,
        Arc::clone(&store) as Arc<dyn MetadataStore>,
        Arc::clone(&progress) as _,
    )?;

    let job = pipeline
        .extract_and_save(bytes, &file_name, mime_type)
        .await?;
    progress.finish();

    if job.status == JobStatus::Failed {
        anyhow::bail!(
            "Extraction failed: {}",
            job.error_message.as_deref().unwrap_or("unknown error")
        );
    }

    let invoice = store
        .find_invoice(job.invoice_key.as_deref().unwrap_or_default())?
        .ok_or_else(|| anyhow::anyhow!("completed job has no stored invoice"))?;

    if args.validate {
        let issues = invoice.validate();
        if !issues.is_empty() {
            eprintln!("{}", style("Validation issues:").yellow());
            for issue in &issues {
                eprintln!("  - {}", issue);
            }
        }
    }

    let output = format_invoice(&invoice, args.format)?;
    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.show_confidence {
        print_summary(&job);
    }

    debug!("Total processing time: {:?}", start.elapsed());
    Ok(())
}

fn print_summary(job: &ExtractionJob) {
    println!();
    if let Some(confidence) = job.confidence_score {
        println!(
            "{} Extraction confidence: {:.1}%",
            style("ℹ").blue(),
            confidence * 100.0
        );
    }
    if let Some(engine) = &job.engine_used {
        println!("{} Extraction path: {}", style("ℹ").blue(), engine);
    }
}

pub fn format_invoice(invoice: &InvoiceRecord, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(invoice)?),
        OutputFormat::Csv => format_csv(std::slice::from_ref(invoice)),
        OutputFormat::Text => format_text(invoice),
    }
}

pub fn format_csv(invoices: &[InvoiceRecord]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "invoice_number",
        "amount",
        "currency",
        "client_name",
        "client_address",
        "status",
        "source_file",
    ])?;

    for invoice in invoices {
        wtr.write_record([
            &invoice.invoice_number,
            &invoice.amount.to_string(),
            &invoice.currency,
            &invoice.client_name,
            &invoice.client_address.clone().unwrap_or_default(),
            &format!("{:?}", invoice.status),
            &invoice.source_file_name,
        ])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(invoice: &InvoiceRecord) -> anyhow::Result<String> {
    let mut output = String::new();

    output.push_str(&format!("Invoice: {}\n", invoice.invoice_number));
    output.push_str(&format!(
        "Amount:  {} {}\n",
        invoice.amount, invoice.currency
    ));
    output.push_str(&format!("Client:  {}\n", invoice.client_name));
    if let Some(address) = &invoice.client_address {
        output.push_str(&format!("Address: {}\n", address));
    }
    output.push_str(&format!("Source:  {}\n", invoice.source_file_name));

    Ok(output)
}
