//! Progress reporting sink for terminal output.

use indicatif::{ProgressBar, ProgressStyle};

use invox_core::{EventSink, ExtractionEvent};

/// Drives an indicatif bar from pipeline lifecycle events.
pub struct ProgressSink {
    bar: ProgressBar,
}

impl ProgressSink {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {msg}")
                .unwrap()
                .progress_chars("##-"),
        );
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for ProgressSink {
    fn publish(&self, event: &ExtractionEvent) {
        match event {
            ExtractionEvent::Started { file_name, .. } => {
                self.bar.set_position(5);
                self.bar.set_message(format!("Processing {file_name}"));
            }
            ExtractionEvent::OcrCompleted { page_count, .. } => {
                self.bar.set_position(40);
                self.bar.set_message(format!("OCR complete ({page_count} page(s))"));
            }
            ExtractionEvent::LlmCompleted { .. } => {
                self.bar.set_position(70);
                self.bar.set_message("Fields extracted (LLM)");
            }
            ExtractionEvent::LlmSkipped { .. } => {
                self.bar.set_position(70);
                self.bar.set_message("Fields extracted (pattern fallback)");
            }
            ExtractionEvent::InvoiceSaved { .. } => {
                self.bar.set_position(90);
                self.bar.set_message("Invoice saved");
            }
            ExtractionEvent::Completed { .. } => {
                self.bar.set_position(100);
                self.bar.set_message("Done");
            }
            ExtractionEvent::Failed { error, .. } => {
                self.bar.set_position(100);
                self.bar.set_message(format!("Failed: {error}"));
            }
        }
    }
}
