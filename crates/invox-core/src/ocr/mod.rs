//! OCR engine adapter contract and confidence heuristics.

mod engine;
mod pdf;

pub use engine::DocumentOcrEngine;
pub use pdf::{PdfPreflight, PdfType};

use serde::{Deserialize, Serialize};

use crate::error::OcrError;

/// Result of running OCR over one document.
///
/// Transient: the orchestrator folds this into the job's audit payload
/// rather than persisting it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrOutcome {
    /// Recognized text, in reading order.
    pub text: String,

    /// Engine-reported or heuristic confidence (0.0 - 1.0).
    pub confidence: f32,

    /// Number of pages processed.
    pub page_count: u32,

    /// Version string of the engine that produced this outcome.
    pub engine_version: String,
}

impl OcrOutcome {
    /// True if the text is empty or whitespace-only.
    ///
    /// An empty outcome is a terminal failure condition for the job.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Adapter contract around an OCR engine.
///
/// Implementations must complete or fail within a bounded time; the
/// orchestrator additionally enforces its own timeout around the call.
pub trait OcrEngineAdapter: Send + Sync {
    /// Short name of the underlying engine, recorded on the job.
    fn engine_name(&self) -> &str;

    /// Convert raw document bytes into text plus a confidence estimate.
    fn extract_text(
        &self,
        bytes: &[u8],
        file_name: &str,
        mime_type: &str,
    ) -> Result<OcrOutcome, OcrError>;
}

/// Derive a confidence estimate from text quality when the engine reports
/// none.
///
/// Uses the ratio of alphanumeric characters to total non-whitespace
/// characters, normalized into a conservative band (default 0.5 - 0.95)
/// rather than the full [0,1] range, to avoid over-claiming certainty.
pub fn heuristic_confidence(text: &str, floor: f32, ceiling: f32) -> f32 {
    let total = text.chars().filter(|c| !c.is_whitespace()).count();
    if total == 0 {
        return floor;
    }
    let alnum = text.chars().filter(|c| c.is_alphanumeric()).count();
    let ratio = alnum as f32 / total as f32;
    (floor + ratio * (ceiling - floor)).clamp(floor, ceiling)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heuristic_stays_in_band() {
        let clean = heuristic_confidence("Invoice 12345 Total 99", 0.5, 0.95);
        let noisy = heuristic_confidence("@#$% ^&*! ~~ |||", 0.5, 0.95);

        assert!(clean > noisy);
        assert!((0.5..=0.95).contains(&clean));
        assert!((0.5..=0.95).contains(&noisy));
    }

    #[test]
    fn test_heuristic_empty_text_is_floor() {
        assert_eq!(heuristic_confidence("", 0.5, 0.95), 0.5);
        assert_eq!(heuristic_confidence("   \n\t", 0.5, 0.95), 0.5);
    }

    #[test]
    fn test_heuristic_all_alnum_is_ceiling() {
        let conf = heuristic_confidence("ABC123", 0.5, 0.95);
        assert!((conf - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_blank_outcome() {
        let outcome = OcrOutcome {
            text: "  \n ".to_string(),
            confidence: 0.9,
            page_count: 1,
            engine_version: "test".to_string(),
        };
        assert!(outcome.is_blank());
    }
}
