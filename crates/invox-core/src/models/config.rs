//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};

/// Main configuration for the invox pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Time budget for the OCR call, in seconds. A timeout here is terminal.
    pub ocr_timeout_secs: u64,

    /// Time budget for the LLM call, in seconds. A timeout here triggers
    /// the fallback parser.
    pub llm_timeout_secs: u64,

    /// DPI for rendering PDF pages before recognition. Values below 200 are
    /// raised to 200.
    pub render_dpi: u32,

    /// Currency assigned when the document does not state one.
    pub default_currency: String,

    /// Lower bound of the heuristic OCR confidence band.
    pub heuristic_confidence_floor: f32,

    /// Upper bound of the heuristic OCR confidence band.
    pub heuristic_confidence_ceiling: f32,

    /// Maximum PDF pages to process (0 = unlimited).
    pub max_pages: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ocr_timeout_secs: 60,
            llm_timeout_secs: 30,
            render_dpi: 300,
            default_currency: "USD".to_string(),
            heuristic_confidence_floor: 0.5,
            heuristic_confidence_ceiling: 0.95,
            max_pages: 10,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }

    /// Effective render DPI, with the 200 DPI floor applied.
    pub fn effective_dpi(&self) -> u32 {
        self.render_dpi.max(200)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.ocr_timeout_secs, 60);
        assert_eq!(config.llm_timeout_secs, 30);
        assert_eq!(config.render_dpi, 300);
        assert_eq!(config.default_currency, "USD");
    }

    #[test]
    fn test_dpi_floor() {
        let config = PipelineConfig {
            render_dpi: 72,
            ..Default::default()
        };
        assert_eq!(config.effective_dpi(), 200);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"ocr_timeout_secs": 5}"#).unwrap();
        assert_eq!(config.ocr_timeout_secs, 5);
        assert_eq!(config.llm_timeout_secs, 30);
    }
}
