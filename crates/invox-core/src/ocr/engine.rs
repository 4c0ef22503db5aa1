//! Document OCR engine: text-layer extraction for native PDFs, raster
//! recognition for scans and images.

#[cfg(feature = "native")]
use std::time::Instant;

use image::DynamicImage;
#[cfg(feature = "native")]
use tracing::info;
use tracing::{debug, warn};

use crate::error::OcrError;
use crate::models::PipelineConfig;

use super::{OcrEngineAdapter, OcrOutcome, PdfPreflight, PdfType, heuristic_confidence};

/// OCR adapter covering PDF and common raster formats.
///
/// Text-based PDFs are served from their embedded text layer. Scanned PDFs
/// and standalone images go through the raster recognizer, which requires
/// the `native` feature and a loaded model set.
pub struct DocumentOcrEngine {
    config: PipelineConfig,
    #[cfg(feature = "native")]
    raster: Option<RasterRecognizer>,
}

impl DocumentOcrEngine {
    /// Create an engine without a raster recognizer.
    ///
    /// Only text-based PDFs can be processed; scans fail with
    /// `EngineUnavailable`.
    pub fn text_only(config: PipelineConfig) -> Self {
        Self {
            config,
            #[cfg(feature = "native")]
            raster: None,
        }
    }

    /// Create an engine with a raster recognizer loaded from a model
    /// directory.
    #[cfg(feature = "native")]
    pub fn with_models(
        config: PipelineConfig,
        model_dir: &std::path::Path,
    ) -> Result<Self, OcrError> {
        let raster = RasterRecognizer::from_dir(model_dir)?;
        Ok(Self {
            config,
            raster: Some(raster),
        })
    }

    fn process_pdf(&self, bytes: &[u8], file_name: &str) -> Result<OcrOutcome, OcrError> {
        let pdf = PdfPreflight::load(bytes)?;
        let page_count = pdf.page_count();

        if self.config.max_pages > 0 && page_count as usize > self.config.max_pages {
            warn!(
                "{}: {} pages exceeds limit of {}, processing first {}",
                file_name, page_count, self.config.max_pages, self.config.max_pages
            );
        }

        match pdf.classify() {
            PdfType::Text | PdfType::Hybrid => {
                let text = pdf.extract_text()?;
                if !text.trim().is_empty() {
                    debug!("{}: using embedded text layer", file_name);
                    let confidence = heuristic_confidence(
                        &text,
                        self.config.heuristic_confidence_floor,
                        self.config.heuristic_confidence_ceiling,
                    );
                    return Ok(OcrOutcome {
                        text,
                        confidence,
                        page_count,
                        engine_version: "pdf-text".to_string(),
                    });
                }
                self.recognize_pages(pdf.page_images(), page_count, file_name)
            }
            PdfType::Image => self.recognize_pages(pdf.page_images(), page_count, file_name),
            PdfType::Empty => Ok(OcrOutcome {
                text: String::new(),
                confidence: 0.0,
                page_count,
                engine_version: "pdf-text".to_string(),
            }),
        }
    }

    fn process_image(&self, bytes: &[u8], file_name: &str) -> Result<OcrOutcome, OcrError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| OcrError::FileUnreadable(format!("image decode failed: {e}")))?;
        self.recognize_pages(vec![img], 1, file_name)
    }

    #[cfg(feature = "native")]
    fn recognize_pages(
        &self,
        pages: Vec<DynamicImage>,
        page_count: u32,
        file_name: &str,
    ) -> Result<OcrOutcome, OcrError> {
        let Some(raster) = &self.raster else {
            return Err(OcrError::EngineUnavailable(
                "no OCR models loaded".to_string(),
            ));
        };

        let limit = if self.config.max_pages > 0 {
            self.config.max_pages
        } else {
            pages.len()
        };

        let start = Instant::now();
        let mut texts = Vec::new();
        let mut confidences = Vec::new();
        for page in pages.into_iter().take(limit) {
            let (text, confidence) = raster.recognize(&page)?;
            texts.push(text);
            confidences.push(confidence);
        }

        let text = texts.join("\n\n");
        let confidence = if confidences.is_empty() {
            0.0
        } else {
            confidences.iter().sum::<f32>() / confidences.len() as f32
        };

        info!(
            "{}: recognized {} page(s) in {}ms",
            file_name,
            confidences.len(),
            start.elapsed().as_millis()
        );

        Ok(OcrOutcome {
            text,
            confidence,
            page_count,
            engine_version: "pure-onnx-ocr".to_string(),
        })
    }

    #[cfg(not(feature = "native"))]
    fn recognize_pages(
        &self,
        _pages: Vec<DynamicImage>,
        _page_count: u32,
        _file_name: &str,
    ) -> Result<OcrOutcome, OcrError> {
        Err(OcrError::EngineUnavailable(
            "raster OCR requires the native feature".to_string(),
        ))
    }
}

impl OcrEngineAdapter for DocumentOcrEngine {
    fn engine_name(&self) -> &str {
        "invox-ocr"
    }

    fn extract_text(
        &self,
        bytes: &[u8],
        file_name: &str,
        mime_type: &str,
    ) -> Result<OcrOutcome, OcrError> {
        if bytes.is_empty() {
            return Err(OcrError::FileUnreadable("empty file".to_string()));
        }

        if is_pdf(bytes, mime_type, file_name) {
            self.process_pdf(bytes, file_name)
        } else {
            self.process_image(bytes, file_name)
        }
    }
}

fn is_pdf(bytes: &[u8], mime_type: &str, file_name: &str) -> bool {
    bytes.starts_with(b"%PDF")
        || mime_type == "application/pdf"
        || file_name.to_lowercase().ends_with(".pdf")
}

/// Raster recognizer backed by `pure-onnx-ocr` (pure Rust, no external
/// ONNX Runtime).
#[cfg(feature = "native")]
struct RasterRecognizer {
    engine: pure_onnx_ocr::engine::OcrEngine,
}

#[cfg(feature = "native")]
impl RasterRecognizer {
    fn from_dir(model_dir: &std::path::Path) -> Result<Self, OcrError> {
        let det_path = model_dir.join("det.onnx");
        let rec_path = model_dir.join("latin_rec.onnx");
        let dict_path = model_dir.join("latin_dict.txt");

        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&det_path)
            .rec_model_path(&rec_path)
            .dictionary_path(&dict_path)
            .build()
            .map_err(|e| OcrError::EngineUnavailable(format!("pure-onnx-ocr: {e}")))?;

        info!("Loaded pure-onnx-ocr models from {}", model_dir.display());
        Ok(Self { engine })
    }

    /// Recognize one page, returning text in reading order plus the mean
    /// region confidence.
    fn recognize(&self, image: &DynamicImage) -> Result<(String, f32), OcrError> {
        let mut regions = self
            .engine
            .run_from_image(image)
            .map_err(|e| OcrError::EngineUnavailable(format!("pure-onnx-ocr: {e}")))?;

        debug!("pure-onnx-ocr returned {} text regions", regions.len());

        let origin = |polygon: &pure_onnx_ocr::Polygon<f64>| {
            polygon
                .exterior()
                .coords()
                .next()
                .map(|c| (c.x, c.y))
                .unwrap_or((0.0, 0.0))
        };

        // Sort into reading order: 20px row bands, then left to right.
        regions.sort_by(|a, b| {
            let (ax, ay) = origin(&a.bounding_box);
            let (bx, by) = origin(&b.bounding_box);
            let row_a = (ay / 20.0) as i32;
            let row_b = (by / 20.0) as i32;
            if row_a != row_b {
                row_a.cmp(&row_b)
            } else {
                ax.partial_cmp(&bx).unwrap_or(std::cmp::Ordering::Equal)
            }
        });

        if regions.is_empty() {
            return Ok((String::new(), 0.0));
        }

        let confidence =
            regions.iter().map(|r| r.confidence).sum::<f32>() / regions.len() as f32;
        let text = regions
            .iter()
            .map(|r| r.text.replace("[UNK]", " "))
            .collect::<Vec<_>>()
            .join("\n");

        Ok((text, confidence))
    }
}
