//! PDF preflight: parsing, embedded-text extraction, and page-image
//! recovery using lopdf and pdf-extract.

use image::{DynamicImage, ImageBuffer, Rgba};
use lopdf::{Document, Object};
use tracing::{debug, trace};

use crate::error::OcrError;

/// Minimum embedded-text length for a PDF to count as text-based.
const MIN_TEXT_LEN: usize = 50;

/// How a PDF carries its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfType {
    /// Native text layer; no recognition needed.
    Text,
    /// Scanned pages; requires raster OCR.
    Image,
    /// Both a text layer and page images.
    Hybrid,
    /// Neither usable text nor images.
    Empty,
}

/// A parsed PDF ready for text extraction or page rasterization.
#[derive(Debug)]
pub struct PdfPreflight {
    document: Document,
    raw_data: Vec<u8>,
}

impl PdfPreflight {
    /// Parse PDF bytes.
    ///
    /// Corrupt bytes, encrypted documents (beyond the empty-password case),
    /// and zero-page documents are all reported as `FileUnreadable`.
    pub fn load(data: &[u8]) -> Result<Self, OcrError> {
        let mut doc = Document::load_mem(data)
            .map_err(|e| OcrError::FileUnreadable(format!("PDF parse failed: {e}")))?;

        let raw_data = if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(OcrError::FileUnreadable("PDF is encrypted".to_string()));
            }
            debug!("Decrypted PDF with empty password");
            let mut decrypted = Vec::new();
            doc.save_to(&mut decrypted)
                .map_err(|e| OcrError::FileUnreadable(format!("PDF re-save failed: {e}")))?;
            decrypted
        } else {
            data.to_vec()
        };

        if doc.get_pages().is_empty() {
            return Err(OcrError::FileUnreadable("PDF has no pages".to_string()));
        }

        Ok(Self {
            document: doc,
            raw_data,
        })
    }

    /// Number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.document.get_pages().len() as u32
    }

    /// Extract the embedded text layer, if any.
    pub fn extract_text(&self) -> Result<String, OcrError> {
        pdf_extract::extract_text_from_mem(&self.raw_data)
            .map_err(|e| OcrError::FileUnreadable(format!("text extraction failed: {e}")))
    }

    /// Classify the document by its content.
    pub fn classify(&self) -> PdfType {
        let text_len = self.extract_text().map(|t| t.trim().len()).unwrap_or(0);
        let has_text = text_len > MIN_TEXT_LEN;
        let has_images = !self.page_images().is_empty();

        let pdf_type = match (has_text, has_images) {
            (true, false) => PdfType::Text,
            (false, true) => PdfType::Image,
            (true, true) => PdfType::Hybrid,
            (false, false) => PdfType::Empty,
        };

        debug!(
            "PDF analysis: {} chars text, images={} -> {:?}",
            text_len, has_images, pdf_type
        );
        pdf_type
    }

    /// Recover page images embedded in the document, in object order.
    ///
    /// Scanned invoices store each page as a single full-page image XObject,
    /// which is what the raster OCR path consumes.
    pub fn page_images(&self) -> Vec<DynamicImage> {
        let mut images = Vec::new();
        for object in self.document.objects.values() {
            if let Some(img) = self.decode_image_object(object) {
                images.push(img);
            }
        }
        debug!("Recovered {} page images", images.len());
        images
    }

    fn decode_image_object(&self, obj: &Object) -> Option<DynamicImage> {
        let Object::Stream(stream) = obj else {
            return None;
        };
        let dict = &stream.dict;

        if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
            return None;
        }

        let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
        let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;
        trace!("Found image object: {}x{}", width, height);

        // JPEG streams can be decoded directly from the compressed content.
        if let Ok(filter) = dict.get(b"Filter") {
            let filter_name = match filter {
                Object::Name(name) => Some(name.as_slice()),
                Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
                _ => None,
            };
            match filter_name {
                Some(b"DCTDecode") => {
                    return image::load_from_memory_with_format(
                        &stream.content,
                        image::ImageFormat::Jpeg,
                    )
                    .ok();
                }
                Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                    trace!("Unsupported image filter, skipping");
                    return None;
                }
                _ => {}
            }
        }

        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());

        let color_space = dict
            .get(b"ColorSpace")
            .ok()
            .and_then(|o| match o {
                Object::Name(name) => Some(name.as_slice()),
                Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
                _ => None,
            })
            .unwrap_or(b"DeviceRGB");

        decode_raw_pixels(&data, width, height, color_space)
    }
}

/// Decode an uncompressed 8-bit RGB or grayscale pixel stream.
fn decode_raw_pixels(
    data: &[u8],
    width: u32,
    height: u32,
    color_space: &[u8],
) -> Option<DynamicImage> {
    // Dimensions come from the PDF dictionary; multiply checked so a
    // hostile file cannot overflow the length computation.
    let pixels = (width as usize).checked_mul(height as usize)?;
    let rgb_len = pixels.checked_mul(3)?;

    let rgba: Vec<u8> = if color_space == b"DeviceRGB" {
        if data.len() < rgb_len {
            return None;
        }
        data[..rgb_len]
            .chunks_exact(3)
            .flat_map(|c| [c[0], c[1], c[2], 255])
            .collect()
    } else if color_space == b"DeviceGray" {
        if data.len() < pixels {
            return None;
        }
        data[..pixels].iter().flat_map(|&g| [g, g, g, 255]).collect()
    } else {
        trace!(
            "Unsupported color space: {:?}",
            String::from_utf8_lossy(color_space)
        );
        return None;
    };

    ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba).map(DynamicImage::ImageRgba8)
}
