//! Fixed response schema and prompt for LLM field extraction.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::error::LlmError;
use crate::models::ExtractedFields;

/// Sampling temperature for extraction calls. Low so repeated calls on
/// identical text are stable.
pub const TEMPERATURE: f32 = 0.1;

/// Confidence assigned when the model omits its own estimate.
const DEFAULT_CONFIDENCE: f32 = 0.8;

pub const SYSTEM_PROMPT: &str = "You are an invoice data extraction assistant. \
You respond with a single JSON object and nothing else.";

/// Build the extraction prompt for one document's OCR text.
///
/// The model is told to report absence (null) rather than guess; the
/// parser on the other side treats null and missing keys identically.
pub fn build_prompt(ocr_text: &str) -> String {
    format!(
        "Extract the following fields from this invoice text and return them \
as a JSON object with exactly these keys:\n\
- \"invoice_number\": the invoice or document number (string, or null if not present)\n\
- \"amount\": the total amount as a decimal number (or null if not present)\n\
- \"client_name\": the billed client's name (string, or null if not present)\n\
- \"client_address\": the billed client's address (string, or null if not present)\n\
- \"confidence\": your confidence in the extraction, from 0.0 to 1.0\n\
\n\
Use null for any field the text does not support. Do not guess or invent values.\n\
\n\
Invoice text:\n{ocr_text}"
    )
}

#[derive(Deserialize)]
struct RawResponse {
    #[serde(default)]
    invoice_number: Option<String>,
    #[serde(default)]
    amount: Option<Value>,
    #[serde(default)]
    client_name: Option<String>,
    #[serde(default)]
    client_address: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Parse a model response into extracted fields.
///
/// Tolerates markdown code fences and surrounding prose; the amount may
/// arrive as a JSON number or a string. An all-absent field set is
/// rejected as `NoMeaningfulFields` so the caller falls back.
pub fn parse_response(raw: &str) -> Result<ExtractedFields, LlmError> {
    let json = extract_json_object(raw)
        .ok_or_else(|| LlmError::Malformed("no JSON object in response".to_string()))?;

    let parsed: RawResponse =
        serde_json::from_str(json).map_err(|e| LlmError::Malformed(e.to_string()))?;

    let fields = ExtractedFields {
        invoice_number: non_empty(parsed.invoice_number),
        amount: parsed.amount.and_then(parse_amount),
        client_name: non_empty(parsed.client_name),
        client_address: non_empty(parsed.client_address),
        confidence: parsed
            .confidence
            .unwrap_or(DEFAULT_CONFIDENCE)
            .clamp(0.0, 1.0),
    };

    if !fields.has_meaningful_field() {
        return Err(LlmError::NoMeaningfulFields);
    }
    Ok(fields)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s != "null")
}

fn parse_amount(value: Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => {
            let cleaned = s.trim().trim_start_matches('$').replace(',', "");
            Decimal::from_str(&cleaned).ok()
        }
        _ => None,
    }
}

/// Locate the outermost JSON object, skipping code fences and prose.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end > start { Some(&raw[start..=end]) } else { None }
}
