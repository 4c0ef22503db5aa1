//! Deterministic fallback field parser.
//!
//! A pure, total function over OCR text: it never fails and needs no
//! network. Fields it cannot match are reported as absent; the final merge
//! applies sentinel defaults. This path guarantees the pipeline can always
//! terminate with a usable, if low-confidence, result.

mod patterns;

use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::debug;

use crate::models::ExtractedFields;

use patterns::{
    AMOUNT_BALANCE_DUE, AMOUNT_BARE_TOTAL, AMOUNT_DUE, AMOUNT_GRAND_TOTAL, AMOUNT_INVOICE_TOTAL,
    AMOUNT_TOTAL_AMOUNT, CLIENT_LABEL, INVOICE_NUMBER,
};

/// Pattern-based field parser used when the LLM path is unavailable.
pub struct FallbackFieldParser;

impl FallbackFieldParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse invoice fields from OCR text.
    ///
    /// The aggregate confidence is left at zero; the caller assigns the
    /// OCR-derived confidence when this path produced the final fields.
    pub fn parse(&self, text: &str) -> ExtractedFields {
        let fields = ExtractedFields {
            invoice_number: extract_invoice_number(text),
            amount: extract_amount(text),
            client_name: extract_client_name(text),
            // Address derivation is out of scope for the pattern path;
            // absence is the documented behavior.
            client_address: None,
            confidence: 0.0,
        };

        debug!("Fallback parser matched {} field(s)", fields.matched_count());
        fields
    }
}

impl Default for FallbackFieldParser {
    fn default() -> Self {
        Self::new()
    }
}

/// First match of a document label followed by an alphanumeric token.
fn extract_invoice_number(text: &str) -> Option<String> {
    INVOICE_NUMBER
        .captures(text)
        .map(|caps| caps[1].to_string())
}

/// Labeled amount, searched in label priority order.
///
/// The first label found in priority order wins, even if a lower-priority
/// label occurs earlier in the document.
fn extract_amount(text: &str) -> Option<Decimal> {
    let by_priority = [
        &*AMOUNT_INVOICE_TOTAL,
        &*AMOUNT_GRAND_TOTAL,
        &*AMOUNT_TOTAL_AMOUNT,
        &*AMOUNT_DUE,
        &*AMOUNT_BALANCE_DUE,
        &*AMOUNT_BARE_TOTAL,
    ];

    for pattern in by_priority {
        if let Some(caps) = pattern.captures(text) {
            let normalized = caps[1].replace(',', "");
            if let Ok(amount) = Decimal::from_str(&normalized) {
                return Some(amount);
            }
        }
    }
    None
}

/// Text following a "Bill To / Sold To / Customer" label, bounded by the
/// first address-like (digit-leading) line or all-caps header. Lines
/// between the label and the bound are joined with a space.
fn extract_client_name(text: &str) -> Option<String> {
    let label = CLIENT_LABEL.find(text)?;
    let rest = &text[label.end()..];

    let mut parts = Vec::new();
    for (i, line) in rest.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            if parts.is_empty() {
                continue;
            }
            break;
        }
        if line.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            break;
        }
        // The label line itself may be all caps; later lines that are
        // shout-case are section headers, not name continuations.
        if i > 0 && is_caps_header(line) {
            break;
        }
        parts.push(line);
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn is_caps_header(line: &str) -> bool {
    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 3 && letters.iter().all(|c| c.is_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str =
        "INVOICE #INV-2024-001\nBill To: ACME Corporation\n123 Main Street\nTotal Amount: $1,250.00";

    #[test]
    fn test_sample_invoice() {
        let fields = FallbackFieldParser::new().parse(SAMPLE);

        assert_eq!(fields.invoice_number.as_deref(), Some("INV-2024-001"));
        assert_eq!(fields.amount, Some(Decimal::from_str("1250.00").unwrap()));
        assert_eq!(fields.client_name.as_deref(), Some("ACME Corporation"));
        assert_eq!(fields.client_address, None);
    }

    #[test]
    fn test_amount_label_priority_beats_document_order() {
        let text = "Total: $10.00\nShipping: $2.50\nInvoice Total: $500.00";
        let fields = FallbackFieldParser::new().parse(text);
        assert_eq!(fields.amount, Some(Decimal::from_str("500.00").unwrap()));
    }

    #[test]
    fn test_bare_total_is_last_resort() {
        let text = "Subtotal stuff\nTotal: $42.00";
        let fields = FallbackFieldParser::new().parse(text);
        assert_eq!(fields.amount, Some(Decimal::from_str("42.00").unwrap()));
    }

    #[test]
    fn test_first_invoice_number_wins() {
        let text = "Invoice No: A-100\nRelated invoice: B-200";
        let fields = FallbackFieldParser::new().parse(text);
        assert_eq!(fields.invoice_number.as_deref(), Some("A-100"));
    }

    #[test]
    fn test_multi_line_client_name_is_joined() {
        let text = "Bill To:\nNorthwind\nTraders Ltd\n456 Harbor Blvd";
        let fields = FallbackFieldParser::new().parse(text);
        assert_eq!(fields.client_name.as_deref(), Some("Northwind Traders Ltd"));
    }

    #[test]
    fn test_client_name_stops_at_caps_header() {
        let text = "Sold To: Initech Inc\nPAYMENT TERMS\nNet 30";
        let fields = FallbackFieldParser::new().parse(text);
        assert_eq!(fields.client_name.as_deref(), Some("Initech Inc"));
    }

    #[test]
    fn test_empty_text_is_total() {
        let fields = FallbackFieldParser::new().parse("");
        assert!(fields.is_empty());
        assert_eq!(fields.confidence, 0.0);
    }

    #[test]
    fn test_unlabeled_text_yields_absent_fields() {
        let fields = FallbackFieldParser::new().parse("lorem ipsum dolor sit amet");
        assert_eq!(fields.invoice_number, None);
        assert_eq!(fields.amount, None);
        assert_eq!(fields.client_name, None);
    }
}
