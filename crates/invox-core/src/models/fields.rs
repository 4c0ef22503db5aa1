//! Transient field set produced by the LLM adapter or the fallback parser.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Sentinel value for string fields with no supporting text.
///
/// Applied only at the final merge into an [`super::invoice::InvoiceRecord`];
/// until then absence is represented as `None` so that "not found" stays
/// distinguishable from "found and defaulted".
pub const UNKNOWN_SENTINEL: &str = "UNKNOWN";

/// Structured invoice fields, each independently present or absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedFields {
    /// Invoice number, if one was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,

    /// Total amount, if one was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,

    /// Client name, if one was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,

    /// Client address, if one was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_address: Option<String>,

    /// Aggregate confidence for this field set (0.0 - 1.0).
    pub confidence: f32,
}

impl ExtractedFields {
    /// A field set is only considered valid if at least one economically
    /// meaningful field (invoice number or amount) is present. An all-absent
    /// result is equivalent to the extractor being unavailable.
    pub fn has_meaningful_field(&self) -> bool {
        self.invoice_number.is_some() || self.amount.is_some()
    }

    /// Number of fields that were actually found.
    pub fn matched_count(&self) -> usize {
        [
            self.invoice_number.is_some(),
            self.amount.is_some(),
            self.client_name.is_some(),
            self.client_address.is_some(),
        ]
        .iter()
        .filter(|p| **p)
        .count()
    }

    /// True if no field was found at all.
    pub fn is_empty(&self) -> bool {
        self.matched_count() == 0
    }
}
