//! Invoice record produced by a successful extraction.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Status of an extracted invoice record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Fields were successfully extracted.
    Extracted,
    /// Extraction ran but produced no usable fields.
    ExtractionFailed,
}

/// A persisted invoice produced by the extraction pipeline.
///
/// Owned by the orchestrator at creation time; after the save it belongs to
/// the persistence layer and is never mutated by the core again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// Unique identifier.
    pub key: String,

    /// Invoice number ("UNKNOWN" when no match was found).
    pub invoice_number: String,

    /// Total amount, non-negative (zero when no match was found).
    pub amount: Decimal,

    /// Client name ("UNKNOWN" when no match was found).
    pub client_name: String,

    /// Client address; null means "not found", distinct from "found empty".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_address: Option<String>,

    /// 3-letter currency code.
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Extraction outcome status.
    pub status: InvoiceStatus,

    /// Original file name of the source document.
    pub source_file_name: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl InvoiceRecord {
    /// Validate the record and return any issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.invoice_number.is_empty() {
            issues.push("Missing invoice number".to_string());
        }
        if self.amount.is_sign_negative() {
            issues.push(format!("Negative amount: {}", self.amount));
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            issues.push(format!("Invalid currency code: {}", self.currency));
        }
        if self.client_name.is_empty() {
            issues.push("Missing client name".to_string());
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn record() -> InvoiceRecord {
        InvoiceRecord {
            key: "inv-1".to_string(),
            invoice_number: "INV-2024-001".to_string(),
            amount: Decimal::from_str("1250.00").unwrap(),
            client_name: "ACME Corporation".to_string(),
            client_address: None,
            currency: "USD".to_string(),
            status: InvoiceStatus::Extracted,
            source_file_name: "invoice.pdf".to_string(),
        }
    }

    #[test]
    fn test_valid_record_has_no_issues() {
        assert!(record().validate().is_empty());
    }

    #[test]
    fn test_negative_amount_is_flagged() {
        let mut rec = record();
        rec.amount = Decimal::from_str("-1.00").unwrap();
        let issues = rec.validate();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("Negative"));
    }

    #[test]
    fn test_bad_currency_is_flagged() {
        let mut rec = record();
        rec.currency = "usd".to_string();
        assert!(!rec.validate().is_empty());

        rec.currency = "DOLLARS".to_string();
        assert!(!rec.validate().is_empty());
    }

    #[test]
    fn test_absent_address_serializes_as_missing() {
        let json = serde_json::to_string(&record()).unwrap();
        assert!(!json.contains("client_address"));
    }
}
