//! Regex patterns for deterministic invoice field matching.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Invoice number: a document label followed by an alphanumeric token
    // containing at least one digit.
    pub static ref INVOICE_NUMBER: Regex = Regex::new(
        r"(?i)\b(?:invoice|document|doc)\b\.?\s*(?:#|no\.?|num\.?|number)?[\s:#]*([A-Za-z0-9/_\-]*\d[A-Za-z0-9/_\-]*)"
    ).unwrap();

    // Amount labels, checked in priority order (not document order).
    pub static ref AMOUNT_INVOICE_TOTAL: Regex = Regex::new(
        r"(?i)invoice\s+total[\s:]*\$?\s*(\d{1,3}(?:,\d{3})*\.\d{2}|\d+\.\d{2})"
    ).unwrap();

    pub static ref AMOUNT_GRAND_TOTAL: Regex = Regex::new(
        r"(?i)grand\s+total[\s:]*\$?\s*(\d{1,3}(?:,\d{3})*\.\d{2}|\d+\.\d{2})"
    ).unwrap();

    pub static ref AMOUNT_TOTAL_AMOUNT: Regex = Regex::new(
        r"(?i)total\s+amount[\s:]*\$?\s*(\d{1,3}(?:,\d{3})*\.\d{2}|\d+\.\d{2})"
    ).unwrap();

    pub static ref AMOUNT_DUE: Regex = Regex::new(
        r"(?i)amount\s+due[\s:]*\$?\s*(\d{1,3}(?:,\d{3})*\.\d{2}|\d+\.\d{2})"
    ).unwrap();

    pub static ref AMOUNT_BALANCE_DUE: Regex = Regex::new(
        r"(?i)balance\s+due[\s:]*\$?\s*(\d{1,3}(?:,\d{3})*\.\d{2}|\d+\.\d{2})"
    ).unwrap();

    pub static ref AMOUNT_BARE_TOTAL: Regex = Regex::new(
        r"(?i)\btotal[\s:]*\$?\s*(\d{1,3}(?:,\d{3})*\.\d{2}|\d+\.\d{2})"
    ).unwrap();

    // Client name label; the name itself may continue onto following lines.
    pub static ref CLIENT_LABEL: Regex = Regex::new(
        r"(?i)\b(?:bill\s+to|sold\s+to|customer)[\s:]*"
    ).unwrap();
}
