//! Metadata persistence contract for jobs and invoices.

mod memory;

pub use memory::MemoryMetadataStore;

use crate::error::StoreError;
use crate::models::{ExtractionJob, InvoiceRecord};

/// Persistence contract for extraction metadata.
///
/// Writes are upserts by key: writing a key that already exists replaces
/// the stored record. Terminal-state writes rely on this to stay
/// idempotent, so an implementation must never turn an upsert into a
/// duplicate-key insert. Implementations must serialize writes per key.
pub trait MetadataStore: Send + Sync {
    /// Insert or replace a job by its key.
    fn upsert_job(&self, job: &ExtractionJob) -> Result<(), StoreError>;

    /// Look up a job by key.
    fn find_job(&self, key: &str) -> Result<Option<ExtractionJob>, StoreError>;

    /// Insert or replace an invoice by its key.
    fn upsert_invoice(&self, invoice: &InvoiceRecord) -> Result<(), StoreError>;

    /// Look up an invoice by key.
    fn find_invoice(&self, key: &str) -> Result<Option<InvoiceRecord>, StoreError>;

    /// All stored jobs, newest first.
    fn jobs(&self) -> Result<Vec<ExtractionJob>, StoreError>;

    /// All stored invoices, in no particular order.
    fn invoices(&self) -> Result<Vec<InvoiceRecord>, StoreError>;
}
