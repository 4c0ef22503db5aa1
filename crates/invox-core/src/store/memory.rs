//! In-memory metadata store.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::StoreError;
use crate::models::{ExtractionJob, InvoiceRecord};

use super::MetadataStore;

/// HashMap-backed store, suitable for the CLI and for tests.
///
/// A poisoned lock is recovered rather than propagated: the maps hold
/// plain owned data, so a panicking writer cannot leave a record half
/// written.
#[derive(Default)]
pub struct MemoryMetadataStore {
    jobs: RwLock<HashMap<String, ExtractionJob>>,
    invoices: RwLock<HashMap<String, InvoiceRecord>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn upsert_job(&self, job: &ExtractionJob) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        jobs.insert(job.key.clone(), job.clone());
        Ok(())
    }

    fn find_job(&self, key: &str) -> Result<Option<ExtractionJob>, StoreError> {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        Ok(jobs.get(key).cloned())
    }

    fn upsert_invoice(&self, invoice: &InvoiceRecord) -> Result<(), StoreError> {
        let mut invoices = self.invoices.write().unwrap_or_else(|e| e.into_inner());
        invoices.insert(invoice.key.clone(), invoice.clone());
        Ok(())
    }

    fn find_invoice(&self, key: &str) -> Result<Option<InvoiceRecord>, StoreError> {
        let invoices = self.invoices.read().unwrap_or_else(|e| e.into_inner());
        Ok(invoices.get(key).cloned())
    }

    fn jobs(&self) -> Result<Vec<ExtractionJob>, StoreError> {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<ExtractionJob> = jobs.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    fn invoices(&self) -> Result<Vec<InvoiceRecord>, StoreError> {
        let invoices = self.invoices.read().unwrap_or_else(|e| e.into_inner());
        Ok(invoices.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobStatus;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_upsert_replaces_by_key() {
        let store = MemoryMetadataStore::new();
        let mut job = ExtractionJob::new("a.pdf");
        store.upsert_job(&job).unwrap();

        job.fail("boom").unwrap();
        store.upsert_job(&job).unwrap();

        let stored = store.find_job(&job.key).unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(store.jobs().unwrap().len(), 1);
    }

    #[test]
    fn test_find_missing_is_none() {
        let store = MemoryMetadataStore::new();
        assert!(store.find_job("nope").unwrap().is_none());
        assert!(store.find_invoice("nope").unwrap().is_none());
    }

    #[test]
    fn test_jobs_newest_first() {
        let store = MemoryMetadataStore::new();
        let older = ExtractionJob::new("first.pdf");
        store.upsert_job(&older).unwrap();

        let mut newer = ExtractionJob::new("second.pdf");
        newer.created_at = older.created_at + chrono::Duration::seconds(5);
        store.upsert_job(&newer).unwrap();

        let all = store.jobs().unwrap();
        assert_eq!(all[0].source_file_name, "second.pdf");
    }
}
