//! LLM extraction adapter contract.
//!
//! The adapter is consulted per job: availability reflects both
//! configuration (a provider is set up) and liveness (a recent call has
//! not failed in a way indicating the service is down). All failures on
//! this path are non-fatal; the orchestrator degrades to the fallback
//! parser.

pub mod schema;

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::error::LlmError;
use crate::models::ExtractedFields;

/// Adapter contract around an LLM extraction provider.
pub trait LlmExtractionAdapter: Send + Sync {
    /// Whether the provider can be called right now. Consulted before
    /// every job, never cached indefinitely.
    fn is_available(&self) -> bool;

    /// Extract invoice fields from OCR text.
    ///
    /// Implementations must constrain the model to the fixed schema in
    /// [`schema`] and report absence rather than guessing.
    fn extract_invoice_data(&self, ocr_text: &str) -> Result<ExtractedFields, LlmError>;
}

/// Tracks recent provider failures so availability checks can report the
/// service as down without issuing a network call per job.
pub struct LivenessTracker {
    cooldown: Duration,
    last_failure: Mutex<Option<Instant>>,
}

impl LivenessTracker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_failure: Mutex::new(None),
        }
    }

    /// True when no failure was recorded within the cooldown window.
    pub fn is_live(&self) -> bool {
        let guard = self
            .last_failure
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        match *guard {
            Some(at) => at.elapsed() >= self.cooldown,
            None => true,
        }
    }

    /// Record a failure that indicates the provider is down.
    pub fn record_failure(&self) {
        warn!("LLM provider failure recorded, cooling down");
        let mut guard = self
            .last_failure
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *guard = Some(Instant::now());
    }

    /// Clear the failure state after a successful call.
    pub fn record_success(&self) {
        let mut guard = self
            .last_failure
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }
}

impl Default for LivenessTracker {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_until_failure() {
        let tracker = LivenessTracker::new(Duration::from_secs(60));
        assert!(tracker.is_live());

        tracker.record_failure();
        assert!(!tracker.is_live());
    }

    #[test]
    fn test_success_clears_cooldown() {
        let tracker = LivenessTracker::new(Duration::from_secs(60));
        tracker.record_failure();
        tracker.record_success();
        assert!(tracker.is_live());
    }

    #[test]
    fn test_zero_cooldown_recovers_immediately() {
        let tracker = LivenessTracker::new(Duration::ZERO);
        tracker.record_failure();
        assert!(tracker.is_live());
    }
}
