// 🛟 Recovery Supervisor
// Turns a crash-class fault during extraction into a per-event NoMatch

use crate::extraction::{ExtractionOutcome, Extractor, NoMatchReason, RawEvent};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

pub struct RecoverySupervisor<E: Extractor> {
    extractor: E,
    failures: AtomicU64,
}

impl<E: Extractor> RecoverySupervisor<E> {
    pub fn new(extractor: E) -> Self {
        RecoverySupervisor {
            extractor,
            failures: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &E {
        &self.extractor
    }

    /// Run the extractor; errors and panics become `NoMatch(Recovered)`
    pub fn extract(&self, event: &RawEvent) -> ExtractionOutcome {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.extractor.extract(event)));

        let failure = match result {
            Ok(Ok(outcome)) => return outcome,
            Ok(Err(err)) => err.to_string(),
            Err(panic_info) => {
                if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "extractor panicked".to_string()
                }
            }
        };

        let total = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::error!(
            source = %event.source,
            failures = total,
            "extraction failed, dropping event: {}",
            failure
        );

        // The engine keeps no mutable state; recovery only confirms the
        // rule table still matches what was loaded.
        match self.extractor.verify_state() {
            Ok(()) => tracing::debug!("extractor state verified after failure"),
            Err(err) => tracing::error!("extractor state check failed: {}", err),
        }

        ExtractionOutcome::no_match(NoMatchReason::Recovered)
    }

    /// Failures absorbed since construction
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

// ============================================================================
// TESTS
// ============================================================================
