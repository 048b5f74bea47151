// 🔍 Duplicate Suppression - Drop re-delivered events
// Banking apps re-post the same notification on update, and the screen reader
// sees the same slip on consecutive frames.

use crate::extraction::RawEvent;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;

pub const DEFAULT_DUPLICATE_WINDOW_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateDecision {
    Fresh,
    Duplicate,
}

/// Fingerprint for duplicate detection: source, title and body.
/// The timestamp is left out on purpose, re-posts carry a new one.
pub fn event_fingerprint(event: &RawEvent) -> String {
    let mut hasher = Sha256::new();
    hasher.update(event.source.as_str().as_bytes());
    hasher.update([0x1f]);
    hasher.update(event.title.trim().as_bytes());
    hasher.update([0x1f]);
    hasher.update(event.body.trim().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Remembers fingerprints for `window_ms`; nothing is kept longer
#[derive(Debug)]
pub struct DuplicateSuppressor {
    window_ms: u64,
    seen: Mutex<HashMap<String, i64>>,
}

impl DuplicateSuppressor {
    pub fn new(window_ms: u64) -> Self {
        DuplicateSuppressor {
            window_ms,
            seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Record `event` at `now_ms`; `Duplicate` if the same event was recorded
    /// less than `window_ms` ago. A window of 0 disables suppression.
    pub fn check(&self, event: &RawEvent, now_ms: i64) -> DuplicateDecision {
        if self.window_ms == 0 {
            return DuplicateDecision::Fresh;
        }

        let fingerprint = event_fingerprint(event);
        let mut seen = self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let window = self.window_ms as i64;
        seen.retain(|_, last| now_ms.saturating_sub(*last) < window);

        match seen.get(&fingerprint) {
            Some(last) => {
                tracing::debug!(source = %event.source, last_seen_ms = *last, "duplicate event suppressed");
                DuplicateDecision::Duplicate
            }
            None => {
                seen.insert(fingerprint, now_ms);
                DuplicateDecision::Fresh
            }
        }
    }

    /// Fingerprints currently remembered
    pub fn tracked(&self) -> usize {
        self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }
}

impl Default for DuplicateSuppressor {
    fn default() -> Self {
        Self::new(DEFAULT_DUPLICATE_WINDOW_MS)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn event(body: &str) -> RawEvent {
        RawEvent::new("com.scb.phone", "SCB", body, 0)
    }

    #[test]
    fn test_repeat_within_window_suppressed() {
        let suppressor = DuplicateSuppressor::new(5_000);
        let e = event("เงินเข้า 100.00 บาท");

        assert_eq!(suppressor.check(&e, 1_000), DuplicateDecision::Fresh);
        assert_eq!(suppressor.check(&e, 3_000), DuplicateDecision::Duplicate);
    }

    #[test]
    fn test_repeat_after_window_is_fresh() {
        let suppressor = DuplicateSuppressor::new(5_000);
        let e = event("เงินเข้า 100.00 บาท");

        assert_eq!(suppressor.check(&e, 1_000), DuplicateDecision::Fresh);
        assert_eq!(suppressor.check(&e, 6_000), DuplicateDecision::Fresh);
    }

    #[test]
    fn test_different_bodies_are_independent() {
        let suppressor = DuplicateSuppressor::new(5_000);

        assert_eq!(suppressor.check(&event("เงินเข้า 100.00 บาท"), 0), DuplicateDecision::Fresh);
        assert_eq!(suppressor.check(&event("เงินเข้า 200.00 บาท"), 0), DuplicateDecision::Fresh);
        assert_eq!(suppressor.tracked(), 2);
    }

    #[test]
    fn test_duplicates_do_not_extend_window() {
        let suppressor = DuplicateSuppressor::new(5_000);
        let e = event("x");

        suppressor.check(&e, 0);
        assert_eq!(suppressor.check(&e, 4_000), DuplicateDecision::Duplicate);
        assert_eq!(suppressor.check(&e, 5_000), DuplicateDecision::Fresh);
    }

    #[test]
    fn test_expired_entries_pruned() {
        let suppressor = DuplicateSuppressor::new(1_000);
        suppressor.check(&event("a"), 0);
        suppressor.check(&event("b"), 0);

        suppressor.check(&event("c"), 2_000);
        assert_eq!(suppressor.tracked(), 1);
    }

    #[test]
    fn test_zero_window_disables() {
        let suppressor = DuplicateSuppressor::new(0);
        let e = event("x");
        assert_eq!(suppressor.check(&e, 0), DuplicateDecision::Fresh);
        assert_eq!(suppressor.check(&e, 0), DuplicateDecision::Fresh);
    }

    #[test]
    fn test_fingerprint_ignores_timestamp_and_padding() {
        let a = RawEvent::new("s", "t", "body", 1);
        let b = RawEvent::new("s", " t ", "body\n", 999);
        let c = RawEvent::new("other", "t", "body", 1);

        assert_eq!(event_fingerprint(&a), event_fingerprint(&b));
        assert_ne!(event_fingerprint(&a), event_fingerprint(&c));
    }
}
