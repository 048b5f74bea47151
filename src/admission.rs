// 🚦 Admission Controller - Fixed window rate limiting
// Bounds how many raw events may reach the extraction engine per window
//
// Fixed, not sliding: the counter only resets at window boundaries, so up to
// 2x the threshold can pass around a boundary.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

pub const DEFAULT_MAX_EVENTS: u32 = 10;
pub const DEFAULT_WINDOW_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionDecision {
    Allow,
    Deny,
}

impl AdmissionDecision {
    pub fn is_allowed(&self) -> bool {
        *self == AdmissionDecision::Allow
    }
}

/// Counter for the current window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateWindowState {
    pub window_start_ms: i64,
    pub count_in_window: u32,
}

/// One per process. `admit` takes `&self`; the reset-then-increment step
/// runs under a single lock.
#[derive(Debug)]
pub struct AdmissionController {
    max_events: u32,
    window_ms: u64,
    state: Mutex<Option<RateWindowState>>,
}

impl AdmissionController {
    pub fn new(max_events: u32, window_ms: u64) -> Self {
        AdmissionController {
            max_events,
            window_ms,
            state: Mutex::new(None),
        }
    }

    pub fn max_events(&self) -> u32 {
        self.max_events
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Count one event at `now_ms` and decide whether it may proceed
    pub fn admit(&self, now_ms: i64) -> AdmissionDecision {
        let mut guard = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let current = match *guard {
            Some(state) if !self.window_expired(&state, now_ms) => state,
            // First call or window rollover
            _ => {
                *guard = Some(RateWindowState {
                    window_start_ms: now_ms,
                    count_in_window: 1,
                });
                return AdmissionDecision::Allow;
            }
        };

        let next = RateWindowState {
            count_in_window: current.count_in_window.saturating_add(1),
            ..current
        };
        *guard = Some(next);

        if next.count_in_window > self.max_events {
            tracing::warn!(
                count = next.count_in_window,
                max_events = self.max_events,
                window_start_ms = next.window_start_ms,
                "rate limit exceeded, dropping event"
            );
            AdmissionDecision::Deny
        } else {
            AdmissionDecision::Allow
        }
    }

    /// Current window, `None` before the first event
    pub fn snapshot(&self) -> Option<RateWindowState> {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // A clock that moved backwards stays in the current window
    fn window_expired(&self, state: &RateWindowState, now_ms: i64) -> bool {
        let elapsed = now_ms.saturating_sub(state.window_start_ms);
        elapsed >= 0 && elapsed as u64 >= self.window_ms
    }
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENTS, DEFAULT_WINDOW_MS)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const START: i64 = 1_700_000_000_000;

    #[test]
    fn test_tenth_allowed_eleventh_denied() {
        let controller = AdmissionController::default();

        for i in 0..10 {
            assert_eq!(controller.admit(START + i * 100), AdmissionDecision::Allow, "call {}", i + 1);
        }
        assert_eq!(controller.admit(START + 59_999), AdmissionDecision::Deny);
        assert_eq!(controller.snapshot().unwrap().count_in_window, 11);
    }

    #[test]
    fn test_window_rollover_resets_counter() {
        let controller = AdmissionController::default();

        for _ in 0..12 {
            controller.admit(START);
        }
        assert_eq!(controller.admit(START + 60_000), AdmissionDecision::Allow);

        let state = controller.snapshot().unwrap();
        assert_eq!(state.window_start_ms, START + 60_000);
        assert_eq!(state.count_in_window, 1);
    }

    #[test]
    fn test_burst_across_boundary() {
        // Fixed window: 10 at the end of one window + 10 at the start of the next
        let controller = AdmissionController::default();
        controller.admit(START);
        for _ in 0..9 {
            assert!(controller.admit(START + 59_000).is_allowed());
        }
        for _ in 0..10 {
            assert!(controller.admit(START + 60_000).is_allowed());
        }
        assert!(!controller.admit(START + 60_001).is_allowed());
    }

    #[test]
    fn test_clock_going_backwards_counts_in_window() {
        let controller = AdmissionController::new(2, 1_000);
        assert!(controller.admit(START).is_allowed());
        assert!(controller.admit(START - 5_000).is_allowed());
        assert!(!controller.admit(START - 5_000).is_allowed());
    }

    #[test]
    fn test_snapshot_empty_before_first_event() {
        let controller = AdmissionController::default();
        assert!(controller.snapshot().is_none());
    }

    #[test]
    fn test_concurrent_admits_never_exceed_threshold() {
        let controller = Arc::new(AdmissionController::new(50, 60_000));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let controller = Arc::clone(&controller);
            handles.push(thread::spawn(move || {
                (0..25)
                    .filter(|_| controller.admit(START + 10).is_allowed())
                    .count()
            }));
        }

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 50);
        assert_eq!(controller.snapshot().unwrap().count_in_window, 200);
    }
}
