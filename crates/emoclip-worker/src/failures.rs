//! Log suppression for repeated per-frame failures.

use tracing::{debug, warn};

/// Tracks consecutive failures of a repeated operation.
///
/// A classifier that is down fails every frame; after a few logged
/// failures the rest are counted silently until the next success.
#[derive(Debug, Default)]
pub struct FailureTracker {
    consecutive_failures: u32,
    total_failures: u32,
    max_logged_failures: u32,
    suppressed: bool,
}

impl FailureTracker {
    pub fn new(max_logged_failures: u32) -> Self {
        Self {
            max_logged_failures,
            ..Default::default()
        }
    }

    /// Record a successful operation (resets the consecutive count).
    pub fn record_success(&mut self) {
        if self.consecutive_failures > 0 && self.suppressed {
            debug!(
                "Operation recovered after {} consecutive failures",
                self.consecutive_failures
            );
        }
        self.consecutive_failures = 0;
        self.suppressed = false;
    }

    /// Record a failed operation.
    ///
    /// Returns `true` if this failure should be logged.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures += 1;
        self.total_failures += 1;

        if self.consecutive_failures <= self.max_logged_failures {
            true
        } else {
            if self.consecutive_failures == self.max_logged_failures + 1 {
                self.suppressed = true;
                warn!(
                    "Suppressing further failure logs after {} consecutive failures",
                    self.max_logged_failures
                );
            }
            false
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures
    }

    /// Failures over the tracker's lifetime.
    pub fn total_failures(&self) -> u32 {
        self.total_failures
    }
}
