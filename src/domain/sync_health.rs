pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// What the UI should say about freshness of a polled scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Healthy,
    /// "Last updated N seconds ago, retrying".
    Retrying {
        failures: u32,
        since_last_success_ms: Option<i64>,
    },
}

/// Consecutive transient failure counter for one polling scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncHealth {
    threshold: u32,
    consecutive_failures: u32,
    last_success_ms: Option<i64>,
}

impl Default for SyncHealth {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD)
    }
}

impl SyncHealth {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            consecutive_failures: 0,
            last_success_ms: None,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn record_success(&mut self, now_ms: i64) {
        self.consecutive_failures = 0;
        self.last_success_ms = Some(now_ms);
    }

    /// Returns true when this failure is the one that crosses the threshold.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_failures == self.threshold.saturating_add(1)
    }

    pub fn status(&self, now_ms: i64) -> SyncStatus {
        if self.consecutive_failures <= self.threshold {
            return SyncStatus::Healthy;
        }

        SyncStatus::Retrying {
            failures: self.consecutive_failures,
            since_last_success_ms: self
                .last_success_ms
                .map(|at| now_ms.saturating_sub(at).max(0)),
        }
    }

    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.last_success_ms = None;
    }
}
