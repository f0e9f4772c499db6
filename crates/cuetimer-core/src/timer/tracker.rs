//! Drift-free elapsed-time bookkeeping for one running interval.
//!
//! Elapsed time is always reconstructed from absolute timestamps,
//! never by counting ticks: `elapsed = now - start - total_paused`,
//! with the open pause interval excluded while paused. Delayed or
//! skipped ticks therefore have no effect on correctness -- a long gap
//! simply produces a larger elapsed value on the next poll.

use serde::{Deserialize, Serialize};

/// Pure state + arithmetic; polled by the segment runner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElapsedTracker {
    started_at_ms: Option<u64>,
    paused_at_ms: Option<u64>,
    total_paused_ms: u64,
}

impl ElapsedTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a fresh interval at `now_ms`, discarding any prior state.
    pub fn start(&mut self, now_ms: u64) {
        self.started_at_ms = Some(now_ms);
        self.paused_at_ms = None;
        self.total_paused_ms = 0;
    }

    /// Open a pause interval. No-op while already paused or not started.
    pub fn pause(&mut self, now_ms: u64) {
        if self.started_at_ms.is_some() && self.paused_at_ms.is_none() {
            self.paused_at_ms = Some(now_ms);
        }
    }

    /// Close the open pause interval. No-op while not paused.
    pub fn resume(&mut self, now_ms: u64) {
        if let Some(paused_at) = self.paused_at_ms.take() {
            self.total_paused_ms += now_ms.saturating_sub(paused_at);
        }
    }

    pub fn is_started(&self) -> bool {
        self.started_at_ms.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at_ms.is_some()
    }

    /// Elapsed milliseconds at `now_ms`, excluding paused intervals.
    ///
    /// While paused, elapsed is frozen at the pause instant. Returns 0
    /// before `start` has been called.
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        let Some(started_at) = self.started_at_ms else {
            return 0;
        };
        let effective_now = self.paused_at_ms.unwrap_or(now_ms);
        effective_now
            .saturating_sub(started_at)
            .saturating_sub(self.total_paused_ms)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
