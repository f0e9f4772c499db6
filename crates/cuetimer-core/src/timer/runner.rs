//! Single-segment lifecycle: `Idle -> Running <-> Paused -> Completed`.
//!
//! The runner is polled; each tick recomputes elapsed time from the
//! tracker (never increments a counter), derives the displayed value,
//! evaluates alerts, and only then checks completion. That ordering
//! guarantees an alert at the terminal threshold fires before the
//! segment is marked complete, and makes the runner correct regardless
//! of how many ticks were actually delivered.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::alerts::AlertEvaluator;
use super::tracker::ElapsedTracker;
use crate::events::Event;
use crate::model::{Direction, Segment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerState {
    Idle,
    Running,
    Paused,
    Completed,
}

/// Drives one segment's countdown-or-countup lifecycle.
///
/// Holds a read-only snapshot of the segment taken at construction;
/// definitions never mutate mid-run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentRunner {
    segment: Segment,
    segment_index: usize,
    state: RunnerState,
    tracker: ElapsedTracker,
    alerts: AlertEvaluator,
    last_alert_color: Option<String>,
}

impl SegmentRunner {
    pub fn new(segment_index: usize, segment: Segment) -> Self {
        Self {
            segment,
            segment_index,
            state: RunnerState::Idle,
            tracker: ElapsedTracker::new(),
            alerts: AlertEvaluator::new(),
            last_alert_color: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    pub fn segment_index(&self) -> usize {
        self.segment_index
    }

    /// Color applied by the most recent persistent alert, if any.
    pub fn last_alert_color(&self) -> Option<&str> {
        self.last_alert_color.as_deref()
    }

    /// The large-clock value at `now_ms`. Never negative: countdown is
    /// clamped at zero, bounded count-up is clamped at its duration.
    pub fn display_seconds(&self, now_ms: u64) -> u32 {
        match self.state {
            RunnerState::Idle => self.segment.initial_display(),
            RunnerState::Completed => self.segment.final_display(),
            RunnerState::Running | RunnerState::Paused => {
                let elapsed_secs = self.elapsed_secs(now_ms);
                match self.segment.direction {
                    Direction::Countdown => {
                        self.segment.duration_seconds.saturating_sub(elapsed_secs)
                    }
                    Direction::Countup => {
                        if self.segment.duration_seconds > 0 {
                            elapsed_secs.min(self.segment.duration_seconds)
                        } else {
                            elapsed_secs
                        }
                    }
                }
            }
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start from idle. Fires already-crossed alerts immediately, and a
    /// zero-duration countdown completes on the spot.
    pub fn start(&mut self, now_ms: u64) -> Vec<Event> {
        if self.state != RunnerState::Idle {
            return Vec::new();
        }
        self.tracker.start(now_ms);
        self.state = RunnerState::Running;
        let mut out = vec![Event::SegmentStarted {
            segment_index: self.segment_index,
            segment_id: self.segment.id.clone(),
            name: self.segment.name.clone(),
            direction: self.segment.direction,
            duration_seconds: self.segment.duration_seconds,
            tick_sound_enabled: self.segment.tick_sound_enabled,
            at: Utc::now(),
        }];
        out.extend(self.tick(now_ms));
        out
    }

    /// Idempotent: pausing while not running is a no-op, so duplicate
    /// UI events (double key-press) are tolerated.
    pub fn pause(&mut self, now_ms: u64) -> Option<Event> {
        if self.state != RunnerState::Running {
            return None;
        }
        self.tracker.pause(now_ms);
        self.state = RunnerState::Paused;
        Some(Event::TimerPaused {
            segment_index: self.segment_index,
            display_seconds: self.display_seconds(now_ms),
            at: Utc::now(),
        })
    }

    pub fn resume(&mut self, now_ms: u64) -> Option<Event> {
        if self.state != RunnerState::Paused {
            return None;
        }
        self.tracker.resume(now_ms);
        self.state = RunnerState::Running;
        Some(Event::TimerResumed {
            segment_index: self.segment_index,
            display_seconds: self.display_seconds(now_ms),
            at: Utc::now(),
        })
    }

    /// Back to idle: tracker cleared, fired-alert set cleared, displayed
    /// value back to the segment's initial value.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.alerts.reset();
        self.last_alert_color = None;
        self.state = RunnerState::Idle;
    }

    /// Poll while running. Order within a tick is fixed: recompute
    /// elapsed, evaluate alerts, then check completion.
    pub fn tick(&mut self, now_ms: u64) -> Vec<Event> {
        if self.state != RunnerState::Running {
            return Vec::new();
        }

        let elapsed_ms = self.tracker.elapsed_ms(now_ms);
        let elapsed_secs = self.elapsed_secs(now_ms);
        let current = match self.segment.direction {
            Direction::Countdown => self.segment.duration_seconds.saturating_sub(elapsed_secs),
            Direction::Countup => elapsed_secs,
        };

        let mut out = Vec::new();
        for fired in self
            .alerts
            .evaluate(self.segment.direction, current, &self.segment.alerts)
        {
            if fired.alert.persist_background {
                self.last_alert_color = Some(fired.alert.color.clone());
            }
            out.push(Event::AlertFired {
                segment_index: self.segment_index,
                alert_id: fired.alert.id,
                threshold_seconds: fired.alert.threshold_seconds,
                color: fired.alert.color,
                persist_background: fired.alert.persist_background,
                flash: fired.alert.flash,
                sound: fired.alert.sound,
                urgent: fired.urgent,
                at: Utc::now(),
            });
        }

        let completed = match self.segment.direction {
            Direction::Countdown => elapsed_ms >= self.segment.duration_ms(),
            // Unbounded count-up never completes on its own.
            Direction::Countup => {
                self.segment.duration_seconds > 0 && elapsed_ms >= self.segment.duration_ms()
            }
        };
        if completed {
            self.state = RunnerState::Completed;
            out.push(Event::SegmentCompleted {
                segment_index: self.segment_index,
                segment_id: self.segment.id.clone(),
                name: self.segment.name.clone(),
                completion_sound_enabled: self.segment.completion_sound_enabled,
                completion_flash_enabled: self.segment.completion_flash_enabled,
                at: Utc::now(),
            });
        }
        out
    }

    fn elapsed_secs(&self, now_ms: u64) -> u32 {
        (self.tracker.elapsed_ms(now_ms) / 1000).min(u64::from(u32::MAX)) as u32
    }
}
