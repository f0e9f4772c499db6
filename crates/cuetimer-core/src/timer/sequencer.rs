//! Event-level sequencing: segment order, auto-advance, the
//! scheduled-start gate, and the transition interstitial.
//!
//! ## Phase Transitions
//!
//! ```text
//! (WaitingForSchedule ->) Idle -> Running <-> Paused
//!                          Running -> Transitioning -> Running
//!                          Running -> Completed
//! ```
//!
//! The sequencer is a wall-clock state machine with no internal thread;
//! the caller polls `tick()` on a short interval (100 ms is the design
//! target). Every command and tick takes an explicit `now_ms`, so all
//! state transitions happen synchronously inside those calls. A tick
//! dispatches on the current phase only, which makes stale callbacks
//! structurally impossible: once a phase is left, late ticks for it are
//! no-ops.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::runner::SegmentRunner;
use crate::error::ValidationError;
use crate::events::Event;
use crate::model::{EventDef, Segment};

/// Interstitial duration between two segments.
pub const TRANSITION_MS: u64 = 2_500;
/// Blink sequence: on/off cycles and per-phase duration.
pub const FLASH_CYCLES: u32 = 3;
pub const FLASH_TOGGLE_MS: u64 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    WaitingForSchedule,
    Idle,
    Running,
    Paused,
    Transitioning,
    Completed,
}

/// Finite blink sequence driven by the tick loop rather than detached
/// timers, so resetting a segment mid-flash cannot leak a callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashSequence {
    phases_left: u32,
    on: bool,
    next_toggle_at_ms: u64,
}

impl FlashSequence {
    fn start(now_ms: u64) -> Self {
        let mut flash = Self {
            phases_left: FLASH_CYCLES * 2,
            on: false,
            next_toggle_at_ms: now_ms,
        };
        flash.tick(now_ms);
        flash
    }

    /// Advance past due toggles; returns false once the sequence ends.
    fn tick(&mut self, now_ms: u64) -> bool {
        while self.phases_left > 0 && now_ms >= self.next_toggle_at_ms {
            self.on = !self.on;
            self.phases_left -= 1;
            self.next_toggle_at_ms += FLASH_TOGGLE_MS;
        }
        self.phases_left > 0
    }

    fn is_on(&self) -> bool {
        self.on && self.phases_left > 0
    }
}

/// Owns the ordered segment list, the active index and the active
/// [`SegmentRunner`]. Takes an immutable-for-the-run copy of the event
/// definition at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSequencer {
    event: EventDef,
    phase: Phase,
    active_index: usize,
    /// Segment to start when the schedule gate releases.
    pending_index: usize,
    runner: Option<SegmentRunner>,
    transition_until_ms: Option<u64>,
    /// Pending scheduled start; one-shot, cleared on release or bypass.
    schedule_epoch_ms: Option<u64>,
    flash: Option<FlashSequence>,
    #[serde(default = "default_transition_ms")]
    transition_ms: u64,
}

fn default_transition_ms() -> u64 {
    TRANSITION_MS
}

impl EventSequencer {
    pub fn new(event: EventDef) -> Result<Self, ValidationError> {
        if event.segments.is_empty() {
            return Err(ValidationError::EmptyCollection("segments".into()));
        }
        Ok(Self {
            event,
            phase: Phase::Idle,
            active_index: 0,
            pending_index: 0,
            runner: None,
            transition_until_ms: None,
            schedule_epoch_ms: None,
            flash: None,
            transition_ms: TRANSITION_MS,
        })
    }

    pub fn with_transition_ms(mut self, transition_ms: u64) -> Self {
        self.transition_ms = transition_ms;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn event(&self) -> &EventDef {
        &self.event
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn active_segment(&self) -> Option<&Segment> {
        self.event.segments.get(self.active_index)
    }

    pub fn display_seconds(&self, now_ms: u64) -> u32 {
        match self.phase {
            Phase::WaitingForSchedule => self.event.segments[self.pending_index].initial_display(),
            _ => match &self.runner {
                Some(runner) => runner.display_seconds(now_ms),
                None => self.event.segments[self.active_index].initial_display(),
            },
        }
    }

    /// Color from the last persistent alert; cleared at segment end.
    pub fn active_alert_color(&self) -> Option<&str> {
        match self.phase {
            Phase::Running | Phase::Paused => self.runner.as_ref()?.last_alert_color(),
            _ => None,
        }
    }

    pub fn is_flashing(&self) -> bool {
        self.flash.as_ref().map(FlashSequence::is_on).unwrap_or(false)
    }

    /// Countdown string while gated, recomputed from the target instant.
    pub fn schedule_countdown(&self, now_ms: u64) -> Option<String> {
        if self.phase != Phase::WaitingForSchedule {
            return None;
        }
        let target = self.schedule_epoch_ms?;
        Some(format_countdown(target.saturating_sub(now_ms)))
    }

    /// "(from, to)" segment names while transitioning.
    pub fn transition_names(&self) -> Option<(&str, &str)> {
        if self.phase != Phase::Transitioning {
            return None;
        }
        let from = self.event.segments.get(self.active_index)?;
        let to = self.event.segments.get(self.active_index + 1)?;
        Some((from.name.as_str(), to.name.as_str()))
    }

    /// Build a full state snapshot event for rendering.
    pub fn snapshot(&self, now_ms: u64) -> Event {
        let (transition_from, transition_to) = match self.transition_names() {
            Some((from, to)) => (Some(from.to_string()), Some(to.to_string())),
            None => (None, None),
        };
        Event::StateSnapshot {
            phase: self.phase,
            active_segment_index: self.active_index,
            display_seconds: self.display_seconds(now_ms),
            active_alert_color: self.active_alert_color().map(str::to_string),
            is_flashing: self.is_flashing(),
            schedule_countdown: self.schedule_countdown(now_ms),
            transition_from,
            transition_to,
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start playback from `from_index`, discarding any prior run state.
    ///
    /// If the event carries a scheduled start still in the future, the
    /// sequencer holds in `WaitingForSchedule` until `tick` observes the
    /// instant (or `start_now` bypasses the gate). An out-of-range index
    /// is rejected with no state mutation.
    pub fn start(&mut self, from_index: usize, now_ms: u64) -> Result<Vec<Event>, ValidationError> {
        let len = self.event.segments.len();
        if from_index >= len {
            return Err(ValidationError::OutOfBounds {
                collection: "segments".into(),
                index: from_index,
                len,
            });
        }

        if let Some(scheduled) = self.event.scheduled_start_epoch_ms {
            if scheduled > now_ms {
                self.runner = None;
                self.flash = None;
                self.transition_until_ms = None;
                self.pending_index = from_index;
                self.schedule_epoch_ms = Some(scheduled);
                self.phase = Phase::WaitingForSchedule;
                return Ok(vec![Event::ScheduleWaiting {
                    scheduled_start_epoch_ms: scheduled,
                    countdown: format_countdown(scheduled - now_ms),
                    at: Utc::now(),
                }]);
            }
        }

        Ok(self.start_at(from_index, now_ms))
    }

    /// Manual "start now" override while gated. Clears the schedule.
    pub fn start_now(&mut self, now_ms: u64) -> Vec<Event> {
        if self.phase != Phase::WaitingForSchedule {
            return Vec::new();
        }
        let mut out = vec![Event::ScheduleReleased { at: Utc::now() }];
        out.extend(self.start_at(self.pending_index, now_ms));
        out
    }

    pub fn pause(&mut self, now_ms: u64) -> Option<Event> {
        if self.phase != Phase::Running {
            return None;
        }
        let event = self.runner.as_mut()?.pause(now_ms)?;
        self.phase = Phase::Paused;
        Some(event)
    }

    pub fn resume(&mut self, now_ms: u64) -> Option<Event> {
        if self.phase != Phase::Paused {
            return None;
        }
        let event = self.runner.as_mut()?.resume(now_ms)?;
        self.phase = Phase::Running;
        Some(event)
    }

    /// Reset the active segment back to idle at its initial value.
    /// Clears fired alerts, flash state and any pending schedule wait.
    pub fn reset(&mut self) -> Event {
        if let Some(runner) = self.runner.as_mut() {
            runner.reset();
        }
        self.flash = None;
        self.transition_until_ms = None;
        self.schedule_epoch_ms = None;
        self.phase = Phase::Idle;
        Event::TimerReset { at: Utc::now() }
    }

    /// Stop everything and hand control back to the caller. The only
    /// path back to the event-editing context.
    pub fn exit(&mut self) -> Event {
        self.runner = None;
        self.flash = None;
        self.transition_until_ms = None;
        self.schedule_epoch_ms = None;
        self.active_index = 0;
        self.pending_index = 0;
        self.phase = Phase::Idle;
        Event::TimerExited { at: Utc::now() }
    }

    /// Poll on a short interval. Drives the schedule gate, the running
    /// segment, the transition timeout and the flash sequence.
    pub fn tick(&mut self, now_ms: u64) -> Vec<Event> {
        if let Some(flash) = self.flash.as_mut() {
            if !flash.tick(now_ms) {
                self.flash = None;
            }
        }

        match self.phase {
            Phase::WaitingForSchedule => match self.schedule_epoch_ms {
                Some(target) if now_ms >= target => {
                    let mut out = vec![Event::ScheduleReleased { at: Utc::now() }];
                    out.extend(self.start_at(self.pending_index, now_ms));
                    out
                }
                _ => Vec::new(),
            },
            Phase::Transitioning => match self.transition_until_ms {
                Some(until) if now_ms >= until => self.start_at(self.active_index + 1, now_ms),
                _ => Vec::new(),
            },
            Phase::Running => {
                let mut out = match self.runner.as_mut() {
                    Some(runner) => runner.tick(now_ms),
                    None => Vec::new(),
                };
                let extra = self.react(&out, now_ms);
                out.extend(extra);
                out
            }
            Phase::Idle | Phase::Paused | Phase::Completed => Vec::new(),
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Fresh runner at `index`, auto-started. Resets all per-segment
    /// run state and consumes the one-shot schedule.
    fn start_at(&mut self, index: usize, now_ms: u64) -> Vec<Event> {
        self.schedule_epoch_ms = None;
        self.event.scheduled_start_epoch_ms = None;
        self.flash = None;
        self.transition_until_ms = None;
        self.active_index = index;
        let mut runner = SegmentRunner::new(index, self.event.segments[index].clone());
        let mut out = runner.start(now_ms);
        self.runner = Some(runner);
        self.phase = Phase::Running;
        let extra = self.react(&out, now_ms);
        out.extend(extra);
        out
    }

    /// Fold runner output back into sequencer state: flash triggers and
    /// the advance-or-complete decision on segment completion.
    fn react(&mut self, events: &[Event], now_ms: u64) -> Vec<Event> {
        let mut extra = Vec::new();
        for event in events {
            match event {
                Event::AlertFired { flash: true, .. } => {
                    self.flash = Some(FlashSequence::start(now_ms));
                }
                Event::SegmentCompleted {
                    segment_index,
                    completion_flash_enabled,
                    ..
                } => {
                    if *completion_flash_enabled {
                        self.flash = Some(FlashSequence::start(now_ms));
                    }
                    let next = segment_index + 1;
                    if next < self.event.segments.len() {
                        self.phase = Phase::Transitioning;
                        self.transition_until_ms = Some(now_ms + self.transition_ms);
                        extra.push(Event::TransitionStarted {
                            from_index: *segment_index,
                            to_index: next,
                            from_name: self.event.segments[*segment_index].name.clone(),
                            to_name: self.event.segments[next].name.clone(),
                            at: Utc::now(),
                        });
                    } else {
                        self.phase = Phase::Completed;
                        extra.push(Event::EventCompleted { at: Utc::now() });
                    }
                }
                _ => {}
            }
        }
        extra
    }
}

/// `h:mm:ss` above an hour, `m:ss` below. Rounds up, so "0:01" is shown
/// until the instant actually arrives.
fn format_countdown(remaining_ms: u64) -> String {
    let secs = remaining_ms.div_ceil(1000);
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlertDef, Direction};

    fn segment(id: &str, duration: u32, direction: Direction) -> Segment {
        Segment {
            id: id.into(),
            name: format!("Segment {id}"),
            duration_seconds: duration,
            direction,
            alerts: vec![],
            completion_sound_enabled: true,
            completion_flash_enabled: false,
            tick_sound_enabled: false,
        }
    }

    fn event(segments: Vec<Segment>) -> EventDef {
        EventDef {
            id: "e1".into(),
            title: "Rehearsal".into(),
            segments,
            scheduled_start_epoch_ms: None,
        }
    }

    fn has<F: Fn(&Event) -> bool>(events: &[Event], pred: F) -> bool {
        events.iter().any(pred)
    }

    #[test]
    fn rejects_empty_event() {
        assert!(matches!(
            EventSequencer::new(event(vec![])),
            Err(ValidationError::EmptyCollection(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_start_without_mutation() {
        let mut seq = EventSequencer::new(event(vec![segment("a", 5, Direction::Countdown)]))
            .unwrap();
        let err = seq.start(3, 0).unwrap_err();
        assert!(matches!(err, ValidationError::OutOfBounds { index: 3, .. }));
        assert_eq!(seq.phase(), Phase::Idle);
    }

    #[test]
    fn two_segment_auto_advance() {
        // Segment A: 5 s countdown. Segment B: unbounded count-up.
        let mut seq = EventSequencer::new(event(vec![
            segment("a", 5, Direction::Countdown),
            segment("b", 0, Direction::Countup),
        ]))
        .unwrap();
        seq.start(0, 0).unwrap();
        assert_eq!(seq.phase(), Phase::Running);

        let done = seq.tick(5_000);
        assert!(has(&done, |e| matches!(e, Event::SegmentCompleted { .. })));
        assert!(has(&done, |e| matches!(
            e,
            Event::TransitionStarted { from_index: 0, to_index: 1, .. }
        )));
        assert_eq!(seq.phase(), Phase::Transitioning);
        assert!(seq.transition_names().is_some());

        // Transition lasts the fixed duration.
        assert!(seq.tick(7_499).is_empty());
        assert_eq!(seq.phase(), Phase::Transitioning);

        let advanced = seq.tick(7_500);
        assert!(has(&advanced, |e| matches!(
            e,
            Event::SegmentStarted { segment_index: 1, .. }
        )));
        assert_eq!(seq.phase(), Phase::Running);
        // B starts at elapsed 0 and never completes on its own.
        assert_eq!(seq.display_seconds(7_500), 0);
        assert!(seq.tick(3_600_000 + 7_500).is_empty());
        assert_eq!(seq.phase(), Phase::Running);
    }

    #[test]
    fn last_segment_completion_is_terminal() {
        let mut seq =
            EventSequencer::new(event(vec![segment("a", 2, Direction::Countdown)])).unwrap();
        seq.start(0, 0).unwrap();
        let done = seq.tick(2_000);
        assert!(has(&done, |e| matches!(e, Event::EventCompleted { .. })));
        assert_eq!(seq.phase(), Phase::Completed);
        assert_eq!(seq.display_seconds(2_000), 0);
        // No further auto-action.
        assert!(seq.tick(10_000).is_empty());
        assert_eq!(seq.phase(), Phase::Completed);
    }

    #[test]
    fn schedule_gate_releases_exactly_once_observed() {
        let mut def = event(vec![segment("a", 10, Direction::Countdown)]);
        def.scheduled_start_epoch_ms = Some(105_000);
        let mut seq = EventSequencer::new(def).unwrap();

        let out = seq.start(0, 100_000).unwrap();
        assert!(has(&out, |e| matches!(e, Event::ScheduleWaiting { .. })));
        assert_eq!(seq.phase(), Phase::WaitingForSchedule);
        assert_eq!(seq.schedule_countdown(100_000).as_deref(), Some("0:05"));
        assert_eq!(seq.display_seconds(100_000), 10);

        // Never earlier than the target.
        assert!(seq.tick(104_999).is_empty());
        assert_eq!(seq.phase(), Phase::WaitingForSchedule);

        let released = seq.tick(105_000);
        assert!(has(&released, |e| matches!(e, Event::ScheduleReleased { .. })));
        assert!(has(&released, |e| matches!(
            e,
            Event::SegmentStarted { segment_index: 0, .. }
        )));
        assert_eq!(seq.phase(), Phase::Running);
        // One-shot: the schedule is consumed.
        assert!(seq.event().scheduled_start_epoch_ms.is_none());
    }

    #[test]
    fn start_now_bypasses_gate_and_clears_schedule() {
        let mut def = event(vec![segment("a", 10, Direction::Countdown)]);
        def.scheduled_start_epoch_ms = Some(200_000);
        let mut seq = EventSequencer::new(def).unwrap();
        seq.start(0, 100_000).unwrap();

        let out = seq.start_now(101_000);
        assert!(has(&out, |e| matches!(e, Event::ScheduleReleased { .. })));
        assert_eq!(seq.phase(), Phase::Running);
        assert!(seq.event().scheduled_start_epoch_ms.is_none());
        // Bypass is a no-op outside the waiting phase.
        assert!(seq.start_now(102_000).is_empty());
    }

    #[test]
    fn start_from_index_resets_run_state() {
        let alert = AlertDef {
            id: "warn".into(),
            threshold_seconds: 50,
            color: "#ff0000".into(),
            persist_background: true,
            flash: false,
            sound: false,
        };
        let mut seg_b = segment("b", 60, Direction::Countdown);
        seg_b.alerts = vec![alert];
        let mut seq =
            EventSequencer::new(event(vec![segment("a", 60, Direction::Countdown), seg_b]))
                .unwrap();

        // Jump straight to segment 1 and run past the alert.
        seq.start(1, 0).unwrap();
        let fired = seq.tick(15_000);
        assert!(has(&fired, |e| matches!(e, Event::AlertFired { .. })));
        assert_eq!(seq.active_alert_color(), Some("#ff0000"));

        // Restarting at the same index is a fresh run: alert refires.
        seq.start(1, 100_000).unwrap();
        assert_eq!(seq.display_seconds(100_000), 60);
        assert_eq!(seq.active_alert_color(), None);
        let refired = seq.tick(115_000);
        assert!(has(&refired, |e| matches!(e, Event::AlertFired { .. })));
    }

    #[test]
    fn flash_sequence_blinks_then_ends() {
        let alert = AlertDef {
            id: "f".into(),
            threshold_seconds: 5,
            color: "#ffffff".into(),
            persist_background: false,
            flash: true,
            sound: false,
        };
        let mut seg = segment("a", 6, Direction::Countdown);
        seg.alerts = vec![alert];
        let mut seq = EventSequencer::new(event(vec![seg])).unwrap();
        seq.start(0, 0).unwrap();

        let fired = seq.tick(1_000);
        assert!(has(&fired, |e| matches!(e, Event::AlertFired { flash: true, .. })));
        assert!(seq.is_flashing());
        seq.tick(1_250);
        assert!(!seq.is_flashing()); // first off phase
        seq.tick(1_500);
        assert!(seq.is_flashing()); // back on
        // 3 cycles x 2 phases x 250 ms: over by 1.5 s after the trigger.
        seq.tick(2_500);
        assert!(!seq.is_flashing());
    }

    #[test]
    fn pause_resume_only_from_matching_phase() {
        let mut seq =
            EventSequencer::new(event(vec![segment("a", 30, Direction::Countdown)])).unwrap();
        assert!(seq.pause(0).is_none()); // idle
        seq.start(0, 0).unwrap();
        assert!(seq.resume(100).is_none()); // running, not paused
        assert!(seq.pause(4_000).is_some());
        assert_eq!(seq.phase(), Phase::Paused);
        assert!(seq.pause(4_100).is_none()); // duplicate press
        assert!(seq.resume(7_000).is_some());
        assert_eq!(seq.display_seconds(20_000), 30 - 17);
    }

    #[test]
    fn reset_returns_active_segment_to_initial() {
        let mut seq =
            EventSequencer::new(event(vec![segment("a", 30, Direction::Countdown)])).unwrap();
        seq.start(0, 0).unwrap();
        seq.tick(12_000);
        seq.reset();
        assert_eq!(seq.phase(), Phase::Idle);
        assert_eq!(seq.display_seconds(12_000), 30);
        assert!(!seq.is_flashing());
    }

    #[test]
    fn exit_clears_everything() {
        let mut def = event(vec![
            segment("a", 5, Direction::Countdown),
            segment("b", 5, Direction::Countdown),
        ]);
        def.scheduled_start_epoch_ms = Some(999_999_999);
        let mut seq = EventSequencer::new(def).unwrap();
        seq.start(1, 0).unwrap();
        seq.exit();
        assert_eq!(seq.phase(), Phase::Idle);
        assert_eq!(seq.active_index(), 0);
        assert!(seq.tick(1_000_000_000).is_empty());
    }

    #[test]
    fn snapshot_reflects_phase() {
        let mut seq =
            EventSequencer::new(event(vec![segment("a", 15, Direction::Countdown)])).unwrap();
        seq.start(0, 0).unwrap();
        seq.tick(3_000);
        match seq.snapshot(3_000) {
            Event::StateSnapshot {
                phase,
                active_segment_index,
                display_seconds,
                ..
            } => {
                assert_eq!(phase, Phase::Running);
                assert_eq!(active_segment_index, 0);
                assert_eq!(display_seconds, 12);
            }
            _ => panic!("expected StateSnapshot"),
        }
    }

    #[test]
    fn countdown_formatting() {
        assert_eq!(format_countdown(0), "0:00");
        assert_eq!(format_countdown(4_200), "0:05");
        assert_eq!(format_countdown(65_000), "1:05");
        assert_eq!(format_countdown(3_600_000), "1:00:00");
        assert_eq!(format_countdown(3_661_000), "1:01:01");
    }
}
