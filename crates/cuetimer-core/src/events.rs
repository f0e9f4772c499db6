use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Direction;
use crate::timer::Phase;

/// Every state change in the engine produces an Event.
/// The driving layer polls for events and forwards them to the display
/// and effect collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Playback was requested but the scheduled start is still in the future.
    ScheduleWaiting {
        scheduled_start_epoch_ms: u64,
        countdown: String,
        at: DateTime<Utc>,
    },
    /// The scheduled-start gate released (or was bypassed manually).
    ScheduleReleased {
        at: DateTime<Utc>,
    },
    SegmentStarted {
        segment_index: usize,
        segment_id: String,
        name: String,
        direction: Direction,
        duration_seconds: u32,
        tick_sound_enabled: bool,
        at: DateTime<Utc>,
    },
    TimerPaused {
        segment_index: usize,
        display_seconds: u32,
        at: DateTime<Utc>,
    },
    TimerResumed {
        segment_index: usize,
        display_seconds: u32,
        at: DateTime<Utc>,
    },
    AlertFired {
        segment_index: usize,
        alert_id: String,
        threshold_seconds: u32,
        color: String,
        persist_background: bool,
        flash: bool,
        sound: bool,
        /// Sound cues at threshold <= 10 s get a distinct urgent variant.
        urgent: bool,
        at: DateTime<Utc>,
    },
    SegmentCompleted {
        segment_index: usize,
        segment_id: String,
        name: String,
        completion_sound_enabled: bool,
        completion_flash_enabled: bool,
        at: DateTime<Utc>,
    },
    /// Auto-advance interstitial between two segments.
    TransitionStarted {
        from_index: usize,
        to_index: usize,
        from_name: String,
        to_name: String,
        at: DateTime<Utc>,
    },
    /// The last segment completed; terminal for the run.
    EventCompleted {
        at: DateTime<Utc>,
    },
    TimerReset {
        at: DateTime<Utc>,
    },
    TimerExited {
        at: DateTime<Utc>,
    },
    /// Read-only observable state for rendering.
    StateSnapshot {
        phase: Phase,
        active_segment_index: usize,
        display_seconds: u32,
        active_alert_color: Option<String>,
        is_flashing: bool,
        schedule_countdown: Option<String>,
        transition_from: Option<String>,
        transition_to: Option<String>,
        at: DateTime<Utc>,
    },
}
