//! Event, segment and alert definitions.
//!
//! These are the authoring-side documents: the editor produces them, the
//! engine takes an immutable-for-the-run snapshot when playback starts.
//! The JSON shape is a compatibility contract with previously saved
//! documents, so fields added later carry serde defaults (a document
//! missing `tickSoundEnabled` reads back as `false`, a document missing
//! `persistBackground` reads back as `true`).

use serde::{Deserialize, Serialize};

/// Which way a segment's clock moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Countdown,
    Countup,
}

/// A threshold-triggered effect within a segment.
///
/// Countdown: fires when remaining <= threshold. Count-up: fires when
/// elapsed >= threshold. Firing is crossing-based, not exact-match, so a
/// skipped tick at the boundary cannot drop the alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertDef {
    pub id: String,
    pub threshold_seconds: u32,
    #[serde(default = "default_alert_color")]
    pub color: String,
    /// If true the color stays applied until the next alert or segment end;
    /// if false the alert is momentary (flash only).
    #[serde(default = "default_true")]
    pub persist_background: bool,
    #[serde(default)]
    pub flash: bool,
    #[serde(default)]
    pub sound: bool,
}

/// A single timed phase within an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: String,
    pub name: String,
    /// Countdown: the starting value. Count-up: `0` means unbounded,
    /// `> 0` means "complete upon reaching this value".
    pub duration_seconds: u32,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub alerts: Vec<AlertDef>,
    #[serde(default = "default_true")]
    pub completion_sound_enabled: bool,
    #[serde(default = "default_true")]
    pub completion_flash_enabled: bool,
    #[serde(default)]
    pub tick_sound_enabled: bool,
}

impl Segment {
    pub fn duration_ms(&self) -> u64 {
        u64::from(self.duration_seconds).saturating_mul(1000)
    }

    /// Displayed value before the segment has started.
    pub fn initial_display(&self) -> u32 {
        match self.direction {
            Direction::Countdown => self.duration_seconds,
            Direction::Countup => 0,
        }
    }

    /// Displayed value once the segment has completed.
    pub fn final_display(&self) -> u32 {
        match self.direction {
            Direction::Countdown => 0,
            Direction::Countup => self.duration_seconds,
        }
    }
}

/// An ordered sequence of segments plus scheduling metadata.
///
/// Order is meaningful: playback order and default displayed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDef {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub segments: Vec<Segment>,
    /// Absolute instant; when set and in the future, playback is gated
    /// until reached. One-shot: cleared on release or manual bypass.
    #[serde(default)]
    pub scheduled_start_epoch_ms: Option<u64>,
}

fn default_true() -> bool {
    true
}

fn default_alert_color() -> String {
    "#f59e0b".into()
}
