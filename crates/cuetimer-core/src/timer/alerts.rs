//! Crossing-based alert evaluation.
//!
//! Sampling is discrete (roughly 100 ms ticks) and a busy or throttled
//! host can skip the exact second an alert names, so alerts fire on
//! "value has passed threshold" rather than equality. Each alert fires
//! at most once per segment run, tracked in a fired set keyed by alert
//! id that the runner clears on restart or segment change.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::model::{AlertDef, Direction};

/// Sound cues at threshold <= this many seconds use the urgent variant.
pub const URGENT_ALERT_THRESHOLD_SECS: u32 = 10;

/// An alert that crossed its threshold on this tick.
#[derive(Debug, Clone, PartialEq)]
pub struct FiredAlert {
    pub alert: AlertDef,
    pub urgent: bool,
}

/// Run-scoped firing state. Marking an alert fired is an intentional
/// side effect of evaluation: "has this alert fired" belongs to the
/// run, not to the query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEvaluator {
    fired: HashSet<String>,
}

impl AlertEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the not-yet-fired alerts whose threshold the current
    /// value has crossed, in threshold order, and marks them fired.
    ///
    /// Countdown evaluates descending by threshold, count-up ascending,
    /// so a tick gap that jumps several thresholds still fires all of
    /// them in the order they would have fired individually. An alert
    /// already past its threshold when the segment starts fires on the
    /// first evaluation (defined behavior, not clamped).
    pub fn evaluate(
        &mut self,
        direction: Direction,
        current_secs: u32,
        alerts: &[AlertDef],
    ) -> Vec<FiredAlert> {
        let mut ordered: Vec<&AlertDef> = alerts.iter().collect();
        match direction {
            // Stable sort keeps insertion order for equal thresholds.
            Direction::Countdown => {
                ordered.sort_by(|a, b| b.threshold_seconds.cmp(&a.threshold_seconds))
            }
            Direction::Countup => ordered.sort_by_key(|a| a.threshold_seconds),
        }

        let mut out = Vec::new();
        for alert in ordered {
            if self.fired.contains(&alert.id) {
                continue;
            }
            let crossed = match direction {
                Direction::Countdown => current_secs <= alert.threshold_seconds,
                Direction::Countup => current_secs >= alert.threshold_seconds,
            };
            if crossed {
                self.fired.insert(alert.id.clone());
                out.push(FiredAlert {
                    urgent: alert.threshold_seconds <= URGENT_ALERT_THRESHOLD_SECS,
                    alert: alert.clone(),
                });
            }
        }
        out
    }

    pub fn has_fired(&self, alert_id: &str) -> bool {
        self.fired.contains(alert_id)
    }

    pub fn fired_count(&self) -> usize {
        self.fired.len()
    }

    /// Clear firing state for a fresh run of the segment.
    pub fn reset(&mut self) {
        self.fired.clear();
    }
}
