mod alerts;
mod clock;
mod runner;
mod sequencer;
mod tracker;

pub use alerts::{AlertEvaluator, FiredAlert, URGENT_ALERT_THRESHOLD_SECS};
pub use clock::{now_ms, Clock, ManualClock, SystemClock};
pub use runner::{RunnerState, SegmentRunner};
pub use sequencer::{
    EventSequencer, Phase, FLASH_CYCLES, FLASH_TOGGLE_MS, TRANSITION_MS,
};
pub use tracker::ElapsedTracker;
