//! # Cuetimer Core Library
//!
//! Core engine for Cuetimer, a presentation/speech timer: events are
//! ordered sequences of timed segments, each counting down or up with
//! threshold alerts (color, flash, sound), auto-advancing on
//! completion, optionally gated behind a scheduled wall-clock start.
//!
//! ## Architecture
//!
//! - **Timer Engine**: wall-clock state machines with no internal
//!   threads -- the caller polls `tick()` (100 ms design target) and
//!   supplies explicit instants, so elapsed time is reconstructed from
//!   timestamps and survives delayed or skipped ticks
//! - **Storage**: SQLite event documents plus TOML configuration
//! - **Effects**: fire-and-forget audio/vibration and platform hooks
//!   behind traits; failures never stall timer progression
//!
//! ## Key Components
//!
//! - [`EventSequencer`]: segment ordering, auto-advance, schedule gate
//! - [`SegmentRunner`]: one segment's countdown/count-up lifecycle
//! - [`ElapsedTracker`]: drift-free pause-aware elapsed time
//! - [`AlertEvaluator`]: crossing-based, at-most-once alert firing

pub mod effects;
pub mod error;
pub mod events;
pub mod model;
pub mod storage;
pub mod timer;

pub use effects::{EffectKind, EffectSink, NoopHooks, NullSink, PlatformHooks};
pub use error::{ConfigError, CoreError, StorageError, ValidationError};
pub use events::Event;
pub use model::{AlertDef, Direction, EventDef, Segment};
pub use storage::{Config, Database};
pub use timer::{
    AlertEvaluator, Clock, ElapsedTracker, EventSequencer, ManualClock, Phase, RunnerState,
    SegmentRunner, SystemClock,
};
