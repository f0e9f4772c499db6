//! Outbound effect interfaces: sound/vibration cues and ambient
//! platform capabilities.
//!
//! Effects are fire-and-forget; a failure or delay in playback must
//! never stall timer progression, so nothing here returns into the
//! engine's control flow. The one contractual obligation is the
//! custom-sound fallback: if a configured sound fails, the synthesized
//! finish cue plays instead so a completion is never silent.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::Event;

/// Synthesized cue variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Tick,
    Alert,
    UrgentAlert,
    Start,
    Pause,
    Finish,
}

#[derive(Error, Debug)]
pub enum EffectError {
    #[error("failed to play sound {path}: {message}")]
    PlaybackFailed { path: String, message: String },
}

/// Audio/vibration collaborator. Implementations are best-effort.
pub trait EffectSink {
    fn play_effect(&mut self, kind: EffectKind, with_vibration: bool);

    /// Attempt a user-provided sound file. Callers fall back to the
    /// synthesized [`EffectKind::Finish`] cue on error.
    fn play_custom_sound(&mut self, path: &str) -> Result<(), EffectError>;
}

/// Discards all effects.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EffectSink for NullSink {
    fn play_effect(&mut self, _kind: EffectKind, _with_vibration: bool) {}

    fn play_custom_sound(&mut self, _path: &str) -> Result<(), EffectError> {
        Ok(())
    }
}

/// Ambient OS capabilities invoked at phase boundaries. Success or
/// failure has zero effect on timing correctness.
pub trait PlatformHooks {
    fn request_wake_lock(&mut self) -> bool;
    fn release_wake_lock(&mut self);
    fn set_fullscreen(&mut self, on: bool) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl PlatformHooks for NoopHooks {
    fn request_wake_lock(&mut self) -> bool {
        true
    }

    fn release_wake_lock(&mut self) {}

    fn set_fullscreen(&mut self, _on: bool) -> bool {
        true
    }
}

/// Map engine events to sink calls.
///
/// `custom_sound` replaces the synthesized completion cue when set; a
/// playback error logs and immediately falls back so the completion
/// signal is never lost.
pub fn dispatch(
    events: &[Event],
    custom_sound: Option<&str>,
    with_vibration: bool,
    sink: &mut dyn EffectSink,
) {
    for event in events {
        match event {
            Event::SegmentStarted { .. } | Event::TimerResumed { .. } => {
                sink.play_effect(EffectKind::Start, false);
            }
            Event::TimerPaused { .. } => {
                sink.play_effect(EffectKind::Pause, false);
            }
            Event::AlertFired {
                sound: true, urgent, ..
            } => {
                let kind = if *urgent {
                    EffectKind::UrgentAlert
                } else {
                    EffectKind::Alert
                };
                sink.play_effect(kind, with_vibration);
            }
            Event::SegmentCompleted {
                completion_sound_enabled: true,
                ..
            } => match custom_sound {
                Some(path) => {
                    if let Err(err) = sink.play_custom_sound(path) {
                        log::warn!("custom completion sound failed: {err}");
                        sink.play_effect(EffectKind::Finish, with_vibration);
                    }
                }
                None => sink.play_effect(EffectKind::Finish, with_vibration),
            },
            _ => {}
        }
    }
}
