use std::io::Write;
use std::time::Duration;

use clap::Subcommand;
use cuetimer_core::effects::{dispatch, EffectError, EffectKind, EffectSink};
use cuetimer_core::storage::{Config, Database};
use cuetimer_core::timer::{Clock, SystemClock};
use cuetimer_core::{EventSequencer, NoopHooks, Phase, PlatformHooks};

const RUN_STATE_KEY: &str = "run_state";

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start an event, optionally from a given segment index
    Start {
        /// Event id to run
        event_id: String,
        /// Segment index to start from
        #[arg(long, default_value = "0")]
        from: usize,
    },
    /// Bypass a pending scheduled start
    StartNow,
    /// Pause the running segment
    Pause,
    /// Resume a paused segment
    Resume,
    /// Reset the active segment, or exit if already idle
    Reset,
    /// Leave the run entirely
    Exit,
    /// Tick once and print current state as JSON
    Status,
    /// Drive the timer in the foreground until the event completes
    Watch,
}

/// Terminal effect sink: rings the bell for sound cues. A custom sound
/// path that doesn't exist reports failure so the dispatch fallback
/// kicks in.
struct TerminalSink {
    audible: bool,
}

impl EffectSink for TerminalSink {
    fn play_effect(&mut self, kind: EffectKind, _with_vibration: bool) {
        log::debug!("effect cue: {kind:?}");
        if self.audible {
            eprint!("\x07");
        }
    }

    fn play_custom_sound(&mut self, path: &str) -> Result<(), EffectError> {
        if std::path::Path::new(path).exists() {
            log::info!("playing custom sound {path}");
            if self.audible {
                eprint!("\x07");
            }
            Ok(())
        } else {
            Err(EffectError::PlaybackFailed {
                path: path.into(),
                message: "file not found".into(),
            })
        }
    }
}

pub(crate) fn load_sequencer(db: &Database) -> Option<EventSequencer> {
    let json = db.kv_get(RUN_STATE_KEY).ok()??;
    serde_json::from_str(&json).ok()
}

fn save_sequencer(db: &Database, seq: &EventSequencer) -> Result<(), Box<dyn std::error::Error>> {
    db.kv_set(RUN_STATE_KEY, &serde_json::to_string(seq)?)?;
    Ok(())
}

fn require_run(db: &Database) -> Result<EventSequencer, Box<dyn std::error::Error>> {
    load_sequencer(db).ok_or_else(|| "no active run; use `timer start <event-id>` first".into())
}

/// Print engine events and forward them to the effect sink.
fn emit(
    events: &[cuetimer_core::Event],
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    for event in events {
        println!("{}", serde_json::to_string_pretty(event)?);
    }
    let mut sink = TerminalSink {
        audible: config.notifications.enabled && config.notifications.volume > 0,
    };
    dispatch(
        events,
        config.notifications.custom_sound.as_deref(),
        config.notifications.vibration,
        &mut sink,
    );
    Ok(())
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let config = Config::load_or_default();
    let clock = SystemClock;

    match action {
        TimerAction::Start { event_id, from } => {
            let event = db.get_event(&event_id)?;
            let mut seq =
                EventSequencer::new(event)?.with_transition_ms(config.timer.transition_ms);
            let events = seq.start(from, clock.now_ms())?;
            emit(&events, &config)?;
            save_sequencer(&db, &seq)?;
        }
        TimerAction::StartNow => {
            let mut seq = require_run(&db)?;
            let events = seq.start_now(clock.now_ms());
            if events.is_empty() {
                println!("{}", serde_json::to_string_pretty(&seq.snapshot(clock.now_ms()))?);
            } else {
                emit(&events, &config)?;
            }
            save_sequencer(&db, &seq)?;
        }
        TimerAction::Pause => {
            let mut seq = require_run(&db)?;
            match seq.pause(clock.now_ms()) {
                Some(event) => emit(&[event], &config)?,
                None => println!(
                    "{}",
                    serde_json::to_string_pretty(&seq.snapshot(clock.now_ms()))?
                ),
            }
            save_sequencer(&db, &seq)?;
        }
        TimerAction::Resume => {
            let mut seq = require_run(&db)?;
            match seq.resume(clock.now_ms()) {
                Some(event) => emit(&[event], &config)?,
                None => println!(
                    "{}",
                    serde_json::to_string_pretty(&seq.snapshot(clock.now_ms()))?
                ),
            }
            save_sequencer(&db, &seq)?;
        }
        TimerAction::Reset => {
            let mut seq = require_run(&db)?;
            if seq.phase() == Phase::Idle {
                // Second press leaves the run entirely.
                let event = seq.exit();
                println!("{}", serde_json::to_string_pretty(&event)?);
                db.kv_delete(RUN_STATE_KEY)?;
            } else {
                let event = seq.reset();
                println!("{}", serde_json::to_string_pretty(&event)?);
                save_sequencer(&db, &seq)?;
            }
        }
        TimerAction::Exit => {
            let mut seq = require_run(&db)?;
            let event = seq.exit();
            println!("{}", serde_json::to_string_pretty(&event)?);
            db.kv_delete(RUN_STATE_KEY)?;
        }
        TimerAction::Status => {
            let mut seq = require_run(&db)?;
            let now = clock.now_ms();
            let events = seq.tick(now);
            println!("{}", serde_json::to_string_pretty(&seq.snapshot(now))?);
            if !events.is_empty() {
                emit(&events, &config)?;
            }
            save_sequencer(&db, &seq)?;
        }
        TimerAction::Watch => {
            let mut seq = require_run(&db)?;
            watch(&mut seq, &config, &clock);
            save_sequencer(&db, &seq)?;
        }
    }

    Ok(())
}

/// Foreground drive loop at the configured tick cadence.
fn watch(seq: &mut EventSequencer, config: &Config, clock: &dyn Clock) {
    let mut sink = TerminalSink {
        audible: config.notifications.enabled && config.notifications.volume > 0,
    };
    let mut hooks = NoopHooks;
    let mut wake_lock_held = false;
    let mut last_display = seq.display_seconds(clock.now_ms());

    loop {
        let now = clock.now_ms();
        let events = seq.tick(now);
        dispatch(
            &events,
            config.notifications.custom_sound.as_deref(),
            config.notifications.vibration,
            &mut sink,
        );

        // Wake lock follows the running phase; denial is irrelevant to
        // timing.
        let running = seq.phase() == Phase::Running;
        if running && !wake_lock_held {
            hooks.request_wake_lock();
            wake_lock_held = true;
        } else if !running && wake_lock_held {
            hooks.release_wake_lock();
            wake_lock_held = false;
        }

        let display = seq.display_seconds(now);
        if display != last_display {
            if running
                && seq
                    .active_segment()
                    .map(|s| s.tick_sound_enabled)
                    .unwrap_or(false)
            {
                sink.play_effect(EffectKind::Tick, false);
            }
            last_display = display;
        }

        render_line(seq, now);
        if matches!(seq.phase(), Phase::Completed | Phase::Idle) {
            println!();
            break;
        }
        std::thread::sleep(Duration::from_millis(config.timer.tick_interval_ms.max(10)));
    }
}

fn render_line(seq: &EventSequencer, now_ms: u64) {
    let line = match seq.phase() {
        Phase::WaitingForSchedule => format!(
            "waiting for schedule  starts in {}",
            seq.schedule_countdown(now_ms).unwrap_or_default()
        ),
        Phase::Transitioning => match seq.transition_names() {
            Some((from, to)) => format!("{from}  ->  {to}"),
            None => "...".into(),
        },
        phase => {
            let name = seq
                .active_segment()
                .map(|s| s.name.as_str())
                .unwrap_or("-");
            let marker = if seq.is_flashing() { " *" } else { "" };
            let color = seq
                .active_alert_color()
                .map(|c| format!(" [{c}]"))
                .unwrap_or_default();
            format!(
                "{name}  {}  ({phase:?}){color}{marker}",
                format_clock(seq.display_seconds(now_ms))
            )
        }
    };
    print!("\r\x1b[2K{line}");
    let _ = std::io::stdout().flush();
}

fn format_clock(secs: u32) -> String {
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}
