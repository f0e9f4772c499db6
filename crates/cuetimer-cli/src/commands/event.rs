use clap::Subcommand;
use cuetimer_core::model::{AlertDef, Direction, EventDef, Segment};
use cuetimer_core::storage::Database;
use cuetimer_core::timer::now_ms;
use cuetimer_core::Phase;
use uuid::Uuid;

use super::timer::load_sequencer;

#[derive(Subcommand)]
pub enum EventAction {
    /// Create a new empty event
    Create {
        /// Display title
        title: String,
    },
    /// List stored events
    List,
    /// Print one event document as JSON
    Show { event_id: String },
    /// Delete an event
    Delete { event_id: String },
    /// Append a segment to an event
    AddSegment {
        event_id: String,
        /// Display label
        name: String,
        /// Duration in seconds; for count-up, 0 means unbounded
        #[arg(long, default_value = "300")]
        duration: u32,
        /// Count up instead of down
        #[arg(long)]
        countup: bool,
        /// Per-second tick sound while running
        #[arg(long)]
        tick_sound: bool,
    },
    /// Remove a segment from an event
    RemoveSegment {
        event_id: String,
        segment_id: String,
    },
    /// Attach a threshold alert to a segment
    AddAlert {
        event_id: String,
        segment_id: String,
        /// Threshold in seconds: remaining for countdown, elapsed for count-up
        #[arg(long)]
        threshold: u32,
        /// Display color to apply
        #[arg(long, default_value = "#f59e0b")]
        color: String,
        /// Momentary color only; do not persist as background
        #[arg(long)]
        momentary: bool,
        /// Trigger the blink sequence
        #[arg(long)]
        flash: bool,
        /// Play a sound cue
        #[arg(long)]
        sound: bool,
    },
    /// Schedule the event to auto-start at a wall-clock instant
    SetSchedule {
        event_id: String,
        /// Absolute start instant in epoch milliseconds
        #[arg(long, conflicts_with = "in_secs")]
        at_epoch_ms: Option<u64>,
        /// Start this many seconds from now
        #[arg(long)]
        in_secs: Option<u64>,
    },
    /// Clear a scheduled start
    ClearSchedule { event_id: String },
}

pub fn run(action: EventAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        EventAction::Create { title } => {
            let event = EventDef {
                id: Uuid::new_v4().to_string(),
                title,
                segments: vec![],
                scheduled_start_epoch_ms: None,
            };
            db.put_event(&event)?;
            println!("event created: {}", event.id);
        }
        EventAction::List => {
            let events = db.list_events()?;
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
        EventAction::Show { event_id } => {
            let event = db.get_event(&event_id)?;
            println!("{}", serde_json::to_string_pretty(&event)?);
        }
        EventAction::Delete { event_id } => {
            if db.delete_event(&event_id)? {
                println!("event deleted: {event_id}");
            } else {
                eprintln!("no such event: {event_id}");
                std::process::exit(1);
            }
        }
        EventAction::AddSegment {
            event_id,
            name,
            duration,
            countup,
            tick_sound,
        } => {
            let mut event = db.get_event(&event_id)?;
            let segment = Segment {
                id: Uuid::new_v4().to_string(),
                name,
                duration_seconds: duration,
                direction: if countup {
                    Direction::Countup
                } else {
                    Direction::Countdown
                },
                alerts: vec![],
                completion_sound_enabled: true,
                completion_flash_enabled: true,
                tick_sound_enabled: tick_sound,
            };
            println!("segment added: {}", segment.id);
            event.segments.push(segment);
            db.put_event(&event)?;
        }
        EventAction::RemoveSegment {
            event_id,
            segment_id,
        } => {
            let mut event = db.get_event(&event_id)?;
            // The active running segment cannot be removed out from
            // under the run.
            if let Some(seq) = load_sequencer(&db) {
                let live = !matches!(seq.phase(), Phase::Idle | Phase::Completed);
                if live
                    && seq.event().id == event_id
                    && seq.active_segment().map(|s| s.id.as_str()) == Some(segment_id.as_str())
                {
                    return Err("segment is active in the current run; exit the run first".into());
                }
            }
            let before = event.segments.len();
            event.segments.retain(|s| s.id != segment_id);
            if event.segments.len() == before {
                eprintln!("no such segment: {segment_id}");
                std::process::exit(1);
            }
            db.put_event(&event)?;
            println!("segment removed: {segment_id}");
        }
        EventAction::AddAlert {
            event_id,
            segment_id,
            threshold,
            color,
            momentary,
            flash,
            sound,
        } => {
            let mut event = db.get_event(&event_id)?;
            let segment = event
                .segments
                .iter_mut()
                .find(|s| s.id == segment_id)
                .ok_or_else(|| format!("no such segment: {segment_id}"))?;
            let alert = AlertDef {
                id: Uuid::new_v4().to_string(),
                threshold_seconds: threshold,
                color,
                persist_background: !momentary,
                flash,
                sound,
            };
            println!("alert added: {}", alert.id);
            segment.alerts.push(alert);
            db.put_event(&event)?;
        }
        EventAction::SetSchedule {
            event_id,
            at_epoch_ms,
            in_secs,
        } => {
            let target = at_epoch_ms
                .or_else(|| in_secs.map(|s| now_ms() + s * 1000))
                .ok_or("provide --at-epoch-ms or --in-secs")?;
            let mut event = db.get_event(&event_id)?;
            event.scheduled_start_epoch_ms = Some(target);
            db.put_event(&event)?;
            println!("scheduled start set: {target}");
        }
        EventAction::ClearSchedule { event_id } => {
            let mut event = db.get_event(&event_id)?;
            event.scheduled_start_epoch_ms = None;
            db.put_event(&event)?;
            println!("scheduled start cleared");
        }
    }

    Ok(())
}
