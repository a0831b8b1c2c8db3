//! Section trimming.
//!
//! A track is cut to the half-open tick window `[start, end)` and re-based so
//! the window begins at tick 0:
//!
//! - Controller state set before the window (tempo, meter, key, program,
//!   control changes, pitch bend), descriptive metas and SysEx are replayed
//!   at tick 0.
//! - Notes sounding when the window opens are dropped along with their
//!   note-offs.
//! - Notes still sounding when the window closes get a note-off at its end.
//! - Every track ends exactly at the window length.

use std::collections::BTreeMap;

use midly::num::{u4, u7};
use midly::{MetaMessage, MidiMessage, TrackEventKind};

use crate::timeline::TimedEvent;

/// Which piece of playback state an event sets; a later event with the same
/// key replaces the earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StateKey {
    Tempo,
    TimeSignature,
    KeySignature,
    Program(u8),
    Controller(u8, u8),
    PitchBend(u8),
}

enum Carry {
    Keyed(StateKey),
    Always,
    Drop,
}

fn classify(kind: &TrackEventKind<'_>) -> Carry {
    match kind {
        TrackEventKind::Meta(meta) => match meta {
            MetaMessage::Tempo(_) => Carry::Keyed(StateKey::Tempo),
            MetaMessage::TimeSignature(..) => Carry::Keyed(StateKey::TimeSignature),
            MetaMessage::KeySignature(..) => Carry::Keyed(StateKey::KeySignature),
            MetaMessage::TrackNumber(_)
            | MetaMessage::Copyright(_)
            | MetaMessage::TrackName(_)
            | MetaMessage::InstrumentName(_)
            | MetaMessage::ProgramName(_)
            | MetaMessage::DeviceName(_)
            | MetaMessage::MidiChannel(_)
            | MetaMessage::MidiPort(_) => Carry::Always,
            _ => Carry::Drop,
        },
        TrackEventKind::SysEx(_) | TrackEventKind::Escape(_) => Carry::Always,
        TrackEventKind::Midi { channel, message } => {
            let ch = channel.as_int();
            match message {
                MidiMessage::ProgramChange { .. } => Carry::Keyed(StateKey::Program(ch)),
                MidiMessage::Controller { controller, .. } => {
                    Carry::Keyed(StateKey::Controller(ch, controller.as_int()))
                }
                MidiMessage::PitchBend { .. } => Carry::Keyed(StateKey::PitchBend(ch)),
                _ => Carry::Drop,
            }
        }
    }
}

/// Note transitions: `Some(true)` starts a note, `Some(false)` ends one.
fn note_transition(kind: &TrackEventKind<'_>) -> Option<(u8, u8, bool)> {
    match kind {
        TrackEventKind::Midi { channel, message } => match message {
            MidiMessage::NoteOn { key, vel } => {
                Some((channel.as_int(), key.as_int(), vel.as_int() > 0))
            }
            MidiMessage::NoteOff { key, .. } => Some((channel.as_int(), key.as_int(), false)),
            _ => None,
        },
        _ => None,
    }
}

fn is_end_of_track(kind: &TrackEventKind<'_>) -> bool {
    matches!(kind, TrackEventKind::Meta(MetaMessage::EndOfTrack))
}

/// Decrements a note counter, returning whether there was one to release.
fn release(counts: &mut BTreeMap<(u8, u8), u32>, note: (u8, u8)) -> bool {
    match counts.get_mut(&note) {
        Some(count) if *count > 0 => {
            *count -= 1;
            if *count == 0 {
                counts.remove(&note);
            }
            true
        }
        _ => false,
    }
}

/// Cuts one track to `[start, end)` and re-bases it to tick 0.
///
/// `events` must be sorted by tick; the result is too.
pub fn trim_track<'a>(events: &[TimedEvent<'a>], start: u64, end: u64) -> Vec<TimedEvent<'a>> {
    let length = end.saturating_sub(start);

    let mut carried: Vec<(Option<StateKey>, TrackEventKind<'a>)> = Vec::new();
    let mut sounding_at_start: BTreeMap<(u8, u8), u32> = BTreeMap::new();
    let mut inside: Vec<TimedEvent<'a>> = Vec::new();
    let mut sounding_in_window: BTreeMap<(u8, u8), u32> = BTreeMap::new();

    for event in events {
        if is_end_of_track(&event.kind) {
            continue;
        }

        if event.tick < start {
            if let Some((ch, key, on)) = note_transition(&event.kind) {
                if on {
                    *sounding_at_start.entry((ch, key)).or_default() += 1;
                } else {
                    release(&mut sounding_at_start, (ch, key));
                }
                continue;
            }
            match classify(&event.kind) {
                Carry::Keyed(state) => {
                    carried.retain(|(existing, _)| *existing != Some(state));
                    carried.push((Some(state), event.kind));
                }
                Carry::Always => carried.push((None, event.kind)),
                Carry::Drop => {}
            }
            continue;
        }

        if event.tick >= end {
            break;
        }

        if let Some((ch, key, on)) = note_transition(&event.kind) {
            if on {
                *sounding_in_window.entry((ch, key)).or_default() += 1;
            } else if release(&mut sounding_at_start, (ch, key)) {
                // Ends a note that began before the window.
                continue;
            } else {
                release(&mut sounding_in_window, (ch, key));
            }
        }

        inside.push(TimedEvent {
            tick: event.tick - start,
            kind: event.kind,
        });
    }

    let mut out: Vec<TimedEvent<'a>> = carried
        .into_iter()
        .map(|(_, kind)| TimedEvent { tick: 0, kind })
        .collect();
    out.extend(inside);

    for ((ch, key), count) in sounding_in_window {
        for _ in 0..count {
            out.push(TimedEvent {
                tick: length,
                kind: TrackEventKind::Midi {
                    channel: u4::new(ch),
                    message: MidiMessage::NoteOff {
                        key: u7::new(key),
                        vel: u7::new(0),
                    },
                },
            });
        }
    }

    out.push(TimedEvent {
        tick: length,
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    out
}
