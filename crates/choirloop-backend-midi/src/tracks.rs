//! Per-track descriptive metadata.

use midly::{MetaMessage, MidiMessage, Smf, Track, TrackEventKind};
use serde::Serialize;

/// Voice keywords matched against track names, in priority order.
const VOICE_PATTERNS: &[(&str, &[&str])] = &[
    ("Soprano", &["soprano", "sop"]),
    ("Alto", &["alto", "alt"]),
    ("Tenor", &["tenor", "ten"]),
    ("Bass", &["bass", "bas"]),
    ("Piano", &["piano", "pno", "accomp"]),
    ("Organ", &["organ", "org"]),
];

/// What a caller needs to label a track in a mixer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackInfo {
    /// Zero-based index, the key used in volume and enabled maps.
    pub track_number: u16,
    /// Track name meta-event, or `Track N` (one-based).
    pub name: String,
    /// Channel of the first channel-voice event.
    pub channel: Option<u8>,
    /// Number of sounding note-ons.
    pub note_count: usize,
    /// First program change.
    pub program: Option<u8>,
    /// Voice part guessed from the name.
    pub suggested_voice: Option<&'static str>,
}

/// Lists the tracks of a MIDI file that contain notes.
///
/// Metadata is advisory: a file that cannot be parsed is logged and reported
/// as having no tracks instead of failing.
pub fn discover_tracks(midi: &[u8]) -> Vec<TrackInfo> {
    match Smf::parse(midi) {
        Ok(smf) => smf
            .tracks
            .iter()
            .enumerate()
            .filter_map(|(index, track)| analyze_track(index, track))
            .collect(),
        Err(e) => {
            log::warn!("Could not read track metadata: {}", e);
            Vec::new()
        }
    }
}

fn analyze_track(index: usize, track: &Track<'_>) -> Option<TrackInfo> {
    let track_number = u16::try_from(index).ok()?;
    let mut name = None;
    let mut channel = None;
    let mut program = None;
    let mut note_count = 0;

    for event in track {
        match event.kind {
            TrackEventKind::Meta(MetaMessage::TrackName(bytes)) if name.is_none() => {
                let text = String::from_utf8_lossy(bytes).trim().to_string();
                if !text.is_empty() {
                    name = Some(text);
                }
            }
            TrackEventKind::Midi {
                channel: ch,
                message,
            } => {
                channel.get_or_insert(ch.as_int());
                match message {
                    MidiMessage::NoteOn { vel, .. } if vel.as_int() > 0 => note_count += 1,
                    MidiMessage::ProgramChange { program: p } => {
                        program.get_or_insert(p.as_int());
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    if note_count == 0 {
        return None;
    }

    let name = name.unwrap_or_else(|| format!("Track {}", index + 1));
    let suggested_voice = suggest_voice(&name);
    Some(TrackInfo {
        track_number,
        name,
        channel,
        note_count,
        program,
        suggested_voice,
    })
}

/// Guesses the voice part from a track name.
pub fn suggest_voice(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    VOICE_PATTERNS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| lower.contains(p)))
        .map(|(voice, _)| *voice)
}
