//! Tracks command implementation

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use colored::Colorize;

use choirloop_backend_midi::{discover_tracks, TrackInfo};

use super::json_output::{error_codes, JsonError, TracksOutput};
use super::CliContext;

/// Where to read the MIDI from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSource<'a> {
    /// A song in the library.
    Song(&'a str),
    /// A MIDI file on disk.
    File(&'a str),
}

/// Lists the tracks that hold notes, for building a mixer.
///
/// # Arguments
/// * `ctx` - Library, cache and config locations
/// * `source` - Library song or MIDI file
/// * `json` - Whether to output machine-readable JSON
pub fn run(ctx: &CliContext, source: TrackSource<'_>, json: bool) -> Result<ExitCode> {
    let tracks = match source {
        TrackSource::Song(song_id) => match ctx.renderer()?.discover_tracks(song_id) {
            Ok(tracks) => tracks,
            Err(e) if json => {
                TracksOutput::failure(JsonError::from(&e)).print()?;
                return Ok(ExitCode::from(1));
            }
            Err(e) => return Err(e.into()),
        },
        TrackSource::File(path) => match read_midi(Path::new(path)) {
            Ok(midi) => discover_tracks(&midi),
            Err(e) if json => {
                TracksOutput::failure(JsonError::new(error_codes::FILE_READ, format!("{:#}", e)))
                    .print()?;
                return Ok(ExitCode::from(1));
            }
            Err(e) => return Err(e),
        },
    };

    if json {
        TracksOutput::success(tracks).print()?;
    } else {
        print_tracks(&tracks);
    }

    Ok(ExitCode::SUCCESS)
}

fn read_midi(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn print_tracks(tracks: &[TrackInfo]) {
    if tracks.is_empty() {
        println!("{}", "No tracks with notes".dimmed());
        return;
    }

    println!("{}", "Tracks".cyan().bold());
    for track in tracks {
        let mut details = vec![format!("{} notes", track.note_count)];
        if let Some(channel) = track.channel {
            details.push(format!("channel {}", channel + 1));
        }
        if let Some(program) = track.program {
            details.push(format!("program {}", program));
        }
        if let Some(voice) = track.suggested_voice {
            details.push(format!("voice {}", voice));
        }
        println!(
            "  {:>3}  {}  {}",
            track.track_number.to_string().bold(),
            track.name,
            details.join(", ").dimmed()
        );
    }
}
