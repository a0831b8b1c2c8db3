//! Transform command implementation
//!
//! Applies a mix to a MIDI file on disk without synthesizing it, which is
//! handy for checking a trim or tempo change in any MIDI player.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use colored::Colorize;

use choirloop_backend_midi::{transform, TransformPlan};
use choirloop_spec::{normalize, NoSections};

use crate::mix::MixArgs;

/// Song id used when normalizing settings for a loose file.
const LOCAL_SONG_ID: &str = "local";

/// Transforms `input` and writes the result to `output`.
///
/// Stored sections are unavailable here; use `--start`/`--end`.
pub fn run(input: &str, output: &str, mix: &MixArgs) -> Result<ExitCode> {
    let settings = normalize(&mix.to_request(LOCAL_SONG_ID), &NoSections)?;
    let plan = TransformPlan::from_settings(&settings);

    let source = std::fs::read(input).with_context(|| format!("Failed to read {}", input))?;
    let transformed = transform(&source, &plan)
        .with_context(|| format!("Failed to transform {}", input))?;
    std::fs::write(Path::new(output), &transformed)
        .with_context(|| format!("Failed to write {}", output))?;

    println!(
        "{} {} -> {} ({} bytes)",
        "SUCCESS".green().bold(),
        input,
        output,
        transformed.len()
    );
    println!("  {}: {}", "Settings".dimmed(), settings.canonical_json());

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::num::{u15, u24, u28, u4, u7};
    use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

    fn source_file() -> Vec<u8> {
        let track = vec![
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(500_000))),
            },
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Midi {
                    channel: u4::new(0),
                    message: MidiMessage::NoteOn {
                        key: u7::new(60),
                        vel: u7::new(100),
                    },
                },
            },
            TrackEvent {
                delta: u28::new(1920),
                kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
            },
        ];
        let smf = Smf {
            header: Header::new(Format::SingleTrack, Timing::Metrical(u15::new(480))),
            tracks: vec![track],
        };
        let mut out = Vec::new();
        smf.write_std(&mut out).unwrap();
        out
    }

    #[test]
    fn test_transform_writes_scaled_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mid");
        let output = dir.path().join("out.mid");
        std::fs::write(&input, source_file()).unwrap();

        let mix = MixArgs {
            tempo: Some(50),
            ..Default::default()
        };
        run(
            input.to_str().unwrap(),
            output.to_str().unwrap(),
            &mix,
        )
        .unwrap();

        let bytes = std::fs::read(&output).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        assert_eq!(
            smf.tracks[0][0].kind,
            TrackEventKind::Meta(MetaMessage::Tempo(u24::new(1_000_000)))
        );
    }

    #[test]
    fn test_invalid_mix_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mid");
        let output = dir.path().join("out.mid");
        std::fs::write(&input, source_file()).unwrap();

        let mix = MixArgs {
            tempo: Some(400),
            ..Default::default()
        };
        assert!(run(input.to_str().unwrap(), output.to_str().unwrap(), &mix).is_err());
        assert!(!output.exists());
    }

    #[test]
    fn test_stored_section_unavailable() {
        let mix = MixArgs {
            section: Some("chorus".to_string()),
            ..Default::default()
        };
        let err = run("in.mid", "out.mid", &mix).unwrap_err();
        assert!(err.to_string().contains("chorus"));
    }
}
