//! Error types for the MIDI backend.

use choirloop_spec::{BackendError, BeatPosition};
use thiserror::Error;

/// Result type for MIDI backend operations.
pub type TransformResult<T> = Result<T, TransformError>;

/// Errors that can occur while transforming a MIDI file.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The source bytes are not a readable Standard MIDI File.
    #[error("malformed MIDI file: {0}")]
    Parse(#[from] midly::Error),

    /// Serializing the transformed file failed.
    #[error("failed to write MIDI file: {0}")]
    Write(#[source] std::io::Error),

    /// Section trimming needs metrical (ticks per quarter note) timing.
    #[error("section trimming requires metrical timing; file uses SMPTE timecode")]
    UnsupportedTiming,

    /// A section bound names a beat the measure does not have.
    #[error("beat {position} is outside a {numerator}-beat measure")]
    BeatOutOfRange { position: BeatPosition, numerator: u32 },

    /// The section starts at or after the end of the song.
    #[error("section starting at {start} begins after the song ends")]
    SectionOutOfRange { start: BeatPosition },
}

impl BackendError for TransformError {
    fn code(&self) -> &'static str {
        match self {
            TransformError::Parse(_) => "MIDI_001",
            TransformError::Write(_) => "MIDI_002",
            TransformError::UnsupportedTiming => "MIDI_003",
            TransformError::BeatOutOfRange { .. } => "MIDI_004",
            TransformError::SectionOutOfRange { .. } => "MIDI_005",
        }
    }

    fn category(&self) -> &'static str {
        "midi"
    }
}
