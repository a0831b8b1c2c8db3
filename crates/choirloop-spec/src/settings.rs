//! Canonical render settings.
//!
//! A [`RenderSettings`] value is only produced by
//! [`normalize`](crate::normalize::normalize), so every instance is already
//! validated and stores its per-track maps in canonical form: sorted by track
//! index, with entries equal to the default pruned.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, ValidationError};
use crate::hash::{canonical_value_hash, canonicalize_json, Fingerprint};

/// Version tag mixed into every canonical settings document.
pub const SETTINGS_VERSION: u32 = 2;

/// Sample rate of every synthesized waveform, in Hz.
pub const OUTPUT_SAMPLE_RATE: u32 = 44_100;

/// Bitrate of every encoded preview, in kbps.
pub const OUTPUT_BITRATE_KBPS: u32 = 192;

/// Lowest accepted tempo percentage.
pub const MIN_TEMPO_PERCENT: u16 = 50;

/// Highest accepted tempo percentage.
pub const MAX_TEMPO_PERCENT: u16 = 150;

/// Tempo percentage used when the request does not give one.
pub const DEFAULT_TEMPO_PERCENT: u16 = 100;

/// Volume applied to tracks without an explicit entry.
pub const DEFAULT_VOLUME_DB: i32 = -10;

/// Quietest accepted track volume.
pub const MIN_VOLUME_DB: i32 = -100;

/// Loudest accepted track volume. Gains above 0 dB are clamped at render time.
pub const MAX_VOLUME_DB: i32 = 12;

/// Zero-based index of a track in the source MIDI file.
pub type TrackIndex = u16;

/// A position in the score, both parts 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BeatPosition {
    /// Measure number, starting at 1.
    pub measure: u32,
    /// Beat within the measure, starting at 1.
    pub beat: u32,
}

impl BeatPosition {
    /// Creates a new beat position.
    pub fn new(measure: u32, beat: u32) -> Self {
        Self { measure, beat }
    }
}

impl std::fmt::Display for BeatPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.measure, self.beat)
    }
}

/// A half-open section of the score: `start` is the first beat played, `end`
/// the first beat no longer played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SectionWindow {
    start: BeatPosition,
    end: BeatPosition,
}

impl SectionWindow {
    /// Creates a section window, checking that both positions are 1-based and
    /// that `end` comes strictly after `start`.
    pub fn new(start: BeatPosition, end: BeatPosition) -> Result<Self, ValidationError> {
        let bounds = [
            ("start_measure", start.measure),
            ("start_beat", start.beat),
            ("end_measure", end.measure),
            ("end_beat", end.beat),
        ];
        for (field, value) in bounds {
            if value < 1 {
                return Err(ValidationError::new(
                    ErrorCode::SectionBoundTooSmall,
                    field,
                    format!("{} must be at least 1, got {}", field, value),
                ));
            }
        }

        if end <= start {
            return Err(ValidationError::new(
                ErrorCode::SectionNotAscending,
                "end_measure",
                format!("section end {} must come after start {}", end, start),
            ));
        }

        Ok(Self { start, end })
    }

    /// First beat inside the section.
    pub fn start(&self) -> BeatPosition {
        self.start
    }

    /// First beat after the section.
    pub fn end(&self) -> BeatPosition {
        self.end
    }
}

/// Validated, canonical render settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    pub(crate) song_id: String,
    pub(crate) tempo_percent: u16,
    pub(crate) track_volumes: BTreeMap<TrackIndex, i32>,
    pub(crate) enabled_tracks: BTreeMap<TrackIndex, bool>,
    pub(crate) section: Option<SectionWindow>,
    pub(crate) soundbank: Option<String>,
}

impl RenderSettings {
    /// Song the settings apply to.
    pub fn song_id(&self) -> &str {
        &self.song_id
    }

    /// Playback speed as a percentage of the original tempo.
    pub fn tempo_percent(&self) -> u16 {
        self.tempo_percent
    }

    /// Volume for a track in decibels, falling back to [`DEFAULT_VOLUME_DB`].
    pub fn volume_db(&self, track: TrackIndex) -> i32 {
        self.track_volumes
            .get(&track)
            .copied()
            .unwrap_or(DEFAULT_VOLUME_DB)
    }

    /// Whether a track is audible, defaulting to `true`.
    pub fn is_enabled(&self, track: TrackIndex) -> bool {
        self.enabled_tracks.get(&track).copied().unwrap_or(true)
    }

    /// Non-default volume entries.
    pub fn track_volumes(&self) -> &BTreeMap<TrackIndex, i32> {
        &self.track_volumes
    }

    /// Non-default (disabled) track entries.
    pub fn enabled_tracks(&self) -> &BTreeMap<TrackIndex, bool> {
        &self.enabled_tracks
    }

    /// Tracks with any non-default setting.
    pub fn configured_tracks(&self) -> BTreeSet<TrackIndex> {
        self.track_volumes
            .keys()
            .chain(self.enabled_tracks.keys())
            .copied()
            .collect()
    }

    /// Name of the instrument soundbank the audio is synthesized with.
    pub fn soundbank(&self) -> Option<&str> {
        self.soundbank.as_deref()
    }

    /// Records the soundbank a renderer synthesizes with. Different
    /// soundbanks produce different audio, so the name is hashed.
    pub fn with_soundbank(mut self, name: impl Into<String>) -> Self {
        self.soundbank = Some(name.into());
        self
    }

    /// Section to render, if trimming was requested.
    pub fn section(&self) -> Option<&SectionWindow> {
        self.section.as_ref()
    }

    /// The settings as a JSON document, before canonical serialization.
    pub fn to_value(&self) -> serde_json::Value {
        let volumes: serde_json::Map<String, serde_json::Value> = self
            .track_volumes
            .iter()
            .map(|(track, db)| (track.to_string(), serde_json::Value::from(*db)))
            .collect();
        let enabled: serde_json::Map<String, serde_json::Value> = self
            .enabled_tracks
            .iter()
            .map(|(track, on)| (track.to_string(), serde_json::Value::from(*on)))
            .collect();
        let section = match &self.section {
            Some(window) => serde_json::json!({
                "start": { "measure": window.start.measure, "beat": window.start.beat },
                "end": { "measure": window.end.measure, "beat": window.end.beat },
            }),
            None => serde_json::Value::Null,
        };

        serde_json::json!({
            "version": SETTINGS_VERSION,
            "output": {
                "sample_rate": OUTPUT_SAMPLE_RATE,
                "bitrate_kbps": OUTPUT_BITRATE_KBPS,
                "soundbank": self.soundbank,
            },
            "song_id": self.song_id,
            "tempo_percent": self.tempo_percent,
            "track_volumes": volumes,
            "enabled_tracks": enabled,
            "section": section,
        })
    }

    /// Canonical serialized form: sorted keys, no whitespace, integers only.
    pub fn canonical_json(&self) -> String {
        canonicalize_json(&self.to_value())
    }

    /// Fingerprint naming this exact settings combination.
    pub fn fingerprint(&self) -> Fingerprint {
        canonical_value_hash(&self.to_value())
    }
}
