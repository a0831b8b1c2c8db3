//! Raw render requests as received from callers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Render request fields exactly as a caller sent them.
///
/// Track maps are keyed by strings because that is how JSON objects arrive;
/// [`normalize`](crate::normalize::normalize) parses and validates them.
///
/// # Example
///
/// ```
/// use choirloop_spec::RenderRequest;
///
/// let request: RenderRequest = serde_json::from_str(r#"{
///     "song_id": "ave-maria",
///     "tempo": 80,
///     "track_volumes": {"0": -6},
///     "enabled_tracks": {"2": false}
/// }"#).unwrap();
/// assert_eq!(request.tempo, Some(80));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderRequest {
    /// Song to render.
    pub song_id: String,
    /// Tempo percentage; 100 when absent.
    pub tempo: Option<i64>,
    /// Track volumes in decibels, keyed by track index.
    pub track_volumes: HashMap<String, i64>,
    /// Track enable flags, keyed by track index.
    pub enabled_tracks: HashMap<String, bool>,
    /// Stored practice section to render.
    pub section_id: Option<String>,
    /// Explicit section start measure.
    pub start_measure: Option<i64>,
    /// Explicit section start beat.
    pub start_beat: Option<i64>,
    /// Explicit section end measure.
    pub end_measure: Option<i64>,
    /// Explicit section end beat.
    pub end_beat: Option<i64>,
}

impl RenderRequest {
    /// Creates a request for a song with every other field defaulted.
    pub fn new(song_id: impl Into<String>) -> Self {
        Self {
            song_id: song_id.into(),
            ..Default::default()
        }
    }

    /// Sets the tempo percentage.
    pub fn tempo(mut self, percent: i64) -> Self {
        self.tempo = Some(percent);
        self
    }

    /// Sets one track's volume in decibels.
    pub fn volume(mut self, track: u16, db: i64) -> Self {
        self.track_volumes.insert(track.to_string(), db);
        self
    }

    /// Enables or disables one track.
    pub fn enabled(mut self, track: u16, enabled: bool) -> Self {
        self.enabled_tracks.insert(track.to_string(), enabled);
        self
    }

    /// Renders a stored practice section.
    pub fn section_id(mut self, id: impl Into<String>) -> Self {
        self.section_id = Some(id.into());
        self
    }

    /// Renders an explicit section.
    pub fn section(mut self, start_measure: i64, start_beat: i64, end_measure: i64, end_beat: i64) -> Self {
        self.start_measure = Some(start_measure);
        self.start_beat = Some(start_beat);
        self.end_measure = Some(end_measure);
        self.end_beat = Some(end_beat);
        self
    }

    /// Whether any explicit section bound was supplied.
    pub fn has_explicit_bounds(&self) -> bool {
        self.start_measure.is_some()
            || self.start_beat.is_some()
            || self.end_measure.is_some()
            || self.end_beat.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let request = RenderRequest::new("song")
            .tempo(120)
            .volume(0, -6)
            .enabled(1, false)
            .section(2, 1, 4, 1);

        assert_eq!(request.song_id, "song");
        assert_eq!(request.tempo, Some(120));
        assert_eq!(request.track_volumes.get("0"), Some(&-6));
        assert_eq!(request.enabled_tracks.get("1"), Some(&false));
        assert!(request.has_explicit_bounds());
    }

    #[test]
    fn test_deserialize_defaults() {
        let request: RenderRequest = serde_json::from_str(r#"{"song_id": "x"}"#).unwrap();
        assert_eq!(request, RenderRequest::new("x"));
        assert!(!request.has_explicit_bounds());
    }
}
