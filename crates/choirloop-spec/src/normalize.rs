//! Settings normalization: raw request in, canonical [`RenderSettings`] out.

use std::collections::BTreeMap;

use crate::error::{ErrorCode, NormalizeError, ValidationError};
use crate::request::RenderRequest;
use crate::settings::{
    BeatPosition, RenderSettings, SectionWindow, TrackIndex, DEFAULT_TEMPO_PERCENT,
    DEFAULT_VOLUME_DB, MAX_TEMPO_PERCENT, MAX_VOLUME_DB, MIN_TEMPO_PERCENT, MIN_VOLUME_DB,
};

/// Looks up stored practice sections by id.
pub trait SectionResolver {
    /// Returns the bounds of a song's practice section, or `None` if the song
    /// has no section with that id.
    fn resolve_section(&self, song_id: &str, section_id: &str) -> Option<SectionWindow>;
}

/// Resolver for callers without stored sections; every reference is unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSections;

impl SectionResolver for NoSections {
    fn resolve_section(&self, _song_id: &str, _section_id: &str) -> Option<SectionWindow> {
        None
    }
}

/// Validates a raw request and produces canonical settings.
///
/// Defaults are applied (tempo 100, volume -10 dB, tracks enabled) and
/// entries equal to their default are dropped, so requests that differ only
/// in map order or in spelling out defaults normalize to equal values.
///
/// # Example
/// ```
/// use choirloop_spec::normalize::{normalize, NoSections};
/// use choirloop_spec::RenderRequest;
///
/// let a = normalize(&RenderRequest::new("song").volume(0, -10), &NoSections).unwrap();
/// let b = normalize(&RenderRequest::new("song"), &NoSections).unwrap();
/// assert_eq!(a.fingerprint(), b.fingerprint());
/// ```
pub fn normalize(
    request: &RenderRequest,
    sections: &dyn SectionResolver,
) -> Result<RenderSettings, NormalizeError> {
    if request.song_id.trim().is_empty() {
        return Err(ValidationError::new(
            ErrorCode::EmptySongId,
            "song_id",
            "song id must not be empty",
        )
        .into());
    }

    let tempo_percent = normalize_tempo(request.tempo)?;

    let mut track_volumes = BTreeMap::new();
    for (key, db) in sorted_entries(&request.track_volumes) {
        let track = parse_track_index("track_volumes", key)?;
        if !(MIN_VOLUME_DB as i64..=MAX_VOLUME_DB as i64).contains(db) {
            return Err(ValidationError::new(
                ErrorCode::VolumeOutOfRange,
                format!("track_volumes[{:?}]", key),
                format!(
                    "volume must be between {} and {} dB, got {}",
                    MIN_VOLUME_DB, MAX_VOLUME_DB, db
                ),
            )
            .into());
        }
        let db = *db as i32;
        if db != DEFAULT_VOLUME_DB {
            track_volumes.insert(track, db);
        }
    }

    let mut enabled_tracks = BTreeMap::new();
    for (key, enabled) in sorted_entries(&request.enabled_tracks) {
        let track = parse_track_index("enabled_tracks", key)?;
        if !*enabled {
            enabled_tracks.insert(track, false);
        }
    }

    let section = normalize_section(request, sections)?;

    Ok(RenderSettings {
        song_id: request.song_id.clone(),
        tempo_percent,
        track_volumes,
        enabled_tracks,
        section,
        soundbank: None,
    })
}

fn normalize_tempo(tempo: Option<i64>) -> Result<u16, ValidationError> {
    let Some(tempo) = tempo else {
        return Ok(DEFAULT_TEMPO_PERCENT);
    };
    if !(MIN_TEMPO_PERCENT as i64..=MAX_TEMPO_PERCENT as i64).contains(&tempo) {
        return Err(ValidationError::new(
            ErrorCode::TempoOutOfRange,
            "tempo",
            format!(
                "tempo must be between {} and {} percent, got {}",
                MIN_TEMPO_PERCENT, MAX_TEMPO_PERCENT, tempo
            ),
        ));
    }
    Ok(tempo as u16)
}

/// Map entries in key order, so the first reported error does not depend on
/// hash map iteration.
fn sorted_entries<V>(map: &std::collections::HashMap<String, V>) -> Vec<(&String, &V)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

/// Parses a track key. Only the plain decimal spelling is accepted so that
/// "7" and "007" can never both name track 7.
fn parse_track_index(map: &str, key: &str) -> Result<TrackIndex, ValidationError> {
    match key.parse::<TrackIndex>() {
        Ok(track) if track.to_string() == key => Ok(track),
        _ => Err(ValidationError::new(
            ErrorCode::InvalidTrackIndex,
            format!("{}[{:?}]", map, key),
            format!("track key must be an integer between 0 and {}", TrackIndex::MAX),
        )),
    }
}

fn normalize_section(
    request: &RenderRequest,
    sections: &dyn SectionResolver,
) -> Result<Option<SectionWindow>, NormalizeError> {
    if let Some(section_id) = &request.section_id {
        if request.has_explicit_bounds() {
            return Err(ValidationError::new(
                ErrorCode::ConflictingSection,
                "section_id",
                "give either a section id or explicit bounds, not both",
            )
            .into());
        }
        return sections
            .resolve_section(&request.song_id, section_id)
            .map(Some)
            .ok_or_else(|| NormalizeError::SectionNotFound {
                song_id: request.song_id.clone(),
                section_id: section_id.clone(),
            });
    }

    if !request.has_explicit_bounds() {
        return Ok(None);
    }

    let start = BeatPosition::new(
        section_bound("start_measure", request.start_measure)?,
        section_bound("start_beat", request.start_beat)?,
    );
    let end = BeatPosition::new(
        section_bound("end_measure", request.end_measure)?,
        section_bound("end_beat", request.end_beat)?,
    );
    Ok(Some(SectionWindow::new(start, end)?))
}

fn section_bound(field: &str, value: Option<i64>) -> Result<u32, ValidationError> {
    let value = value.ok_or_else(|| {
        ValidationError::new(
            ErrorCode::IncompleteSection,
            field,
            format!("{} is required when any section bound is given", field),
        )
    })?;
    if value < 1 {
        return Err(ValidationError::new(
            ErrorCode::SectionBoundTooSmall,
            field,
            format!("{} must be at least 1, got {}", field, value),
        ));
    }
    u32::try_from(value).map_err(|_| {
        ValidationError::new(
            ErrorCode::SectionBoundTooSmall,
            field,
            format!("{} is out of range: {}", field, value),
        )
    })
}
