//! MIDI transformation: tempo scaling, per-track gain/mute and section trim.

use std::collections::BTreeMap;

use choirloop_spec::{RenderSettings, SectionWindow, TrackIndex, DEFAULT_VOLUME_DB};
use midly::num::{u24, u28, u7};
use midly::{MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};

use crate::error::{TransformError, TransformResult};
use crate::gain::{scale_velocity, TrackGain};
use crate::tempo::{scale_tempo, DEFAULT_TEMPO_US};
use crate::timeline::{song_end_tick, to_absolute, to_track, MeterMap};
use crate::trim::trim_track;

/// Everything the transformer needs to know about a render.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformPlan {
    /// Playback speed in percent of the original.
    pub tempo_percent: u32,
    /// Gain for tracks without an entry in `track_gains`.
    pub default_gain: TrackGain,
    /// Per-track gain overrides.
    pub track_gains: BTreeMap<TrackIndex, TrackGain>,
    /// Section to keep, if any.
    pub section: Option<SectionWindow>,
}

impl Default for TransformPlan {
    fn default() -> Self {
        Self {
            tempo_percent: 100,
            default_gain: TrackGain::UNITY,
            track_gains: BTreeMap::new(),
            section: None,
        }
    }
}

impl TransformPlan {
    /// Plan for canonical render settings.
    pub fn from_settings(settings: &RenderSettings) -> Self {
        let track_gains = settings
            .configured_tracks()
            .into_iter()
            .map(|track| (track, TrackGain::from_settings(settings, track)))
            .collect();

        Self {
            tempo_percent: settings.tempo_percent() as u32,
            default_gain: TrackGain::new(DEFAULT_VOLUME_DB, true),
            track_gains,
            section: settings.section().copied(),
        }
    }

    /// Sets the tempo percentage.
    pub fn tempo_percent(mut self, percent: u32) -> Self {
        self.tempo_percent = percent;
        self
    }

    /// Sets one track's gain.
    pub fn track(mut self, track: TrackIndex, volume_db: i32, enabled: bool) -> Self {
        self.track_gains.insert(track, TrackGain::new(volume_db, enabled));
        self
    }

    /// Sets the section to keep.
    pub fn section(mut self, window: SectionWindow) -> Self {
        self.section = Some(window);
        self
    }

    /// Gain applied to a track.
    pub fn gain_for(&self, track: usize) -> TrackGain {
        TrackIndex::try_from(track)
            .ok()
            .and_then(|index| self.track_gains.get(&index).copied())
            .unwrap_or(self.default_gain)
    }
}

/// Applies a plan to a Standard MIDI File.
///
/// The output keeps the source's format, timing and track count/order. Tempo
/// meta-events are rescaled, note-on velocities are scaled per track, and,
/// when a section is given, every track is trimmed to it. All other events
/// keep their order and spacing.
pub fn transform(source: &[u8], plan: &TransformPlan) -> TransformResult<Vec<u8>> {
    let smf = Smf::parse(source)?;
    let transformed = transform_smf(&smf, plan)?;

    let mut out = Vec::with_capacity(source.len() + 16);
    transformed.write_std(&mut out).map_err(TransformError::Write)?;
    Ok(out)
}

/// Applies a plan to a parsed file.
pub fn transform_smf<'a>(smf: &Smf<'a>, plan: &TransformPlan) -> TransformResult<Smf<'a>> {
    let mut tracks: Vec<Track<'a>> = smf
        .tracks
        .iter()
        .enumerate()
        .map(|(index, track)| {
            let multiplier = plan.gain_for(index).multiplier();
            track
                .iter()
                .map(|event| TrackEvent {
                    delta: event.delta,
                    kind: rewrite_event(event.kind, plan.tempo_percent, multiplier),
                })
                .collect()
        })
        .collect();

    if let Some(window) = &plan.section {
        tracks = trim_tracks(smf.header.timing, &smf.tracks, tracks, window)?;
    }

    if plan.tempo_percent != 100 && matches!(smf.header.timing, Timing::Metrical(_)) {
        ensure_initial_tempo(&mut tracks, plan.tempo_percent);
    }

    Ok(Smf {
        header: smf.header,
        tracks,
    })
}

fn rewrite_event(kind: TrackEventKind<'_>, tempo_percent: u32, multiplier: f64) -> TrackEventKind<'_> {
    match kind {
        TrackEventKind::Meta(MetaMessage::Tempo(us)) => TrackEventKind::Meta(MetaMessage::Tempo(
            u24::new(scale_tempo(us.as_int(), tempo_percent)),
        )),
        TrackEventKind::Midi {
            channel,
            message: MidiMessage::NoteOn { key, vel },
        } if vel.as_int() > 0 => TrackEventKind::Midi {
            channel,
            message: MidiMessage::NoteOn {
                key,
                vel: u7::new(scale_velocity(vel.as_int(), multiplier)),
            },
        },
        other => other,
    }
}

/// Trims already-rewritten tracks; positions are resolved on the source
/// file's meter, which tempo scaling never changes.
fn trim_tracks<'a>(
    timing: Timing,
    source: &[Track<'a>],
    tracks: Vec<Track<'a>>,
    window: &SectionWindow,
) -> TransformResult<Vec<Track<'a>>> {
    let Timing::Metrical(ticks_per_quarter) = timing else {
        return Err(TransformError::UnsupportedTiming);
    };

    let meter = MeterMap::new(ticks_per_quarter.as_int(), source);
    let start = meter.tick_at(window.start())?;
    let end = meter.tick_at(window.end())?;
    let song_end = song_end_tick(source);

    if start >= song_end {
        return Err(TransformError::SectionOutOfRange {
            start: window.start(),
        });
    }
    let end = end.min(song_end);

    log::debug!(
        "Trimming to ticks [{}, {}) of {} ({} .. {})",
        start,
        end,
        song_end,
        window.start(),
        window.end()
    );

    Ok(tracks
        .iter()
        .map(|track| to_track(&trim_track(&to_absolute(track), start, end)))
        .collect())
}

/// Inserts a scaled default tempo when no track sets one at tick 0, so the
/// speed change applies to files that rely on the implicit 120 BPM.
fn ensure_initial_tempo(tracks: &mut [Track<'_>], tempo_percent: u32) {
    let has_initial_tempo = tracks.iter().any(|track| {
        track
            .iter()
            .take_while(|event| event.delta.as_int() == 0)
            .any(|event| matches!(event.kind, TrackEventKind::Meta(MetaMessage::Tempo(_))))
    });
    if has_initial_tempo {
        return;
    }

    if let Some(first) = tracks.first_mut() {
        first.insert(
            0,
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(scale_tempo(
                    DEFAULT_TEMPO_US,
                    tempo_percent,
                )))),
            },
        );
    }
}
