//! Tick timeline helpers: absolute event times and measure/beat positions.

use choirloop_spec::BeatPosition;
use midly::num::u28;
use midly::{MetaMessage, Track, TrackEvent, TrackEventKind};

use crate::error::{TransformError, TransformResult};

/// Largest delta time a track event can hold (28 bits).
const MAX_DELTA: u64 = 0x0FFF_FFFF;

/// An event placed at an absolute tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedEvent<'a> {
    /// Ticks since the start of the track.
    pub tick: u64,
    /// The event itself.
    pub kind: TrackEventKind<'a>,
}

/// Converts delta-timed track events to absolute ticks.
pub fn to_absolute<'a>(track: &[TrackEvent<'a>]) -> Vec<TimedEvent<'a>> {
    let mut tick = 0u64;
    track
        .iter()
        .map(|event| {
            tick += event.delta.as_int() as u64;
            TimedEvent {
                tick,
                kind: event.kind,
            }
        })
        .collect()
}

/// Converts absolutely-timed events (sorted by tick) back to a track.
pub fn to_track<'a>(events: &[TimedEvent<'a>]) -> Track<'a> {
    let mut last = 0u64;
    events
        .iter()
        .map(|event| {
            let delta = event.tick.saturating_sub(last).min(MAX_DELTA);
            last = event.tick.max(last);
            TrackEvent {
                delta: u28::new(delta as u32),
                kind: event.kind,
            }
        })
        .collect()
}

/// Tick of the last event in any track.
pub fn song_end_tick(tracks: &[Track<'_>]) -> u64 {
    tracks
        .iter()
        .map(|track| track.iter().map(|e| e.delta.as_int() as u64).sum::<u64>())
        .max()
        .unwrap_or(0)
}

/// A stretch of the score with one time signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MeterSegment {
    start_tick: u64,
    start_measure: u64,
    numerator: u32,
    beat_ticks: u64,
}

impl MeterSegment {
    fn measure_ticks(&self) -> u64 {
        self.numerator as u64 * self.beat_ticks
    }
}

/// Maps measure/beat positions to ticks using a file's time signatures.
///
/// A beat is one denominator unit of the current time signature; files
/// without a time signature are read as 4/4. A time signature that appears
/// mid-measure starts a new measure at that tick.
#[derive(Debug, Clone)]
pub struct MeterMap {
    segments: Vec<MeterSegment>,
}

impl MeterMap {
    /// Builds the map from every time-signature event in the file.
    pub fn new(ticks_per_quarter: u16, tracks: &[Track<'_>]) -> Self {
        let tpq = ticks_per_quarter.max(1) as u64;

        let mut changes: Vec<(u64, u32, u64)> = Vec::new();
        for track in tracks {
            for event in to_absolute(track) {
                if let TrackEventKind::Meta(MetaMessage::TimeSignature(num, denom_pow, _, _)) =
                    event.kind
                {
                    let beat_ticks = (tpq * 4).checked_shr(denom_pow as u32).unwrap_or(0).max(1);
                    changes.push((event.tick, num.max(1) as u32, beat_ticks));
                }
            }
        }
        // Stable: for equal ticks the later track wins.
        changes.sort_by_key(|(tick, _, _)| *tick);

        let mut segments = vec![MeterSegment {
            start_tick: 0,
            start_measure: 1,
            numerator: 4,
            beat_ticks: tpq,
        }];

        for (tick, numerator, beat_ticks) in changes {
            let Some(current) = segments.last_mut() else {
                break;
            };
            if tick == current.start_tick {
                current.numerator = numerator;
                current.beat_ticks = beat_ticks;
                continue;
            }
            let elapsed = tick - current.start_tick;
            let measures = elapsed.div_ceil(current.measure_ticks());
            let start_measure = current.start_measure + measures;
            segments.push(MeterSegment {
                start_tick: tick,
                start_measure,
                numerator,
                beat_ticks,
            });
        }

        Self { segments }
    }

    /// Tick at which a measure/beat position begins.
    pub fn tick_at(&self, position: BeatPosition) -> TransformResult<u64> {
        let measure = position.measure.max(1) as u64;
        let segment = self
            .segments
            .iter()
            .rev()
            .find(|segment| segment.start_measure <= measure)
            .unwrap_or(&self.segments[0]);

        if position.beat < 1 || position.beat > segment.numerator {
            return Err(TransformError::BeatOutOfRange {
                position,
                numerator: segment.numerator,
            });
        }

        Ok(segment.start_tick
            + (measure - segment.start_measure) * segment.measure_ticks()
            + (position.beat as u64 - 1) * segment.beat_ticks)
    }
}
