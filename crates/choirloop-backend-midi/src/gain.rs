//! Track gain: decibels to note-velocity multipliers.

use choirloop_spec::RenderSettings;

/// At or below this level a track is treated as silent.
pub const SILENCE_FLOOR_DB: i32 = -60;

/// Highest MIDI note velocity.
pub const MAX_VELOCITY: u8 = 127;

/// Volume and mute state of one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackGain {
    /// Volume in decibels.
    pub volume_db: i32,
    /// Disabled tracks are silenced regardless of volume.
    pub enabled: bool,
}

impl TrackGain {
    /// Unity gain: 0 dB, enabled.
    pub const UNITY: TrackGain = TrackGain {
        volume_db: 0,
        enabled: true,
    };

    /// Creates a track gain.
    pub fn new(volume_db: i32, enabled: bool) -> Self {
        Self { volume_db, enabled }
    }

    /// Gain of a track under the given settings.
    pub fn from_settings(settings: &RenderSettings, track: u16) -> Self {
        Self::new(settings.volume_db(track), settings.is_enabled(track))
    }

    /// Velocity multiplier for this gain.
    pub fn multiplier(&self) -> f64 {
        velocity_multiplier(self.volume_db, self.enabled)
    }
}

/// Converts a track volume into a note-velocity multiplier.
///
/// `clamp(10^(dB/20), 0, 1)`, forced to 0 for disabled tracks and for
/// volumes at or below [`SILENCE_FLOOR_DB`].
///
/// # Example
/// ```
/// use choirloop_backend_midi::gain::velocity_multiplier;
///
/// assert_eq!(velocity_multiplier(0, true), 1.0);
/// assert!((velocity_multiplier(-10, true) - 0.3162).abs() < 1e-4);
/// assert_eq!(velocity_multiplier(-10, false), 0.0);
/// ```
pub fn velocity_multiplier(volume_db: i32, enabled: bool) -> f64 {
    if !enabled || volume_db <= SILENCE_FLOOR_DB {
        return 0.0;
    }
    10f64.powf(volume_db as f64 / 20.0).clamp(0.0, 1.0)
}

/// Scales a note velocity, rounding to nearest and clamping to the MIDI range.
pub fn scale_velocity(velocity: u8, multiplier: f64) -> u8 {
    (velocity as f64 * multiplier)
        .round()
        .clamp(0.0, MAX_VELOCITY as f64) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minus_ten_db() {
        let m = velocity_multiplier(-10, true);
        assert!((m - 0.316_227_766).abs() < 1e-6);
    }

    #[test]
    fn test_zero_and_positive_db_capped_at_one() {
        assert_eq!(velocity_multiplier(0, true), 1.0);
        assert_eq!(velocity_multiplier(6, true), 1.0);
        assert_eq!(velocity_multiplier(12, true), 1.0);
    }

    #[test]
    fn test_floor_is_silent() {
        assert_eq!(velocity_multiplier(SILENCE_FLOOR_DB, true), 0.0);
        assert_eq!(velocity_multiplier(-100, true), 0.0);
        assert!(velocity_multiplier(SILENCE_FLOOR_DB + 1, true) > 0.0);
    }

    #[test]
    fn test_disabled_is_silent_at_any_volume() {
        for db in [-100, -10, 0, 12] {
            assert_eq!(velocity_multiplier(db, false), 0.0);
        }
    }

    #[test]
    fn test_scale_velocity_rounds_and_clamps() {
        assert_eq!(scale_velocity(100, 0.316_227_766), 32);
        assert_eq!(scale_velocity(127, 1.0), 127);
        assert_eq!(scale_velocity(80, 0.0), 0);
        assert_eq!(scale_velocity(127, 2.0), 127);
        assert_eq!(scale_velocity(3, 0.5), 2);
    }

    #[test]
    fn test_track_gain_unity() {
        assert_eq!(TrackGain::UNITY.multiplier(), 1.0);
        assert_eq!(TrackGain::new(-10, false).multiplier(), 0.0);
    }
}
