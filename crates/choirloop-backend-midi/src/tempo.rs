//! Tempo scaling.

/// Tempo assumed by players when a file has no tempo event (120 BPM).
pub const DEFAULT_TEMPO_US: u32 = 500_000;

/// Largest value a tempo meta-event can hold (24 bits).
pub const MAX_TEMPO_US: u32 = 0xFF_FFFF;

/// Scales a tempo meta-event value for playback at `tempo_percent` of the
/// original speed.
///
/// Microseconds per beat are multiplied by `100 / tempo_percent`, rounded to
/// nearest and kept within the 24-bit field.
///
/// # Example
/// ```
/// use choirloop_backend_midi::tempo::scale_tempo;
///
/// assert_eq!(scale_tempo(500_000, 200), 250_000);
/// assert_eq!(scale_tempo(500_000, 50), 1_000_000);
/// ```
pub fn scale_tempo(us_per_beat: u32, tempo_percent: u32) -> u32 {
    if tempo_percent == 0 || tempo_percent == 100 {
        return us_per_beat;
    }
    let percent = tempo_percent as u64;
    let scaled = (us_per_beat as u64 * 100 + percent / 2) / percent;
    scaled.clamp(1, MAX_TEMPO_US as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        assert_eq!(scale_tempo(428_571, 100), 428_571);
    }

    #[test]
    fn test_double_speed_halves() {
        assert_eq!(scale_tempo(600_000, 200), 300_000);
        assert_eq!(scale_tempo(500_001, 200), 250_001);
    }

    #[test]
    fn test_slow_down() {
        assert_eq!(scale_tempo(500_000, 80), 625_000);
        assert_eq!(scale_tempo(500_000, 150), 333_333);
    }

    #[test]
    fn test_clamped_to_field() {
        assert_eq!(scale_tempo(MAX_TEMPO_US, 50), MAX_TEMPO_US);
        assert_eq!(scale_tempo(1, 150), 1);
    }
}
