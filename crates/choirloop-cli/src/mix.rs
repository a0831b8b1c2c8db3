//! Mix options shared by the commands that take render settings.

use clap::Args;

use choirloop_spec::RenderRequest;

/// Tempo, per-track mix and section options.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct MixArgs {
    /// Playback speed in percent of the original (50-150)
    #[arg(long)]
    pub tempo: Option<i64>,

    /// Track volume in dB as TRACK=DB, e.g. 1=-6 (repeatable)
    #[arg(long = "volume", value_name = "TRACK=DB", value_parser = parse_volume)]
    pub volumes: Vec<(u16, i64)>,

    /// Silence a track by its zero-based index (repeatable)
    #[arg(long = "mute", value_name = "TRACK")]
    pub muted: Vec<u16>,

    /// Practice section stored with the song
    #[arg(long)]
    pub section: Option<String>,

    /// First beat of the section as MEASURE:BEAT
    #[arg(long, value_name = "MEASURE:BEAT", value_parser = parse_position, requires = "end")]
    pub start: Option<(i64, i64)>,

    /// First beat after the section as MEASURE:BEAT
    #[arg(long, value_name = "MEASURE:BEAT", value_parser = parse_position, requires = "start")]
    pub end: Option<(i64, i64)>,
}

impl MixArgs {
    /// Builds the raw request for `song_id`; validation is left to the
    /// normalizer so the CLI reports the same errors as any other caller.
    pub fn to_request(&self, song_id: &str) -> RenderRequest {
        let mut request = RenderRequest::new(song_id);
        if let Some(tempo) = self.tempo {
            request = request.tempo(tempo);
        }
        for &(track, db) in &self.volumes {
            request = request.volume(track, db);
        }
        for &track in &self.muted {
            request = request.enabled(track, false);
        }
        if let Some(section) = &self.section {
            request = request.section_id(section.clone());
        }
        if let (Some((sm, sb)), Some((em, eb))) = (self.start, self.end) {
            request = request.section(sm, sb, em, eb);
        }
        request
    }
}

/// Parses `TRACK=DB`.
pub fn parse_volume(value: &str) -> Result<(u16, i64), String> {
    let (track, db) = value
        .split_once('=')
        .ok_or_else(|| format!("expected TRACK=DB, got '{}'", value))?;
    let track = track
        .trim()
        .parse::<u16>()
        .map_err(|_| format!("invalid track index '{}'", track))?;
    let db = db
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("invalid volume '{}'", db))?;
    Ok((track, db))
}

/// Parses `MEASURE:BEAT`.
pub fn parse_position(value: &str) -> Result<(i64, i64), String> {
    let (measure, beat) = value
        .split_once(':')
        .ok_or_else(|| format!("expected MEASURE:BEAT, got '{}'", value))?;
    let measure = measure
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("invalid measure '{}'", measure))?;
    let beat = beat
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("invalid beat '{}'", beat))?;
    Ok((measure, beat))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_volume() {
        assert_eq!(parse_volume("1=-6"), Ok((1, -6)));
        assert_eq!(parse_volume("0=12"), Ok((0, 12)));
        assert!(parse_volume("1").is_err());
        assert!(parse_volume("x=3").is_err());
        assert!(parse_volume("-1=3").is_err());
        assert!(parse_volume("2=loud").is_err());
    }

    #[test]
    fn test_parse_position() {
        assert_eq!(parse_position("5:1"), Ok((5, 1)));
        assert_eq!(parse_position("0:3"), Ok((0, 3)));
        assert!(parse_position("5").is_err());
        assert!(parse_position("a:1").is_err());
    }

    #[test]
    fn test_to_request() {
        let args = MixArgs {
            tempo: Some(80),
            volumes: vec![(0, -3)],
            muted: vec![2],
            section: None,
            start: Some((2, 1)),
            end: Some((4, 1)),
        };
        assert_eq!(
            args.to_request("ave-maria"),
            RenderRequest::new("ave-maria")
                .tempo(80)
                .volume(0, -3)
                .enabled(2, false)
                .section(2, 1, 4, 1)
        );
    }

    #[test]
    fn test_empty_args_give_bare_request() {
        assert_eq!(
            MixArgs::default().to_request("s"),
            RenderRequest::new("s")
        );
    }
}
