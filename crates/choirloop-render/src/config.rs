//! Render configuration and external program discovery.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::FailureReason;

/// Default timeout for each external tool (5 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// General MIDI soundbank shipped by most Linux distributions.
pub const DEFAULT_SOUNDFONT: &str = "/usr/share/sounds/sf2/FluidR3_GM.sf2";

/// Environment variable overriding the synthesizer executable.
pub const SYNTHESIZER_ENV: &str = "CHOIRLOOP_FLUIDSYNTH";

/// Environment variable overriding the encoder executable.
pub const ENCODER_ENV: &str = "CHOIRLOOP_FFMPEG";

/// Environment variable overriding the soundfont path.
pub const SOUNDFONT_ENV: &str = "CHOIRLOOP_SOUNDFONT";

/// Synthesizer (MIDI to waveform) settings.
///
/// Sample rate and bitrate are fixed by the output profile hashed into every
/// fingerprint, so they are not configurable here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SynthesizerConfig {
    /// Executable; discovered when unset.
    pub program: Option<PathBuf>,
    /// Arguments placed before the generated ones.
    pub prefix_args: Vec<String>,
    /// Instrument soundbank; discovered when unset.
    pub soundfont: Option<PathBuf>,
    /// Time limit in seconds.
    pub timeout_secs: u64,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            program: None,
            prefix_args: Vec::new(),
            soundfont: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Encoder (waveform to compressed audio) settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncoderConfig {
    /// Executable; discovered when unset.
    pub program: Option<PathBuf>,
    /// Arguments placed before the generated ones.
    pub prefix_args: Vec<String>,
    /// Time limit in seconds.
    pub timeout_secs: u64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            program: None,
            prefix_args: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Configuration for a [`Renderer`](crate::Renderer).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub synthesizer: SynthesizerConfig,
    pub encoder: EncoderConfig,
    /// Parent directory of per-render scratch directories; the system temp
    /// directory when unset.
    pub work_dir: Option<PathBuf>,
}

impl RenderConfig {
    /// Loads a JSON config file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Sets the synthesizer executable.
    pub fn synthesizer_program(mut self, path: impl Into<PathBuf>) -> Self {
        self.synthesizer.program = Some(path.into());
        self
    }

    /// Sets the arguments placed before the synthesizer's own.
    pub fn synthesizer_prefix_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synthesizer.prefix_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the soundfont.
    pub fn soundfont(mut self, path: impl Into<PathBuf>) -> Self {
        self.synthesizer.soundfont = Some(path.into());
        self
    }

    /// Sets the encoder executable.
    pub fn encoder_program(mut self, path: impl Into<PathBuf>) -> Self {
        self.encoder.program = Some(path.into());
        self
    }

    /// Sets the arguments placed before the encoder's own.
    pub fn encoder_prefix_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.encoder.prefix_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets both tool timeouts in seconds.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.synthesizer.timeout_secs = secs;
        self.encoder.timeout_secs = secs;
        self
    }

    /// Sets the scratch parent directory.
    pub fn work_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(path.into());
        self
    }
}

impl SynthesizerConfig {
    /// Time limit as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The soundfont this config selects: config, then environment, then
    /// the distribution default. Existence is not checked.
    pub fn soundfont_path(&self) -> PathBuf {
        self.soundfont
            .clone()
            .or_else(|| std::env::var_os(SOUNDFONT_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SOUNDFONT))
    }

    /// Name of the selected soundfont, hashed into fingerprints so renders
    /// with different instruments never share a cache entry.
    pub fn soundbank(&self) -> String {
        let path = self.soundfont_path();
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    }

    /// Resolves the soundfont path, failing when the file is missing.
    pub fn resolve_soundfont(&self) -> Result<PathBuf, FailureReason> {
        let path = self.soundfont_path();
        if path.is_file() {
            Ok(path)
        } else {
            Err(FailureReason::SoundfontMissing { path })
        }
    }
}

impl EncoderConfig {
    /// Time limit as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// A tool that can be located on this machine.
#[derive(Debug, Clone, Copy)]
pub struct ProgramSpec {
    /// Executable base name.
    pub name: &'static str,
    /// Environment variable overriding the path.
    pub env_var: &'static str,
    /// Install locations checked last.
    pub common_paths: &'static [&'static str],
}

/// The synthesizer executable.
pub const FLUIDSYNTH: ProgramSpec = ProgramSpec {
    name: "fluidsynth",
    env_var: SYNTHESIZER_ENV,
    common_paths: &[
        "/usr/bin/fluidsynth",
        "/usr/local/bin/fluidsynth",
        "/opt/homebrew/bin/fluidsynth",
    ],
};

/// The encoder executable.
pub const FFMPEG: ProgramSpec = ProgramSpec {
    name: "ffmpeg",
    env_var: ENCODER_ENV,
    common_paths: &[
        "/usr/bin/ffmpeg",
        "/usr/local/bin/ffmpeg",
        "/opt/homebrew/bin/ffmpeg",
    ],
};

/// Finds an executable: configured path, then environment variable, then
/// `PATH`, then common install locations.
///
/// A configured path is used as given (it may be a bare name such as `sh`).
pub fn find_program(configured: Option<&Path>, spec: &ProgramSpec) -> Result<PathBuf, FailureReason> {
    if let Some(path) = configured {
        return Ok(path.to_path_buf());
    }

    if let Some(path) = std::env::var_os(spec.env_var) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
    }

    let name = if cfg!(windows) {
        format!("{}.exe", spec.name)
    } else {
        spec.name.to_string()
    };
    if let Ok(path) = which::which(&name) {
        return Ok(path);
    }

    for path_str in spec.common_paths {
        let path = PathBuf::from(path_str);
        if path.exists() {
            return Ok(path);
        }
    }

    Err(FailureReason::ProgramNotFound {
        program: spec.name.to_string(),
        env_var: spec.env_var,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = RenderConfig::default();
        assert_eq!(config.synthesizer.timeout(), Duration::from_secs(300));
        assert!(config.work_dir.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = RenderConfig::default()
            .synthesizer_program("sh")
            .synthesizer_prefix_args(["fake-synth.sh"])
            .encoder_program("/usr/bin/ffmpeg")
            .timeout_secs(5)
            .work_dir("/tmp/choirloop");

        assert_eq!(config.synthesizer.program, Some(PathBuf::from("sh")));
        assert_eq!(config.synthesizer.prefix_args, vec!["fake-synth.sh".to_string()]);
        assert_eq!(config.encoder.timeout(), Duration::from_secs(5));
        assert_eq!(config.work_dir, Some(PathBuf::from("/tmp/choirloop")));
    }

    #[test]
    fn test_partial_json_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("choirloop.json");
        std::fs::write(
            &path,
            r#"{"synthesizer": {"soundfont": "/srv/sf2/choir.sf2"}, "encoder": {"timeout_secs": 60}}"#,
        )
        .unwrap();

        let config = RenderConfig::from_json_file(&path).unwrap();
        assert_eq!(
            config.synthesizer.soundfont,
            Some(PathBuf::from("/srv/sf2/choir.sf2"))
        );
        assert_eq!(config.synthesizer.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.encoder.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_output_profile_keys_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("choirloop.json");
        for text in [
            r#"{"encoder": {"bitrate_kbps": 128}}"#,
            r#"{"synthesizer": {"sample_rate": 48000}}"#,
            r#"{"synthesizer": {"gain": 0.5}}"#,
        ] {
            std::fs::write(&path, text).unwrap();
            let err = RenderConfig::from_json_file(&path).unwrap_err();
            assert_eq!(err.kind(), std::io::ErrorKind::InvalidData, "{}", text);
        }
    }

    #[test]
    fn test_soundbank_is_file_name() {
        let config = SynthesizerConfig {
            soundfont: Some(PathBuf::from("/srv/sf2/Choir.sf2")),
            ..Default::default()
        };
        assert_eq!(config.soundbank(), "Choir.sf2");
        assert_eq!(config.soundfont_path(), PathBuf::from("/srv/sf2/Choir.sf2"));
    }

    #[test]
    fn test_configured_program_used_as_given() {
        let path = find_program(Some(Path::new("sh")), &FLUIDSYNTH).unwrap();
        assert_eq!(path, PathBuf::from("sh"));
    }

    #[test]
    fn test_missing_soundfont() {
        let config = SynthesizerConfig {
            soundfont: Some(PathBuf::from("/nonexistent/choir.sf2")),
            ..Default::default()
        };
        assert!(matches!(
            config.resolve_soundfont(),
            Err(FailureReason::SoundfontMissing { .. })
        ));
    }
}
