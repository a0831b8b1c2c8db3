//! Waveform to MP3 encoding through FFmpeg.

use std::path::Path;

use choirloop_spec::OUTPUT_BITRATE_KBPS;

use crate::config::{find_program, EncoderConfig, FFMPEG};
use crate::error::{RenderError, RenderResult, Stage};
use crate::process::{Invocation, ProcessOutput};

/// Media type of encoded previews.
pub const MEDIA_TYPE: &str = "audio/mpeg";

/// File extension of encoded previews.
pub const EXTENSION: &str = "mp3";

/// Encodes WAV files to constant-bitrate MP3.
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    config: EncoderConfig,
}

impl Encoder {
    /// Creates an encoder with the given configuration.
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// Builds the invocation encoding `wav` into `mp3`.
    pub fn invocation(&self, wav: &Path, mp3: &Path) -> RenderResult<Invocation> {
        let program = find_program(self.config.program.as_deref(), &FFMPEG)
            .map_err(|reason| RenderError::failed(Stage::Encode, reason))?;

        Ok(Invocation::new(Stage::Encode, program, mp3)
            .timeout(self.config.timeout())
            .args(&self.config.prefix_args)
            .args(["-nostdin", "-hide_banner", "-loglevel", "error", "-y", "-i"])
            .arg(wav)
            .args(["-vn", "-codec:a", "libmp3lame", "-b:a"])
            .arg(format!("{}k", OUTPUT_BITRATE_KBPS))
            .args(["-f", EXTENSION])
            .arg(mp3))
    }

    /// Encodes `wav` into `mp3`.
    pub async fn encode(&self, wav: &Path, mp3: &Path) -> RenderResult<ProcessOutput> {
        self.invocation(wav, mp3)?.run().await
    }
}
