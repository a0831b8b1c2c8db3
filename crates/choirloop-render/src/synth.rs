//! MIDI to waveform synthesis through FluidSynth.

use std::path::Path;

use choirloop_spec::OUTPUT_SAMPLE_RATE;

use crate::config::{find_program, SynthesizerConfig, FLUIDSYNTH};
use crate::error::{RenderError, RenderResult, Stage};
use crate::process::{Invocation, ProcessOutput};

/// Renders MIDI files to 16-bit WAV with a General MIDI soundbank.
#[derive(Debug, Clone, Default)]
pub struct Synthesizer {
    config: SynthesizerConfig,
}

impl Synthesizer {
    /// Creates a synthesizer with the given configuration.
    pub fn new(config: SynthesizerConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    pub fn config(&self) -> &SynthesizerConfig {
        &self.config
    }

    /// Builds the invocation rendering `midi` into `wav`.
    ///
    /// `fluidsynth -ni -F <wav> -T wav -r 44100 <soundfont> <midi>`
    pub fn invocation(&self, midi: &Path, wav: &Path) -> RenderResult<Invocation> {
        let program = find_program(self.config.program.as_deref(), &FLUIDSYNTH)
            .map_err(|reason| RenderError::failed(Stage::Synthesize, reason))?;
        let soundfont = self
            .config
            .resolve_soundfont()
            .map_err(|reason| RenderError::failed(Stage::Synthesize, reason))?;

        Ok(Invocation::new(Stage::Synthesize, program, wav)
            .timeout(self.config.timeout())
            .args(&self.config.prefix_args)
            .arg("-ni")
            .arg("-F")
            .arg(wav)
            .arg("-T")
            .arg("wav")
            .arg("-r")
            .arg(OUTPUT_SAMPLE_RATE.to_string())
            .arg(soundfont)
            .arg(midi))
    }

    /// Renders `midi` into `wav`.
    pub async fn synthesize(&self, midi: &Path, wav: &Path) -> RenderResult<ProcessOutput> {
        self.invocation(midi, wav)?.run().await
    }
}
