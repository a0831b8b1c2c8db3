//! The render orchestrator.
//!
//! `NORMALIZE -> KEY -> LOOKUP -> (HIT | MISS -> TRANSFORM -> SYNTHESIZE ->
//! ENCODE -> COMMIT)`. Intermediate files live in a per-render scratch
//! directory that is removed on every path, including failures and dropped
//! futures. Renders of one fingerprint are serialized; later callers wait and
//! then read the committed entry.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use choirloop_backend_midi::{discover_tracks, transform, TrackInfo, TransformPlan};
use choirloop_spec::{normalize, Fingerprint, RenderRequest, RenderSettings, SectionResolver, SectionWindow};
use serde::Serialize;
use tempfile::TempDir;

use crate::cache::{Artifact, CacheStore};
use crate::config::RenderConfig;
use crate::encoder::{Encoder, EXTENSION, MEDIA_TYPE};
use crate::error::{RenderError, RenderResult, Stage};
use crate::library::SongLibrary;
use crate::locks::FingerprintLocks;
use crate::synth::Synthesizer;

/// File names inside a render's scratch directory.
const TRANSFORMED_MIDI: &str = "transformed.mid";
const WAVEFORM: &str = "waveform.wav";

/// How a render was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    /// The entry already existed.
    Hit,
    /// Another caller rendered it while this one waited.
    Coalesced,
    /// This call ran the pipeline.
    Rendered,
}

/// Wall-clock time spent in one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub elapsed_ms: u64,
}

/// Result of a successful render.
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    /// Fingerprint of the canonical settings; reusable with
    /// [`Renderer::fetch`].
    pub fingerprint: Fingerprint,
    /// The committed artifact.
    pub artifact: Artifact,
    /// Media type of the artifact.
    pub media_type: &'static str,
    pub cache_status: CacheStatus,
    pub stages: Vec<StageTiming>,
}

#[derive(Default)]
struct StageTimer {
    tag: String,
    stages: Vec<StageTiming>,
}

impl StageTimer {
    fn tag(&mut self, fingerprint: &Fingerprint) {
        self.tag = fingerprint.short().to_string();
    }

    fn record(&mut self, stage: Stage, started: Instant) {
        let elapsed = started.elapsed();
        log::debug!("[{}] {} finished in {:?}", self.tag, stage, elapsed);
        self.stages.push(StageTiming {
            stage,
            elapsed_ms: millis(elapsed),
        });
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Section lookups through a song library.
struct LibrarySections<'a>(&'a dyn SongLibrary);

impl SectionResolver for LibrarySections<'_> {
    fn resolve_section(&self, song_id: &str, section_id: &str) -> Option<SectionWindow> {
        self.0.resolve_section(song_id, section_id)
    }
}

/// Renders MIDI previews and caches them by settings fingerprint.
pub struct Renderer {
    config: RenderConfig,
    soundbank: String,
    library: Arc<dyn SongLibrary>,
    cache: Arc<dyn CacheStore>,
    locks: FingerprintLocks,
    synthesizer: Synthesizer,
    encoder: Encoder,
}

impl Renderer {
    /// Creates a renderer.
    pub fn new(config: RenderConfig, library: Arc<dyn SongLibrary>, cache: Arc<dyn CacheStore>) -> Self {
        let synthesizer = Synthesizer::new(config.synthesizer.clone());
        let encoder = Encoder::new(config.encoder.clone());
        let soundbank = config.synthesizer.soundbank();
        Self {
            config,
            soundbank,
            library,
            cache,
            locks: FingerprintLocks::new(),
            synthesizer,
            encoder,
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Name of the soundbank hashed into this renderer's fingerprints.
    pub fn soundbank(&self) -> &str {
        &self.soundbank
    }

    /// Validates a request against this renderer's song library and stamps
    /// it with this renderer's output profile.
    pub fn settings(&self, request: &RenderRequest) -> RenderResult<RenderSettings> {
        let settings = normalize(request, &LibrarySections(self.library.as_ref()))?;
        Ok(settings.with_soundbank(self.soundbank.as_str()))
    }

    /// Renders a request, or returns the cached result of an identical one.
    pub async fn render(&self, request: &RenderRequest) -> RenderResult<RenderOutcome> {
        let mut timer = StageTimer::default();
        let started = Instant::now();
        let settings = self.settings(request)?;
        timer.record(Stage::Normalize, started);

        self.render_with(&settings, timer).await
    }

    /// Renders settings normalized elsewhere, e.g. by a caller that resolves
    /// sections itself. The settings are restamped with this renderer's
    /// soundbank, so the fingerprint matches [`Renderer::render`] for the
    /// same request. No normalize stage is recorded.
    pub async fn render_settings(&self, settings: &RenderSettings) -> RenderResult<RenderOutcome> {
        let settings = settings.clone().with_soundbank(self.soundbank.as_str());
        self.render_with(&settings, StageTimer::default()).await
    }

    /// Returns a previously committed render without resubmitting settings.
    pub fn fetch(&self, fingerprint: &Fingerprint) -> RenderResult<Option<Artifact>> {
        Ok(self.cache.lookup(fingerprint)?)
    }

    /// Describes a song's tracks. Unreadable MIDI yields an empty list.
    pub fn discover_tracks(&self, song_id: &str) -> RenderResult<Vec<TrackInfo>> {
        let midi = self.library.load_midi(song_id)?;
        Ok(discover_tracks(&midi))
    }

    async fn render_with(
        &self,
        settings: &RenderSettings,
        mut timer: StageTimer,
    ) -> RenderResult<RenderOutcome> {
        let started = Instant::now();
        let fingerprint = settings.fingerprint();
        timer.tag(&fingerprint);
        timer.record(Stage::Key, started);

        let started = Instant::now();
        let cached = self.cache.lookup(&fingerprint)?;
        timer.record(Stage::Lookup, started);
        if let Some(artifact) = cached {
            log::info!("[{}] Cache hit for '{}'", fingerprint.short(), settings.song_id());
            return Ok(self.outcome(fingerprint, artifact, CacheStatus::Hit, timer));
        }

        let permit = self.locks.acquire(&fingerprint).await;

        // Another render may have committed while this one waited.
        if let Some(artifact) = self.cache.lookup(&fingerprint)? {
            let status = if permit.waited() {
                log::info!("[{}] Coalesced with in-flight render", fingerprint.short());
                CacheStatus::Coalesced
            } else {
                CacheStatus::Hit
            };
            return Ok(self.outcome(fingerprint, artifact, status, timer));
        }

        log::info!(
            "[{}] Cache miss for '{}'; rendering",
            fingerprint.short(),
            settings.song_id()
        );
        let midi = self.library.load_midi(settings.song_id())?;

        let scratch = self.scratch_dir(&fingerprint)?;
        let result = self
            .run_pipeline(scratch.path(), settings, &fingerprint, midi, &mut timer)
            .await;
        remove_scratch(scratch);
        drop(permit);

        match result {
            Ok(artifact) => {
                log::info!(
                    "[{}] Rendered '{}' ({} bytes)",
                    fingerprint.short(),
                    settings.song_id(),
                    artifact.size
                );
                Ok(self.outcome(fingerprint, artifact, CacheStatus::Rendered, timer))
            }
            Err(e) => {
                log::warn!("[{}] Render failed: {}", fingerprint.short(), e);
                Err(e)
            }
        }
    }

    async fn run_pipeline(
        &self,
        scratch: &Path,
        settings: &RenderSettings,
        fingerprint: &Fingerprint,
        midi: Vec<u8>,
        timer: &mut StageTimer,
    ) -> RenderResult<Artifact> {
        let midi_path = scratch.join(TRANSFORMED_MIDI);
        let wav_path = scratch.join(WAVEFORM);
        let encoded_path = scratch.join(format!("preview.{}", EXTENSION));

        let started = Instant::now();
        let plan = TransformPlan::from_settings(settings);
        let path = midi_path.clone();
        blocking(move || {
            let transformed = transform(&midi, &plan)?;
            std::fs::write(&path, transformed)?;
            Ok(())
        })
        .await?;
        timer.record(Stage::Transform, started);

        let started = Instant::now();
        self.synthesizer.synthesize(&midi_path, &wav_path).await?;
        timer.record(Stage::Synthesize, started);

        let started = Instant::now();
        self.encoder.encode(&wav_path, &encoded_path).await?;
        timer.record(Stage::Encode, started);

        let started = Instant::now();
        let cache = Arc::clone(&self.cache);
        let key = fingerprint.clone();
        let artifact = blocking(move || Ok(cache.commit(&key, &encoded_path)?)).await?;
        timer.record(Stage::Commit, started);

        Ok(artifact)
    }

    fn scratch_dir(&self, fingerprint: &Fingerprint) -> RenderResult<TempDir> {
        let mut builder = tempfile::Builder::new();
        let prefix = format!("choirloop-{}-", fingerprint.short());
        builder.prefix(&prefix);
        let dir = match &self.config.work_dir {
            Some(work_dir) => {
                std::fs::create_dir_all(work_dir)?;
                builder.tempdir_in(work_dir)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    fn outcome(
        &self,
        fingerprint: Fingerprint,
        artifact: Artifact,
        cache_status: CacheStatus,
        timer: StageTimer,
    ) -> RenderOutcome {
        RenderOutcome {
            fingerprint,
            artifact,
            media_type: MEDIA_TYPE,
            cache_status,
            stages: timer.stages,
        }
    }
}

/// Runs file work on the blocking pool so the executor keeps serving other
/// renders.
async fn blocking<T, F>(work: F) -> RenderResult<T>
where
    F: FnOnce() -> RenderResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| RenderError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
}

/// Deletes a scratch directory; failures are logged, never raised.
fn remove_scratch(scratch: TempDir) {
    let path = scratch.path().to_path_buf();
    if let Err(e) = scratch.close() {
        log::warn!("Failed to remove scratch directory {}: {}", path.display(), e);
    }
}
