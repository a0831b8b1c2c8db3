//! End-to-end tests for the render orchestrator.
//!
//! FluidSynth and FFmpeg are replaced by small `sh` scripts: the fake
//! synthesizer copies the transformed MIDI to its "waveform" output and the
//! fake encoder copies that to the final artifact, so the cached bytes are the
//! transformed MIDI and can be inspected directly. Each script appends a line
//! to a log file per invocation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use choirloop_render::{
    CacheStatus, CacheStore, FailureReason, FsCacheStore, MemorySongLibrary, RenderConfig,
    RenderError, Renderer, Stage,
};
use choirloop_spec::{
    normalize, BeatPosition, NoSections, NormalizeError, RenderRequest, SectionWindow,
};
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

// =============================================================================
// Fixtures
// =============================================================================

const COPY_SYNTH: &str = r#"
out=""
last=""
while [ $# -gt 0 ]; do
  case "$1" in
    -F) out="$2"; shift 2 ;;
    *) last="$1"; shift ;;
  esac
done
echo "$last" >> "$LOG"
cat "$last" > "$out"
"#;

const SLOW_SYNTH: &str = r#"
out=""
last=""
while [ $# -gt 0 ]; do
  case "$1" in
    -F) out="$2"; shift 2 ;;
    *) last="$1"; shift ;;
  esac
done
echo "$last" >> "$LOG"
sleep 1
cat "$last" > "$out"
"#;

const FAILING_SYNTH: &str = r#"
last=""
for arg in "$@"; do last="$arg"; done
echo "$last" >> "$LOG"
echo "fluidsynth: error: Failed to load SoundFont" 1>&2
exit 1
"#;

const SLOW_FAILING_SYNTH: &str = r#"
last=""
for arg in "$@"; do last="$arg"; done
echo "$last" >> "$LOG"
sleep 1
echo "fluidsynth: error: Failed to load SoundFont" 1>&2
exit 1
"#;

const HANGING_SYNTH: &str = r#"
last=""
for arg in "$@"; do last="$arg"; done
echo "$last" >> "$LOG"
exec sleep 30
"#;

const COPY_ENCODER: &str = r#"
in=""
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -i) in="$2"; shift 2 ;;
    *) out="$1"; shift ;;
  esac
done
echo "$in" >> "$LOG"
cat "$in" > "$out"
"#;

fn event(delta: u32, kind: TrackEventKind<'static>) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(delta),
        kind,
    }
}

/// Four quarter notes of velocity 100 on one channel.
fn voice(channel: u8, key: u8) -> Track<'static> {
    let mut track = Vec::new();
    for _ in 0..4 {
        track.push(event(
            0,
            TrackEventKind::Midi {
                channel: u4::new(channel),
                message: MidiMessage::NoteOn {
                    key: u7::new(key),
                    vel: u7::new(100),
                },
            },
        ));
        track.push(event(
            480,
            TrackEventKind::Midi {
                channel: u4::new(channel),
                message: MidiMessage::NoteOff {
                    key: u7::new(key),
                    vel: u7::new(0),
                },
            },
        ));
    }
    track.push(event(0, TrackEventKind::Meta(MetaMessage::EndOfTrack)));
    track
}

/// Two voices over one 4/4 measure, then one more measure of the soprano.
fn song_midi() -> Vec<u8> {
    let mut soprano = vec![event(0, TrackEventKind::Meta(MetaMessage::Tempo(u24::new(500_000))))];
    soprano.extend(voice(0, 72));
    soprano.pop();
    soprano.extend(voice(0, 74));
    let alto = voice(1, 67);

    let smf = Smf {
        header: Header::new(Format::Parallel, Timing::Metrical(u15::new(480))),
        tracks: vec![soprano, alto],
    };
    let mut out = Vec::new();
    smf.write_std(&mut out).unwrap();
    out
}

struct Harness {
    dir: TempDir,
    renderer: Arc<Renderer>,
    cache: Arc<FsCacheStore>,
}

impl Harness {
    fn new(synth_script: &str) -> Self {
        Self::with_library(synth_script, MemorySongLibrary::new().with_song("X", song_midi()))
    }

    fn with_library(synth_script: &str, library: MemorySongLibrary) -> Self {
        let dir = TempDir::new().unwrap();
        let synth = write_script(dir.path(), "synth.sh", "synth.log", synth_script);
        let encoder = write_script(dir.path(), "encoder.sh", "encoder.log", COPY_ENCODER);
        let soundfont = dir.path().join("choir.sf2");
        std::fs::write(&soundfont, b"sfbk").unwrap();

        let config = RenderConfig::default()
            .synthesizer_program("sh")
            .synthesizer_prefix_args([synth.display().to_string()])
            .soundfont(&soundfont)
            .encoder_program("sh")
            .encoder_prefix_args([encoder.display().to_string()])
            .timeout_secs(1)
            .work_dir(dir.path().join("work"));

        let cache = Arc::new(FsCacheStore::new(dir.path().join("cache")));
        let renderer = Renderer::new(config, Arc::new(library), cache.clone());

        Self {
            dir,
            renderer: Arc::new(renderer),
            cache,
        }
    }

    /// A second renderer over the same cache and song.
    fn renderer_with(&self, config: RenderConfig) -> Arc<Renderer> {
        Arc::new(Renderer::new(
            config,
            Arc::new(MemorySongLibrary::new().with_song("X", song_midi())),
            self.cache.clone(),
        ))
    }

    /// Same scripts with a 30s tool timeout, for the slow synthesizers.
    fn patient(self) -> Self {
        let renderer = self.renderer_with(self.renderer.config().clone().timeout_secs(30));
        Self { renderer, ..self }
    }

    fn synth_runs(&self) -> Vec<PathBuf> {
        read_log(&self.dir.path().join("synth.log"))
    }

    fn encoder_runs(&self) -> Vec<PathBuf> {
        read_log(&self.dir.path().join("encoder.log"))
    }

    fn scratch_dirs_left(&self) -> usize {
        match std::fs::read_dir(self.dir.path().join("work")) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}

fn write_script(dir: &Path, name: &str, log: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    let script = format!("LOG='{}'\n{}", dir.join(log).display(), body);
    std::fs::write(&path, script).unwrap();
    path
}

fn read_log(path: &Path) -> Vec<PathBuf> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(PathBuf::from)
        .collect()
}

fn note_on_velocities(track: &Track<'_>) -> Vec<u8> {
    track
        .iter()
        .filter_map(|e| match e.kind {
            TrackEventKind::Midi {
                message: MidiMessage::NoteOn { vel, .. },
                ..
            } => Some(vel.as_int()),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Idempotence and end-to-end
// =============================================================================

#[tokio::test]
async fn test_repeat_render_invokes_tools_once() {
    let harness = Harness::new(COPY_SYNTH);
    let request = RenderRequest::new("X").tempo(90);

    let first = harness.renderer.render(&request).await.unwrap();
    let second = harness.renderer.render(&request).await.unwrap();

    assert_eq!(first.cache_status, CacheStatus::Rendered);
    assert_eq!(second.cache_status, CacheStatus::Hit);
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(first.artifact.read().unwrap(), second.artifact.read().unwrap());
    assert_eq!(harness.synth_runs().len(), 1);
    assert_eq!(harness.encoder_runs().len(), 1);

    let fetched = harness.renderer.fetch(&first.fingerprint).unwrap().unwrap();
    assert_eq!(fetched, first.artifact);
}

#[tokio::test]
async fn test_end_to_end_mix() {
    let harness = Harness::new(COPY_SYNTH);
    let request = RenderRequest::new("X")
        .tempo(100)
        .volume(0, -10)
        .volume(1, -10)
        .enabled(0, true)
        .enabled(1, false);

    let outcome = harness.renderer.render(&request).await.unwrap();
    assert_eq!(outcome.media_type, "audio/mpeg");
    assert_eq!(
        outcome.artifact.path(),
        Some(harness.cache.entry_path(&outcome.fingerprint).as_path())
    );
    assert_eq!(
        outcome.stages.iter().map(|s| s.stage).collect::<Vec<_>>(),
        vec![
            Stage::Normalize,
            Stage::Key,
            Stage::Lookup,
            Stage::Transform,
            Stage::Synthesize,
            Stage::Encode,
            Stage::Commit,
        ]
    );

    let bytes = outcome.artifact.read().unwrap();
    let rendered = Smf::parse(&bytes).unwrap();
    assert_eq!(note_on_velocities(&rendered.tracks[0]), vec![32; 8]);
    assert_eq!(note_on_velocities(&rendered.tracks[1]), vec![0; 4]);

    let again = harness.renderer.render(&request).await.unwrap();
    assert_eq!(again.cache_status, CacheStatus::Hit);
    assert_eq!(harness.synth_runs().len(), 1);
}

#[tokio::test]
async fn test_distinct_settings_render_separately() {
    let harness = Harness::new(COPY_SYNTH);

    let slow = harness.renderer.render(&RenderRequest::new("X").tempo(80)).await.unwrap();
    let normal = harness.renderer.render(&RenderRequest::new("X")).await.unwrap();

    assert_ne!(slow.fingerprint, normal.fingerprint);
    assert_eq!(harness.synth_runs().len(), 2);
    assert_eq!(harness.cache.info().unwrap().entry_count, 2);
}

#[tokio::test]
async fn test_section_reference_matches_explicit_bounds() {
    let window = SectionWindow::new(BeatPosition::new(2, 1), BeatPosition::new(3, 1)).unwrap();
    let library = MemorySongLibrary::new()
        .with_song("X", song_midi())
        .with_section("X", "second", window);
    let harness = Harness::with_library(COPY_SYNTH, library);

    let by_reference = harness
        .renderer
        .render(&RenderRequest::new("X").section_id("second"))
        .await
        .unwrap();
    let explicit = harness
        .renderer
        .render(&RenderRequest::new("X").section(2, 1, 3, 1))
        .await
        .unwrap();

    assert_eq!(by_reference.fingerprint, explicit.fingerprint);
    assert_eq!(explicit.cache_status, CacheStatus::Hit);

    // Only the soprano's second measure survives.
    let bytes = by_reference.artifact.read().unwrap();
    let rendered = Smf::parse(&bytes).unwrap();
    assert_eq!(rendered.tracks.len(), 2);
    assert_eq!(note_on_velocities(&rendered.tracks[0]).len(), 4);
    assert!(note_on_velocities(&rendered.tracks[1]).is_empty());
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_identical_renders_coalesce() {
    let harness = Harness::new(SLOW_SYNTH).patient();

    let request = RenderRequest::new("X").volume(1, -20);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let renderer = Arc::clone(&harness.renderer);
            let request = request.clone();
            tokio::spawn(async move { renderer.render(&request).await })
        })
        .collect();

    let mut statuses = Vec::new();
    let mut fingerprints = Vec::new();
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        statuses.push(outcome.cache_status);
        fingerprints.push(outcome.fingerprint);
    }

    assert_eq!(harness.synth_runs().len(), 1);
    assert_eq!(harness.encoder_runs().len(), 1);
    assert_eq!(
        statuses.iter().filter(|s| **s == CacheStatus::Rendered).count(),
        1
    );
    assert!(statuses
        .iter()
        .all(|s| matches!(s, CacheStatus::Rendered | CacheStatus::Coalesced | CacheStatus::Hit)));
    assert!(fingerprints.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_waiters_rerun_after_failed_render() {
    let harness = Harness::new(SLOW_FAILING_SYNTH).patient();
    let request = RenderRequest::new("X").tempo(110);

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let renderer = Arc::clone(&harness.renderer);
            let request = request.clone();
            tokio::spawn(async move { renderer.render(&request).await })
        })
        .collect();

    for handle in handles {
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            RenderError::RenderFailed {
                stage: Stage::Synthesize,
                reason: FailureReason::ExitStatus { code: Some(1) },
                ..
            }
        ));
    }

    // Each waiter found nothing committed and ran the pipeline itself, one
    // at a time.
    assert_eq!(harness.synth_runs().len(), 3);
    assert!(harness.encoder_runs().is_empty());
    assert_eq!(harness.cache.info().unwrap().entry_count, 0);
    assert_eq!(harness.scratch_dirs_left(), 0);
}

// =============================================================================
// Output profile
// =============================================================================

#[tokio::test]
async fn test_soundfonts_do_not_share_cache_entries() {
    let harness = Harness::new(COPY_SYNTH);
    let piano_font = harness.dir.path().join("piano.sf2");
    std::fs::write(&piano_font, b"sfbk").unwrap();
    let piano = harness.renderer_with(harness.renderer.config().clone().soundfont(&piano_font));
    assert_eq!(harness.renderer.soundbank(), "choir.sf2");
    assert_eq!(piano.soundbank(), "piano.sf2");

    let request = RenderRequest::new("X").tempo(90);
    let choir = harness.renderer.render(&request).await.unwrap();
    let other = piano.render(&request).await.unwrap();

    assert_ne!(choir.fingerprint, other.fingerprint);
    assert_eq!(other.cache_status, CacheStatus::Rendered);
    assert_eq!(harness.synth_runs().len(), 2);
    assert_eq!(harness.cache.info().unwrap().entry_count, 2);

    // Each renderer still hits its own entry.
    assert_eq!(piano.render(&request).await.unwrap().cache_status, CacheStatus::Hit);
    assert!(piano.fetch(&choir.fingerprint).unwrap().is_some());
    assert_eq!(harness.synth_runs().len(), 2);
}

#[tokio::test]
async fn test_prenormalized_settings_share_fingerprint() {
    let harness = Harness::new(COPY_SYNTH);
    let request = RenderRequest::new("X").volume(0, -6).section(2, 1, 3, 1);

    let settings = normalize(&request, &NoSections).unwrap();
    assert_eq!(settings.soundbank(), None);

    let outcome = harness.renderer.render_settings(&settings).await.unwrap();
    assert_eq!(outcome.cache_status, CacheStatus::Rendered);
    assert_eq!(
        outcome.fingerprint,
        harness.renderer.settings(&request).unwrap().fingerprint()
    );
    assert_eq!(
        outcome.stages.iter().map(|s| s.stage).collect::<Vec<_>>(),
        vec![
            Stage::Key,
            Stage::Lookup,
            Stage::Transform,
            Stage::Synthesize,
            Stage::Encode,
            Stage::Commit,
        ]
    );

    let again = harness.renderer.render(&request).await.unwrap();
    assert_eq!(again.cache_status, CacheStatus::Hit);
    assert_eq!(again.fingerprint, outcome.fingerprint);
    assert_eq!(harness.synth_runs().len(), 1);
}

// =============================================================================
// Failures and cleanup
// =============================================================================

#[tokio::test]
async fn test_synth_failure_leaves_no_entry() {
    let harness = Harness::new(FAILING_SYNTH);
    let request = RenderRequest::new("X").tempo(120);

    let err = harness.renderer.render(&request).await.unwrap_err();
    match &err {
        RenderError::RenderFailed {
            stage,
            reason: FailureReason::ExitStatus { code },
            diagnostics,
        } => {
            assert_eq!(*stage, Stage::Synthesize);
            assert_eq!(*code, Some(1));
            assert!(diagnostics.contains("Failed to load SoundFont"));
        }
        other => panic!("unexpected error: {other}"),
    }

    let fingerprint = harness
        .renderer
        .settings(&request)
        .unwrap()
        .fingerprint();
    assert!(harness.cache.lookup(&fingerprint).unwrap().is_none());
    assert!(harness.encoder_runs().is_empty());

    // Nothing was committed, so a retry runs the whole pipeline again.
    harness.renderer.render(&request).await.unwrap_err();
    assert_eq!(harness.synth_runs().len(), 2);
}

#[tokio::test]
async fn test_scratch_files_removed_on_success_and_failure() {
    let ok = Harness::new(COPY_SYNTH);
    ok.renderer.render(&RenderRequest::new("X")).await.unwrap();
    assert_eq!(ok.scratch_dirs_left(), 0);
    for midi in ok.synth_runs() {
        assert!(!midi.exists());
        assert!(!midi.parent().unwrap().exists());
    }

    let failing = Harness::new(FAILING_SYNTH);
    failing.renderer.render(&RenderRequest::new("X")).await.unwrap_err();
    assert_eq!(failing.scratch_dirs_left(), 0);
    assert_eq!(failing.synth_runs().len(), 1);
    assert!(!failing.synth_runs()[0].exists());
}

#[tokio::test]
async fn test_hung_synthesizer_times_out() {
    let harness = Harness::new(HANGING_SYNTH);

    let err = harness.renderer.render(&RenderRequest::new("X")).await.unwrap_err();
    assert!(matches!(
        err,
        RenderError::RenderFailed {
            stage: Stage::Synthesize,
            reason: FailureReason::Timeout { timeout_secs: 1 },
            ..
        }
    ));
    assert_eq!(harness.scratch_dirs_left(), 0);
    assert_eq!(harness.cache.info().unwrap().entry_count, 0);
}

#[tokio::test]
async fn test_rejected_requests_do_no_work() {
    let harness = Harness::new(COPY_SYNTH);

    let err = harness
        .renderer
        .render(&RenderRequest::new("X").tempo(200))
        .await
        .unwrap_err();
    assert!(matches!(err, RenderError::Validation(NormalizeError::Invalid(_))));

    let err = harness
        .renderer
        .render(&RenderRequest::new("missing-song"))
        .await
        .unwrap_err();
    assert!(matches!(err, RenderError::NotFound(_)));
    assert!(err.is_not_found());

    let err = harness
        .renderer
        .render(&RenderRequest::new("X").section_id("chorus"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RenderError::Validation(NormalizeError::SectionNotFound { .. })
    ));

    assert!(harness.synth_runs().is_empty());
    assert_eq!(harness.scratch_dirs_left(), 0);
}

#[tokio::test]
async fn test_malformed_midi_aborts_before_tools() {
    let library = MemorySongLibrary::new().with_song("X", b"MThd not really midi".to_vec());
    let harness = Harness::with_library(COPY_SYNTH, library);

    let err = harness.renderer.render(&RenderRequest::new("X")).await.unwrap_err();
    assert!(matches!(err, RenderError::Transform(_)));
    assert!(harness.synth_runs().is_empty());
    assert_eq!(harness.scratch_dirs_left(), 0);

    // Track discovery degrades instead of failing.
    assert!(harness.renderer.discover_tracks("X").unwrap().is_empty());
}

#[tokio::test]
async fn test_discover_tracks() {
    let harness = Harness::new(COPY_SYNTH);
    let tracks = harness.renderer.discover_tracks("X").unwrap();
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0].note_count, 8);
    assert_eq!(tracks[1].name, "Track 2");
}
