//! ChoirLoop Render Pipeline - MIDI previews through external tools
//!
//! This crate drives a render from request to cached MP3: settings are
//! normalized and fingerprinted, the cache is consulted, and on a miss the
//! source MIDI is transformed, synthesized with FluidSynth, encoded with
//! FFmpeg and committed under its fingerprint.
//!
//! # Guarantees
//!
//! - A cache entry becomes visible only once complete, and is never replaced.
//! - Concurrent renders of one fingerprint run the pipeline once.
//! - Scratch files are removed whether a render succeeds or fails.
//! - Every external tool runs under a timeout.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use choirloop_render::{DirSongLibrary, FsCacheStore, RenderConfig, Renderer};
//! use choirloop_spec::RenderRequest;
//!
//! let renderer = Renderer::new(
//!     RenderConfig::default(),
//!     Arc::new(DirSongLibrary::new("songs")),
//!     Arc::new(FsCacheStore::new("cache")),
//! );
//! let outcome = renderer.render(&RenderRequest::new("ave-maria").tempo(80)).await?;
//! println!("{} -> {:?}", outcome.fingerprint, outcome.artifact.path());
//! ```

pub mod cache;
pub mod config;
pub mod encoder;
pub mod error;
pub mod library;
pub mod locks;
pub mod orchestrator;
pub mod process;
pub mod synth;

pub use cache::{Artifact, ArtifactData, CacheError, CacheInfo, CacheStore, FsCacheStore, MemoryCacheStore};
pub use config::{EncoderConfig, RenderConfig, SynthesizerConfig};
pub use encoder::{Encoder, MEDIA_TYPE};
pub use error::{FailureReason, RenderError, RenderResult, Stage};
pub use library::{DirSongLibrary, LibraryError, MemorySongLibrary, SongLibrary};
pub use orchestrator::{CacheStatus, RenderOutcome, Renderer, StageTiming};
pub use synth::Synthesizer;
