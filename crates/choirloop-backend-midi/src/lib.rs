//! ChoirLoop MIDI Backend - Standard MIDI File transformation
//!
//! This crate rewrites a source MIDI file for one render: tempo meta-events are
//! rescaled, note velocities are scaled per track, and the file can be cut to a
//! practice section. It also extracts descriptive per-track metadata.
//!
//! # Determinism
//!
//! The transformation is a pure function of the source bytes and the
//! [`TransformPlan`]. Event order and spacing are preserved except where a
//! rule changes them.
//!
//! # Example
//!
//! ```ignore
//! use choirloop_backend_midi::{transform, TransformPlan};
//!
//! let source = std::fs::read("song.mid")?;
//! let plan = TransformPlan::default().tempo_percent(80).track(1, -10, false);
//! let output = transform(&source, &plan)?;
//! ```
//!
//! # Modules
//!
//! - [`transform`]: The transformer and its plan
//! - [`gain`]: Decibel to velocity conversion
//! - [`tempo`]: Tempo meta-event scaling
//! - [`timeline`]: Absolute ticks and measure/beat positions
//! - [`trim`]: Section trimming
//! - [`tracks`]: Track discovery

pub mod error;
pub mod gain;
pub mod tempo;
pub mod timeline;
pub mod tracks;
pub mod transform;
pub mod trim;

pub use error::{TransformError, TransformResult};
pub use gain::{velocity_multiplier, TrackGain};
pub use tracks::{discover_tracks, TrackInfo};
pub use transform::{transform, transform_smf, TransformPlan};
