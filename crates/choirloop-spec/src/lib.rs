//! ChoirLoop render settings library.
//!
//! This crate turns raw render requests into canonical, validated settings
//! and derives the fingerprint that names a render in the cache.
//!
//! # Example
//!
//! ```
//! use choirloop_spec::normalize::{normalize, NoSections};
//! use choirloop_spec::RenderRequest;
//!
//! let request = RenderRequest::new("ave-maria")
//!     .tempo(80)
//!     .volume(0, -6)
//!     .enabled(1, false);
//!
//! let settings = normalize(&request, &NoSections).unwrap();
//! let fingerprint = settings.fingerprint();
//! assert_eq!(fingerprint.as_str().len(), 64);
//! ```
//!
//! # Modules
//!
//! - [`error`]: Validation errors and the shared [`BackendError`] trait
//! - [`request`]: Raw request fields as received from callers
//! - [`settings`]: Canonical settings types and bounds
//! - [`normalize`]: Request validation and canonicalization
//! - [`hash`]: Canonical JSON and fingerprints

pub mod error;
pub mod hash;
pub mod normalize;
pub mod request;
pub mod settings;

pub use error::{BackendError, ErrorCode, NormalizeError, ValidationError};
pub use hash::{canonical_value_hash, canonicalize_json, Fingerprint, FINGERPRINT_LEN};
pub use normalize::{normalize, NoSections, SectionResolver};
pub use request::RenderRequest;
pub use settings::{
    BeatPosition, RenderSettings, SectionWindow, TrackIndex, DEFAULT_TEMPO_PERCENT,
    DEFAULT_VOLUME_DB, MAX_TEMPO_PERCENT, MAX_VOLUME_DB, MIN_TEMPO_PERCENT, MIN_VOLUME_DB,
    OUTPUT_BITRATE_KBPS, OUTPUT_SAMPLE_RATE, SETTINGS_VERSION,
};
