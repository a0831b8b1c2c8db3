//! Error types for render settings validation.

use thiserror::Error;

/// Error codes for render settings validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// E001: Tempo percentage outside the accepted range
    TempoOutOfRange,
    /// E002: Track key is not a valid track index
    InvalidTrackIndex,
    /// E003: Track volume outside the accepted decibel range
    VolumeOutOfRange,
    /// E004: Section measure or beat below 1
    SectionBoundTooSmall,
    /// E005: Section end is not after its start
    SectionNotAscending,
    /// E006: Explicit section bounds are incomplete
    IncompleteSection,
    /// E007: Both a section reference and explicit bounds were supplied
    ConflictingSection,
    /// E008: Song identifier is empty
    EmptySongId,
    /// E009: Fingerprint is not a 64-character lowercase hex string
    MalformedFingerprint,
}

impl ErrorCode {
    /// Returns the error code string (e.g., "E001").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::TempoOutOfRange => "E001",
            ErrorCode::InvalidTrackIndex => "E002",
            ErrorCode::VolumeOutOfRange => "E003",
            ErrorCode::SectionBoundTooSmall => "E004",
            ErrorCode::SectionNotAscending => "E005",
            ErrorCode::IncompleteSection => "E006",
            ErrorCode::ConflictingSection => "E007",
            ErrorCode::EmptySongId => "E008",
            ErrorCode::MalformedFingerprint => "E009",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A validation error naming the offending request field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The error code.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
    /// Request field that failed validation (e.g., `track_volumes["3"]`).
    pub field: String,
}

impl ValidationError {
    /// Creates a new validation error for a field.
    pub fn new(code: ErrorCode, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: field.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} (field `{}`)", self.code, self.message, self.field)
    }
}

impl std::error::Error for ValidationError {}

/// Errors produced while turning a raw request into canonical settings.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The request violated a bound or was internally inconsistent.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// The request referenced a practice section the song does not have.
    #[error("section '{section_id}' not found for song '{song_id}'")]
    SectionNotFound { song_id: String, section_id: String },
}

impl NormalizeError {
    /// Returns the validation error, if this is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            NormalizeError::Invalid(err) => Some(err),
            NormalizeError::SectionNotFound { .. } => None,
        }
    }
}

/// Common trait for pipeline errors.
///
/// Every crate in the render pipeline implements this for its error type so
/// callers can report a stable code and category without matching on
/// crate-specific enums.
pub trait BackendError: std::error::Error {
    /// Stable error code such as "MIDI_001" or "RENDER_004".
    fn code(&self) -> &'static str;

    /// Human-readable message, by default the `Display` output.
    fn message(&self) -> String {
        self.to_string()
    }

    /// Error category such as "midi" or "render".
    fn category(&self) -> &'static str;
}

impl BackendError for NormalizeError {
    fn code(&self) -> &'static str {
        match self {
            NormalizeError::Invalid(err) => err.code.code(),
            NormalizeError::SectionNotFound { .. } => "SETTINGS_404",
        }
    }

    fn category(&self) -> &'static str {
        "settings"
    }
}
