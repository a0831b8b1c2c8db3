//! Error types for the render pipeline.

use std::path::PathBuf;

use choirloop_backend_midi::TransformError;
use choirloop_spec::{BackendError, NormalizeError};
use thiserror::Error;

use crate::cache::CacheError;
use crate::library::LibraryError;

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Normalize,
    Key,
    Lookup,
    Transform,
    Synthesize,
    Encode,
    Commit,
}

impl Stage {
    /// Returns the string identifier for this stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Normalize => "normalize",
            Stage::Key => "key",
            Stage::Lookup => "lookup",
            Stage::Transform => "transform",
            Stage::Synthesize => "synthesize",
            Stage::Encode => "encode",
            Stage::Commit => "commit",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an external tool invocation failed.
#[derive(Debug, Error)]
pub enum FailureReason {
    /// The executable could not be located.
    #[error("executable '{program}' not found; install it or set {env_var}")]
    ProgramNotFound {
        program: String,
        env_var: &'static str,
    },

    /// The instrument soundbank does not exist.
    #[error("soundfont not found at {path}; set CHOIRLOOP_SOUNDFONT")]
    SoundfontMissing { path: PathBuf },

    /// The process could not be started.
    #[error("failed to spawn '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process started but waiting on it failed.
    #[error("failed to wait for '{program}': {source}")]
    WaitFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process exited unsuccessfully.
    #[error("process exited with {}", exit_description(*code))]
    ExitStatus { code: Option<i32> },

    /// The process ran past its time limit and was killed.
    #[error("process timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The process succeeded but did not write its output file.
    #[error("expected output file not found: {path}")]
    OutputMissing { path: PathBuf },

    /// The process succeeded but its output file is empty.
    #[error("output file is empty: {path}")]
    OutputEmpty { path: PathBuf },
}

fn exit_description(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}

impl FailureReason {
    fn code(&self) -> &'static str {
        match self {
            FailureReason::ProgramNotFound { .. } => "RENDER_010",
            FailureReason::SoundfontMissing { .. } => "RENDER_011",
            FailureReason::SpawnFailed { .. } => "RENDER_012",
            FailureReason::ExitStatus { .. } => "RENDER_013",
            FailureReason::Timeout { .. } => "RENDER_014",
            FailureReason::OutputMissing { .. } => "RENDER_015",
            FailureReason::OutputEmpty { .. } => "RENDER_016",
            FailureReason::WaitFailed { .. } => "RENDER_017",
        }
    }
}

/// Errors that can occur while rendering a preview.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The request is out of range or inconsistent; nothing was done.
    #[error(transparent)]
    Validation(#[from] NormalizeError),

    /// The song or its MIDI file does not exist; nothing was done.
    #[error(transparent)]
    NotFound(#[from] LibraryError),

    /// The source MIDI could not be transformed; no tool was invoked.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Synthesis or encoding failed. The cache is untouched.
    #[error("{stage} failed: {reason}{}", diagnostics_suffix(diagnostics))]
    RenderFailed {
        stage: Stage,
        reason: FailureReason,
        diagnostics: String,
    },

    /// Reading or publishing a cache entry failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Scratch space could not be prepared.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn diagnostics_suffix(diagnostics: &str) -> String {
    if diagnostics.is_empty() {
        String::new()
    } else {
        format!("\n{}", diagnostics)
    }
}

impl RenderError {
    /// Creates a render failure without diagnostics.
    pub fn failed(stage: Stage, reason: FailureReason) -> Self {
        Self::RenderFailed {
            stage,
            reason,
            diagnostics: String::new(),
        }
    }

    /// Whether the error names a missing song, section or cache entry.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RenderError::NotFound(_)
                | RenderError::Validation(NormalizeError::SectionNotFound { .. })
        )
    }
}

impl BackendError for RenderError {
    fn code(&self) -> &'static str {
        match self {
            RenderError::Validation(err) => err.code(),
            RenderError::NotFound(_) => "RENDER_001",
            RenderError::Transform(err) => err.code(),
            RenderError::RenderFailed { reason, .. } => reason.code(),
            RenderError::Cache(_) => "RENDER_020",
            RenderError::Io(_) => "RENDER_030",
        }
    }

    fn category(&self) -> &'static str {
        match self {
            RenderError::Validation(err) => err.category(),
            RenderError::Transform(err) => err.category(),
            _ => "render",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use choirloop_spec::{ErrorCode, ValidationError};

    #[test]
    fn test_error_display() {
        let err = RenderError::RenderFailed {
            stage: Stage::Synthesize,
            reason: FailureReason::ExitStatus { code: Some(3) },
            diagnostics: "fluidsynth: error: bad soundfont".to_string(),
        };
        let text = err.to_string();
        assert!(text.starts_with("synthesize failed: process exited with status 3"));
        assert!(text.contains("bad soundfont"));

        let err = RenderError::failed(Stage::Encode, FailureReason::Timeout { timeout_secs: 300 });
        assert_eq!(err.to_string(), "encode failed: process timed out after 300 seconds");
    }

    #[test]
    fn test_codes_delegate_to_source() {
        let err = RenderError::from(NormalizeError::from(ValidationError::new(
            ErrorCode::TempoOutOfRange,
            "tempo",
            "tempo must be between 50 and 150",
        )));
        assert_eq!(err.code(), "E001");
        assert_eq!(err.category(), "settings");

        let err = RenderError::from(LibraryError::SongNotFound {
            song_id: "x".to_string(),
        });
        assert_eq!(err.code(), "RENDER_001");
        assert!(err.is_not_found());

        let err = RenderError::failed(Stage::Synthesize, FailureReason::OutputEmpty {
            path: PathBuf::from("out.wav"),
        });
        assert_eq!(err.code(), "RENDER_016");
        assert_eq!(err.category(), "render");
        assert!(!err.is_not_found());
    }
}
