//! JSON output types for machine-readable CLI output.
//!
//! Every command that accepts `--json` prints exactly one of these objects to
//! stdout, with `success` telling callers whether to look at `result` or
//! `errors`.

use serde::Serialize;

use choirloop_backend_midi::TrackInfo;
use choirloop_render::{CacheInfo, CacheStatus, RenderError, RenderOutcome, StageTiming};
use choirloop_spec::{BackendError, RenderSettings};

/// Error codes for CLI operations.
///
/// Pipeline errors pass their own codes through (`E001`, `MIDI_003`,
/// `RENDER_013`, ...).
pub mod error_codes {
    /// Input file could not be read
    pub const FILE_READ: &str = "CLI_001";
    /// Output file could not be written
    pub const FILE_WRITE: &str = "CLI_002";
    /// Cache directory could not be inspected
    pub const CACHE: &str = "CLI_003";
}

/// A structured error in JSON output.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct JsonError {
    /// Stable error code (e.g., "CLI_001", "E001", "RENDER_014")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Request field at fault (validation errors only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Pipeline stage that failed (render failures only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// Tail of the failing tool's diagnostic output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

impl JsonError {
    /// Creates a new error with code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            field: None,
            stage: None,
            diagnostics: None,
        }
    }
}

impl From<&RenderError> for JsonError {
    fn from(err: &RenderError) -> Self {
        let mut json = JsonError::new(err.code(), err.message());
        match err {
            RenderError::Validation(inner) => {
                if let Some(validation) = inner.as_validation() {
                    json.message = validation.message.clone();
                    json.field = Some(validation.field.clone());
                }
            }
            RenderError::RenderFailed {
                stage,
                reason,
                diagnostics,
            } => {
                json.message = reason.to_string();
                json.stage = Some(stage.to_string());
                if !diagnostics.is_empty() {
                    json.diagnostics = Some(diagnostics.clone());
                }
            }
            _ => {}
        }
        json
    }
}

/// Summary of a successful render.
#[derive(Debug, Clone, Serialize)]
pub struct RenderSummary {
    /// Fingerprint naming the cached artifact
    pub fingerprint: String,
    /// Media type of the artifact
    pub media_type: &'static str,
    /// Whether the render was served from cache
    pub cache_status: CacheStatus,
    /// Location of the cached artifact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Copy written with `--output`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Artifact size in bytes
    pub size: u64,
    /// Per-stage timings
    pub stages: Vec<StageTiming>,
}

impl RenderSummary {
    /// Summarizes an outcome.
    pub fn new(outcome: &RenderOutcome, output: Option<String>) -> Self {
        Self {
            fingerprint: outcome.fingerprint.to_string(),
            media_type: outcome.media_type,
            cache_status: outcome.cache_status,
            path: outcome
                .artifact
                .path()
                .map(|path| path.display().to_string()),
            output,
            size: outcome.artifact.size,
            stages: outcome.stages.clone(),
        }
    }
}

/// Canonical settings and their fingerprint.
#[derive(Debug, Clone, Serialize)]
pub struct FingerprintSummary {
    /// Fingerprint of the canonical settings
    pub fingerprint: String,
    /// The canonical settings document that was hashed
    pub settings: serde_json::Value,
    /// Location of the cached artifact, when already rendered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<String>,
}

impl FingerprintSummary {
    /// Summarizes canonical settings.
    pub fn new(settings: &RenderSettings, cached: Option<String>) -> Self {
        Self {
            fingerprint: settings.fingerprint().to_string(),
            settings: settings.to_value(),
            cached,
        }
    }
}

/// JSON output for every command: a result or a list of errors.
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutput<T: Serialize> {
    /// Whether the command succeeded
    pub success: bool,
    /// Errors encountered
    pub errors: Vec<JsonError>,
    /// The command's result (on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
}

impl<T: Serialize> CommandOutput<T> {
    /// Creates a successful output.
    pub fn success(result: T) -> Self {
        Self {
            success: true,
            errors: Vec::new(),
            result: Some(result),
        }
    }

    /// Creates a failed output.
    pub fn failure(error: JsonError) -> Self {
        Self {
            success: false,
            errors: vec![error],
            result: None,
        }
    }

    /// Prints the output as pretty JSON.
    pub fn print(&self) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(self)?);
        Ok(())
    }
}

/// JSON result of `render`.
pub type RenderOutput = CommandOutput<RenderSummary>;

/// JSON result of `fingerprint`.
pub type FingerprintOutput = CommandOutput<FingerprintSummary>;

/// JSON result of `tracks`.
pub type TracksOutput = CommandOutput<Vec<TrackInfo>>;

/// JSON result of `cache info`.
pub type CacheInfoOutput = CommandOutput<CacheInfo>;
