//! CLI command implementations

pub mod cache;
pub mod context;
pub mod fingerprint;
pub mod json_output;
pub mod render;
pub mod tracks;
pub mod transform;

pub use context::CliContext;
