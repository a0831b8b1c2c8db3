//! Fingerprint command implementation

use std::process::ExitCode;

use anyhow::Result;
use colored::Colorize;

use super::json_output::{FingerprintOutput, FingerprintSummary, JsonError};
use super::CliContext;
use crate::mix::MixArgs;

/// Prints the canonical settings and fingerprint for a request without
/// rendering, and whether the cache already holds it.
///
/// # Arguments
/// * `ctx` - Library, cache and config locations
/// * `song_id` - Song the settings apply to
/// * `mix` - Tempo, track and section options
/// * `json` - Whether to output machine-readable JSON
pub fn run(ctx: &CliContext, song_id: &str, mix: &MixArgs, json: bool) -> Result<ExitCode> {
    let renderer = ctx.renderer()?;

    let settings = match renderer.settings(&mix.to_request(song_id)) {
        Ok(settings) => settings,
        Err(e) if json => {
            FingerprintOutput::failure(JsonError::from(&e)).print()?;
            return Ok(ExitCode::from(1));
        }
        Err(e) => return Err(e.into()),
    };

    let fingerprint = settings.fingerprint();
    let cached = renderer
        .fetch(&fingerprint)?
        .map(|artifact| match artifact.path() {
            Some(path) => path.display().to_string(),
            None => fingerprint.to_string(),
        });

    if json {
        FingerprintOutput::success(FingerprintSummary::new(&settings, cached)).print()?;
        return Ok(ExitCode::SUCCESS);
    }

    println!("{}", fingerprint);
    println!("  {}: {}", "Settings".dimmed(), settings.canonical_json());
    match cached {
        Some(path) => println!("  {} {}", "CACHED".yellow().bold(), path),
        None => println!("  {}", "Not rendered yet".dimmed()),
    }

    Ok(ExitCode::SUCCESS)
}
