//! Render command implementation

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use colored::Colorize;

use choirloop_render::{CacheStatus, RenderOutcome};

use super::json_output::{error_codes, JsonError, RenderOutput, RenderSummary};
use super::CliContext;
use crate::mix::MixArgs;

/// Renders a song with the given mix and prints where the preview is.
///
/// # Arguments
/// * `ctx` - Library, cache and config locations
/// * `song_id` - Song to render
/// * `mix` - Tempo, track and section options
/// * `output` - Optional path to copy the rendered MP3 to
/// * `json` - Whether to output machine-readable JSON
pub fn run(
    ctx: &CliContext,
    song_id: &str,
    mix: &MixArgs,
    output: Option<&str>,
    json: bool,
) -> Result<ExitCode> {
    let renderer = ctx.renderer()?;
    let request = mix.to_request(song_id);

    if !json {
        println!("{} {}", "Rendering:".cyan().bold(), song_id);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let result = runtime.block_on(renderer.render(&request));

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) if json => {
            RenderOutput::failure(JsonError::from(&e)).print()?;
            return Ok(ExitCode::from(1));
        }
        Err(e) => return Err(e.into()),
    };

    let copied = match output {
        Some(path) => match copy_artifact(&outcome, Path::new(path)) {
            Ok(()) => Some(path.to_string()),
            Err(e) if json => {
                RenderOutput::failure(JsonError::new(error_codes::FILE_WRITE, format!("{:#}", e)))
                    .print()?;
                return Ok(ExitCode::from(1));
            }
            Err(e) => return Err(e),
        },
        None => None,
    };

    if json {
        RenderOutput::success(RenderSummary::new(&outcome, copied)).print()?;
    } else {
        print_outcome(&outcome, copied.as_deref());
    }

    Ok(ExitCode::SUCCESS)
}

fn copy_artifact(outcome: &RenderOutcome, dest: &Path) -> Result<()> {
    let bytes = outcome
        .artifact
        .read()
        .context("Failed to read rendered artifact")?;
    std::fs::write(dest, bytes).with_context(|| format!("Failed to write {}", dest.display()))
}

fn print_outcome(outcome: &RenderOutcome, copied: Option<&str>) {
    let status = match outcome.cache_status {
        CacheStatus::Hit => "CACHED".yellow().bold(),
        CacheStatus::Coalesced => "SHARED".yellow().bold(),
        CacheStatus::Rendered => "RENDERED".green().bold(),
    };
    println!("  {} {}", status, outcome.fingerprint);

    if let Some(path) = outcome.artifact.path() {
        println!("  {}: {}", "Artifact".dimmed(), path.display());
    }
    if let Some(copied) = copied {
        println!("  {}: {}", "Written to".dimmed(), copied);
    }
    println!(
        "  {}: {} ({:.1} KB)",
        "Media type".dimmed(),
        outcome.media_type,
        outcome.artifact.size as f64 / 1024.0
    );

    if !outcome.stages.is_empty() {
        let stages: Vec<String> = outcome
            .stages
            .iter()
            .map(|timing| format!("{} {}ms", timing.stage, timing.elapsed_ms))
            .collect();
        println!("  {}: {}", "Stages".dimmed(), stages.join(", "));
    }
}
