//! Cache management commands

use std::process::ExitCode;

use anyhow::Result;
use colored::Colorize;

use super::json_output::{error_codes, CacheInfoOutput, JsonError};
use super::CliContext;

/// Clear all cache entries
pub fn clear(ctx: &CliContext) -> Result<ExitCode> {
    let cache = ctx.cache()?;

    println!("{}", "Clearing render cache...".cyan().bold());

    let count = cache.clear()?;

    if count == 0 {
        println!("  {}", "Cache is already empty".dimmed());
    } else {
        println!(
            "  {} Removed {} cache {}",
            "SUCCESS".green().bold(),
            count,
            if count == 1 { "entry" } else { "entries" }
        );
    }

    Ok(ExitCode::SUCCESS)
}

/// Show cache information
pub fn info(ctx: &CliContext, json: bool) -> Result<ExitCode> {
    let cache = ctx.cache()?;

    let info = match cache.info() {
        Ok(info) => info,
        Err(e) if json => {
            CacheInfoOutput::failure(JsonError::new(error_codes::CACHE, e.to_string())).print()?;
            return Ok(ExitCode::from(1));
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        CacheInfoOutput::success(info).print()?;
        return Ok(ExitCode::SUCCESS);
    }

    println!("{}", "Cache Information".cyan().bold());
    println!(
        "  {}: {}",
        "Cache directory".dimmed(),
        info.cache_dir.display()
    );
    println!("  {}: {}", "Entry count".dimmed(), info.entry_count);

    let size_mb = info.total_size_bytes as f64 / (1024.0 * 1024.0);
    if size_mb >= 1.0 {
        println!("  {}: {:.2} MB", "Total size".dimmed(), size_mb);
    } else {
        let size_kb = info.total_size_bytes as f64 / 1024.0;
        println!("  {}: {:.2} KB", "Total size".dimmed(), size_kb);
    }

    Ok(ExitCode::SUCCESS)
}
