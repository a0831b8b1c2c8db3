//! ChoirLoop CLI - Practice audio from choir MIDI files
//!
//! This binary renders MIDI songs to MP3 with a chosen tempo, per-track mix
//! and practice section, and manages the render cache.

mod cli_args;

use std::process::ExitCode;

use clap::Parser;

use choirloop_cli::commands::{self, tracks::TrackSource, CliContext};
use cli_args::{CacheCommands, Cli, Commands};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let ctx = CliContext {
        config: cli.config,
        cache_dir: cli.cache_dir,
        library: cli.library,
    };

    let result = match cli.command {
        Commands::Render {
            song_id,
            mix,
            output,
            json,
        } => commands::render::run(&ctx, &song_id, &mix, output.as_deref(), json),
        Commands::Fingerprint { song_id, mix, json } => {
            commands::fingerprint::run(&ctx, &song_id, &mix, json)
        }
        Commands::Tracks {
            song_id,
            midi,
            json,
        } => {
            let source = match midi.as_deref() {
                Some(path) => TrackSource::File(path),
                None => TrackSource::Song(song_id.as_deref().unwrap_or_default()),
            };
            commands::tracks::run(&ctx, source, json)
        }
        Commands::Transform { input, output, mix } => {
            commands::transform::run(&input, &output, &mix)
        }
        Commands::Cache { command } => match command {
            CacheCommands::Clear => commands::cache::clear(&ctx),
            CacheCommands::Info { json } => commands::cache::info(&ctx, json),
        },
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", colored::Colorize::red("error"), e);
            ExitCode::from(1)
        }
    }
}
