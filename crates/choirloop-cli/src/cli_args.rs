//! CLI argument definitions for the ChoirLoop command-line interface.
//!
//! All `#[derive(Parser)]` and `#[derive(Subcommand)]` types are defined here,
//! keeping `main.rs` focused on dispatch logic.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use choirloop_cli::mix::MixArgs;

/// ChoirLoop - Practice audio from choir MIDI files
#[derive(Parser)]
#[command(name = "choirloop")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    /// JSON render configuration file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Render cache directory (default: <user cache>/choirloop/renders)
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Song library directory (default: ./songs)
    #[arg(long, global = true, value_name = "DIR")]
    pub library: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Render a song to MP3, reusing the cache when possible
    Render {
        /// Song identifier in the library
        song_id: String,

        #[command(flatten)]
        mix: MixArgs,

        /// Copy the rendered MP3 to this path
        #[arg(short, long)]
        output: Option<String>,

        /// Output machine-readable JSON (no colored output)
        #[arg(long)]
        json: bool,
    },

    /// Print the canonical settings and fingerprint without rendering
    Fingerprint {
        /// Song identifier in the library
        song_id: String,

        #[command(flatten)]
        mix: MixArgs,

        /// Output machine-readable JSON (no colored output)
        #[arg(long)]
        json: bool,
    },

    /// List the tracks of a song or MIDI file
    Tracks {
        /// Song identifier in the library
        #[arg(required_unless_present = "midi", conflicts_with = "midi")]
        song_id: Option<String>,

        /// Read a MIDI file instead of a library song
        #[arg(long, value_name = "FILE")]
        midi: Option<String>,

        /// Output machine-readable JSON (no colored output)
        #[arg(long)]
        json: bool,
    },

    /// Apply tempo, mix and section changes to a MIDI file
    Transform {
        /// Source MIDI file
        input: String,

        /// Destination MIDI file
        output: String,

        #[command(flatten)]
        mix: MixArgs,
    },

    /// Manage the render cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
pub(crate) enum CacheCommands {
    /// Remove every cached render
    Clear,

    /// Show cache location, entry count and size
    Info {
        /// Output machine-readable JSON (no colored output)
        #[arg(long)]
        json: bool,
    },
}
