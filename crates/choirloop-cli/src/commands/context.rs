//! Locations and configuration shared by every command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use choirloop_render::{DirSongLibrary, FsCacheStore, RenderConfig, Renderer};

/// Directory used for songs when `--library` is not given.
pub const DEFAULT_LIBRARY_DIR: &str = "songs";

/// Global options resolved from the command line.
#[derive(Debug, Clone, Default)]
pub struct CliContext {
    /// JSON render configuration file.
    pub config: Option<PathBuf>,
    /// Cache directory override.
    pub cache_dir: Option<PathBuf>,
    /// Song library root.
    pub library: Option<PathBuf>,
}

impl CliContext {
    /// Loads the render configuration, or the defaults when none was given.
    pub fn render_config(&self) -> Result<RenderConfig> {
        match &self.config {
            Some(path) => RenderConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display())),
            None => Ok(RenderConfig::default()),
        }
    }

    /// Song library root.
    pub fn library_dir(&self) -> PathBuf {
        self.library
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LIBRARY_DIR))
    }

    /// Opens the song library.
    pub fn library(&self) -> DirSongLibrary {
        DirSongLibrary::new(self.library_dir())
    }

    /// Opens the render cache.
    pub fn cache(&self) -> Result<FsCacheStore> {
        let dir = match &self.cache_dir {
            Some(dir) => dir.clone(),
            None => FsCacheStore::default_cache_dir()
                .context("Could not determine a cache directory; pass --cache-dir")?,
        };
        Ok(FsCacheStore::new(dir))
    }

    /// Builds a renderer over the library and cache.
    pub fn renderer(&self) -> Result<Renderer> {
        let config = self.render_config()?;
        let cache = self.cache()?;
        log::debug!(
            "Library {}, cache {}",
            self.library_dir().display(),
            cache.cache_dir().display()
        );
        Ok(Renderer::new(
            config,
            Arc::new(self.library()),
            Arc::new(cache),
        ))
    }
}
