//! Song library: where source MIDI files and practice sections come from.

use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use choirloop_spec::{BeatPosition, SectionResolver, SectionWindow};
use serde::Deserialize;
use thiserror::Error;

/// Name of the per-song metadata file.
pub const SONG_MANIFEST: &str = "song.json";

/// Errors raised while loading songs.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// No song with this id exists.
    #[error("song '{song_id}' not found")]
    SongNotFound { song_id: String },

    /// The song exists but its MIDI file does not.
    #[error("MIDI file for song '{song_id}' not found at {path}")]
    MidiNotFound { song_id: String, path: PathBuf },

    /// The id cannot name a song directory.
    #[error("invalid song id '{song_id}'")]
    InvalidSongId { song_id: String },

    /// The song metadata could not be read or parsed.
    #[error("failed to read song metadata {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Source of MIDI files and practice sections.
pub trait SongLibrary: SectionResolver + Send + Sync {
    /// Returns the source MIDI bytes for a song.
    fn load_midi(&self, song_id: &str) -> Result<Vec<u8>, LibraryError>;
}

/// Contents of a `song.json` file.
#[derive(Debug, Clone, Deserialize)]
pub struct SongManifest {
    /// MIDI file name, relative to the song directory.
    pub midi_file: String,
    /// Stored practice sections.
    #[serde(default)]
    pub practice_sections: Vec<PracticeSection>,
}

/// A named section of a song.
#[derive(Debug, Clone, Deserialize)]
pub struct PracticeSection {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    pub start_measure: u32,
    pub start_beat: u32,
    pub end_measure: u32,
    pub end_beat: u32,
}

impl PracticeSection {
    /// Section bounds, if they form a valid window.
    pub fn window(&self) -> Option<SectionWindow> {
        SectionWindow::new(
            BeatPosition::new(self.start_measure, self.start_beat),
            BeatPosition::new(self.end_measure, self.end_beat),
        )
        .ok()
    }
}

/// Library laid out as `<root>/<song_id>/song.json` plus the MIDI file.
#[derive(Debug, Clone)]
pub struct DirSongLibrary {
    root: PathBuf,
}

impl DirSongLibrary {
    /// Creates a library rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Reads a song's metadata.
    pub fn manifest(&self, song_id: &str) -> Result<SongManifest, LibraryError> {
        let path = self.song_dir(song_id)?.join(SONG_MANIFEST);
        let text = std::fs::read_to_string(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                LibraryError::SongNotFound {
                    song_id: song_id.to_string(),
                }
            } else {
                LibraryError::Metadata {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        serde_json::from_str(&text).map_err(|e| LibraryError::Metadata {
            path,
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })
    }

    fn song_dir(&self, song_id: &str) -> Result<PathBuf, LibraryError> {
        if !is_single_component(song_id) {
            return Err(LibraryError::InvalidSongId {
                song_id: song_id.to_string(),
            });
        }
        Ok(self.root.join(song_id))
    }
}

/// Whether `name` is one plain path component (no separators, no `..`).
fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(part)), None) if part == name
    )
}

impl SectionResolver for DirSongLibrary {
    fn resolve_section(&self, song_id: &str, section_id: &str) -> Option<SectionWindow> {
        let manifest = match self.manifest(song_id) {
            Ok(manifest) => manifest,
            Err(e) => {
                log::debug!("No sections for '{}': {}", song_id, e);
                return None;
            }
        };
        manifest
            .practice_sections
            .iter()
            .find(|section| section.id == section_id)
            .and_then(PracticeSection::window)
    }
}

impl SongLibrary for DirSongLibrary {
    fn load_midi(&self, song_id: &str) -> Result<Vec<u8>, LibraryError> {
        let manifest = self.manifest(song_id)?;
        let song_dir = self.song_dir(song_id)?;
        let path = song_dir.join(&manifest.midi_file);

        if !is_single_component(&manifest.midi_file) {
            return Err(LibraryError::MidiNotFound {
                song_id: song_id.to_string(),
                path,
            });
        }

        std::fs::read(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                LibraryError::MidiNotFound {
                    song_id: song_id.to_string(),
                    path: path.clone(),
                }
            } else {
                LibraryError::Metadata {
                    path: path.clone(),
                    source,
                }
            }
        })
    }
}

#[derive(Debug, Clone, Default)]
struct MemorySong {
    midi: Vec<u8>,
    sections: HashMap<String, SectionWindow>,
}

/// In-memory library for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemorySongLibrary {
    songs: HashMap<String, MemorySong>,
}

impl MemorySongLibrary {
    /// Creates an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a song.
    pub fn with_song(mut self, song_id: impl Into<String>, midi: Vec<u8>) -> Self {
        self.songs.entry(song_id.into()).or_default().midi = midi;
        self
    }

    /// Adds a practice section to a song.
    pub fn with_section(
        mut self,
        song_id: impl Into<String>,
        section_id: impl Into<String>,
        window: SectionWindow,
    ) -> Self {
        self.songs
            .entry(song_id.into())
            .or_default()
            .sections
            .insert(section_id.into(), window);
        self
    }
}

impl SectionResolver for MemorySongLibrary {
    fn resolve_section(&self, song_id: &str, section_id: &str) -> Option<SectionWindow> {
        self.songs.get(song_id)?.sections.get(section_id).copied()
    }
}

impl SongLibrary for MemorySongLibrary {
    fn load_midi(&self, song_id: &str) -> Result<Vec<u8>, LibraryError> {
        match self.songs.get(song_id) {
            Some(song) if !song.midi.is_empty() => Ok(song.midi.clone()),
            Some(_) => Err(LibraryError::MidiNotFound {
                song_id: song_id.to_string(),
                path: PathBuf::from(song_id),
            }),
            None => Err(LibraryError::SongNotFound {
                song_id: song_id.to_string(),
            }),
        }
    }
}
