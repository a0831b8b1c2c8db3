//! Content-addressed storage of encoded previews.
//!
//! An entry is named by the fingerprint of the settings that produced it and
//! is published exactly once: the artifact is staged under a private name in
//! the cache directory and linked into place only when complete. Readers can
//! therefore never observe a partial entry, and an existing entry is never
//! overwritten.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use choirloop_spec::Fingerprint;
use thiserror::Error;

use crate::encoder::EXTENSION;

/// Prefix of staging files inside the cache directory.
const STAGING_PREFIX: &str = ".staging-";

/// Errors raised by a cache store.
#[derive(Debug, Error)]
pub enum CacheError {
    /// An entry exists but could not be read.
    #[error("Failed to read cache entry {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An artifact could not be staged or published.
    #[error("Failed to commit cache entry {path}: {source}")]
    Commit {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The cache directory could not be listed or cleaned.
    #[error("Failed to access cache directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where an artifact's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactData {
    /// A committed file.
    File(PathBuf),
    /// Bytes held by an in-memory store.
    Memory(Arc<[u8]>),
}

/// An immutable, committed render result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Fingerprint naming the entry.
    pub fingerprint: Fingerprint,
    /// The entry's bytes or their location.
    pub data: ArtifactData,
    /// Size in bytes.
    pub size: u64,
}

impl Artifact {
    /// Path of the committed file, for file-backed stores.
    pub fn path(&self) -> Option<&Path> {
        match &self.data {
            ArtifactData::File(path) => Some(path),
            ArtifactData::Memory(_) => None,
        }
    }

    /// Reads the artifact's bytes.
    pub fn read(&self) -> io::Result<Vec<u8>> {
        match &self.data {
            ArtifactData::File(path) => fs::read(path),
            ArtifactData::Memory(bytes) => Ok(bytes.to_vec()),
        }
    }
}

/// Fingerprint-keyed storage of finished artifacts.
pub trait CacheStore: Send + Sync {
    /// Returns the committed artifact for `fingerprint`, if any.
    fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<Artifact>, CacheError>;

    /// Publishes the file at `staged` under `fingerprint`.
    ///
    /// If an entry already exists it is kept and returned unchanged.
    fn commit(&self, fingerprint: &Fingerprint, staged: &Path) -> Result<Artifact, CacheError>;
}

/// Flat directory of `<fingerprint>.mp3` files.
#[derive(Debug, Clone)]
pub struct FsCacheStore {
    cache_dir: PathBuf,
}

/// Cache directory summary.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CacheInfo {
    /// Cache directory path
    pub cache_dir: PathBuf,
    /// Number of committed entries
    pub entry_count: u64,
    /// Total size of committed entries in bytes
    pub total_size_bytes: u64,
}

impl FsCacheStore {
    /// Creates a store rooted at `cache_dir`. The directory is created on
    /// first commit.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Default cache directory (XDG-compatible).
    pub fn default_cache_dir() -> Option<PathBuf> {
        dirs::cache_dir().map(|d| d.join("choirloop").join("renders"))
    }

    /// The cache directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path of the entry for a fingerprint.
    pub fn entry_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.cache_dir.join(format!("{}.{}", fingerprint, EXTENSION))
    }

    /// Counts committed entries and their total size.
    pub fn info(&self) -> Result<CacheInfo, CacheError> {
        let mut entry_count = 0u64;
        let mut total_size_bytes = 0u64;

        for (path, kind) in self.scan()? {
            if kind == EntryKind::Committed {
                let meta = fs::metadata(&path).map_err(|source| CacheError::Read {
                    path: path.clone(),
                    source,
                })?;
                entry_count += 1;
                total_size_bytes += meta.len();
            }
        }

        Ok(CacheInfo {
            cache_dir: self.cache_dir.clone(),
            entry_count,
            total_size_bytes,
        })
    }

    /// Removes every committed entry and stale staging file; returns the
    /// number of entries removed.
    ///
    /// Must not run while renders are in flight.
    pub fn clear(&self) -> Result<u64, CacheError> {
        let mut count = 0u64;
        for (path, kind) in self.scan()? {
            fs::remove_file(&path).map_err(|source| CacheError::Directory {
                path: path.clone(),
                source,
            })?;
            if kind == EntryKind::Committed {
                count += 1;
            }
        }
        Ok(count)
    }

    fn scan(&self) -> Result<Vec<(PathBuf, EntryKind)>, CacheError> {
        let read_dir = match fs::read_dir(&self.cache_dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(CacheError::Directory {
                    path: self.cache_dir.clone(),
                    source,
                })
            }
        };

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|source| CacheError::Directory {
                path: self.cache_dir.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(kind) = classify_file(name) {
                entries.push((path, kind));
            }
        }
        Ok(entries)
    }

    fn artifact(&self, fingerprint: &Fingerprint, path: PathBuf, size: u64) -> Artifact {
        Artifact {
            fingerprint: fingerprint.clone(),
            data: ArtifactData::File(path),
            size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Committed,
    Staging,
}

fn classify_file(name: &str) -> Option<EntryKind> {
    if name.starts_with(STAGING_PREFIX) {
        return Some(EntryKind::Staging);
    }
    let stem = name.strip_suffix(EXTENSION)?.strip_suffix('.')?;
    Fingerprint::parse(stem).ok().map(|_| EntryKind::Committed)
}

impl CacheStore for FsCacheStore {
    fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<Artifact>, CacheError> {
        let path = self.entry_path(fingerprint);
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {
                let size = meta.len();
                Ok(Some(self.artifact(fingerprint, path, size)))
            }
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Read { path, source }),
        }
    }

    fn commit(&self, fingerprint: &Fingerprint, staged: &Path) -> Result<Artifact, CacheError> {
        let path = self.entry_path(fingerprint);
        let commit_err = |source| CacheError::Commit {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.cache_dir).map_err(commit_err)?;

        // Staged in the cache directory so publishing is a same-filesystem link.
        let mut staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(".part")
            .tempfile_in(&self.cache_dir)
            .map_err(commit_err)?;
        let mut source = fs::File::open(staged).map_err(commit_err)?;
        let size = io::copy(&mut source, staging.as_file_mut()).map_err(commit_err)?;
        staging.as_file().sync_all().map_err(commit_err)?;

        match staging.persist_noclobber(&path) {
            Ok(_) => {
                log::debug!("Committed {} ({} bytes)", path.display(), size);
                Ok(self.artifact(fingerprint, path, size))
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                log::warn!(
                    "Cache entry {} already exists; keeping the committed artifact",
                    fingerprint.short()
                );
                let existing = self.lookup(fingerprint)?;
                existing.ok_or_else(|| commit_err(e.error))
            }
            Err(e) => Err(commit_err(e.error)),
        }
    }
}

/// In-memory store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<Fingerprint, Arc<[u8]>>>,
}

impl MemoryCacheStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed entries.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an entry exists for `fingerprint`.
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries().contains_key(fingerprint)
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<Fingerprint, Arc<[u8]>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn artifact(fingerprint: &Fingerprint, bytes: &Arc<[u8]>) -> Artifact {
        Artifact {
            fingerprint: fingerprint.clone(),
            data: ArtifactData::Memory(Arc::clone(bytes)),
            size: bytes.len() as u64,
        }
    }
}

impl CacheStore for MemoryCacheStore {
    fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<Artifact>, CacheError> {
        Ok(self
            .entries()
            .get(fingerprint)
            .map(|bytes| Self::artifact(fingerprint, bytes)))
    }

    fn commit(&self, fingerprint: &Fingerprint, staged: &Path) -> Result<Artifact, CacheError> {
        let bytes: Arc<[u8]> = fs::read(staged)
            .map_err(|source| CacheError::Commit {
                path: staged.to_path_buf(),
                source,
            })?
            .into();

        let mut entries = self.entries();
        let stored = entries.entry(fingerprint.clone()).or_insert(bytes);
        Ok(Self::artifact(fingerprint, stored))
    }
}
