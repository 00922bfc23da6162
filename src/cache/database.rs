//! Key/value backing stores for the result cache.
//!
//! The cache consumes an abstract byte-oriented map; concrete backings are
//! an in-process ordered map and a directory-per-store persistent layout.
//! Keys are hex hash strings, values are serialized result maps.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{EngineError, EngineResult};

/// Abstract key/value store consumed by the cache.
pub trait Database {
    /// Number of entries stored under `key` (0 or 1).
    fn count(&self, key: &str) -> usize;

    /// Store `value` under `key`, replacing any prior entry.
    fn insert(&mut self, key: &str, value: Vec<u8>) -> EngineResult<()>;

    /// Retrieve the value stored under `key`.
    ///
    /// # Errors
    ///
    /// *not-found* when the key is absent; *backend-io* on storage failure.
    fn at(&self, key: &str) -> EngineResult<Vec<u8>>;

    /// Remove the entry under `key`. Absent keys are ignored.
    fn free(&mut self, key: &str) -> EngineResult<()>;

    /// Flush any buffered state to durable storage.
    fn backup(&mut self) -> EngineResult<()>;

    /// Drop any state that is not durable.
    fn dump(&mut self) -> EngineResult<()>;

    /// Every stored key, in stable order.
    fn keys(&self) -> Vec<String>;
}

/// In-process ordered map backing.
#[derive(Debug, Default)]
pub struct MapDatabase {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MapDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Database for MapDatabase {
    fn count(&self, key: &str) -> usize {
        usize::from(self.entries.contains_key(key))
    }

    fn insert(&mut self, key: &str, value: Vec<u8>) -> EngineResult<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn at(&self, key: &str) -> EngineResult<Vec<u8>> {
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(key.to_string()))
    }

    fn free(&mut self, key: &str) -> EngineResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn backup(&mut self) -> EngineResult<()> {
        Ok(())
    }

    fn dump(&mut self) -> EngineResult<()> {
        self.entries.clear();
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Persistent file-per-key backing rooted at one directory.
///
/// Keys are hex hash strings, so they are filename-safe as-is. The directory
/// is created on first use.
#[derive(Debug)]
pub struct DirDatabase {
    root: PathBuf,
}

impl DirDatabase {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> EngineResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(DirDatabase { root })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Database for DirDatabase {
    fn count(&self, key: &str) -> usize {
        usize::from(self.entry_path(key).is_file())
    }

    fn insert(&mut self, key: &str, value: Vec<u8>) -> EngineResult<()> {
        fs::write(self.entry_path(key), value)?;
        Ok(())
    }

    fn at(&self, key: &str) -> EngineResult<Vec<u8>> {
        let path = self.entry_path(key);
        if !path.is_file() {
            return Err(EngineError::NotFound(key.to_string()));
        }
        Ok(fs::read(path)?)
    }

    fn free(&mut self, key: &str) -> EngineResult<()> {
        let path = self.entry_path(key);
        if path.is_file() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn backup(&mut self) -> EngineResult<()> {
        Ok(())
    }

    fn dump(&mut self) -> EngineResult<()> {
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if let Ok(entries) = fs::read_dir(&self.root) {
            for entry in entries.flatten() {
                if entry.path().is_file() {
                    if let Some(name) = entry.file_name().to_str() {
                        keys.push(name.to_string());
                    }
                }
            }
        }
        keys.sort();
        keys
    }
}

/// Creates per-implementation-type databases under one root, maintaining the
/// persisted layout: `<root>/cache/<fingerprint>/` for value stores and
/// `<root>/uuid/<fingerprint>` for the registered-type directory.
#[derive(Debug)]
pub struct DatabaseFactory {
    root: PathBuf,
}

impl DatabaseFactory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DatabaseFactory { root: root.into() }
    }

    fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    fn uuid_dir(&self) -> PathBuf {
        self.root.join("uuid")
    }

    /// Open the value store for the implementation type fingerprinted by
    /// `fingerprint_hex`.
    pub fn value_store(&self, fingerprint_hex: &str) -> EngineResult<DirDatabase> {
        DirDatabase::open(self.cache_dir().join(fingerprint_hex))
    }

    /// Record a registered type in the on-disk type directory.
    pub fn record_type(&self, fingerprint_hex: &str, type_name: &str) -> EngineResult<()> {
        fs::create_dir_all(self.uuid_dir())?;
        fs::write(self.uuid_dir().join(fingerprint_hex), type_name.as_bytes())?;
        Ok(())
    }

    /// Fingerprints of every value store present on disk.
    pub fn stored_fingerprints(&self) -> EngineResult<Vec<String>> {
        let mut fingerprints = Vec::new();
        let cache_dir = self.cache_dir();
        if cache_dir.is_dir() {
            for entry in fs::read_dir(cache_dir)? {
                let entry = entry?;
                if entry.path().is_dir() {
                    if let Some(name) = entry.file_name().to_str() {
                        fingerprints.push(name.to_string());
                    }
                }
            }
        }
        fingerprints.sort();
        Ok(fingerprints)
    }
}
