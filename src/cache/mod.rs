//! Content-addressed result store.
//!
//! A `ModuleCache` maps context-hash strings to result maps. It is two-tier:
//! a primary in-memory map plus an optional byte-oriented backing store.
//! `backup()` flushes primary entries through the codec registry into the
//! backing; `dump()` evicts the primary (entries never backed up are lost).
//! Lookups consult the primary first, then the backing.

mod database;

pub use database::{Database, DatabaseFactory, DirDatabase, MapDatabase};

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::any::CodecRegistry;
use crate::errors::{EngineError, EngineResult};
use crate::fields::{ModuleResult, ResultMap};
use crate::hashing::HashValue;

/// How caches are shared between module instances of one implementation
/// type.
pub type SharedCache = Rc<RefCell<ModuleCache>>;

/// Shared handle to the registry of persistable types.
pub type SharedCodecs = Rc<RefCell<CodecRegistry>>;

#[derive(Serialize, Deserialize)]
struct StoredField {
    key: String,
    #[serde(rename = "type")]
    fingerprint: String,
    value: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
struct StoredResultMap {
    fields: Vec<StoredField>,
}

/// Per-implementation-type result cache.
pub struct ModuleCache {
    primary: BTreeMap<String, ResultMap>,
    backing: Option<Box<dyn Database>>,
    codecs: SharedCodecs,
}

impl ModuleCache {
    pub fn new(codecs: SharedCodecs) -> Self {
        ModuleCache {
            primary: BTreeMap::new(),
            backing: None,
            codecs,
        }
    }

    /// Cache with its own empty codec registry; nothing it holds can be
    /// persisted until types are registered elsewhere.
    pub fn in_memory() -> Self {
        Self::new(Rc::new(RefCell::new(CodecRegistry::new())))
    }

    /// Attach (or replace) the secondary backing store.
    pub fn attach_backing(&mut self, backing: Box<dyn Database>) {
        self.backing = Some(backing);
    }

    pub fn has_backing(&self) -> bool {
        self.backing.is_some()
    }

    /// Number of entries under `key` across both tiers (0 or 1).
    pub fn count(&self, key: &str) -> usize {
        if self.primary.contains_key(key) {
            return 1;
        }
        self.backing
            .as_ref()
            .map_or(0, |backing| backing.count(key))
    }

    /// Retrieve the result map stored under `key`, consulting the primary
    /// tier first.
    ///
    /// # Errors
    ///
    /// *not-found* when neither tier holds the key; *backend-io* when the
    /// backing store fails or a stored type has no codec.
    pub fn at(&self, key: &str) -> EngineResult<ResultMap> {
        if let Some(results) = self.primary.get(key) {
            return Ok(results.clone());
        }
        let backing = self
            .backing
            .as_ref()
            .ok_or_else(|| EngineError::NotFound(key.to_string()))?;
        let bytes = backing.at(key)?;
        self.decode_results(&bytes)
    }

    /// Store a computed result map. Presence of a key afterwards implies a
    /// successful computation with an equivalent context.
    pub fn insert(&mut self, key: impl Into<String>, results: ResultMap) {
        self.primary.insert(key.into(), results);
    }

    /// Remove `key` from both tiers.
    pub fn free(&mut self, key: &str) -> EngineResult<()> {
        self.primary.remove(key);
        if let Some(backing) = self.backing.as_mut() {
            backing.free(key)?;
        }
        Ok(())
    }

    /// Flush every primary entry into the backing store.
    ///
    /// # Errors
    ///
    /// *backend-io* when encoding or the store fails; already-flushed
    /// entries stay flushed and the primary map is untouched either way.
    pub fn backup(&mut self) -> EngineResult<()> {
        let backing = match self.backing.as_mut() {
            Some(backing) => backing,
            None => return Ok(()),
        };
        for (key, results) in &self.primary {
            let bytes = encode_results(&self.codecs.borrow(), results)?;
            backing.insert(key, bytes)?;
        }
        backing.backup()?;
        tracing::debug!(entries = self.primary.len(), "cache backed up");
        Ok(())
    }

    /// Evict the primary tier. Entries never backed up are lost.
    pub fn dump(&mut self) {
        let evicted = self.primary.len();
        self.primary.clear();
        tracing::debug!(evicted, "cache primary dumped");
    }

    /// Merge entries from `other` whose keys are missing here. Idempotent,
    /// and never drops a prior primary key.
    pub fn synchronize(&mut self, other: &ModuleCache) {
        for (key, results) in &other.primary {
            self.primary
                .entry(key.clone())
                .or_insert_with(|| results.clone());
        }
    }

    /// All keys across both tiers, sorted and deduplicated.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.primary.keys().cloned().collect();
        if let Some(backing) = self.backing.as_ref() {
            keys.extend(backing.keys());
        }
        keys.sort();
        keys.dedup();
        keys
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flush every entry into an external store (persistence path).
    pub fn backup_into(&self, store: &mut dyn Database) -> EngineResult<()> {
        for (key, results) in &self.primary {
            let bytes = encode_results(&self.codecs.borrow(), results)?;
            store.insert(key, bytes)?;
        }
        store.backup()
    }

    /// Load every entry of an external store into the primary tier.
    pub fn load_from(&mut self, store: &dyn Database) -> EngineResult<()> {
        for key in store.keys() {
            let bytes = store.at(&key)?;
            let results = self.decode_results(&bytes)?;
            self.primary.insert(key, results);
        }
        Ok(())
    }

    fn decode_results(&self, bytes: &[u8]) -> EngineResult<ResultMap> {
        decode_results(&self.codecs.borrow(), bytes)
    }
}

impl PartialEq for ModuleCache {
    /// Key-set equality across both tiers.
    fn eq(&self, other: &Self) -> bool {
        self.keys() == other.keys()
    }
}

impl std::fmt::Debug for ModuleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleCache")
            .field("primary", &self.primary)
            .field("backing", &self.backing.is_some())
            .finish()
    }
}

fn encode_results(codecs: &CodecRegistry, results: &ResultMap) -> EngineResult<Vec<u8>> {
    let mut fields = Vec::with_capacity(results.len());
    for (key, result) in results.iter() {
        let field = result.any_field().ok_or_else(|| {
            EngineError::BackendIo(format!("result '{key}' holds no value"))
        })?;
        let (fingerprint, value) = codecs.encode(field)?;
        fields.push(StoredField {
            key: key.to_string(),
            fingerprint: fingerprint.to_hex(),
            value,
        });
    }
    Ok(serde_json::to_vec(&StoredResultMap { fields })?)
}

fn decode_results(codecs: &CodecRegistry, bytes: &[u8]) -> EngineResult<ResultMap> {
    let stored: StoredResultMap = serde_json::from_slice(bytes)?;
    let mut results = ResultMap::new();
    for field in stored.fields {
        let fingerprint = HashValue::from_hex(&field.fingerprint).ok_or_else(|| {
            EngineError::BackendIo(format!("malformed type fingerprint for '{}'", field.key))
        })?;
        let value = codecs.decode(fingerprint, &field.value)?;
        results.insert(field.key, ModuleResult::from_decoded(value));
    }
    Ok(results)
}
