//! Registry of named module instances.
//!
//! The manager owns the wrapped modules, the per-implementation-type caches
//! they share, the codec registry used for persistence, and the default
//! module assignments used to auto-fill unbound submodule slots. Defaults
//! are process-scoped configuration, explicitly initialized by the caller.

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::any::{CodecRegistry, FieldPayload};
use crate::cache::{DatabaseFactory, ModuleCache, SharedCache, SharedCodecs};
use crate::errors::{EngineError, EngineResult};
use crate::fields::{FieldMap, InputMap};
use crate::hashing::type_fingerprint;
use crate::module::{Module, ModuleBase, SharedModule, TypeKey};
use crate::property_type::PropertyType;

struct DefaultEntry {
    key: String,
    inputs: InputMap,
}

/// Registry of `key -> Module`, with per-type caches and default wiring.
#[derive(Default)]
pub struct ModuleManager {
    bases: BTreeMap<TypeId, Arc<dyn ModuleBase>>,
    modules: FieldMap<SharedModule>,
    caches: BTreeMap<TypeId, SharedCache>,
    cache_types: BTreeMap<TypeId, TypeKey>,
    defaults: BTreeMap<TypeId, DefaultEntry>,
    codecs: SharedCodecs,
}

impl ModuleManager {
    pub fn new() -> Self {
        ModuleManager {
            bases: BTreeMap::new(),
            modules: FieldMap::new(),
            caches: BTreeMap::new(),
            cache_types: BTreeMap::new(),
            defaults: BTreeMap::new(),
            codecs: Rc::new(RefCell::new(CodecRegistry::new())),
        }
    }

    /// Register `T` for cache persistence.
    pub fn register_type<T>(&mut self)
    where
        T: FieldPayload + Serialize + DeserializeOwned,
    {
        self.codecs.borrow_mut().register::<T>();
    }

    /// Number of registered modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// 1 when `key` names a module, 0 otherwise.
    pub fn count(&self, key: &str) -> usize {
        usize::from(self.modules.contains_key(key))
    }

    /// Registered module keys, in registration order.
    pub fn keys(&self) -> Vec<String> {
        self.modules.keys().map(str::to_string).collect()
    }

    /// Iterate `(key, module)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SharedModule)> {
        self.modules.iter()
    }

    fn cache_for(&mut self, type_key: TypeKey) -> SharedCache {
        let cache = self
            .caches
            .entry(type_key.id())
            .or_insert_with(|| Rc::new(RefCell::new(ModuleCache::new(Rc::clone(&self.codecs)))));
        self.cache_types.entry(type_key.id()).or_insert(type_key);
        Rc::clone(cache)
    }

    /// Wrap `base` in a fresh module registered under `key`, bound to the
    /// cache shared by every module of `base`'s implementation type.
    ///
    /// # Errors
    ///
    /// *already-exists* when the key is taken; *bad-type* when the
    /// implementation's declaration fails validation.
    pub fn add_module(&mut self, key: impl Into<String>, base: Arc<dyn ModuleBase>) -> EngineResult<()> {
        let key = key.into();
        if self.modules.contains_key(&key) {
            return Err(EngineError::AlreadyExists(key));
        }
        let type_key = base.type_key();
        let base = Arc::clone(
            self.bases
                .entry(type_key.id())
                .or_insert_with(|| Arc::clone(&base)),
        );
        let cache = self.cache_for(type_key);
        let module = Module::new(base, cache)?;
        tracing::debug!(key = %key, implementation = %type_key.short_name(), "module registered");
        self.modules.insert_unique(key, module.into_shared())
    }

    /// The module registered under `key`, with any unbound, non-ready
    /// submodule slots auto-filled from the declared defaults.
    ///
    /// # Errors
    ///
    /// *not-found* when the key names nothing.
    pub fn at(&mut self, key: &str) -> EngineResult<SharedModule> {
        let mut resolving = Vec::new();
        self.at_resolving(key, &mut resolving)
    }

    fn at_resolving(&mut self, key: &str, resolving: &mut Vec<String>) -> EngineResult<SharedModule> {
        let module = self
            .modules
            .get(key)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(key.to_string()))?;
        if resolving.iter().any(|seen| seen.eq_ignore_ascii_case(key)) {
            return Ok(module);
        }
        resolving.push(key.to_string());

        // Slots needing defaults, gathered first: filling them borrows the
        // manager again recursively.
        let wanted: Vec<(String, TypeId)> = {
            let borrowed = module.try_borrow().map_err(|_| {
                EngineError::Locked(format!("module '{key}' is currently executing"))
            })?;
            borrowed
                .submods()
                .iter()
                .filter(|(_, request)| !request.ready())
                .filter_map(|(slot, request)| {
                    request
                        .required_property_type()
                        .filter(|pt| self.defaults.contains_key(&pt.id()))
                        .map(|pt| (slot.to_string(), pt.id()))
                })
                .collect()
        };

        for (slot, pt_id) in wanted {
            let (default_key, overrides) = {
                let entry = match self.defaults.get(&pt_id) {
                    Some(entry) => entry,
                    None => continue,
                };
                (entry.key.clone(), entry.inputs.clone())
            };
            let default_module = self.at_resolving(&default_key, resolving)?;
            let bind = {
                let mut borrowed = default_module.try_borrow_mut().map_err(|_| {
                    EngineError::Locked(format!(
                        "default module '{default_key}' is currently executing"
                    ))
                })?;
                // Apply the recorded input overrides, then bind only if the
                // default can actually run.
                for (input_key, input) in overrides.iter() {
                    if let Some(value) = input_value(input) {
                        borrowed
                            .input_mut(input_key)?
                            .change_any(value)
                            .map_err(|err| err.with_field(input_key))?;
                    }
                }
                borrowed.ready()
            };
            if bind {
                module
                    .try_borrow_mut()
                    .map_err(|_| {
                        EngineError::Locked(format!("module '{key}' is currently executing"))
                    })?
                    .change_submod(&slot, Rc::clone(&default_module))?;
                tracing::debug!(key = %key, slot = %slot, default = %default_key, "default submodule bound");
            }
        }

        resolving.pop();
        Ok(module)
    }

    /// Deep-copy the module under `old_key` to `new_key`. The copy is
    /// unlocked regardless of the original's state.
    pub fn copy_module(&mut self, old_key: &str, new_key: impl Into<String>) -> EngineResult<()> {
        let new_key = new_key.into();
        if self.modules.contains_key(&new_key) {
            return Err(EngineError::AlreadyExists(new_key));
        }
        let copied = {
            let module = self
                .modules
                .get(old_key)
                .ok_or_else(|| EngineError::NotFound(old_key.to_string()))?;
            let borrowed = module.try_borrow().map_err(|_| {
                EngineError::Locked(format!("module '{old_key}' is currently executing"))
            })?;
            borrowed.unlocked_copy()
        };
        self.modules.insert_unique(new_key, copied.into_shared())
    }

    /// Remove the module under `key`. Absent keys are ignored; cached
    /// results of its implementation type stay in the per-type cache.
    pub fn erase(&mut self, key: &str) {
        self.modules.remove(key);
    }

    /// Bind the module registered under `submod_key` into the `slot` of the
    /// module registered under `module_key`.
    pub fn change_submod(
        &mut self,
        module_key: &str,
        slot: &str,
        submod_key: &str,
    ) -> EngineResult<()> {
        let submodule = self
            .modules
            .get(submod_key)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(submod_key.to_string()))?;
        let module = self
            .modules
            .get(module_key)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(module_key.to_string()))?;
        let mut borrowed = module.try_borrow_mut().map_err(|_| {
            EngineError::Locked(format!("module '{module_key}' is currently executing"))
        })?;
        borrowed.change_submod(slot, submodule)
    }

    /// Declare the module under `key` as the default implementation of
    /// `PT`, with `inputs` applied as overrides when the default is bound.
    ///
    /// Modules retrieved through [`at`](Self::at) afterwards have unbound
    /// `PT`-typed submodule slots auto-bound to this default.
    pub fn set_default<PT: PropertyType>(
        &mut self,
        inputs: InputMap,
        key: impl Into<String>,
    ) -> EngineResult<()> {
        let key = key.into();
        if !self.modules.contains_key(&key) {
            return Err(EngineError::NotFound(key));
        }
        let pt = PT::key();
        tracing::debug!(property_type = %pt.short_name(), key = %key, "default module declared");
        self.defaults.insert(pt.id(), DefaultEntry { key, inputs });
        Ok(())
    }

    /// The declared default module key for `PT`, if any.
    pub fn default_for<PT: PropertyType>(&self) -> Option<&str> {
        self.defaults
            .get(&PT::key().id())
            .map(|entry| entry.key.as_str())
    }

    /// Persist every per-type cache under `root`: serialized value stores
    /// under `root/cache/` and the registered-type directory under
    /// `root/uuid/`. Directories are created on first use.
    pub fn save_caches(&self, root: impl AsRef<Path>) -> EngineResult<()> {
        let factory = DatabaseFactory::new(root.as_ref());
        for (fingerprint, type_name) in self.codecs.borrow().entries() {
            factory.record_type(&fingerprint.to_hex(), type_name)?;
        }
        for (type_id, cache) in &self.caches {
            let type_key = match self.cache_types.get(type_id) {
                Some(type_key) => type_key,
                None => continue,
            };
            let fingerprint = type_fingerprint(type_key.name());
            let mut store = factory.value_store(&fingerprint.to_hex())?;
            cache.borrow().backup_into(&mut store)?;
        }
        tracing::info!(root = %root.as_ref().display(), caches = self.caches.len(), "caches saved");
        Ok(())
    }

    /// Load previously-saved caches from `root`. Implementation types with
    /// no registered module are skipped; stored values of unregistered
    /// payload types surface *backend-io*.
    pub fn load_caches(&mut self, root: impl AsRef<Path>) -> EngineResult<()> {
        let factory = DatabaseFactory::new(root.as_ref());
        let stored = factory.stored_fingerprints()?;
        let known: Vec<(String, TypeId)> = self
            .cache_types
            .iter()
            .map(|(type_id, type_key)| (type_fingerprint(type_key.name()).to_hex(), *type_id))
            .collect();
        for (fingerprint_hex, type_id) in known {
            if !stored.contains(&fingerprint_hex) {
                continue;
            }
            let store = factory.value_store(&fingerprint_hex)?;
            if let Some(cache) = self.caches.get(&type_id) {
                cache.borrow_mut().load_from(&store)?;
            }
        }
        tracing::info!(root = %root.as_ref().display(), "caches loaded");
        Ok(())
    }
}

fn input_value(input: &crate::fields::ModuleInput) -> Option<crate::any::AnyField> {
    input.any_field().cloned()
}
