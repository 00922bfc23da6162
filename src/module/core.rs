//! Runtime state behind a `Module`.
//!
//! This is where a module's actual state lives: whenever the module is
//! called, the values here are the bound values for inputs and submodules,
//! not the defaults in the developer-provided implementation. That split
//! preserves the developer's defaults while letting users override them.
//!
//! The run path: merge call inputs with bound state, validate readiness,
//! lock the subtree, compute the context hash, consult the cache, dispatch
//! to the implementation on a miss, store, return.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::SharedCache;
use crate::errors::{EngineError, EngineResult};
use crate::fields::{FieldMap, InputMap, ResultMap};
use crate::hashing::{ContextHasher, HashValue};
use crate::module::base::{ModuleBase, TypeKey};
use crate::property_type::PtKey;
use crate::submodule::SubmoduleRequest;

/// Bounded record of recent runs.
const PROFILE_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub(crate) struct RunRecord {
    pub started: String,
    pub duration: Duration,
    pub cache_hit: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct RunProfile {
    records: Vec<RunRecord>,
}

impl RunProfile {
    fn record(&mut self, started: String, duration: Duration, cache_hit: bool) {
        if self.records.len() == PROFILE_CAPACITY {
            self.records.remove(0);
        }
        self.records.push(RunRecord {
            started,
            duration,
            cache_hit,
        });
    }

    pub fn records(&self) -> &[RunRecord] {
        &self.records
    }
}

fn time_stamp() -> String {
    chrono::Local::now().format("%d-%m-%Y %H:%M:%S%.3f").to_string()
}

/// The module's mutable runtime state plus its immutable implementation.
#[derive(Clone)]
pub(crate) struct ModuleCore {
    base: Arc<dyn ModuleBase>,
    description: Option<String>,
    citations: Vec<String>,
    property_types: Vec<PtKey>,
    inputs: InputMap,
    submods: FieldMap<SubmoduleRequest>,
    results: ResultMap,
    cache: SharedCache,
    locked: bool,
    memoizable: bool,
    profile: RunProfile,
}

impl ModuleCore {
    /// Wrap an implementation, snapshotting its declaration as the bound
    /// state. Fails if the declaration violates its own property-type
    /// contracts.
    pub fn new(base: Arc<dyn ModuleBase>, cache: SharedCache) -> EngineResult<Self> {
        let declaration = base.declaration();
        declaration.validate()?;
        let memoizable = base.default_memoizable();
        Ok(ModuleCore {
            description: declaration.description().map(str::to_string),
            citations: declaration.citations().to_vec(),
            property_types: declaration.property_types().to_vec(),
            inputs: declaration.inputs().clone(),
            submods: declaration.submodules().clone(),
            results: declaration.results().clone(),
            base,
            cache,
            locked: false,
            memoizable,
            profile: RunProfile::default(),
        })
    }

    pub fn type_key(&self) -> TypeKey {
        self.base.type_key()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn citations(&self) -> &[String] {
        &self.citations
    }

    pub fn property_types(&self) -> &[PtKey] {
        &self.property_types
    }

    pub fn inputs(&self) -> &InputMap {
        &self.inputs
    }

    pub fn results(&self) -> &ResultMap {
        &self.results
    }

    pub fn submods(&self) -> &FieldMap<SubmoduleRequest> {
        &self.submods
    }

    pub fn locked(&self) -> bool {
        self.locked
    }

    pub fn is_memoizable(&self) -> bool {
        self.memoizable
    }

    fn assert_unlocked(&self) -> EngineResult<()> {
        if self.locked {
            return Err(EngineError::Locked(self.type_key().short_name()));
        }
        Ok(())
    }

    /// Mutable access to a bound input, refused while locked.
    pub fn input_mut(&mut self, key: &str) -> EngineResult<&mut crate::fields::ModuleInput> {
        self.assert_unlocked()?;
        self.inputs.at_mut(key)
    }

    /// Bind a submodule, refused while locked.
    pub fn change_submod(
        &mut self,
        key: &str,
        module: crate::module::SharedModule,
    ) -> EngineResult<()> {
        self.assert_unlocked()?;
        self.submods.at_mut(key)?.change(module)
    }

    pub fn turn_on_memoization(&mut self) -> EngineResult<()> {
        self.assert_unlocked()?;
        self.memoizable = true;
        Ok(())
    }

    pub fn turn_off_memoization(&mut self) -> EngineResult<()> {
        self.assert_unlocked()?;
        self.memoizable = false;
        Ok(())
    }

    /// Every non-optional input has a value and every submodule slot is
    /// bound to a ready module.
    pub fn ready_impl(&self, visited: &mut BTreeSet<usize>) -> bool {
        self.inputs.values().all(|input| input.ready())
            && self
                .submods
                .values()
                .all(|request| request.ready_with(visited))
    }

    /// Readiness under hypothetical call-time inputs.
    pub fn ready_with(&self, call_inputs: &InputMap) -> bool {
        let merged = match self.merge_inputs(call_inputs) {
            Ok(merged) => merged,
            Err(_) => return false,
        };
        let mut visited = BTreeSet::new();
        merged.values().all(|input| input.ready())
            && self
                .submods
                .values()
                .all(|request| request.ready_with(&mut visited))
    }

    /// Recursively lock this module and every bound submodule. Once locked,
    /// inputs, bindings, and flags are frozen.
    pub fn lock_impl(&mut self, visited: &mut BTreeSet<usize>) -> EngineResult<()> {
        if self.locked {
            return Ok(());
        }
        for (_, request) in self.submods.iter() {
            request.lock_with(visited)?;
        }
        self.locked = true;
        tracing::trace!(module = %self.type_key().short_name(), "locked");
        Ok(())
    }

    /// Clear this module's locked flag. Shallow: a shared submodule may be
    /// held locked by another parent, so children are left untouched.
    pub fn unlock(&mut self) {
        self.locked = false;
        tracing::trace!(module = %self.type_key().short_name(), "unlocked");
    }

    /// Merge call-time inputs over the bound state, in declared order. The
    /// bound descriptor always carries the metadata and checks; only the
    /// value is taken from the call map.
    fn merge_inputs(&self, call_inputs: &InputMap) -> EngineResult<InputMap> {
        for key in call_inputs.keys() {
            if !self.inputs.contains_key(key) {
                return Err(EngineError::UnknownKey(key.to_string()));
            }
        }
        let mut merged = InputMap::new();
        for (key, bound) in self.inputs.iter() {
            let mut field = bound.clone();
            if let Some(given) = call_inputs.get(key) {
                if let Some(value) = given.any_field() {
                    field
                        .change_any(value.clone())
                        .map_err(|err| err.with_field(key))?;
                }
            }
            merged.insert(key, field);
        }
        Ok(merged)
    }

    /// The structured not-ready report for `merged`, or `None` when the
    /// module may run.
    fn not_ready_report(&self, merged: &InputMap) -> Option<EngineError> {
        let missing_inputs: Vec<String> = merged
            .iter()
            .filter(|(_, input)| !input.ready())
            .map(|(key, _)| key.to_string())
            .collect();
        let mut visited = BTreeSet::new();
        let unbound_submods: Vec<String> = self
            .submods
            .iter()
            .filter(|(_, request)| !request.ready_with(&mut visited))
            .map(|(key, _)| key.to_string())
            .collect();
        if missing_inputs.is_empty() && unbound_submods.is_empty() {
            return None;
        }
        Some(EngineError::NotReady {
            missing_inputs,
            unbound_submods,
        })
    }

    /// Context hash over an explicit input set: implementation identity,
    /// opaque inputs in declared order, then submodule context hashes in
    /// declared order. Transparent inputs contribute the zero hash.
    fn context_hash_for(
        &self,
        inputs: &InputMap,
        visited: &mut BTreeSet<usize>,
    ) -> EngineResult<HashValue> {
        let mut hasher = ContextHasher::new();
        hasher.update_str(self.base.type_key().name());
        if let Some(token) = self.base.identity_token() {
            hasher.update_str(token);
        }
        for (key, input) in inputs.iter() {
            hasher.update_str(key);
            input.hash(&mut hasher).map_err(|err| err.with_field(key))?;
        }
        for (key, request) in self.submods.iter() {
            hasher.update_str(key);
            request.hash_with(&mut hasher, visited)?;
        }
        Ok(hasher.finish())
    }

    /// Context hash over the currently-bound inputs (the form submodule
    /// slots contribute to their parents).
    pub fn context_hash_with(&self, visited: &mut BTreeSet<usize>) -> EngineResult<HashValue> {
        self.context_hash_for(&self.inputs, visited)
    }

    /// Context hash for a hypothetical invocation.
    pub fn context_hash(&self, call_inputs: &InputMap) -> EngineResult<HashValue> {
        let merged = self.merge_inputs(call_inputs)?;
        self.context_hash_for(&merged, &mut BTreeSet::new())
    }

    /// Whether a run with these inputs is memoized.
    pub fn is_cached(&self, call_inputs: &InputMap) -> bool {
        match self.context_hash(call_inputs) {
            Ok(hash) => self.cache.borrow().count(&hash.to_hex()) == 1,
            Err(_) => false,
        }
    }

    /// Evict this implementation type's primary cache tier.
    pub fn reset_cache(&self) {
        self.cache.borrow_mut().dump();
    }

    /// Execute the module.
    ///
    /// Readiness failures surface before any lock transition; failures from
    /// the implementation propagate uncached with the module left locked.
    pub fn run(&mut self, call_inputs: InputMap) -> EngineResult<ResultMap> {
        let started = time_stamp();
        let timer = Instant::now();
        let name = self.type_key().short_name();

        let merged = self.merge_inputs(&call_inputs)?;
        if let Some(not_ready) = self.not_ready_report(&merged) {
            return Err(not_ready);
        }

        self.lock_impl(&mut BTreeSet::new())?;

        let hash = self.context_hash_for(&merged, &mut BTreeSet::new())?;
        let hash_hex = hash.to_hex();

        if self.memoizable && self.cache.borrow().count(&hash_hex) == 1 {
            tracing::debug!(module = %name, hash = %hash_hex, "cache hit");
            let results = self.cache.borrow().at(&hash_hex)?;
            self.profile.record(started, timer.elapsed(), true);
            return Ok(results);
        }

        tracing::debug!(module = %name, hash = %hash_hex, "running implementation");
        let results = self.base.run(&merged, &self.submods)?;

        if self.memoizable {
            self.cache.borrow_mut().insert(hash_hex, results.clone());
        }
        self.profile.record(started, timer.elapsed(), false);
        Ok(results)
    }

    /// Timing data for this module and, indented, every bound submodule.
    pub fn profile_info(&self) -> String {
        let mut out = String::new();
        let name = self.type_key().short_name();
        match self.profile.records().last() {
            Some(last) => {
                let _ = writeln!(
                    out,
                    "{name}: {} run(s), last at {} took {:.3} ms{}",
                    self.profile.records().len(),
                    last.started,
                    last.duration.as_secs_f64() * 1e3,
                    if last.cache_hit { " (cache hit)" } else { "" },
                );
            }
            None => {
                let _ = writeln!(out, "{name}: no recorded runs");
            }
        }
        for (key, request) in self.submods.iter() {
            let _ = writeln!(out, "  {key}");
            if let Ok(module) = request.value() {
                if let Ok(borrowed) = module.try_borrow() {
                    for line in borrowed.profile_info().lines() {
                        let _ = writeln!(out, "    {line}");
                    }
                }
            }
        }
        out
    }
}

impl PartialEq for ModuleCore {
    /// Same algorithm (most-derived implementation type), same bound
    /// inputs, same submodule bindings, same lockedness, same satisfied
    /// property types.
    fn eq(&self, other: &Self) -> bool {
        self.base.type_key() == other.base.type_key()
            && self.locked == other.locked
            && self.inputs == other.inputs
            && self.submods == other.submods
            && self.property_types == other.property_types
    }
}
