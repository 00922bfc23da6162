//! The runtime module: a developer implementation plus user-bound state.
//!
//! `Module` is the unit callers hold: it owns the runtime core (bound
//! inputs, submodule bindings, lock and memoization flags, the shared
//! per-implementation-type cache) and dispatches typed calls through
//! property types. A module is ready when every non-optional input has a
//! value and every submodule slot is bound to a ready module; running locks
//! the whole subtree.

mod base;
mod core;
mod lambda;

pub use base::{ModuleBase, ModuleDeclaration, TypeKey};
pub use lambda::{lambda_module, LambdaModule};

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::cache::SharedCache;
use crate::errors::{EngineError, EngineResult};
use crate::fields::{FieldMap, InputMap, ModuleInput, ResultMap};
use crate::hashing::HashValue;
use crate::property_type::{self, PropertyType, PtKey};
use crate::submodule::SubmoduleRequest;

use self::core::ModuleCore;

/// Shared handle to a module, as held by managers and submodule slots.
pub type SharedModule = Rc<RefCell<Module>>;

/// A ready-to-wire computation unit.
pub struct Module {
    core: Box<ModuleCore>,
}

impl Module {
    /// Wrap an implementation with a cache shared by every module of the
    /// same implementation type.
    ///
    /// # Errors
    ///
    /// *bad-type* when the implementation's declaration does not cover the
    /// fields of every property type it claims to satisfy.
    pub fn new(base: Arc<dyn ModuleBase>, cache: SharedCache) -> EngineResult<Self> {
        Ok(Module {
            core: Box::new(ModuleCore::new(base, cache)?),
        })
    }

    /// Identity of the wrapped implementation.
    pub fn type_key(&self) -> TypeKey {
        self.core.type_key()
    }

    /// Unqualified implementation name, for messages and documentation.
    pub fn implementation_name(&self) -> String {
        self.core.type_key().short_name()
    }

    pub fn description(&self) -> Option<&str> {
        self.core.description()
    }

    pub fn citations(&self) -> &[String] {
        self.core.citations()
    }

    /// Property types this module's implementation satisfies.
    pub fn property_types(&self) -> &[PtKey] {
        self.core.property_types()
    }

    /// The bound input map.
    pub fn inputs(&self) -> &InputMap {
        self.core.inputs()
    }

    /// The declared result schema.
    pub fn results(&self) -> &ResultMap {
        self.core.results()
    }

    /// The submodule slots.
    pub fn submods(&self) -> &FieldMap<SubmoduleRequest> {
        self.core.submods()
    }

    /// Mutable access to a bound input.
    ///
    /// # Errors
    ///
    /// *locked* while the module is locked; *unknown-key* for an undeclared
    /// input.
    pub fn input_mut(&mut self, key: &str) -> EngineResult<&mut ModuleInput> {
        self.core.input_mut(key)
    }

    /// Bind a value to a declared input.
    pub fn change_input<T: crate::any::FieldPayload>(
        &mut self,
        key: &str,
        value: T,
    ) -> EngineResult<()> {
        self.core
            .input_mut(key)?
            .change(value)
            .map_err(|err| err.with_field(key))
    }

    /// Bind a module into a declared submodule slot.
    ///
    /// # Errors
    ///
    /// *locked*, *unknown-key*, or *pt-unsatisfied*.
    pub fn change_submod(&mut self, key: &str, module: SharedModule) -> EngineResult<()> {
        self.core.change_submod(key, module)
    }

    /// Every non-optional input has a value and every submodule slot is
    /// bound to a ready module.
    pub fn ready(&self) -> bool {
        self.core.ready_impl(&mut BTreeSet::new())
    }

    /// Readiness under hypothetical call-time inputs.
    pub fn ready_with(&self, call_inputs: &InputMap) -> bool {
        self.core.ready_with(call_inputs)
    }

    /// Recursively lock this module and every bound submodule.
    pub fn lock(&mut self) -> EngineResult<()> {
        self.core.lock_impl(&mut BTreeSet::new())
    }

    /// Clear this module's locked flag (children stay as they are: a shared
    /// submodule may be locked under another parent).
    pub fn unlock(&mut self) {
        self.core.unlock()
    }

    pub fn locked(&self) -> bool {
        self.core.locked()
    }

    pub fn is_memoizable(&self) -> bool {
        self.core.is_memoizable()
    }

    pub fn turn_on_memoization(&mut self) -> EngineResult<()> {
        self.core.turn_on_memoization()
    }

    pub fn turn_off_memoization(&mut self) -> EngineResult<()> {
        self.core.turn_off_memoization()
    }

    /// Run with a named input map. See the crate docs for the merge,
    /// validate, lock, hash, cache, dispatch sequence.
    pub fn run(&mut self, call_inputs: InputMap) -> EngineResult<ResultMap> {
        self.core.run(call_inputs)
    }

    /// Typed dispatch through property type `PT`: positional arguments are
    /// packed into the named form, the module runs, and `PT`'s declared
    /// results are read back out positionally.
    ///
    /// # Errors
    ///
    /// *pt-unsatisfied* when the implementation does not declare `PT`;
    /// otherwise whatever `run` surfaces.
    pub fn run_as<PT: PropertyType>(&mut self, args: PT::Inputs) -> EngineResult<PT::Results> {
        if !self.property_types().contains(&PT::key()) {
            return Err(EngineError::PtUnsatisfied {
                name: self.implementation_name(),
                property_type: PT::key().short_name(),
            });
        }
        let call_inputs = property_type::wrap_inputs::<PT>(args)?;
        let results = self.run(call_inputs)?;
        property_type::unwrap_results::<PT>(&results)
    }

    /// The context hash a run with these inputs would be memoized under.
    pub fn context_hash(&self, call_inputs: &InputMap) -> EngineResult<HashValue> {
        self.core.context_hash(call_inputs)
    }

    /// Whether a run with these inputs is already memoized.
    pub fn is_cached(&self, call_inputs: &InputMap) -> bool {
        self.core.is_cached(call_inputs)
    }

    /// Evict the primary cache tier shared by this implementation type.
    pub fn reset_cache(&self) {
        self.core.reset_cache()
    }

    /// Timing data for this module and all submodules, as a formatted
    /// string.
    pub fn profile_info(&self) -> String {
        self.core.profile_info()
    }

    /// Deep copy with the locked flag cleared. Inputs and submodule
    /// bindings are preserved; the copy shares the per-type cache.
    pub fn unlocked_copy(&self) -> Module {
        let mut core = self.core.clone();
        core.unlock();
        Module { core }
    }

    pub(crate) fn ready_impl(&self, visited: &mut BTreeSet<usize>) -> bool {
        self.core.ready_impl(visited)
    }

    pub(crate) fn lock_impl(&mut self, visited: &mut BTreeSet<usize>) -> EngineResult<()> {
        self.core.lock_impl(visited)
    }

    pub(crate) fn context_hash_with(
        &self,
        visited: &mut BTreeSet<usize>,
    ) -> EngineResult<HashValue> {
        self.core.context_hash_with(visited)
    }

    /// Wrap a module for sharing with managers and submodule slots.
    pub fn into_shared(self) -> SharedModule {
        Rc::new(RefCell::new(self))
    }
}

impl Clone for Module {
    /// Deep copy, lockedness included. The per-type cache and submodule
    /// bindings are shared, not duplicated.
    fn clone(&self) -> Self {
        Module {
            core: self.core.clone(),
        }
    }
}

impl PartialEq for Module {
    /// Same algorithm, bound inputs, submodule bindings, lockedness, and
    /// satisfied property types. Stable under copy.
    fn eq(&self, other: &Self) -> bool {
        self.core == other.core
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("implementation", &self.implementation_name())
            .field("locked", &self.locked())
            .field("memoizable", &self.is_memoizable())
            .field("ready", &self.ready())
            .finish()
    }
}
