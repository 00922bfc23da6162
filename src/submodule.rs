//! Submodule call-sites.
//!
//! A `SubmoduleRequest` is a named hole in a module's definition: it names
//! the property type the eventual callee must satisfy, and optionally holds
//! the module bound to fill it. Binding, readiness, locking, and hashing all
//! flow through the request.

use std::collections::BTreeSet;
use std::fmt;

use crate::errors::{EngineError, EngineResult};
use crate::hashing::{ContextHasher, HashValue};
use crate::module::SharedModule;
use crate::property_type::{PropertyType, PtKey};

/// A named, typed submodule slot.
#[derive(Clone)]
pub struct SubmoduleRequest {
    required: Option<PtKey>,
    description: Option<String>,
    module: Option<SharedModule>,
}

impl SubmoduleRequest {
    pub fn new() -> Self {
        SubmoduleRequest {
            required: None,
            description: None,
            module: None,
        }
    }

    /// Declare the property type a bound module must satisfy.
    pub fn with_type<PT: PropertyType>(mut self) -> Self {
        self.required = Some(PT::key());
        self
    }

    pub fn set_type<PT: PropertyType>(&mut self) -> &mut Self {
        self.required = Some(PT::key());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn has_type(&self) -> bool {
        self.required.is_some()
    }

    pub fn has_module(&self) -> bool {
        self.module.is_some()
    }

    /// The property type a bound module must satisfy.
    pub fn required_property_type(&self) -> Option<PtKey> {
        self.required
    }

    /// Bind `module` to this slot.
    ///
    /// # Errors
    ///
    /// * *not-found* — no property type has been declared for the slot.
    /// * *pt-unsatisfied* — the module does not satisfy the declared
    ///   property type.
    pub fn change(&mut self, module: SharedModule) -> EngineResult<()> {
        let required = self.required.ok_or_else(|| {
            EngineError::NotFound("submodule request declares no property type".to_string())
        })?;
        {
            let borrowed = module
                .try_borrow()
                .map_err(|_| EngineError::Locked("submodule is currently executing".to_string()))?;
            if !borrowed.property_types().contains(&required) {
                return Err(EngineError::PtUnsatisfied {
                    name: borrowed.implementation_name(),
                    property_type: required.short_name(),
                });
            }
        }
        self.module = Some(module);
        Ok(())
    }

    /// The bound module.
    ///
    /// # Errors
    ///
    /// *not-found* when the slot is unbound.
    pub fn value(&self) -> EngineResult<SharedModule> {
        self.module
            .clone()
            .ok_or_else(|| EngineError::NotFound("submodule slot is unbound".to_string()))
    }

    /// Bound, and the bound module itself is ready.
    pub fn ready(&self) -> bool {
        let mut visited = BTreeSet::new();
        self.ready_with(&mut visited)
    }

    pub(crate) fn ready_with(&self, visited: &mut BTreeSet<usize>) -> bool {
        match &self.module {
            Some(module) => {
                if !visited.insert(module_ptr(module)) {
                    // Already on the traversal path: break the cycle and let
                    // the first visit decide.
                    return true;
                }
                match module.try_borrow() {
                    Ok(borrowed) => borrowed.ready_impl(visited),
                    Err(_) => false,
                }
            }
            None => false,
        }
    }

    pub(crate) fn lock_with(&self, visited: &mut BTreeSet<usize>) -> EngineResult<()> {
        if let Some(module) = &self.module {
            if !visited.insert(module_ptr(module)) {
                return Ok(());
            }
            let mut borrowed = module.try_borrow_mut().map_err(|_| {
                EngineError::Locked("submodule is currently executing".to_string())
            })?;
            borrowed.lock_impl(visited)?;
        }
        Ok(())
    }

    /// Contribute the bound module's context hash (over its bound inputs).
    /// An unbound slot or a cycle revisit contributes the zero hash.
    pub(crate) fn hash_with(
        &self,
        hasher: &mut ContextHasher,
        visited: &mut BTreeSet<usize>,
    ) -> EngineResult<()> {
        match &self.module {
            Some(module) if visited.insert(module_ptr(module)) => {
                let borrowed = module.try_borrow().map_err(|_| {
                    EngineError::Locked("submodule is currently executing".to_string())
                })?;
                let child_hash = borrowed.context_hash_with(visited)?;
                hasher.update_hash(&child_hash);
                Ok(())
            }
            _ => {
                hasher.update_hash(&HashValue::ZERO);
                Ok(())
            }
        }
    }

    /// Run the bound module through property type `PT`.
    ///
    /// This is the call-site module authors use from inside `run`.
    pub fn run_as<PT: PropertyType>(&self, args: PT::Inputs) -> EngineResult<PT::Results> {
        let module = self.value()?;
        let mut borrowed = module
            .try_borrow_mut()
            .map_err(|_| EngineError::Locked("submodule is currently executing".to_string()))?;
        borrowed.run_as::<PT>(args)
    }
}

fn module_ptr(module: &SharedModule) -> usize {
    std::rc::Rc::as_ptr(module) as *const () as usize
}

impl Default for SubmoduleRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for SubmoduleRequest {
    /// Structural: same requested property type, same description, and
    /// bound modules (if any) compare equal.
    fn eq(&self, other: &Self) -> bool {
        if self.required != other.required || self.description != other.description {
            return false;
        }
        match (&self.module, &other.module) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                if std::rc::Rc::ptr_eq(a, b) {
                    return true;
                }
                match (a.try_borrow(), b.try_borrow()) {
                    (Ok(a), Ok(b)) => *a == *b,
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

impl fmt::Debug for SubmoduleRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmoduleRequest")
            .field("required", &self.required.map(|pt| pt.short_name()))
            .field("description", &self.description)
            .field("bound", &self.module.is_some())
            .finish()
    }
}
