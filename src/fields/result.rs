//! Result field descriptor.
//!
//! Same shape as an input without optional/transparent flags or domain
//! checks. Bound values are held by shared ownership so cached result maps
//! clone cheaply.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use crate::any::{short_type_name, AnyField, FieldPayload};
use crate::errors::{EngineError, EngineResult};
use crate::fields::DeclaredType;
use crate::hashing::{ContextHasher, HashValue};

/// Typed, named result slot.
#[derive(Clone, Debug, PartialEq)]
pub struct ModuleResult {
    declared: Option<DeclaredType>,
    description: Option<String>,
    value: Option<AnyField>,
}

impl ModuleResult {
    pub fn new() -> Self {
        ModuleResult {
            declared: None,
            description: None,
            value: None,
        }
    }

    /// Declare the result's type. Re-declaring the same type is a no-op;
    /// changing the type of a result that already holds a value is
    /// *bad-type*.
    pub fn set_type<T: FieldPayload>(&mut self) -> EngineResult<&mut Self> {
        if let Some(declared) = &self.declared {
            if declared.type_id == TypeId::of::<T>() {
                return Ok(self);
            }
            if self.value.is_some() {
                return Err(EngineError::BadType {
                    expected: declared.short_name(),
                    actual: short_type_name(std::any::type_name::<T>()),
                });
            }
        }
        self.declared = Some(DeclaredType::of::<T>(true));
        Ok(self)
    }

    pub fn with_type<T: FieldPayload>(mut self) -> Self {
        self.value = None;
        self.declared = Some(DeclaredType::of::<T>(true));
        self
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Bind a value by ownership; it is moved into shared storage.
    pub fn change<T: FieldPayload>(&mut self, value: T) -> EngineResult<()> {
        self.assert_declared::<T>()?;
        self.value = Some(AnyField::shared(Arc::new(value)));
        Ok(())
    }

    /// Bind an already-shared value.
    pub fn change_shared<T: FieldPayload>(&mut self, value: Arc<T>) -> EngineResult<()> {
        self.assert_declared::<T>()?;
        self.value = Some(AnyField::shared(value));
        Ok(())
    }

    /// Rebuild a result slot around a decoded value, deriving the declared
    /// type from the value itself. Descriptions do not survive persistence.
    pub(crate) fn from_decoded(field: AnyField) -> Self {
        ModuleResult {
            declared: Some(DeclaredType {
                type_id: field.type_id(),
                type_name: field.type_name(),
                shared: true,
            }),
            description: None,
            value: Some(field),
        }
    }

    /// Bind a pre-erased value (the wrap path of property types and the
    /// cache decode path).
    pub(crate) fn change_any(&mut self, field: AnyField) -> EngineResult<()> {
        let declared = self.declared.as_ref().ok_or_else(|| EngineError::NotReady {
            missing_inputs: vec!["(type not declared)".to_string()],
            unbound_submods: Vec::new(),
        })?;
        if declared.type_id != field.type_id() {
            return Err(EngineError::BadType {
                expected: declared.short_name(),
                actual: field.short_type_name(),
            });
        }
        self.value = Some(field);
        Ok(())
    }

    fn assert_declared<T: FieldPayload>(&self) -> EngineResult<()> {
        let declared = self.declared.as_ref().ok_or_else(|| EngineError::NotReady {
            missing_inputs: vec!["(type not declared)".to_string()],
            unbound_submods: Vec::new(),
        })?;
        if declared.type_id != TypeId::of::<T>() {
            return Err(EngineError::BadType {
                expected: declared.short_name(),
                actual: short_type_name(std::any::type_name::<T>()),
            });
        }
        Ok(())
    }

    /// Copy the bound value out as a `T`.
    pub fn value<T: Clone + 'static>(&self) -> EngineResult<T> {
        self.field()?.value::<T>()
    }

    /// Borrow the bound value.
    pub fn get<T: 'static>(&self) -> EngineResult<&T> {
        self.field()?.get::<T>()
    }

    /// Retrieve the bound value by shared ownership.
    pub fn shared_value<T: FieldPayload + Clone>(&self) -> EngineResult<Arc<T>> {
        self.field()?.shared_value::<T>()
    }

    fn field(&self) -> EngineResult<&AnyField> {
        self.value
            .as_ref()
            .ok_or_else(|| EngineError::NotFound("result holds no value".to_string()))
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn has_type(&self) -> bool {
        self.declared.is_some()
    }

    pub fn declared_type_name(&self) -> Option<String> {
        self.declared.as_ref().map(|d| d.short_name())
    }

    pub(crate) fn declared_type_id(&self) -> Option<TypeId> {
        self.declared.as_ref().map(|d| d.type_id)
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub(crate) fn any_field(&self) -> Option<&AnyField> {
        self.value.as_ref()
    }

    /// Contribute to a context hash: the value's hash, or zero when empty.
    pub fn hash(&self, hasher: &mut ContextHasher) -> EngineResult<()> {
        match &self.value {
            Some(value) => value.hash(hasher),
            None => {
                hasher.update_hash(&HashValue::ZERO);
                Ok(())
            }
        }
    }
}

impl Default for ModuleResult {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ModuleResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{value}"),
            None => f.write_str("<unset>"),
        }
    }
}
