//! Input field descriptor.
//!
//! A `ModuleInput` carries a declared type, metadata, domain checks, and at
//! most one bound value. Values may be stored only after the type is
//! declared, and every stored value must pass every registered check.

use std::any::TypeId;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::any::{short_type_name, AnyField, FieldPayload};
use crate::errors::{EngineError, EngineResult};
use crate::fields::bounds::{BoundsCheck, ErasedCheck};
use crate::fields::DeclaredType;
use crate::hashing::{ContextHasher, HashValue};

/// Typed, named input slot with metadata, checks, and value state.
#[derive(Clone, Debug)]
pub struct ModuleInput {
    declared: Option<DeclaredType>,
    description: Option<String>,
    value: Option<AnyField>,
    checks: Vec<ErasedCheck>,
    optional: bool,
    transparent: bool,
}

impl ModuleInput {
    pub fn new() -> Self {
        ModuleInput {
            declared: None,
            description: None,
            value: None,
            checks: Vec::new(),
            optional: false,
            transparent: false,
        }
    }

    fn declare<T: FieldPayload>(&mut self, shared: bool) {
        let declared = DeclaredType::of::<T>(shared);
        // Checks registered against a previously-declared type cannot apply
        // to the new one.
        if self.declared.as_ref().map(|d| d.type_id) != Some(declared.type_id) {
            self.checks.clear();
        } else {
            self.checks
                .retain(|check| !check.label().starts_with("Type == "));
        }
        self.checks
            .insert(0, ErasedCheck::type_check::<T>(&declared.short_name()));
        self.declared = Some(declared);
    }

    /// Declare the input's type as a by-value `T`. Re-declaring the same type
    /// is a no-op; changing the type of an input that already holds a value
    /// is a *bad-type* error.
    pub fn set_type<T: FieldPayload>(&mut self) -> EngineResult<&mut Self> {
        self.set_type_impl::<T>(false)
    }

    /// Declare the input's type as a shared (const-reference) `T`: bound
    /// values are stored by shared ownership instead of being copied.
    pub fn set_type_shared<T: FieldPayload>(&mut self) -> EngineResult<&mut Self> {
        self.set_type_impl::<T>(true)
    }

    fn set_type_impl<T: FieldPayload>(&mut self, shared: bool) -> EngineResult<&mut Self> {
        if let Some(declared) = &self.declared {
            if declared.type_id == TypeId::of::<T>() && declared.shared == shared {
                return Ok(self);
            }
            if self.value.is_some() {
                return Err(EngineError::BadType {
                    expected: declared.short_name(),
                    actual: short_type_name(std::any::type_name::<T>()),
                });
            }
        }
        self.declare::<T>(shared);
        Ok(self)
    }

    /// Builder form of [`set_type`](Self::set_type). Replaces any prior
    /// declaration and drops a previously-stored value.
    pub fn with_type<T: FieldPayload>(mut self) -> Self {
        self.value = None;
        self.declare::<T>(false);
        self
    }

    /// Builder form of [`set_type_shared`](Self::set_type_shared).
    pub fn with_type_shared<T: FieldPayload>(mut self) -> Self {
        self.value = None;
        self.declare::<T>(true);
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

    /// Builder form of [`change`](Self::change). The default must satisfy
    /// the declared type and every check already registered.
    pub fn with_default<T: FieldPayload>(mut self, value: T) -> Self {
        self.change(value)
            .expect("default value must satisfy the declared type and checks");
        self
    }

    /// Builder form of [`add_check`](Self::add_check).
    pub fn with_check<T: FieldPayload>(mut self, check: BoundsCheck<T>) -> Self {
        self.add_check(check)
            .expect("check must accept the declared type and any stored default");
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn transparent(mut self) -> Self {
        self.transparent = true;
        self
    }

    pub fn make_optional(&mut self) -> &mut Self {
        self.optional = true;
        self
    }

    pub fn make_required(&mut self) -> &mut Self {
        self.optional = false;
        self
    }

    pub fn make_transparent(&mut self) -> &mut Self {
        self.transparent = true;
        self
    }

    pub fn make_opaque(&mut self) -> &mut Self {
        self.transparent = false;
        self
    }

    /// Bind a value.
    ///
    /// # Errors
    ///
    /// * *not-ready* — no type has been declared yet.
    /// * *bad-type* — `T` is not the declared type.
    /// * *out-of-domain* — a registered check rejects the value.
    pub fn change<T: FieldPayload>(&mut self, value: T) -> EngineResult<()> {
        let declared = self.assert_declared::<T>()?;
        let field = if declared.shared {
            AnyField::shared(Arc::new(value))
        } else {
            AnyField::new_const(value)
        };
        self.store(field)
    }

    /// Bind an already-shared value without copying it. A by-value
    /// declaration copies the payload out of the handle.
    pub fn change_shared<T: FieldPayload + Clone>(&mut self, value: Arc<T>) -> EngineResult<()> {
        let declared = self.assert_declared::<T>()?;
        let field = if declared.shared {
            AnyField::shared(value)
        } else {
            AnyField::new_const((*value).clone())
        };
        self.store(field)
    }

    /// Bind a pre-erased value (the wrap path of property types).
    pub(crate) fn change_any(&mut self, field: AnyField) -> EngineResult<()> {
        let declared = self.declared.as_ref().ok_or_else(undeclared_error)?;
        if declared.type_id != field.type_id() {
            return Err(EngineError::BadType {
                expected: declared.short_name(),
                actual: field.short_type_name(),
            });
        }
        self.store(field)
    }

    fn assert_declared<T: FieldPayload>(&self) -> EngineResult<&DeclaredType> {
        let declared = self.declared.as_ref().ok_or_else(undeclared_error)?;
        if declared.type_id != TypeId::of::<T>() {
            return Err(EngineError::BadType {
                expected: declared.short_name(),
                actual: short_type_name(std::any::type_name::<T>()),
            });
        }
        Ok(declared)
    }

    fn store(&mut self, field: AnyField) -> EngineResult<()> {
        for check in &self.checks {
            if !check.passes(field.payload_ref()) {
                return Err(EngineError::OutOfDomain {
                    field: String::new(),
                    check: check.label().to_string(),
                });
            }
        }
        self.value = Some(field);
        Ok(())
    }

    /// Register a domain check. If the input currently holds a value, the
    /// value must satisfy the check or the registration fails immediately.
    pub fn add_check<T: FieldPayload>(&mut self, check: BoundsCheck<T>) -> EngineResult<()> {
        if let Some(declared) = &self.declared {
            if declared.type_id != TypeId::of::<T>() {
                return Err(EngineError::BadType {
                    expected: declared.short_name(),
                    actual: short_type_name(std::any::type_name::<T>()),
                });
            }
        }
        let erased = ErasedCheck::from_typed(check);
        if let Some(value) = &self.value {
            if !erased.passes(value.payload_ref()) {
                return Err(EngineError::OutOfDomain {
                    field: String::new(),
                    check: erased.label().to_string(),
                });
            }
        }
        self.checks.push(erased);
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

    fn field(&self) -> EngineResult<&AnyField> {
        self.value.as_ref().ok_or_else(|| {
            EngineError::NotFound("input holds no value".to_string())
        })
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// Ready to run: optional, or a value is bound.
    pub fn ready(&self) -> bool {
        self.optional || self.value.is_some()
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_transparent(&self) -> bool {
        self.transparent
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
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

    /// Human-readable labels of every registered check, in registration
    /// order.
    pub fn check_labels(&self) -> Vec<&str> {
        self.checks.iter().map(|check| check.label()).collect()
    }

    pub(crate) fn any_field(&self) -> Option<&AnyField> {
        self.value.as_ref()
    }

    /// Contribute to a context hash: opaque bound inputs contribute their
    /// value's hash, transparent and empty inputs contribute the zero hash.
    pub fn hash(&self, hasher: &mut ContextHasher) -> EngineResult<()> {
        match (&self.value, self.transparent) {
            (Some(value), false) => value.hash(hasher),
            _ => {
                hasher.update_hash(&HashValue::ZERO);
                Ok(())
            }
        }
    }
}

fn undeclared_error() -> EngineError {
    EngineError::NotReady {
        missing_inputs: vec!["(type not declared)".to_string()],
        unbound_submods: Vec::new(),
    }
}

impl Default for ModuleInput {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ModuleInput {
    /// Structural equality over declared type, value, description, flags,
    /// and the *set* of check labels.
    fn eq(&self, other: &Self) -> bool {
        let self_labels: BTreeSet<_> = self.checks.iter().map(|c| c.label()).collect();
        let other_labels: BTreeSet<_> = other.checks.iter().map(|c| c.label()).collect();
        self.declared.as_ref().map(|d| (d.type_id, d.shared))
            == other.declared.as_ref().map(|d| (d.type_id, d.shared))
            && self.value == other.value
            && self.description == other.description
            && self.optional == other.optional
            && self.transparent == other.transparent
            && self_labels == other_labels
    }
}

impl fmt::Display for ModuleInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{value}"),
            None => f.write_str("<unset>"),
        }
    }
}
