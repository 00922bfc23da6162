//! Type-erased value container with identity, hash, compare, and cast.
//!
//! An `AnyField` wraps exactly one storable value. The wrapped type is fixed
//! for the field's lifetime; equality, ordering, hashing, and printing all
//! reach through to the payload and never observe the storage discipline.

use std::any::TypeId;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::any::payload::{short_type_name, FieldPayload};
use crate::errors::{EngineError, EngineResult};
use crate::hashing::ContextHasher;

/// How an `AnyField` holds its value.
///
/// `Owned` permits in-place mutation; `OwnedConst` is an owned value frozen
/// after construction; `Shared` is the const-reference discipline, holding the
/// value by shared ownership without copying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discipline {
    Owned,
    OwnedConst,
    Shared,
}

enum Storage {
    Owned { value: Box<dyn FieldPayload>, frozen: bool },
    Shared(Arc<dyn FieldPayload>),
}

/// The engine's type-erased value.
pub struct AnyField {
    storage: Storage,
}

impl AnyField {
    /// Wrap `value` as an owned, mutable payload.
    pub fn new<T: FieldPayload>(value: T) -> Self {
        AnyField {
            storage: Storage::Owned {
                value: Box::new(value),
                frozen: false,
            },
        }
    }

    /// Wrap `value` as an owned payload frozen against mutation.
    pub fn new_const<T: FieldPayload>(value: T) -> Self {
        AnyField {
            storage: Storage::Owned {
                value: Box::new(value),
                frozen: true,
            },
        }
    }

    /// Wrap an already-shared value without copying it.
    pub fn shared<T: FieldPayload>(value: Arc<T>) -> Self {
        AnyField {
            storage: Storage::Shared(value),
        }
    }

    fn payload(&self) -> &dyn FieldPayload {
        match &self.storage {
            Storage::Owned { value, .. } => value.as_ref(),
            Storage::Shared(value) => value.as_ref(),
        }
    }

    pub fn discipline(&self) -> Discipline {
        match &self.storage {
            Storage::Owned { frozen: false, .. } => Discipline::Owned,
            Storage::Owned { frozen: true, .. } => Discipline::OwnedConst,
            Storage::Shared(_) => Discipline::Shared,
        }
    }

    /// Runtime identifier of the wrapped type.
    pub fn type_id(&self) -> TypeId {
        self.payload().as_any().type_id()
    }

    /// Fully-qualified name of the wrapped type.
    pub fn type_name(&self) -> &'static str {
        self.payload().payload_type_name()
    }

    /// Unqualified spelling of the wrapped type, for messages and docs.
    pub fn short_type_name(&self) -> String {
        short_type_name(self.type_name())
    }

    /// Would a read cast to `T` succeed? Never fails.
    pub fn is_convertible<T: 'static>(&self) -> bool {
        self.type_id() == TypeId::of::<T>()
    }

    /// Does the discipline permit in-place mutation?
    pub fn is_mutable(&self) -> bool {
        matches!(self.storage, Storage::Owned { frozen: false, .. })
    }

    fn bad_cast<T: 'static>(&self) -> EngineError {
        EngineError::BadCast {
            requested: short_type_name(std::any::type_name::<T>()),
            stored: self.short_type_name(),
        }
    }

    /// Copy the wrapped value out as a `T`.
    ///
    /// # Errors
    ///
    /// *bad-cast* when `T` is not the stored type.
    pub fn value<T: Clone + 'static>(&self) -> EngineResult<T> {
        self.get::<T>().cloned()
    }

    /// Borrow the wrapped value as a `&T`. Permitted under every discipline.
    pub fn get<T: 'static>(&self) -> EngineResult<&T> {
        self.payload()
            .downcast_ref::<T>()
            .ok_or_else(|| self.bad_cast::<T>())
    }

    /// Borrow the wrapped value mutably. Permitted only for the owned
    /// mutable discipline.
    ///
    /// # Errors
    ///
    /// *bad-cast* when the type mismatches or the discipline forbids
    /// mutation.
    pub fn get_mut<T: 'static>(&mut self) -> EngineResult<&mut T> {
        let err = self.bad_cast::<T>();
        match &mut self.storage {
            Storage::Owned {
                value,
                frozen: false,
            } => value.downcast_mut::<T>().ok_or(err),
            _ => Err(err),
        }
    }

    /// Retrieve the value by shared ownership.
    pub fn shared_value<T: FieldPayload + Clone>(&self) -> EngineResult<Arc<T>> {
        // Arc<dyn FieldPayload> cannot be downcast to Arc<T> in safe code, so
        // both arms clone the payload into a fresh Arc.
        Ok(Arc::new(self.value::<T>()?))
    }

    /// Emit the hash of the value. The discipline never participates.
    pub fn hash(&self, hasher: &mut ContextHasher) -> EngineResult<()> {
        self.payload().hash_payload(hasher)
    }

    /// Canonical byte form of the payload, used by codecs.
    pub fn canonical_bytes(&self) -> EngineResult<Vec<u8>> {
        self.payload().canonical_payload_bytes()
    }

    pub(crate) fn payload_ref(&self) -> &dyn FieldPayload {
        self.payload()
    }
}

impl Clone for AnyField {
    /// Deep copy preserving the discipline. Shared values stay shared: the
    /// clone holds the same payload by reference count.
    fn clone(&self) -> Self {
        let storage = match &self.storage {
            Storage::Owned { value, frozen } => Storage::Owned {
                value: value.clone_payload(),
                frozen: *frozen,
            },
            Storage::Shared(value) => Storage::Shared(Arc::clone(value)),
        };
        AnyField { storage }
    }
}

impl PartialEq for AnyField {
    /// True iff both sides wrap the same type and the values compare equal.
    fn eq(&self, other: &Self) -> bool {
        self.payload().eq_payload(other.payload())
    }
}

impl PartialOrd for AnyField {
    /// Defined only when both sides wrap the same, ordered type.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.payload().partial_cmp_payload(other.payload())
    }
}

impl fmt::Debug for AnyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnyField<{}>(", self.short_type_name())?;
        self.payload().format_payload(f)?;
        f.write_str(")")
    }
}

impl fmt::Display for AnyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.payload().format_payload(f)
    }
}
