//! Field descriptors and their containers.
//!
//! Inputs and results are typed, named slots holding at most one type-erased
//! value plus metadata; `FieldMap` and `FieldTuple` keep them in declaration
//! order with case-insensitive keys.

mod bounds;
mod input;
mod map;
mod result;
mod tuple;

pub use bounds::BoundsCheck;
pub use input::ModuleInput;
pub use map::FieldMap;
pub use result::ModuleResult;
pub use tuple::FieldTuple;

use std::any::TypeId;

use crate::any::short_type_name;

/// A field's declared static type: runtime identifier, name, and whether
/// bound values are held by shared ownership (the const-reference
/// discipline) or copied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DeclaredType {
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub shared: bool,
}

impl DeclaredType {
    pub fn of<T: 'static>(shared: bool) -> Self {
        DeclaredType {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            shared,
        }
    }

    pub fn short_name(&self) -> String {
        short_type_name(self.type_name)
    }
}

/// Convenience alias: the named input set a module run consumes.
pub type InputMap = FieldMap<ModuleInput>;

/// Convenience alias: the named result set a module run produces.
pub type ResultMap = FieldMap<ModuleResult>;
