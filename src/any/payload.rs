//! The storable-payload contract and its type-erased object form.
//!
//! Anything stored in a field descriptor must be clonable, printable,
//! equality-comparable, orderable, and serializable. The `'static` bound is
//! the compile-time rendition of "no raw pointers, no dangling references":
//! a borrowed payload simply does not satisfy the trait.

use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use crate::errors::EngineResult;
use crate::hashing::{canonical_bytes, ContextHasher};

/// Object-safe view of a storable value.
///
/// Implemented blanket-wise for every `T: Clone + Debug + PartialEq +
/// PartialOrd + Serialize + 'static`; user code never implements it by hand.
/// Cross-type comparisons resolve to "not equal" / "unordered": equality and
/// ordering are defined per (type, value) pair, not across types.
pub trait FieldPayload: Any {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Fully-qualified name of the concrete payload type.
    fn payload_type_name(&self) -> &'static str;

    /// True iff `other` wraps the same type and the values compare equal.
    fn eq_payload(&self, other: &dyn FieldPayload) -> bool;

    /// Ordering against another payload; `None` when the types differ or the
    /// stored type itself yields no ordering for the pair.
    fn partial_cmp_payload(&self, other: &dyn FieldPayload) -> Option<Ordering>;

    /// Emit the hash of the value (never of the storage around it).
    fn hash_payload(&self, hasher: &mut ContextHasher) -> EngineResult<()>;

    fn clone_payload(&self) -> Box<dyn FieldPayload>;

    /// Canonical byte form used by codecs and hashing.
    fn canonical_payload_bytes(&self) -> EngineResult<Vec<u8>>;

    fn format_payload(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<T> FieldPayload for T
where
    T: Any + Clone + fmt::Debug + PartialEq + PartialOrd + Serialize,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn payload_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn eq_payload(&self, other: &dyn FieldPayload) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|rhs| self == rhs)
    }

    fn partial_cmp_payload(&self, other: &dyn FieldPayload) -> Option<Ordering> {
        other
            .as_any()
            .downcast_ref::<T>()
            .and_then(|rhs| self.partial_cmp(rhs))
    }

    fn hash_payload(&self, hasher: &mut ContextHasher) -> EngineResult<()> {
        hasher.update_value(self)
    }

    fn clone_payload(&self) -> Box<dyn FieldPayload> {
        Box::new(self.clone())
    }

    fn canonical_payload_bytes(&self) -> EngineResult<Vec<u8>> {
        canonical_bytes(self)
    }

    fn format_payload(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl dyn FieldPayload {
    pub fn is_type<T: Any>(&self) -> bool {
        self.as_any().type_id() == TypeId::of::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Trim a fully-qualified type name down to its unqualified spelling,
/// including inside generic argument lists
/// (`alloc::vec::Vec<alloc::string::String>` -> `Vec<String>`).
pub fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment_start = 0;
    for (idx, ch) in full.char_indices() {
        match ch {
            '<' | '>' | ',' | '(' | ')' | '[' | ']' | ';' | ' ' | '&' => {
                out.push_str(last_segment(&full[segment_start..idx]));
                out.push(ch);
                segment_start = idx + ch.len_utf8();
            }
            _ => {}
        }
    }
    out.push_str(last_segment(&full[segment_start..]));
    out
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_drop_module_paths() {
        assert_eq!(short_type_name("i32"), "i32");
        assert_eq!(short_type_name("alloc::string::String"), "String");
        assert_eq!(
            short_type_name("alloc::vec::Vec<alloc::string::String>"),
            "Vec<String>"
        );
        assert_eq!(
            short_type_name("std::collections::BTreeMap<i32, alloc::vec::Vec<f64>>"),
            "BTreeMap<i32, Vec<f64>>"
        );
    }

    #[test]
    fn cross_type_comparison_is_never_equal() {
        let a: Box<dyn FieldPayload> = Box::new(1i32);
        let b: Box<dyn FieldPayload> = Box::new(1i64);
        assert!(!a.eq_payload(b.as_ref()));
        assert!(a.partial_cmp_payload(b.as_ref()).is_none());
    }
}
