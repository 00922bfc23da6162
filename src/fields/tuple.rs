//! Ordered, keyed collection of field descriptors.
//!
//! A `FieldTuple` records a property type's input or result API: the order
//! fields were declared in, the key for each field, and each field's
//! descriptor (type, default, metadata). Keys must be unique
//! case-insensitively; a duplicate is a declaration-site bug and panics with
//! the offending key.

use crate::fields::map::FieldMap;

/// Declaration-ordered field list, keyed case-insensitively.
///
/// `E` is `ModuleInput` or `ModuleResult` depending on whether the tuple
/// describes the fields a module consumes or the fields it produces.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldTuple<E> {
    fields: FieldMap<E>,
}

impl<E> FieldTuple<E> {
    pub fn new() -> Self {
        FieldTuple {
            fields: FieldMap::new(),
        }
    }

    /// Append a field.
    ///
    /// # Panics
    ///
    /// Panics when `key` is already declared (case-insensitively). Field
    /// declarations are code, not data; a duplicate key cannot be recovered
    /// from at runtime.
    pub fn add_field(mut self, key: impl Into<String>, field: E) -> Self {
        let key = key.into();
        if let Err(err) = self.fields.insert_unique(key, field) {
            panic!("duplicate field declaration: {err}");
        }
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&E> {
        self.fields.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &E)> {
        self.fields.iter()
    }

    /// Consume the tuple into its backing ordered map.
    pub fn into_map(self) -> FieldMap<E> {
        self.fields
    }
}

impl<E> Default for FieldTuple<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_keep_declaration_order() {
        let tuple = FieldTuple::new().add_field("b", 2).add_field("a", 1);
        let keys: Vec<_> = tuple.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    #[should_panic(expected = "duplicate field declaration")]
    fn duplicate_keys_panic() {
        let _ = FieldTuple::new().add_field("Key", 1).add_field("key", 2);
    }
}
