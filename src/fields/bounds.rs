//! Composable domain-check predicates with human-readable labels.
//!
//! A check is a predicate over the declared value type plus a short statement
//! of what it demands ("!= 3", "in [0, 1)"). The engine treats checks only
//! through this pair; the predicate's internals are never inspected.

use std::fmt::Debug;
use std::rc::Rc;

use crate::any::FieldPayload;

/// A typed domain check: predicate plus label.
#[derive(Clone)]
pub struct BoundsCheck<T> {
    predicate: Rc<dyn Fn(&T) -> bool>,
    label: String,
}

impl<T> BoundsCheck<T> {
    /// Build a check from an arbitrary predicate and label.
    pub fn new(label: impl Into<String>, predicate: impl Fn(&T) -> bool + 'static) -> Self {
        BoundsCheck {
            predicate: Rc::new(predicate),
            label: label.into(),
        }
    }

    pub fn check(&self, value: &T) -> bool {
        (self.predicate)(value)
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl<T: PartialEq + Debug + 'static> BoundsCheck<T> {
    pub fn equal_to(bound: T) -> Self {
        let label = format!("== {bound:?}");
        BoundsCheck::new(label, move |v: &T| *v == bound)
    }

    pub fn not_equal_to(bound: T) -> Self {
        let label = format!("!= {bound:?}");
        BoundsCheck::new(label, move |v: &T| *v != bound)
    }
}

impl<T: PartialOrd + Debug + 'static> BoundsCheck<T> {
    pub fn greater_than(bound: T) -> Self {
        let label = format!("> {bound:?}");
        BoundsCheck::new(label, move |v: &T| *v > bound)
    }

    pub fn greater_than_equal(bound: T) -> Self {
        let label = format!(">= {bound:?}");
        BoundsCheck::new(label, move |v: &T| *v >= bound)
    }

    pub fn less_than(bound: T) -> Self {
        let label = format!("< {bound:?}");
        BoundsCheck::new(label, move |v: &T| *v < bound)
    }

    pub fn less_than_equal(bound: T) -> Self {
        let label = format!("<= {bound:?}");
        BoundsCheck::new(label, move |v: &T| *v <= bound)
    }

    /// Closed-open interval membership: `low <= v < high`.
    pub fn in_range(low: T, high: T) -> Self {
        let label = format!("in [{low:?}, {high:?})");
        BoundsCheck::new(label, move |v: &T| *v >= low && *v < high)
    }
}

/// Type-erased form of a check, stored on a field descriptor.
///
/// The closure receives the erased payload; a payload of the wrong type fails
/// the check (the descriptor's type check has already rejected it by then).
#[derive(Clone)]
pub(crate) struct ErasedCheck {
    run: Rc<dyn Fn(&dyn FieldPayload) -> bool>,
    label: String,
}

impl ErasedCheck {
    pub(crate) fn from_typed<T: FieldPayload>(check: BoundsCheck<T>) -> Self {
        let label = check.label.clone();
        ErasedCheck {
            run: Rc::new(move |payload: &dyn FieldPayload| {
                payload
                    .downcast_ref::<T>()
                    .is_some_and(|value| check.check(value))
            }),
            label,
        }
    }

    /// The built-in "Type == T" check every declared field carries.
    pub(crate) fn type_check<T: FieldPayload>(short_name: &str) -> Self {
        ErasedCheck {
            run: Rc::new(|payload: &dyn FieldPayload| payload.downcast_ref::<T>().is_some()),
            label: format!("Type == {short_name}"),
        }
    }

    pub(crate) fn passes(&self, payload: &dyn FieldPayload) -> bool {
        (self.run)(payload)
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }
}

impl Debug for ErasedCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ErasedCheck({})", self.label)
    }
}
