//! ModuleInput / ModuleResult contract tests: declaration, binding, domain
//! checks, optional/transparent flags, hashing contributions, and
//! structural equality.

use std::sync::Arc;

use sciflow_engine::{BoundsCheck, ContextHasher, ModuleInput, ModuleResult};

fn input_hash(input: &ModuleInput) -> sciflow_engine::HashValue {
    let mut hasher = ContextHasher::new();
    input.hash(&mut hasher).unwrap();
    hasher.finish()
}

#[test]
fn change_requires_a_declared_type() {
    let mut input = ModuleInput::new();
    assert_eq!(input.change(3i32).unwrap_err().kind(), "not-ready");

    input.set_type::<i32>().unwrap();
    input.change(3i32).unwrap();
    assert_eq!(input.value::<i32>().unwrap(), 3);
}

#[test]
fn change_rejects_mismatched_types() {
    let mut input = ModuleInput::new();
    input.set_type::<i32>().unwrap();
    assert_eq!(input.change(3.0f64).unwrap_err().kind(), "bad-type");
}

#[test]
fn set_type_is_idempotent_but_fixed_once_bound() {
    let mut input = ModuleInput::new();
    input.set_type::<i32>().unwrap();
    input.set_type::<i32>().unwrap();
    input.change(3i32).unwrap();
    assert_eq!(input.set_type::<f64>().unwrap_err().kind(), "bad-type");
}

#[test]
fn declared_type_records_a_builtin_check() {
    let mut input = ModuleInput::new();
    input.set_type::<i32>().unwrap();
    assert_eq!(input.check_labels(), vec!["Type == i32"]);
}

#[test]
fn checks_gate_incoming_values() {
    let mut input = ModuleInput::new();
    input.set_type::<i32>().unwrap();
    input.add_check(BoundsCheck::not_equal_to(4)).unwrap();

    input.change(3i32).unwrap();
    let err = input.change(4i32).unwrap_err();
    assert_eq!(err.kind(), "out-of-domain");
    assert!(err.to_string().contains("!= 4"));
    // The previously-bound value survives the rejected change.
    assert_eq!(input.value::<i32>().unwrap(), 3);
}

#[test]
fn adding_a_check_rejects_an_already_stored_value() {
    let mut input = ModuleInput::new();
    input.set_type::<i32>().unwrap();
    input.change(4i32).unwrap();
    let err = input.add_check(BoundsCheck::not_equal_to(4)).unwrap_err();
    assert_eq!(err.kind(), "out-of-domain");
    // The rejected check is not registered.
    assert_eq!(input.check_labels(), vec!["Type == i32"]);
}

#[test]
fn readiness_is_optional_or_bound() {
    let mut input = ModuleInput::new();
    input.set_type::<i32>().unwrap();
    assert!(!input.ready());

    input.make_optional();
    assert!(input.ready());

    input.make_required();
    assert!(!input.ready());

    input.change(1i32).unwrap();
    assert!(input.ready());
}

#[test]
fn transparent_inputs_contribute_the_zero_hash() {
    let mut opaque = ModuleInput::new();
    opaque.set_type::<i32>().unwrap();
    opaque.change(42i32).unwrap();

    let mut transparent = ModuleInput::new();
    transparent.set_type::<i32>().unwrap();
    transparent.make_transparent();
    transparent.change(42i32).unwrap();

    assert_ne!(input_hash(&opaque), input_hash(&transparent));

    let mut other_transparent = ModuleInput::new();
    other_transparent.set_type::<String>().unwrap();
    other_transparent.make_transparent();
    other_transparent.change("anything".to_string()).unwrap();

    // Any two transparent inputs contribute identically.
    assert_eq!(input_hash(&transparent), input_hash(&other_transparent));
}

#[test]
fn empty_inputs_hash_like_transparent_ones() {
    let mut empty = ModuleInput::new();
    empty.set_type::<i32>().unwrap();

    let mut transparent = ModuleInput::new();
    transparent.set_type::<i32>().unwrap();
    transparent.make_transparent();
    transparent.change(7i32).unwrap();

    assert_eq!(input_hash(&empty), input_hash(&transparent));
}

#[test]
fn equality_is_structural_over_the_check_label_set() {
    let make = || {
        let mut input = ModuleInput::new();
        input.set_type::<i32>().unwrap();
        input.set_description("an option");
        input.change(3i32).unwrap();
        input
    };
    let mut left = make();
    let mut right = make();
    assert_eq!(left, right);

    // Registration order of checks is not observable through equality.
    left.add_check(BoundsCheck::not_equal_to(10)).unwrap();
    left.add_check(BoundsCheck::less_than(100)).unwrap();
    right.add_check(BoundsCheck::less_than(100)).unwrap();
    right.add_check(BoundsCheck::not_equal_to(10)).unwrap();
    assert_eq!(left, right);

    right.make_transparent();
    assert_ne!(left, right);
}

#[test]
fn shared_declarations_accept_shared_values() {
    let mut input = ModuleInput::new();
    input.set_type_shared::<Vec<f64>>().unwrap();
    let payload = Arc::new(vec![1.0f64, 2.0]);
    input.change_shared(Arc::clone(&payload)).unwrap();
    assert_eq!(input.value::<Vec<f64>>().unwrap(), vec![1.0, 2.0]);
}

#[test]
fn results_accept_values_by_ownership_or_shared() {
    let mut result = ModuleResult::new();
    result.set_type::<f64>().unwrap();
    result.change(5.6088f64).unwrap();
    assert_eq!(result.value::<f64>().unwrap(), 5.6088);

    let mut shared = ModuleResult::new();
    shared.set_type::<f64>().unwrap();
    shared.change_shared(Arc::new(5.6088f64)).unwrap();
    assert_eq!(result, shared);
}

#[test]
fn results_reject_mismatched_types() {
    let mut result = ModuleResult::new();
    result.set_type::<f64>().unwrap();
    assert_eq!(result.change(4i32).unwrap_err().kind(), "bad-type");
}

#[test]
fn result_shared_value_reads_back() {
    let mut result = ModuleResult::new();
    result.set_type::<Vec<i32>>().unwrap();
    result.change(vec![1, 2, 3]).unwrap();
    let shared = result.shared_value::<Vec<i32>>().unwrap();
    assert_eq!(*shared, vec![1, 2, 3]);
}
