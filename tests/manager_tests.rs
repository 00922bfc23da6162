//! ModuleManager tests: registration, lookup, copying, wiring, default
//! resolution, and cache persistence.

mod common;

use std::sync::Arc;

use common::{
    init_tracing, Area, CountingAnswer, FixedAnswer, Prism, PrismVolume, Quantity, Rectangle,
};
use sciflow_engine::fields::InputMap;
use sciflow_engine::{ModuleInput, ModuleManager};

#[test]
fn add_and_lookup_modules() {
    let mut manager = ModuleManager::new();
    manager.add_module("Rectangle", Arc::new(Rectangle)).unwrap();
    assert_eq!(manager.len(), 1);
    assert_eq!(manager.count("Rectangle"), 1);
    assert_eq!(manager.count("rectangle"), 1, "keys are case-insensitive");
    assert_eq!(manager.keys(), vec!["Rectangle".to_string()]);

    let module = manager.at("Rectangle").unwrap();
    assert_eq!(module.borrow().implementation_name(), "Rectangle");
}

#[test]
fn duplicate_keys_and_missing_keys_are_typed_errors() {
    let mut manager = ModuleManager::new();
    manager.add_module("answer", Arc::new(FixedAnswer)).unwrap();
    let err = manager.add_module("Answer", Arc::new(FixedAnswer)).unwrap_err();
    assert_eq!(err.kind(), "already-exists");
    let err = manager.at("nope").unwrap_err();
    assert_eq!(err.kind(), "not-found");
}

#[test]
fn modules_of_one_implementation_share_a_cache() {
    init_tracing();
    let (base, calls) = CountingAnswer::new();
    let mut manager = ModuleManager::new();
    manager.add_module("first", Arc::clone(&base)).unwrap();
    manager.add_module("second", base).unwrap();

    let first = manager.at("first").unwrap();
    first.borrow_mut().run_as::<Quantity>((3,)).unwrap();
    let second = manager.at("second").unwrap();
    let result = second.borrow_mut().run_as::<Quantity>((3,)).unwrap();

    assert_eq!(result, (4,));
    assert_eq!(calls.get(), 1, "second instance hits the shared cache");
}

#[test]
fn copy_module_preserves_state_but_not_locks() {
    let mut manager = ModuleManager::new();
    manager.add_module("original", Arc::new(Rectangle)).unwrap();
    {
        let module = manager.at("original").unwrap();
        let mut borrowed = module.borrow_mut();
        borrowed.change_input("Dimension 1", 2.0f64).unwrap();
        borrowed.change_input("Dimension 2", 3.0f64).unwrap();
        borrowed.lock().unwrap();
    }

    manager.copy_module("original", "copy").unwrap();
    let copy = manager.at("copy").unwrap();
    assert!(!copy.borrow().locked());
    assert_eq!(
        copy.borrow()
            .inputs()
            .at("Dimension 1")
            .unwrap()
            .value::<f64>()
            .unwrap(),
        2.0
    );

    let err = manager.copy_module("original", "copy").unwrap_err();
    assert_eq!(err.kind(), "already-exists");
    let err = manager.copy_module("ghost", "other").unwrap_err();
    assert_eq!(err.kind(), "not-found");
}

#[test]
fn erase_is_silent_for_absent_keys() {
    let mut manager = ModuleManager::new();
    manager.add_module("answer", Arc::new(FixedAnswer)).unwrap();
    manager.erase("answer");
    assert_eq!(manager.len(), 0);
    manager.erase("answer");
}

#[test]
fn change_submod_wires_registered_modules() {
    let mut manager = ModuleManager::new();
    manager.add_module("prism", Arc::new(Prism)).unwrap();
    manager.add_module("rectangle", Arc::new(Rectangle)).unwrap();
    manager.change_submod("prism", "area", "rectangle").unwrap();

    let prism = manager.at("prism").unwrap();
    assert!(prism.borrow().submods().at("area").unwrap().has_module());
}

#[test]
fn change_submod_enforces_the_requested_contract() {
    let mut manager = ModuleManager::new();
    manager.add_module("prism", Arc::new(Prism)).unwrap();
    manager.add_module("answer", Arc::new(FixedAnswer)).unwrap();
    let err = manager.change_submod("prism", "area", "answer").unwrap_err();
    assert_eq!(err.kind(), "pt-unsatisfied");
}

#[test]
fn defaults_auto_bind_with_input_overrides() {
    init_tracing();
    let mut manager = ModuleManager::new();
    manager.add_module("prism", Arc::new(Prism)).unwrap();
    manager.add_module("rectangle", Arc::new(Rectangle)).unwrap();

    // The default rectangle only becomes ready through the recorded input
    // overrides.
    let mut overrides = InputMap::new();
    let mut dim = ModuleInput::new();
    dim.set_type::<f64>().unwrap();
    dim.change(2.0f64).unwrap();
    overrides.insert("Dimension 1", dim.clone());
    let mut dim2 = ModuleInput::new();
    dim2.set_type::<f64>().unwrap();
    dim2.change(3.0f64).unwrap();
    overrides.insert("Dimension 2", dim2);

    manager
        .set_default::<Area>(overrides, "rectangle")
        .unwrap();
    assert_eq!(manager.default_for::<Area>(), Some("rectangle"));

    let prism = manager.at("prism").unwrap();
    assert!(prism.borrow().submods().at("area").unwrap().has_module());
    prism
        .borrow_mut()
        .change_input("Dimensions", vec![1.0f64, 1.0, 2.0])
        .unwrap();
    assert!(prism.borrow().ready());

    let (base, volume) = prism.borrow_mut().run_as::<PrismVolume>((vec![1.0, 1.0, 2.0],)).unwrap();
    assert!((base - 1.0).abs() < 1e-12);
    assert!((volume - 2.0).abs() < 1e-12);
}

#[test]
fn set_default_requires_a_registered_key() {
    let mut manager = ModuleManager::new();
    let err = manager
        .set_default::<Area>(InputMap::new(), "ghost")
        .unwrap_err();
    assert_eq!(err.kind(), "not-found");
}

#[test]
fn saved_caches_survive_into_a_fresh_manager() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    let (base_a, calls_a) = CountingAnswer::new();
    let mut manager_a = ModuleManager::new();
    manager_a.register_type::<i32>();
    manager_a.add_module("answer", base_a).unwrap();
    {
        let module = manager_a.at("answer").unwrap();
        assert_eq!(module.borrow_mut().run_as::<Quantity>((3,)).unwrap(), (4,));
    }
    assert_eq!(calls_a.get(), 1);
    manager_a.save_caches(dir.path()).unwrap();

    // A fresh manager with a fresh implementation instance: the loaded
    // cache answers without invoking the implementation at all.
    let (base_b, calls_b) = CountingAnswer::new();
    let mut manager_b = ModuleManager::new();
    manager_b.register_type::<i32>();
    manager_b.add_module("answer", base_b).unwrap();
    manager_b.load_caches(dir.path()).unwrap();

    let module = manager_b.at("answer").unwrap();
    assert_eq!(module.borrow_mut().run_as::<Quantity>((3,)).unwrap(), (4,));
    assert_eq!(calls_b.get(), 0, "loaded cache served the result");
}

#[test]
fn iteration_follows_registration_order() {
    let mut manager = ModuleManager::new();
    manager.add_module("b", Arc::new(Rectangle)).unwrap();
    manager.add_module("a", Arc::new(Prism)).unwrap();
    let keys: Vec<&str> = manager.iter().map(|(key, _)| key).collect();
    assert_eq!(keys, vec!["b", "a"]);
}
