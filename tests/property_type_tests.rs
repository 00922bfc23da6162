//! PropertyType contract tests: declarative tuples, positional
//! wrap/unwrap round-trips, derivation chains, and arity enforcement.

mod common;

use common::{Area, BoundedArea, PrismVolume, Quantity};
use sciflow_engine::fields::{FieldTuple, InputMap};
use sciflow_engine::property_type::{
    unwrap_inputs, unwrap_results, wrap_inputs, wrap_inputs_into, wrap_results, PropertyType,
};
use sciflow_engine::{ModuleInput, ModuleResult};

#[test]
fn declared_fields_keep_order_and_metadata() {
    let inputs = Area::inputs();
    let keys: Vec<_> = inputs.keys().collect();
    assert_eq!(keys, vec!["Dimension 1", "Dimension 2"]);
    let dim1 = inputs.get("Dimension 1").unwrap();
    assert_eq!(dim1.declared_type_name().unwrap(), "f64");
    assert_eq!(
        dim1.description().unwrap(),
        "The length of the first dimension"
    );
    assert!(dim1.check_labels().contains(&"> 0.0"));

    let results = Area::results();
    assert_eq!(results.keys().collect::<Vec<_>>(), vec!["Area"]);
}

#[test]
fn wrap_then_unwrap_inputs_is_identity() {
    let map = wrap_inputs::<Area>((1.23, 4.56)).unwrap();
    assert_eq!(unwrap_inputs::<Area>(&map).unwrap(), (1.23, 4.56));

    let map = wrap_inputs::<PrismVolume>((vec![1.0, 2.0, 3.0],)).unwrap();
    assert_eq!(
        unwrap_inputs::<PrismVolume>(&map).unwrap(),
        (vec![1.0, 2.0, 3.0],)
    );
}

#[test]
fn wrap_then_unwrap_results_is_identity() {
    let map = wrap_results::<PrismVolume>(PrismVolume::results().into_map(), (5.6088, 44.253432))
        .unwrap();
    assert_eq!(
        unwrap_results::<PrismVolume>(&map).unwrap(),
        (5.6088, 44.253432)
    );
}

#[test]
fn wrapping_applies_field_checks() {
    let err = wrap_inputs::<Area>((-1.0, 4.56)).unwrap_err();
    assert_eq!(err.kind(), "out-of-domain");
    assert!(err.to_string().contains("Dimension 1"));
}

#[test]
fn wrapping_into_a_larger_map_leaves_extra_fields_alone() {
    let mut map: InputMap = Area::inputs().into_map();
    let mut extra = ModuleInput::new();
    extra.set_type::<String>().unwrap();
    extra.change("untouched".to_string()).unwrap();
    map.insert("Comment", extra);

    let wrapped = wrap_inputs_into::<Area>(map, (2.0, 3.0)).unwrap();
    assert_eq!(unwrap_inputs::<Area>(&wrapped).unwrap(), (2.0, 3.0));
    assert_eq!(
        wrapped.at("Comment").unwrap().value::<String>().unwrap(),
        "untouched"
    );
}

#[test]
fn derived_property_types_prepend_parent_fields() {
    let keys: Vec<String> = BoundedArea::inputs()
        .keys()
        .map(str::to_string)
        .collect();
    assert_eq!(keys, vec!["Dimension 1", "Dimension 2", "Max area"]);
    assert_eq!(BoundedArea::results().keys().count(), 1);

    let map = wrap_inputs::<BoundedArea>((1.0, 2.0, 10.0)).unwrap();
    assert_eq!(unwrap_inputs::<BoundedArea>(&map).unwrap(), (1.0, 2.0, 10.0));
}

#[test]
fn property_type_keys_identify_contracts() {
    assert_eq!(Area::key(), Area::key());
    assert_ne!(Area::key(), BoundedArea::key());
    assert_eq!(Area::key().short_name(), "Area");
}

/// A contract whose declared field count disagrees with its positional
/// tuple: the arity check has to catch it at wrap time.
struct Lopsided;

impl PropertyType for Lopsided {
    type Inputs = (i32,);
    type Results = ();

    fn inputs() -> FieldTuple<ModuleInput> {
        FieldTuple::new()
            .add_field("first", ModuleInput::new().with_type::<i32>())
            .add_field("second", ModuleInput::new().with_type::<i32>())
    }

    fn results() -> FieldTuple<ModuleResult> {
        FieldTuple::new()
    }
}

#[test]
fn mismatched_arity_is_rejected() {
    let err = wrap_inputs::<Lopsided>((1,)).unwrap_err();
    assert_eq!(err.kind(), "arity");
    let map = Lopsided::inputs().into_map();
    let err = unwrap_inputs::<Lopsided>(&map).unwrap_err();
    assert_eq!(err.kind(), "arity");
}

#[test]
fn quantity_carries_its_default() {
    let inputs = Quantity::inputs();
    let option = inputs.get("Option 1").unwrap();
    assert_eq!(option.value::<i32>().unwrap(), 3);
    assert!(option.ready());
}
