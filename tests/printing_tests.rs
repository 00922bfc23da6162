//! Documentation rendering tests: module docs as reStructuredText.

mod common;

use std::sync::Arc;

use common::{module_of, Prism, Rectangle};
use sciflow_engine::printing::{document_module, input_table, result_table};

#[test]
fn module_docs_cover_metadata_inputs_and_results() {
    let module = module_of(Arc::new(Rectangle));
    let docs = document_module("Rectangle", &module).unwrap();

    assert!(docs.starts_with("Rectangle\n========="));
    assert!(docs.contains("Computes the area of a rectangle"));
    assert!(docs.contains("Citations"));
    assert!(docs.contains("Euclid. Elements, Book I."));
    assert!(docs.contains("Module API"));
    assert!(docs.contains(".. list-table:: Inputs"));
    assert!(docs.contains("Dimension 1"));
    assert!(docs.contains("> 0.0"));
    assert!(docs.contains(".. list-table:: Results"));
    assert!(docs.contains("Area"));
}

#[test]
fn input_rows_surface_flags_defaults_and_checks() {
    let module = module_of(Arc::new(Prism));
    let table = input_table(module.inputs());
    assert!(table.contains("Dimensions"));
    assert!(table.contains("Vec<f64>"));
    assert!(table.contains("length >= 3"));
    assert!(table.contains("The height, width, and length of the prism"));

    let results = result_table(module.results());
    assert!(results.contains("Base area"));
    assert!(results.contains("Volume"));
    assert!(results.contains("f64"));
}
