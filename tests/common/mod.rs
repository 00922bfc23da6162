//! Shared fixtures for integration tests.
//!
//! Property types and module implementations exercising the geometry wiring
//! path (rectangle/prism), the counted-run path used by memoization tests,
//! and deliberately-failing implementations.
//!
//! Not all test files use every fixture, so unused-code warnings are
//! suppressed at the module level.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use sciflow_engine::errors::{EngineError, EngineResult};
use sciflow_engine::fields::{FieldMap, FieldTuple, InputMap, ResultMap};
use sciflow_engine::module::{Module, ModuleBase, ModuleDeclaration, TypeKey};
use sciflow_engine::property_type::{unwrap_inputs, wrap_results, PropertyType};
use sciflow_engine::submodule::SubmoduleRequest;
use sciflow_engine::{BoundsCheck, ModuleCache, ModuleInput, ModuleResult, SharedCache};

/// Initialize test logging once; repeated calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Contract: two positive dimensions in, one area out.
pub struct Area;

impl PropertyType for Area {
    type Inputs = (f64, f64);
    type Results = (f64,);

    fn inputs() -> FieldTuple<ModuleInput> {
        FieldTuple::new()
            .add_field(
                "Dimension 1",
                ModuleInput::new()
                    .with_type::<f64>()
                    .with_description("The length of the first dimension")
                    .with_check(BoundsCheck::greater_than(0.0)),
            )
            .add_field(
                "Dimension 2",
                ModuleInput::new()
                    .with_type::<f64>()
                    .with_description("The length of the second dimension")
                    .with_check(BoundsCheck::greater_than(0.0)),
            )
    }

    fn results() -> FieldTuple<ModuleResult> {
        FieldTuple::new().add_field(
            "Area",
            ModuleResult::new()
                .with_type::<f64>()
                .with_description("The computed area"),
        )
    }
}

/// Derived contract: the area fields plus a maximum-area bound.
pub struct BoundedArea;

impl PropertyType for BoundedArea {
    type Inputs = (f64, f64, f64);
    type Results = (f64,);

    fn inputs() -> FieldTuple<ModuleInput> {
        let mut tuple = FieldTuple::new();
        for (key, field) in Area::inputs().into_map().iter() {
            tuple = tuple.add_field(key, field.clone());
        }
        tuple.add_field(
            "Max area",
            ModuleInput::new()
                .with_type::<f64>()
                .with_description("Upper bound on the accepted area"),
        )
    }

    fn results() -> FieldTuple<ModuleResult> {
        Area::results()
    }
}

/// Contract: one dimension vector in, base area and volume out.
pub struct PrismVolume;

impl PropertyType for PrismVolume {
    type Inputs = (Vec<f64>,);
    type Results = (f64, f64);

    fn inputs() -> FieldTuple<ModuleInput> {
        FieldTuple::new().add_field(
            "Dimensions",
            ModuleInput::new()
                .with_type::<Vec<f64>>()
                .with_description("The height, width, and length of the prism")
                .with_check(BoundsCheck::new("length >= 3", |v: &Vec<f64>| v.len() >= 3)),
        )
    }

    fn results() -> FieldTuple<ModuleResult> {
        FieldTuple::new()
            .add_field(
                "Base area",
                ModuleResult::new()
                    .with_type::<f64>()
                    .with_description("The area of the base of the prism"),
            )
            .add_field(
                "Volume",
                ModuleResult::new()
                    .with_type::<f64>()
                    .with_description("The volume of the prism"),
            )
    }
}

/// Contract: one integer option in, one integer result out.
pub struct Quantity;

impl PropertyType for Quantity {
    type Inputs = (i32,);
    type Results = (i32,);

    fn inputs() -> FieldTuple<ModuleInput> {
        FieldTuple::new().add_field(
            "Option 1",
            ModuleInput::new()
                .with_type::<i32>()
                .with_description("An option whose value feeds the computation")
                .with_default(3),
        )
    }

    fn results() -> FieldTuple<ModuleResult> {
        FieldTuple::new().add_field(
            "Result 1",
            ModuleResult::new()
                .with_type::<i32>()
                .with_description("The computed value"),
        )
    }
}

/// Computes the area of a rectangle from its two dimensions.
pub struct Rectangle;

impl ModuleBase for Rectangle {
    fn type_key(&self) -> TypeKey {
        TypeKey::of::<Self>()
    }

    fn declaration(&self) -> ModuleDeclaration {
        ModuleDeclaration::new()
            .with_description("Computes the area of a rectangle")
            .with_citation("Euclid. Elements, Book I.")
            .satisfies::<Area>()
    }

    fn run(
        &self,
        inputs: &InputMap,
        _submods: &FieldMap<SubmoduleRequest>,
    ) -> EngineResult<ResultMap> {
        let (dim1, dim2) = unwrap_inputs::<Area>(inputs)?;
        wrap_results::<Area>(Area::results().into_map(), (dim1 * dim2,))
    }
}

/// Computes a prism's volume by delegating the base area to a submodule.
pub struct Prism;

impl ModuleBase for Prism {
    fn type_key(&self) -> TypeKey {
        TypeKey::of::<Self>()
    }

    fn declaration(&self) -> ModuleDeclaration {
        ModuleDeclaration::new()
            .with_description("Computes the volume of a prism")
            .satisfies::<PrismVolume>()
            .with_submodule(
                "area",
                SubmoduleRequest::new()
                    .with_type::<Area>()
                    .with_description("Computes the area of the prism's base"),
            )
    }

    fn run(
        &self,
        inputs: &InputMap,
        submods: &FieldMap<SubmoduleRequest>,
    ) -> EngineResult<ResultMap> {
        let (dims,) = unwrap_inputs::<PrismVolume>(inputs)?;
        let (base,) = submods.at("area")?.run_as::<Area>((dims[0], dims[1]))?;
        wrap_results::<PrismVolume>(PrismVolume::results().into_map(), (base, base * dims[2]))
    }
}

/// Returns 4 without reading its input.
pub struct FixedAnswer;

impl ModuleBase for FixedAnswer {
    fn type_key(&self) -> TypeKey {
        TypeKey::of::<Self>()
    }

    fn declaration(&self) -> ModuleDeclaration {
        ModuleDeclaration::new()
            .with_description("Returns 4 regardless of its input")
            .satisfies::<Quantity>()
    }

    fn run(
        &self,
        _inputs: &InputMap,
        _submods: &FieldMap<SubmoduleRequest>,
    ) -> EngineResult<ResultMap> {
        wrap_results::<Quantity>(Quantity::results().into_map(), (4,))
    }
}

/// Adds one to its option and counts how many times the implementation
/// actually ran. Carries a transparent "Tag" input that never participates
/// in memoization.
pub struct CountingAnswer {
    calls: Rc<Cell<u32>>,
}

impl CountingAnswer {
    pub fn new() -> (Arc<dyn ModuleBase>, Rc<Cell<u32>>) {
        let calls = Rc::new(Cell::new(0));
        (
            Arc::new(CountingAnswer {
                calls: Rc::clone(&calls),
            }),
            calls,
        )
    }
}

impl ModuleBase for CountingAnswer {
    fn type_key(&self) -> TypeKey {
        TypeKey::of::<Self>()
    }

    fn declaration(&self) -> ModuleDeclaration {
        ModuleDeclaration::new()
            .with_description("Adds one to its option, counting invocations")
            .satisfies::<Quantity>()
            .with_input(
                "Tag",
                ModuleInput::new()
                    .with_type::<String>()
                    .with_description("Diagnostic label excluded from memoization")
                    .with_default(String::new())
                    .transparent(),
            )
    }

    fn run(
        &self,
        inputs: &InputMap,
        _submods: &FieldMap<SubmoduleRequest>,
    ) -> EngineResult<ResultMap> {
        self.calls.set(self.calls.get() + 1);
        let (option,) = unwrap_inputs::<Quantity>(inputs)?;
        wrap_results::<Quantity>(Quantity::results().into_map(), (option + 1,))
    }
}

/// Fails every run.
pub struct FailingAnswer;

impl ModuleBase for FailingAnswer {
    fn type_key(&self) -> TypeKey {
        TypeKey::of::<Self>()
    }

    fn declaration(&self) -> ModuleDeclaration {
        ModuleDeclaration::new()
            .with_description("Fails unconditionally")
            .satisfies::<Quantity>()
    }

    fn run(
        &self,
        _inputs: &InputMap,
        _submods: &FieldMap<SubmoduleRequest>,
    ) -> EngineResult<ResultMap> {
        Err(EngineError::BackendIo("deliberate failure".to_string()))
    }
}

/// Fresh single-use cache for direct `Module::new` construction.
pub fn fresh_cache() -> SharedCache {
    Rc::new(RefCell::new(ModuleCache::in_memory()))
}

/// Wrap an implementation with a fresh cache.
pub fn module_of(base: Arc<dyn ModuleBase>) -> Module {
    Module::new(base, fresh_cache()).expect("fixture declarations are valid")
}

/// An input map binding one typed value under `key`.
pub fn input_map_with<T>(key: &str, value: T) -> InputMap
where
    T: sciflow_engine::FieldPayload,
{
    let mut input = ModuleInput::new();
    input
        .set_type::<T>()
        .expect("fresh input accepts a type")
        .change(value)
        .expect("value matches the declared type");
    let mut map = InputMap::new();
    map.insert(key, input);
    map
}
