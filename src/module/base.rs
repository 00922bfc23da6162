//! Developer-facing module implementations.
//!
//! A `ModuleBase` is the pure algorithm: it declares which property types it
//! satisfies, any extra inputs beyond those contracts, its submodule slots,
//! and metadata, then implements `run`. Everything stateful (bound values,
//! locking, caching) lives in the runtime wrapper, so the developer's
//! defaults are never clobbered by users.

use std::any::{Any, TypeId};

use crate::any::short_type_name;
use crate::errors::{EngineError, EngineResult};
use crate::fields::{FieldMap, InputMap, ModuleInput, ModuleResult, ResultMap};
use crate::property_type::{PropertyType, PtKey};
use crate::submodule::SubmoduleRequest;

/// Identity of a module implementation: its most-derived type.
#[derive(Debug, Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: 'static>() -> Self {
        TypeKey {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn short_name(&self) -> String {
        short_type_name(self.name)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

/// One field a satisfied property type demands of the declaring module,
/// kept for superset validation.
#[derive(Debug, Clone)]
struct PtField {
    pt: PtKey,
    key: String,
    type_id: Option<TypeId>,
    type_name: Option<String>,
    is_input: bool,
}

/// Everything a module implementation declares up front.
#[derive(Clone, Default)]
pub struct ModuleDeclaration {
    description: Option<String>,
    citations: Vec<String>,
    property_types: Vec<PtKey>,
    pt_fields: Vec<PtField>,
    inputs: InputMap,
    results: ResultMap,
    submods: FieldMap<SubmoduleRequest>,
}

impl ModuleDeclaration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_citation(mut self, citation: impl Into<String>) -> Self {
        self.citations.push(citation.into());
        self
    }

    /// Declare that the module satisfies `PT`, merging the property type's
    /// input and result fields into the declaration.
    pub fn satisfies<PT: PropertyType>(mut self) -> Self {
        let pt = PT::key();
        if self.property_types.contains(&pt) {
            return self;
        }
        self.property_types.push(pt);
        for (key, field) in PT::inputs().into_map().iter() {
            self.pt_fields.push(PtField {
                pt,
                key: key.to_string(),
                type_id: field.declared_type_id(),
                type_name: field.declared_type_name(),
                is_input: true,
            });
            self.inputs.insert(key, field.clone());
        }
        for (key, field) in PT::results().into_map().iter() {
            self.pt_fields.push(PtField {
                pt,
                key: key.to_string(),
                type_id: field.declared_type_id(),
                type_name: field.declared_type_name(),
                is_input: false,
            });
            self.results.insert(key, field.clone());
        }
        self
    }

    /// Declare an input field beyond what any property type requires.
    pub fn with_input(mut self, key: impl Into<String>, input: ModuleInput) -> Self {
        self.inputs.insert(key, input);
        self
    }

    /// Declare a result field beyond what any property type requires.
    pub fn with_result(mut self, key: impl Into<String>, result: ModuleResult) -> Self {
        self.results.insert(key, result);
        self
    }

    /// Declare a submodule slot.
    pub fn with_submodule(mut self, key: impl Into<String>, request: SubmoduleRequest) -> Self {
        self.submods.insert(key, request);
        self
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn citations(&self) -> &[String] {
        &self.citations
    }

    pub fn property_types(&self) -> &[PtKey] {
        &self.property_types
    }

    pub fn inputs(&self) -> &InputMap {
        &self.inputs
    }

    pub fn results(&self) -> &ResultMap {
        &self.results
    }

    pub fn submodules(&self) -> &FieldMap<SubmoduleRequest> {
        &self.submods
    }

    /// Superset check: the declared input and result maps must contain every
    /// field of every satisfied property type, with matching declared types.
    ///
    /// # Errors
    ///
    /// *bad-type* naming the first offending field.
    pub fn validate(&self) -> EngineResult<()> {
        for pt_field in &self.pt_fields {
            let declared = if pt_field.is_input {
                self.inputs
                    .get(&pt_field.key)
                    .map(|input| input.declared_type_id())
            } else {
                self.results
                    .get(&pt_field.key)
                    .map(|result| result.declared_type_id())
            };
            let expected = pt_field
                .type_name
                .clone()
                .unwrap_or_else(|| "(undeclared)".to_string());
            match declared {
                Some(type_id) if type_id == pt_field.type_id => {}
                _ => {
                    return Err(EngineError::BadType {
                        expected: format!(
                            "field '{}' of {} as {expected}",
                            pt_field.key,
                            pt_field.pt.short_name()
                        ),
                        actual: "missing or differently-typed declaration".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// The abstract module implementation.
///
/// Implementations are stateless with respect to users: the declaration is a
/// snapshot of developer defaults, and `run` is a pure function of the
/// inputs and submodules it is handed. Two implementations are the same
/// algorithm iff their most-derived type identifiers match.
pub trait ModuleBase: Any {
    /// Identity of the most-derived implementation type
    /// (`TypeKey::of::<Self>()`).
    fn type_key(&self) -> TypeKey;

    /// The module's declared property types, fields, submodule slots, and
    /// metadata.
    fn declaration(&self) -> ModuleDeclaration;

    /// The algorithm. `inputs` is the validated, merged input map; `submods`
    /// holds the bound, locked submodule slots.
    fn run(
        &self,
        inputs: &InputMap,
        submods: &FieldMap<SubmoduleRequest>,
    ) -> EngineResult<ResultMap>;

    /// Extra identity mixed into the context hash. Lambda modules return
    /// their caller-provided token here so that two lambdas over the same
    /// property type memoize independently.
    fn identity_token(&self) -> Option<&str> {
        None
    }

    /// Whether freshly-wrapped modules of this implementation memoize.
    fn default_memoizable(&self) -> bool {
        true
    }
}
