//! Closure-backed modules.
//!
//! A lambda module wraps a closure satisfying exactly one property type,
//! for ad-hoc wiring and tests. Every lambda of a given property type shares
//! one implementation type, so the caller-provided identity token is mixed
//! into the context hash to keep distinct lambdas from memoizing into each
//! other. Lambdas do not memoize by default.

use std::sync::Arc;

use crate::cache::ModuleCache;
use crate::errors::EngineResult;
use crate::fields::{FieldMap, InputMap, ResultMap};
use crate::module::base::{ModuleBase, ModuleDeclaration, TypeKey};
use crate::module::Module;
use crate::property_type::{self, PropertyType};
use crate::submodule::SubmoduleRequest;

type LambdaFn<PT> = Box<
    dyn Fn(<PT as PropertyType>::Inputs) -> EngineResult<<PT as PropertyType>::Results>,
>;

/// A module implementation built from a closure over one property type.
pub struct LambdaModule<PT: PropertyType> {
    token: String,
    func: LambdaFn<PT>,
}

impl<PT: PropertyType> LambdaModule<PT> {
    /// `token` is the lambda's identity for memoization purposes; two
    /// lambdas with different tokens never share cache entries.
    pub fn new<F>(token: impl Into<String>, func: F) -> Self
    where
        F: Fn(PT::Inputs) -> EngineResult<PT::Results> + 'static,
    {
        LambdaModule {
            token: token.into(),
            func: Box::new(func),
        }
    }
}

impl<PT: PropertyType> ModuleBase for LambdaModule<PT> {
    fn type_key(&self) -> TypeKey {
        TypeKey::of::<Self>()
    }

    fn declaration(&self) -> ModuleDeclaration {
        ModuleDeclaration::new()
            .with_description(format!("lambda over {}", PT::key().short_name()))
            .satisfies::<PT>()
    }

    fn run(
        &self,
        inputs: &InputMap,
        _submods: &FieldMap<SubmoduleRequest>,
    ) -> EngineResult<ResultMap> {
        let args = property_type::unwrap_inputs::<PT>(inputs)?;
        let values = (self.func)(args)?;
        property_type::wrap_results::<PT>(PT::results().into_map(), values)
    }

    fn identity_token(&self) -> Option<&str> {
        Some(&self.token)
    }

    fn default_memoizable(&self) -> bool {
        false
    }
}

/// Wrap a closure as a ready-to-run [`Module`] with a private in-memory
/// cache.
pub fn lambda_module<PT, F>(token: impl Into<String>, func: F) -> EngineResult<Module>
where
    PT: PropertyType,
    F: Fn(PT::Inputs) -> EngineResult<PT::Results> + 'static,
{
    let base: Arc<dyn ModuleBase> = Arc::new(LambdaModule::<PT>::new(token, func));
    let cache = std::rc::Rc::new(std::cell::RefCell::new(ModuleCache::in_memory()));
    Module::new(base, cache)
}
