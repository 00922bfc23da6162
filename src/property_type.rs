//! Property types: declarative input/result contracts.
//!
//! A property type names an ordered sequence of typed input fields and an
//! ordered sequence of typed result fields. It is the contract between a
//! caller holding positional values and the engine's named field maps:
//! `wrap_inputs` packs positional arguments into a named map, and
//! `unwrap_results` reads a named map back out positionally. Pairing always
//! follows the property type's declared key sequence, so the target map may
//! carry additional fields beyond the contract.
//!
//! A derived property type extends another by listing the parent's fields
//! first in its own `inputs()`/`results()`; there is no separate derivation
//! machinery.

use std::any::TypeId;

use crate::any::{short_type_name, FieldPayload};
use crate::errors::{EngineError, EngineResult};
use crate::fields::{FieldTuple, InputMap, ModuleInput, ModuleResult, ResultMap};

/// Identity of a property type: runtime type identifier plus name.
#[derive(Debug, Clone, Copy)]
pub struct PtKey {
    id: TypeId,
    name: &'static str,
}

impl PtKey {
    pub fn of<PT: 'static>() -> Self {
        PtKey {
            id: TypeId::of::<PT>(),
            name: std::any::type_name::<PT>(),
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

impl PartialEq for PtKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PtKey {}

/// A statically-declared module contract.
///
/// `Inputs` and `Results` are the positional tuple forms of the declared
/// field sequences; `inputs()` and `results()` instantiate the declarative
/// descriptors (keys, types, defaults, checks, metadata).
pub trait PropertyType: 'static {
    type Inputs: FieldPack;
    type Results: FieldPack;

    fn inputs() -> FieldTuple<ModuleInput>;

    fn results() -> FieldTuple<ModuleResult>;

    fn key() -> PtKey
    where
        Self: Sized,
    {
        PtKey::of::<Self>()
    }
}

/// Positional packing/unpacking of a value tuple against ordered field maps.
///
/// Implemented for tuples up to eight storable elements. The i-th tuple
/// element pairs with the i-th key of the `keys` sequence.
pub trait FieldPack: Sized {
    const ARITY: usize;

    fn wrap_inputs(self, map: &mut InputMap, keys: &[String]) -> EngineResult<()>;

    fn unwrap_inputs(map: &InputMap, keys: &[String]) -> EngineResult<Self>;

    fn wrap_results(self, map: &mut ResultMap, keys: &[String]) -> EngineResult<()>;

    fn unwrap_results(map: &ResultMap, keys: &[String]) -> EngineResult<Self>;
}

fn check_arity(expected: usize, actual: usize) -> EngineResult<()> {
    if expected != actual {
        return Err(EngineError::ArityMismatch { expected, actual });
    }
    Ok(())
}

fn bind_input<T: FieldPayload>(map: &mut InputMap, key: &str, value: T) -> EngineResult<()> {
    map.at_mut(key)?
        .change(value)
        .map_err(|err| err.with_field(key))
}

fn read_input<T: Clone + 'static>(map: &InputMap, key: &str) -> EngineResult<T> {
    map.at(key)?.value::<T>()
}

fn bind_result<T: FieldPayload>(map: &mut ResultMap, key: &str, value: T) -> EngineResult<()> {
    map.at_mut(key)?.change(value)
}

fn read_result<T: Clone + 'static>(map: &ResultMap, key: &str) -> EngineResult<T> {
    map.at(key)?.value::<T>()
}

macro_rules! count_tys {
    () => { 0usize };
    ($head:ident $($tail:ident)*) => { 1usize + count_tys!($($tail)*) };
}

macro_rules! impl_field_pack {
    ($($ty:ident => $idx:tt),*) => {
        impl<$($ty,)*> FieldPack for ($($ty,)*)
        where
            $($ty: FieldPayload + Clone,)*
        {
            const ARITY: usize = count_tys!($($ty)*);

            fn wrap_inputs(self, map: &mut InputMap, keys: &[String]) -> EngineResult<()> {
                check_arity(keys.len(), Self::ARITY)?;
                $(bind_input(map, &keys[$idx], self.$idx)?;)*
                Ok(())
            }

            fn unwrap_inputs(map: &InputMap, keys: &[String]) -> EngineResult<Self> {
                check_arity(keys.len(), Self::ARITY)?;
                Ok(($(read_input::<$ty>(map, &keys[$idx])?,)*))
            }

            fn wrap_results(self, map: &mut ResultMap, keys: &[String]) -> EngineResult<()> {
                check_arity(keys.len(), Self::ARITY)?;
                $(bind_result(map, &keys[$idx], self.$idx)?;)*
                Ok(())
            }

            fn unwrap_results(map: &ResultMap, keys: &[String]) -> EngineResult<Self> {
                check_arity(keys.len(), Self::ARITY)?;
                Ok(($(read_result::<$ty>(map, &keys[$idx])?,)*))
            }
        }
    };
}

impl FieldPack for () {
    const ARITY: usize = 0;

    fn wrap_inputs(self, _map: &mut InputMap, keys: &[String]) -> EngineResult<()> {
        check_arity(keys.len(), 0)
    }

    fn unwrap_inputs(_map: &InputMap, keys: &[String]) -> EngineResult<Self> {
        check_arity(keys.len(), 0)
    }

    fn wrap_results(self, _map: &mut ResultMap, keys: &[String]) -> EngineResult<()> {
        check_arity(keys.len(), 0)
    }

    fn unwrap_results(_map: &ResultMap, keys: &[String]) -> EngineResult<Self> {
        check_arity(keys.len(), 0)
    }
}

impl_field_pack!(A => 0);
impl_field_pack!(A => 0, B => 1);
impl_field_pack!(A => 0, B => 1, C => 2);
impl_field_pack!(A => 0, B => 1, C => 2, D => 3);
impl_field_pack!(A => 0, B => 1, C => 2, D => 3, E => 4);
impl_field_pack!(A => 0, B => 1, C => 2, D => 3, E => 4, F => 5);
impl_field_pack!(A => 0, B => 1, C => 2, D => 3, E => 4, F => 5, G => 6);
impl_field_pack!(A => 0, B => 1, C => 2, D => 3, E => 4, F => 5, G => 6, H => 7);

fn input_keys<PT: PropertyType>() -> Vec<String> {
    PT::inputs().keys().map(str::to_string).collect()
}

fn result_keys<PT: PropertyType>() -> Vec<String> {
    PT::results().keys().map(str::to_string).collect()
}

/// Pack positional arguments into a fresh copy of `PT`'s declared input map.
///
/// # Errors
///
/// *arity* when the tuple width differs from the declared field count;
/// *bad-type* / *out-of-domain* when an argument fails its field's contract.
pub fn wrap_inputs<PT: PropertyType>(args: PT::Inputs) -> EngineResult<InputMap> {
    wrap_inputs_into::<PT>(PT::inputs().into_map(), args)
}

/// Pack positional arguments into an existing input map. The map must
/// declare every key of `PT`'s input sequence; extra fields are untouched.
pub fn wrap_inputs_into<PT: PropertyType>(
    mut map: InputMap,
    args: PT::Inputs,
) -> EngineResult<InputMap> {
    args.wrap_inputs(&mut map, &input_keys::<PT>())?;
    Ok(map)
}

/// Read `PT`'s declared keys out of an input map, in declared order.
pub fn unwrap_inputs<PT: PropertyType>(map: &InputMap) -> EngineResult<PT::Inputs> {
    PT::Inputs::unwrap_inputs(map, &input_keys::<PT>())
}

/// Pack positional result values into a result map under `PT`'s declared
/// keys.
pub fn wrap_results<PT: PropertyType>(
    mut map: ResultMap,
    values: PT::Results,
) -> EngineResult<ResultMap> {
    values.wrap_results(&mut map, &result_keys::<PT>())?;
    Ok(map)
}

/// Read `PT`'s declared result keys back into positional form.
pub fn unwrap_results<PT: PropertyType>(map: &ResultMap) -> EngineResult<PT::Results> {
    PT::Results::unwrap_results(map, &result_keys::<PT>())
}
