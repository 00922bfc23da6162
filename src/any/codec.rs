//! Registered-type codecs for persisting type-erased values.
//!
//! Serialization of an `AnyField` dispatches through a registry of per-type
//! encode/decode function pairs. Each entry is keyed in-process by `TypeId`
//! and on disk by the type's stable fingerprint. Values of unregistered types
//! live in memory only; the persistent backing refuses them.

use std::any::TypeId;
use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::any::field::AnyField;
use crate::any::payload::FieldPayload;
use crate::errors::{EngineError, EngineResult};
use crate::hashing::{type_fingerprint, HashValue};

type EncodeFn = fn(&AnyField) -> EngineResult<serde_json::Value>;
type DecodeFn = fn(&serde_json::Value) -> EngineResult<AnyField>;

/// One registered type's codec entry.
#[derive(Clone)]
pub struct TypeCodec {
    type_name: &'static str,
    fingerprint: HashValue,
    encode: EncodeFn,
    decode: DecodeFn,
}

impl TypeCodec {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn fingerprint(&self) -> HashValue {
        self.fingerprint
    }
}

fn encode_as<T>(field: &AnyField) -> EngineResult<serde_json::Value>
where
    T: FieldPayload + Serialize,
{
    let value = field.get::<T>()?;
    Ok(serde_json::to_value(value)?)
}

fn decode_as<T>(json: &serde_json::Value) -> EngineResult<AnyField>
where
    T: FieldPayload + DeserializeOwned,
{
    let value: T = serde_json::from_value(json.clone())?;
    Ok(AnyField::new(value))
}

/// Registry mapping registered types to their codecs.
///
/// Explicitly initialized by the caller; the engine never registers types
/// behind the caller's back.
#[derive(Default)]
pub struct CodecRegistry {
    by_type: BTreeMap<TypeId, TypeCodec>,
    by_fingerprint: BTreeMap<HashValue, TypeId>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` for round-tripping through the persistent backing.
    /// Re-registering the same type is a no-op.
    pub fn register<T>(&mut self)
    where
        T: FieldPayload + Serialize + DeserializeOwned,
    {
        let type_id = TypeId::of::<T>();
        if self.by_type.contains_key(&type_id) {
            return;
        }
        let type_name = std::any::type_name::<T>();
        let fingerprint = type_fingerprint(type_name);
        self.by_fingerprint.insert(fingerprint, type_id);
        self.by_type.insert(
            type_id,
            TypeCodec {
                type_name,
                fingerprint,
                encode: encode_as::<T>,
                decode: decode_as::<T>,
            },
        );
    }

    pub fn is_registered(&self, type_id: TypeId) -> bool {
        self.by_type.contains_key(&type_id)
    }

    /// Encode `field` to `(fingerprint, json)`.
    ///
    /// # Errors
    ///
    /// *backend-io* when the wrapped type has no registered codec.
    pub fn encode(&self, field: &AnyField) -> EngineResult<(HashValue, serde_json::Value)> {
        let codec = self.by_type.get(&field.type_id()).ok_or_else(|| {
            EngineError::BackendIo(format!(
                "no codec registered for type {}",
                field.short_type_name()
            ))
        })?;
        let json = (codec.encode)(field)?;
        Ok((codec.fingerprint, json))
    }

    /// Decode a value previously written under `fingerprint`.
    ///
    /// # Errors
    ///
    /// *backend-io* when the fingerprint names no registered codec.
    pub fn decode(
        &self,
        fingerprint: HashValue,
        json: &serde_json::Value,
    ) -> EngineResult<AnyField> {
        let type_id = self.by_fingerprint.get(&fingerprint).ok_or_else(|| {
            EngineError::BackendIo(format!(
                "no codec registered under fingerprint {fingerprint}"
            ))
        })?;
        let codec = self
            .by_type
            .get(type_id)
            .ok_or_else(|| EngineError::BackendIo("codec registry corrupted".to_string()))?;
        (codec.decode)(json)
    }

    /// Ordered `(fingerprint, type name)` pairs for the on-disk type
    /// directory.
    pub fn entries(&self) -> Vec<(HashValue, &'static str)> {
        self.by_type
            .values()
            .map(|codec| (codec.fingerprint, codec.type_name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}
