//! Type-erased value storage.
//!
//! `AnyField` holds one value of any storable type behind an object-safe
//! payload trait; `CodecRegistry` supplies the registered-type dispatch that
//! serialization round-trips through.

mod codec;
mod field;
mod payload;

pub use codec::{CodecRegistry, TypeCodec};
pub use field::{AnyField, Discipline};
pub use payload::{short_type_name, FieldPayload};
