//! Plugin-based computational engine for composable scientific workflows.
//!
//! Computations are packaged as modules: opaque units that consume a
//! validated, named set of inputs, may call other modules through typed
//! submodule slots, and return a named set of results. The engine registers
//! implementations under textual keys, wires module graphs, enforces
//! readiness before execution, and memoizes results under a content hash of
//! the complete call context so identical work runs at most once.
//!
//! Design principles:
//! 1. Developer defaults are immutable: user-bound state lives in the
//!    runtime wrapper, never in the implementation.
//! 2. Property types are the only call surface (positional in, positional
//!    out; named maps internally).
//! 3. Deterministic identity everywhere: BLAKE3 over canonically-ordered
//!    bytes for values, contexts, and registered types.
//! 4. Single-threaded cooperative execution; `run` returns only when the
//!    full dependent subtree has completed.
//! 5. Every failure is surfaced as a typed error with a structured payload;
//!    nothing is swallowed.

pub mod any;
pub mod cache;
pub mod errors;
pub mod fields;
pub mod hashing;
pub mod manager;
pub mod module;
pub mod printing;
pub mod property_type;
pub mod submodule;

pub use any::{AnyField, CodecRegistry, Discipline, FieldPayload};
pub use cache::{Database, DatabaseFactory, DirDatabase, MapDatabase, ModuleCache, SharedCache};
pub use errors::{EngineError, EngineResult};
pub use fields::{BoundsCheck, FieldMap, FieldTuple, InputMap, ModuleInput, ModuleResult, ResultMap};
pub use hashing::{hash_object, ContextHasher, HashValue};
pub use manager::ModuleManager;
pub use module::{lambda_module, LambdaModule, Module, ModuleBase, ModuleDeclaration, SharedModule, TypeKey};
pub use property_type::{FieldPack, PropertyType, PtKey};
pub use submodule::SubmoduleRequest;
