//! Engine error taxonomy.
//!
//! Every fallible operation in the engine surfaces one of these variants.
//! Each variant carries a short machine-readable kind string (see [`EngineError::kind`])
//! and a structured payload naming the offending field(s). Nothing is swallowed:
//! a failed run does not cache and does not leave partial state behind.

use std::error::Error;
use std::fmt::{self, Debug};

/// Typed error surfaced by every engine operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A readiness precondition was violated. Lists the inputs without values
    /// and the submodule slots that are unbound or not ready.
    NotReady {
        missing_inputs: Vec<String>,
        unbound_submods: Vec<String>,
    },
    /// A value's runtime type does not match a declared type.
    BadType { expected: String, actual: String },
    /// A value failed a registered domain check.
    OutOfDomain { field: String, check: String },
    /// A positional argument pack does not match the field count of a
    /// property type.
    ArityMismatch { expected: usize, actual: usize },
    /// A map lookup used a key the map does not declare.
    UnknownKey(String),
    /// An insertion conflicted with an existing key.
    AlreadyExists(String),
    /// A lookup found nothing under the requested key.
    NotFound(String),
    /// A mutation was attempted on a locked module.
    Locked(String),
    /// A type-erased value was cast to an incompatible target.
    BadCast { requested: String, stored: String },
    /// A submodule binding (or typed run) used a module that does not satisfy
    /// the required property type.
    PtUnsatisfied { name: String, property_type: String },
    /// The cache backing store failed.
    BackendIo(String),
}

impl EngineError {
    /// Fill in the offending field name on payloads that carry one.
    ///
    /// Field descriptors do not know their own keys; callers holding the key
    /// attach it on the way out.
    pub(crate) fn with_field(self, key: &str) -> Self {
        match self {
            EngineError::OutOfDomain { field, check } if field.is_empty() => {
                EngineError::OutOfDomain {
                    field: key.to_string(),
                    check,
                }
            }
            other => other,
        }
    }

    /// Short kind string identifying the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::NotReady { .. } => "not-ready",
            EngineError::BadType { .. } => "bad-type",
            EngineError::OutOfDomain { .. } => "out-of-domain",
            EngineError::ArityMismatch { .. } => "arity",
            EngineError::UnknownKey(_) => "unknown-key",
            EngineError::AlreadyExists(_) => "already-exists",
            EngineError::NotFound(_) => "not-found",
            EngineError::Locked(_) => "locked",
            EngineError::BadCast { .. } => "bad-cast",
            EngineError::PtUnsatisfied { .. } => "pt-unsatisfied",
            EngineError::BackendIo(_) => "backend-io",
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NotReady {
                missing_inputs,
                unbound_submods,
            } => write!(
                f,
                "not ready: missing inputs {missing_inputs:?}, unready submodules {unbound_submods:?}"
            ),
            EngineError::BadType { expected, actual } => {
                write!(f, "bad type: expected {expected}, got {actual}")
            }
            EngineError::OutOfDomain { field, check } => {
                write!(f, "value for '{field}' violates check: {check}")
            }
            EngineError::ArityMismatch { expected, actual } => {
                write!(f, "expected {expected} positional arguments, got {actual}")
            }
            EngineError::UnknownKey(key) => write!(f, "unknown key: '{key}'"),
            EngineError::AlreadyExists(key) => write!(f, "key already in use: '{key}'"),
            EngineError::NotFound(key) => write!(f, "nothing found under key: '{key}'"),
            EngineError::Locked(what) => write!(f, "module is locked: {what}"),
            EngineError::BadCast { requested, stored } => {
                write!(f, "bad cast: requested {requested}, stored {stored}")
            }
            EngineError::PtUnsatisfied {
                name,
                property_type,
            } => write!(f, "'{name}' does not satisfy property type {property_type}"),
            EngineError::BackendIo(message) => write!(f, "backing store error: {message}"),
        }
    }
}

impl Error for EngineError {}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::BackendIo(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::BackendIo(err.to_string())
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
