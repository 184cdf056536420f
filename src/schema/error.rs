//! Schema error definitions.

use thiserror::Error;

use crate::schema::key::{ConfigKey, Namespace};

/// Errors raised while defining a schema or validating values against it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    /// Key text is not a dotted, namespaced identifier.
    #[error("invalid key '{0}': expected lowercase dotted segments such as 'track.name'")]
    InvalidKey(String),

    /// Namespace text is not a single lowercase segment.
    #[error("invalid namespace '{0}'")]
    InvalidNamespace(String),

    /// Key is not registered in the schema.
    #[error("unknown key '{0}'")]
    UnknownKey(ConfigKey),

    /// No key of the schema lives in this namespace.
    #[error("unknown namespace '{0}'")]
    UnknownNamespace(Namespace),

    /// Key belongs to a different namespace than the request targets.
    #[error("key '{key}' does not belong to namespace '{namespace}'")]
    NamespaceMismatch { key: ConfigKey, namespace: Namespace },

    /// Value tag does not match the declared type.
    #[error("type mismatch for '{key}' at '{path}': expected {expected}, found {found}")]
    TypeMismatch {
        key: ConfigKey,
        path: String,
        expected: String,
        found: String,
    },

    /// Value is outside a declared bound.
    #[error("range violation for '{key}' at '{path}': {detail}")]
    RangeViolation {
        key: ConfigKey,
        path: String,
        detail: String,
    },

    /// Key is declared twice.
    #[error("duplicate key '{0}' in schema definition")]
    DuplicateKey(ConfigKey),

    /// One key is a prefix of another, so the namespace has no record shape.
    #[error("key '{parent}' overlaps key '{child}'")]
    OverlappingKeys { parent: ConfigKey, child: ConfigKey },

    /// Declared default does not satisfy the declared type.
    #[error("default for '{key}' is invalid: {reason}")]
    InvalidDefault { key: ConfigKey, reason: String },

    /// Schema definition source could not be parsed.
    #[error("failed to parse schema definition: {0}")]
    Definition(String),
}

impl SchemaError {
    /// The key the error refers to, when there is one.
    pub fn key(&self) -> Option<&ConfigKey> {
        match self {
            SchemaError::UnknownKey(key)
            | SchemaError::DuplicateKey(key)
            | SchemaError::NamespaceMismatch { key, .. }
            | SchemaError::TypeMismatch { key, .. }
            | SchemaError::RangeViolation { key, .. }
            | SchemaError::InvalidDefault { key, .. } => Some(key),
            SchemaError::OverlappingKeys { parent, .. } => Some(parent),
            SchemaError::InvalidKey(_)
            | SchemaError::InvalidNamespace(_)
            | SchemaError::UnknownNamespace(_)
            | SchemaError::Definition(_) => None,
        }
    }
}
