//! Schema construction and validation entry points.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::schema::error::SchemaError;
use crate::schema::key::{ConfigKey, Namespace};
use crate::schema::value::{ConfigValue, ValueType, Violation};
use crate::store::{ConfigSnapshot, ConfigVersion};

/// Declaration of a single key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyDefinition {
    /// Fully qualified key, e.g. `track.name`.
    pub name: ConfigKey,

    /// Declared type and bounds.
    pub kind: ValueType,

    /// Value the store starts with.
    pub default: ConfigValue,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Serializable schema source.
///
/// ```toml
/// [[keys]]
/// name = "speed.max"
/// default = 5.0
/// kind = { type = "float", min = 0.0, max = 10.0 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    #[serde(default)]
    pub keys: Vec<KeyDefinition>,
}

/// Immutable set of key declarations.
#[derive(Debug, Clone)]
pub struct Schema {
    keys: BTreeMap<ConfigKey, KeyDefinition>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Build a schema, checking key uniqueness and every default.
    pub fn from_definition(definition: SchemaDefinition) -> Result<Self, SchemaError> {
        let mut keys = BTreeMap::new();
        for mut key_def in definition.keys {
            if keys.contains_key(&key_def.name) {
                return Err(SchemaError::DuplicateKey(key_def.name));
            }
            let path = key_def.name.to_string();
            key_def.default = key_def
                .kind
                .check(key_def.default, &path)
                .map_err(|violation| SchemaError::InvalidDefault {
                    key: key_def.name.clone(),
                    reason: attribute(&key_def.name, violation).to_string(),
                })?;
            keys.insert(key_def.name.clone(), key_def);
        }

        // Sorted order puts a parent right before its children.
        let names: Vec<&ConfigKey> = keys.keys().collect();
        for pair in names.windows(2) {
            if pair[0].is_prefix_of(pair[1]) {
                return Err(SchemaError::OverlappingKeys {
                    parent: pair[0].clone(),
                    child: pair[1].clone(),
                });
            }
        }

        Ok(Self { keys })
    }

    /// Parse a TOML schema definition.
    pub fn from_toml_str(source: &str) -> Result<Self, SchemaError> {
        let definition: SchemaDefinition =
            toml::from_str(source).map_err(|e| SchemaError::Definition(e.to_string()))?;
        Self::from_definition(definition)
    }

    /// Declaration of `key`, if registered.
    pub fn get(&self, key: &ConfigKey) -> Option<&KeyDefinition> {
        self.keys.get(key)
    }

    /// All declarations in key order.
    pub fn definitions(&self) -> impl Iterator<Item = &KeyDefinition> {
        self.keys.values()
    }

    /// Distinct namespaces in order.
    pub fn namespaces(&self) -> Vec<Namespace> {
        let mut namespaces: Vec<Namespace> = self.keys.keys().map(ConfigKey::namespace).collect();
        namespaces.dedup();
        namespaces
    }

    pub fn contains_namespace(&self, namespace: &Namespace) -> bool {
        self.keys.keys().any(|key| key.in_namespace(namespace))
    }

    /// Keys declared in `namespace`.
    pub fn keys_in<'a>(&'a self, namespace: &'a Namespace) -> impl Iterator<Item = &'a ConfigKey> + 'a {
        self.keys.keys().filter(move |key| key.in_namespace(namespace))
    }

    /// Check that `key` is registered and belongs to `namespace`.
    pub fn check_membership(
        &self,
        namespace: &Namespace,
        key: &ConfigKey,
    ) -> Result<&KeyDefinition, SchemaError> {
        if !key.in_namespace(namespace) {
            return Err(SchemaError::NamespaceMismatch {
                key: key.clone(),
                namespace: namespace.clone(),
            });
        }
        self.keys
            .get(key)
            .ok_or_else(|| SchemaError::UnknownKey(key.clone()))
    }

    /// Validate a value for `key`.
    pub fn validate(&self, key: &ConfigKey, value: &ConfigValue) -> Result<(), SchemaError> {
        self.normalize(key, value.clone()).map(drop)
    }

    /// Validate a value for `key` and return its canonical form.
    pub fn normalize(&self, key: &ConfigKey, value: ConfigValue) -> Result<ConfigValue, SchemaError> {
        let definition = self
            .keys
            .get(key)
            .ok_or_else(|| SchemaError::UnknownKey(key.clone()))?;
        definition
            .kind
            .check(value, key.as_str())
            .map_err(|violation| attribute(key, violation))
    }

    /// Default snapshot of one namespace, at the initial version.
    pub fn default_snapshot(&self, namespace: &Namespace) -> Result<ConfigSnapshot, SchemaError> {
        if !self.contains_namespace(namespace) {
            return Err(SchemaError::UnknownNamespace(namespace.clone()));
        }
        let values = self
            .keys
            .iter()
            .filter(|(key, _)| key.in_namespace(namespace))
            .map(|(key, def)| (key.clone(), def.default.clone()))
            .collect();
        Ok(ConfigSnapshot::new(namespace.clone(), ConfigVersion::INITIAL, values))
    }

    /// Default snapshots of every namespace.
    pub fn default_snapshots(&self) -> Vec<ConfigSnapshot> {
        self.namespaces()
            .iter()
            .filter_map(|namespace| self.default_snapshot(namespace).ok())
            .collect()
    }

    /// Serializable form, e.g. for printing.
    pub fn to_definition(&self) -> SchemaDefinition {
        SchemaDefinition {
            keys: self.keys.values().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn attribute(key: &ConfigKey, violation: Violation) -> SchemaError {
    match violation {
        Violation::Type { path, expected, found } => SchemaError::TypeMismatch {
            key: key.clone(),
            path,
            expected,
            found,
        },
        Violation::Range { path, detail } => SchemaError::RangeViolation {
            key: key.clone(),
            path,
            detail,
        },
    }
}

/// Incremental schema construction from code.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    pending: Vec<(String, ValueType, ConfigValue, Option<String>)>,
}

impl SchemaBuilder {
    /// Declare a key. Key syntax is checked by [`SchemaBuilder::build`].
    pub fn key(mut self, name: &str, kind: ValueType, default: impl Into<ConfigValue>) -> Self {
        self.pending.push((name.to_string(), kind, default.into(), None));
        self
    }

    /// Declare a key with a description.
    pub fn described(
        mut self,
        name: &str,
        kind: ValueType,
        default: impl Into<ConfigValue>,
        description: &str,
    ) -> Self {
        self.pending
            .push((name.to_string(), kind, default.into(), Some(description.to_string())));
        self
    }

    pub fn build(self) -> Result<Schema, SchemaError> {
        let keys = self
            .pending
            .into_iter()
            .map(|(name, kind, default, description)| {
                Ok(KeyDefinition {
                    name: ConfigKey::parse(&name)?,
                    kind,
                    default,
                    description,
                })
            })
            .collect::<Result<Vec<_>, SchemaError>>()?;
        Schema::from_definition(SchemaDefinition { keys })
    }
}
