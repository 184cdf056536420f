//! Startup value overrides.
//!
//! An overrides file assigns values to schema keys. Keys may be written
//! dotted, as TOML tables, or as a mix of both:
//!
//! ```toml
//! area.game_over_condition = "all"
//!
//! [track]
//! name = "reinvent_base"
//! finish_line = 0.5
//! ```
//!
//! Record-valued keys (such as the agent roster) are given as the value of
//! that key, e.g. `[[agents.roster]]` tables.

use std::collections::BTreeMap;

use crate::config::loader::ConfigError;
use crate::schema::{ConfigKey, ConfigValue, Namespace, Schema, SchemaError};

/// Validated overrides, grouped by namespace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueOverrides {
    by_namespace: BTreeMap<Namespace, BTreeMap<ConfigKey, ConfigValue>>,
}

impl ValueOverrides {
    /// Parse and validate an overrides document.
    pub fn from_toml_str(source: &str, schema: &Schema) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(source)?;
        Self::from_table(table, schema)
    }

    pub fn from_table(table: toml::Table, schema: &Schema) -> Result<Self, ConfigError> {
        let mut overrides = Self::default();
        overrides.collect(None, table, schema)?;
        Ok(overrides)
    }

    fn collect(
        &mut self,
        prefix: Option<&str>,
        table: toml::Table,
        schema: &Schema,
    ) -> Result<(), ConfigError> {
        for (segment, value) in table {
            let path = match prefix {
                Some(prefix) => format!("{prefix}.{segment}"),
                None => segment,
            };

            let registered = ConfigKey::parse(&path)
                .ok()
                .filter(|key| schema.get(key).is_some());
            match (registered, value) {
                (Some(key), value) => {
                    let value: ConfigValue = value.try_into()?;
                    let value = schema.normalize(&key, value)?;
                    self.by_namespace
                        .entry(key.namespace())
                        .or_default()
                        .insert(key, value);
                }
                (None, toml::Value::Table(nested)) => {
                    check_table_path(&path, schema)?;
                    self.collect(Some(&path), nested, schema)?
                }
                (None, _) => {
                    let key = ConfigKey::parse(&path)?;
                    return Err(SchemaError::UnknownKey(key).into());
                }
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.by_namespace.is_empty()
    }

    /// Number of overridden keys.
    pub fn len(&self) -> usize {
        self.by_namespace.values().map(BTreeMap::len).sum()
    }

    pub fn namespaces(&self) -> impl Iterator<Item = (&Namespace, &BTreeMap<ConfigKey, ConfigValue>)> {
        self.by_namespace.iter()
    }
}

/// A table must lead to at least one registered key, even when it is empty.
fn check_table_path(path: &str, schema: &Schema) -> Result<(), SchemaError> {
    if !path.contains('.') {
        let namespace = Namespace::parse(path)?;
        return if schema.contains_namespace(&namespace) {
            Ok(())
        } else {
            Err(SchemaError::UnknownNamespace(namespace))
        };
    }
    let key = ConfigKey::parse(path)?;
    if schema.definitions().any(|definition| key.is_prefix_of(&definition.name)) {
        Ok(())
    } else {
        Err(SchemaError::UnknownKey(key))
    }
}
