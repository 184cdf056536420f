//! Versioned snapshot types shared by the store, engine and client.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::schema::{ConfigKey, ConfigValue, Namespace};

/// Monotonic version of a namespace.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ConfigVersion(u64);

impl ConfigVersion {
    /// Version of a freshly initialized namespace.
    pub const INITIAL: ConfigVersion = ConfigVersion(0);

    pub const fn new(version: u64) -> Self {
        Self(version)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// The following version, or `None` once the counter is exhausted.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl From<u64> for ConfigVersion {
    fn from(version: u64) -> Self {
        Self(version)
    }
}

impl fmt::Display for ConfigVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Values of one namespace at one version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub namespace: Namespace,
    pub version: ConfigVersion,
    pub values: BTreeMap<ConfigKey, ConfigValue>,
}

impl ConfigSnapshot {
    pub fn new(
        namespace: Namespace,
        version: ConfigVersion,
        values: BTreeMap<ConfigKey, ConfigValue>,
    ) -> Self {
        Self { namespace, version, values }
    }

    pub fn get(&self, key: &ConfigKey) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    /// Look up a value by key text.
    pub fn value(&self, key: &str) -> Option<&ConfigValue> {
        let key = ConfigKey::parse(key).ok()?;
        self.values.get(&key)
    }

    /// Same version, restricted to `keys`. Missing keys are skipped.
    pub fn project(&self, keys: &BTreeSet<ConfigKey>) -> Self {
        let values = keys
            .iter()
            .filter_map(|key| self.values.get(key).map(|value| (key.clone(), value.clone())))
            .collect();
        Self::new(self.namespace.clone(), self.version, values)
    }

    /// Nest the namespace into a record keyed by field path.
    ///
    /// `track.geometry.width = 1.0` becomes `{geometry: {width: 1.0}}`.
    pub fn to_record(&self) -> ConfigValue {
        let mut root = BTreeMap::new();
        for (key, value) in &self.values {
            let segments: Vec<&str> = key.field_path().collect();
            insert_nested(&mut root, &segments, value.clone());
        }
        ConfigValue::Record(root)
    }

    /// Decode the namespace into a typed structure.
    pub fn decode_into<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        self.to_record().deserialize_into()
    }
}

fn insert_nested(node: &mut BTreeMap<String, ConfigValue>, segments: &[&str], value: ConfigValue) {
    match segments {
        [] => {}
        [leaf] => {
            node.insert(leaf.to_string(), value);
        }
        [head, rest @ ..] => {
            let child = node
                .entry(head.to_string())
                .or_insert_with(|| ConfigValue::Record(BTreeMap::new()));
            if let ConfigValue::Record(child) = child {
                insert_nested(child, rest, value);
            }
        }
    }
}

/// A set of proposed values for one namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub namespace: Namespace,
    pub values: BTreeMap<ConfigKey, ConfigValue>,
    /// Version the caller based its update on; `None` applies unconditionally.
    pub expected_version: Option<ConfigVersion>,
}

/// Successful application of an [`UpdateRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateResult {
    /// Version produced by this update.
    pub version: ConfigVersion,
    /// The written keys at `version`.
    pub snapshot: ConfigSnapshot,
}
