//! Namespaced configuration keys.
//!
//! A key is a dotted identifier such as `track.geometry.width`. The first
//! segment is the namespace, which owns one version counter in the store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::schema::error::SchemaError;

const SEPARATOR: char = '.';

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Logical grouping of keys sharing one version counter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Namespace(String);

impl Namespace {
    /// Parse a namespace name (a single key segment).
    pub fn parse(raw: &str) -> Result<Self, SchemaError> {
        if is_valid_segment(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(SchemaError::InvalidNamespace(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Namespace {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Namespace {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Namespace> for String {
    fn from(ns: Namespace) -> Self {
        ns.0
    }
}

/// Identifier of a single configuration field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConfigKey(String);

impl ConfigKey {
    /// Parse a dotted key. At least a namespace and one field segment.
    pub fn parse(raw: &str) -> Result<Self, SchemaError> {
        let mut segments = 0usize;
        for segment in raw.split(SEPARATOR) {
            if !is_valid_segment(segment) {
                return Err(SchemaError::InvalidKey(raw.to_string()));
            }
            segments += 1;
        }
        if segments < 2 {
            return Err(SchemaError::InvalidKey(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    /// Namespace of this key (its first segment).
    pub fn namespace(&self) -> Namespace {
        Namespace(self.namespace_str().to_string())
    }

    /// Check namespace membership without allocating.
    pub fn in_namespace(&self, namespace: &Namespace) -> bool {
        self.namespace_str() == namespace.as_str()
    }

    /// Segments after the namespace.
    pub fn field_path(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR).skip(1)
    }

    /// True when `other` lives underneath this key (`a.b` is a prefix of `a.b.c`).
    pub fn is_prefix_of(&self, other: &ConfigKey) -> bool {
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0[self.0.len()..].starts_with(SEPARATOR)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn namespace_str(&self) -> &str {
        self.0.split(SEPARATOR).next().unwrap_or_default()
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ConfigKey {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ConfigKey {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ConfigKey> for String {
    fn from(key: ConfigKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_namespaced_keys() {
        let key = ConfigKey::parse("track.geometry.width").unwrap();
        assert_eq!(key.namespace().as_str(), "track");
        assert_eq!(key.field_path().collect::<Vec<_>>(), vec!["geometry", "width"]);
    }

    #[test]
    fn rejects_malformed_keys() {
        for raw in ["track", "", "track.", ".name", "Track.name", "track..name", "track.na me"] {
            assert!(
                matches!(ConfigKey::parse(raw), Err(SchemaError::InvalidKey(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn prefix_detection_respects_segments() {
        let parent = ConfigKey::parse("track.geometry").unwrap();
        let child = ConfigKey::parse("track.geometry.width").unwrap();
        let sibling = ConfigKey::parse("track.geometry_v2").unwrap();
        assert!(parent.is_prefix_of(&child));
        assert!(!parent.is_prefix_of(&sibling));
        assert!(!child.is_prefix_of(&parent));
    }

    #[test]
    fn serde_validates_on_deserialize() {
        let key: ConfigKey = serde_json::from_str("\"speed.max\"").unwrap();
        assert_eq!(key.as_str(), "speed.max");
        assert!(serde_json::from_str::<ConfigKey>("\"speed\"").is_err());
        assert!(serde_json::from_str::<Namespace>("\"a.b\"").is_err());
    }
}
