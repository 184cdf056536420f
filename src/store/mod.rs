//! Authoritative in-memory configuration store.
//!
//! # Responsibilities
//! - Hold one versioned snapshot per namespace
//! - Apply updates atomically, advancing the version once per update
//! - Reject updates based on a stale version
//!
//! # Design Decisions
//! - Readers load the current snapshot through `ArcSwap`, so a read never
//!   observes a half-applied update and never waits on a writer
//! - Writers serialize on a per-namespace mutex; namespaces never block
//!   each other
//! - The store trusts the engine for type checks but still refuses keys it
//!   was not initialized with

pub mod types;

use arc_swap::ArcSwap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::observability::metrics;
use crate::schema::{ConfigKey, Namespace, Schema};

pub use types::{ConfigSnapshot, ConfigVersion, UpdateRequest, UpdateResult};

/// Errors returned by the store.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("unknown namespace '{0}'")]
    UnknownNamespace(Namespace),

    #[error("unknown key '{0}'")]
    UnknownKey(ConfigKey),

    /// The caller's base version is not the current version.
    #[error("version conflict: expected {expected}, current {}", current.version)]
    VersionConflict {
        expected: ConfigVersion,
        current: Box<ConfigSnapshot>,
        /// Requested keys written after `expected`.
        conflicting_keys: Vec<ConfigKey>,
    },

    #[error("store fault: {0}")]
    Fault(String),
}

/// Mutable bookkeeping guarded by the writer lock.
#[derive(Debug, Default)]
struct WriterState {
    /// Version at which each key was last written.
    modified_at: BTreeMap<ConfigKey, ConfigVersion>,
}

#[derive(Debug)]
struct NamespaceStore {
    current: ArcSwap<ConfigSnapshot>,
    writer: Mutex<WriterState>,
}

impl NamespaceStore {
    fn new(snapshot: ConfigSnapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(snapshot),
            writer: Mutex::new(WriterState::default()),
        }
    }
}

/// One store per environment process.
#[derive(Debug)]
pub struct ConfigStore {
    namespaces: BTreeMap<Namespace, NamespaceStore>,
}

impl ConfigStore {
    /// Initialize every namespace to the schema defaults.
    pub fn new(schema: &Schema) -> Self {
        let namespaces = schema
            .default_snapshots()
            .into_iter()
            .map(|snapshot| (snapshot.namespace.clone(), NamespaceStore::new(snapshot)))
            .collect();
        Self { namespaces }
    }

    /// Current version of `namespace`.
    pub fn version(&self, namespace: &Namespace) -> Option<ConfigVersion> {
        self.namespaces
            .get(namespace)
            .map(|ns| ns.current.load().version)
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &Namespace> {
        self.namespaces.keys()
    }

    /// Read a consistent snapshot. An empty key set reads the whole namespace.
    pub fn read(
        &self,
        namespace: &Namespace,
        keys: &BTreeSet<ConfigKey>,
    ) -> Result<ConfigSnapshot, StoreError> {
        let ns = self.namespace(namespace)?;
        let current = ns.current.load_full();
        if keys.is_empty() {
            return Ok((*current).clone());
        }
        if let Some(missing) = keys.iter().find(|key| !current.values.contains_key(*key)) {
            return Err(StoreError::UnknownKey(missing.clone()));
        }
        Ok(current.project(keys))
    }

    /// Apply an update atomically.
    pub fn apply(&self, request: UpdateRequest) -> Result<UpdateResult, StoreError> {
        let ns = self.namespace(&request.namespace)?;
        let mut writer = ns
            .writer
            .lock()
            .map_err(|_| StoreError::Fault(format!("writer lock for '{}' poisoned", request.namespace)))?;

        let current = ns.current.load_full();

        if let Some(expected) = request.expected_version {
            if expected != current.version {
                let conflicting_keys = request
                    .values
                    .keys()
                    .filter(|key| {
                        writer
                            .modified_at
                            .get(*key)
                            .is_some_and(|modified| *modified > expected)
                    })
                    .cloned()
                    .collect();
                return Err(StoreError::VersionConflict {
                    expected,
                    current: Box::new((*current).clone()),
                    conflicting_keys,
                });
            }
        }

        if let Some(unknown) = request
            .values
            .keys()
            .find(|key| !current.values.contains_key(*key))
        {
            return Err(StoreError::UnknownKey(unknown.clone()));
        }

        let version = current.version.next().ok_or_else(|| {
            StoreError::Fault(format!("version counter of '{}' exhausted", request.namespace))
        })?;

        let written: BTreeSet<ConfigKey> = request.values.keys().cloned().collect();
        let mut next = (*current).clone();
        next.version = version;
        for (key, value) in request.values {
            writer.modified_at.insert(key.clone(), version);
            next.values.insert(key, value);
        }
        let snapshot = next.project(&written);
        ns.current.store(Arc::new(next));

        metrics::record_namespace_version(&request.namespace, version);
        tracing::debug!(
            namespace = %request.namespace,
            version = %version,
            keys = written.len(),
            "Update applied"
        );

        Ok(UpdateResult { version, snapshot })
    }

    fn namespace(&self, namespace: &Namespace) -> Result<&NamespaceStore, StoreError> {
        self.namespaces
            .get(namespace)
            .ok_or_else(|| StoreError::UnknownNamespace(namespace.clone()))
    }
}
