//! Request processing against the schema and the store.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::codec::{
    decode, encode, CodecError, ErrorBody, ErrorKind, Message, Operation, Outcome, Request,
    Response,
};
use crate::config::ValueOverrides;
use crate::engine::state::RequestLifecycle;
use crate::observability::metrics;
use crate::schema::{ConfigKey, ConfigValue, Namespace, Schema};
use crate::store::{ConfigStore, ConfigVersion, StoreError, UpdateRequest};

/// An override could not be applied.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("override for namespace '{namespace}' rejected: {reason}")]
pub struct OverrideRejected {
    pub namespace: Namespace,
    pub reason: String,
}

/// Validates and applies requests. Owns the authoritative store.
#[derive(Debug)]
pub struct SyncEngine {
    schema: Arc<Schema>,
    store: ConfigStore,
}

impl SyncEngine {
    /// Create an engine with every namespace at its defaults.
    pub fn new(schema: Arc<Schema>) -> Self {
        let store = ConfigStore::new(&schema);
        tracing::info!(
            keys = schema.len(),
            namespaces = schema.namespaces().len(),
            "Config store initialized"
        );
        Self { schema, store }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn version(&self, namespace: &Namespace) -> Option<ConfigVersion> {
        self.store.version(namespace)
    }

    /// Run one request to a terminal state.
    pub fn process(&self, request: Request) -> Response {
        let start = Instant::now();
        let op = request.operation.name();
        let request_id = request.request_id;
        let mut lifecycle = RequestLifecycle::received(request_id, op);

        let outcome = match request.operation {
            Operation::Get { keys } => self.process_get(&mut lifecycle, &request.namespace, keys),
            Operation::Set {
                values,
                expected_version,
            } => self.process_set(&mut lifecycle, &request.namespace, values, expected_version),
        };
        debug_assert!(
            lifecycle.state().is_terminal(),
            "request {request_id} answered in state {}",
            lifecycle.state()
        );

        match &outcome {
            Outcome::Ok { snapshot } => tracing::debug!(
                request_id = %request_id,
                op,
                namespace = %request.namespace,
                version = %snapshot.version,
                "Request committed"
            ),
            Outcome::Conflict {
                expected_version,
                snapshot,
                ..
            } => tracing::info!(
                request_id = %request_id,
                namespace = %request.namespace,
                expected = %expected_version,
                current = %snapshot.version,
                "Stale update rejected"
            ),
            Outcome::Error(body) => tracing::info!(
                request_id = %request_id,
                op,
                namespace = %request.namespace,
                kind = %body.kind,
                key = body.key.as_ref().map(ConfigKey::as_str),
                "{}",
                body.message
            ),
        }

        metrics::record_request(op, outcome.status(), start);
        Response::new(Some(request_id), outcome)
    }

    fn process_get(
        &self,
        lifecycle: &mut RequestLifecycle,
        namespace: &Namespace,
        keys: BTreeSet<ConfigKey>,
    ) -> Outcome {
        lifecycle.validating();
        if let Err(body) = self.check_namespace(namespace) {
            lifecycle.reject(body.kind);
            return Outcome::Error(body);
        }
        for key in &keys {
            if let Err(e) = self.schema.check_membership(namespace, key) {
                let body = ErrorBody::from(&e);
                lifecycle.reject(body.kind);
                return Outcome::Error(body);
            }
        }

        lifecycle.applying();
        match self.store.read(namespace, &keys) {
            Ok(snapshot) => {
                lifecycle.commit();
                Outcome::Ok { snapshot }
            }
            Err(e) => {
                let body = store_error_body(e);
                lifecycle.reject(body.kind);
                Outcome::Error(body)
            }
        }
    }

    fn process_set(
        &self,
        lifecycle: &mut RequestLifecycle,
        namespace: &Namespace,
        values: BTreeMap<ConfigKey, ConfigValue>,
        expected_version: Option<ConfigVersion>,
    ) -> Outcome {
        lifecycle.validating();
        if let Err(body) = self.check_namespace(namespace) {
            lifecycle.reject(body.kind);
            return Outcome::Error(body);
        }
        if values.is_empty() {
            lifecycle.reject(ErrorKind::MalformedMessage);
            return Outcome::Error(ErrorBody::new(
                ErrorKind::MalformedMessage,
                "SET carries no values",
            ));
        }

        let mut normalized = BTreeMap::new();
        for (key, value) in values {
            let checked = self
                .schema
                .check_membership(namespace, &key)
                .and_then(|_| self.schema.normalize(&key, value));
            match checked {
                Ok(value) => {
                    normalized.insert(key, value);
                }
                Err(e) => {
                    let body = ErrorBody::from(&e);
                    lifecycle.reject(body.kind);
                    return Outcome::Error(body);
                }
            }
        }

        lifecycle.applying();
        let update = UpdateRequest {
            namespace: namespace.clone(),
            values: normalized,
            expected_version,
        };
        match self.store.apply(update) {
            Ok(result) => {
                lifecycle.commit();
                Outcome::Ok {
                    snapshot: result.snapshot,
                }
            }
            Err(StoreError::VersionConflict {
                expected,
                current,
                conflicting_keys,
            }) => {
                lifecycle.reject(ErrorKind::VersionConflict);
                Outcome::Conflict {
                    expected_version: expected,
                    snapshot: *current,
                    conflicting_keys,
                }
            }
            Err(e) => {
                let body = store_error_body(e);
                lifecycle.reject(body.kind);
                Outcome::Error(body)
            }
        }
    }

    fn check_namespace(&self, namespace: &Namespace) -> Result<(), ErrorBody> {
        if self.schema.contains_namespace(namespace) {
            Ok(())
        } else {
            Err(ErrorBody::new(
                ErrorKind::UnknownNamespace,
                format!("unknown namespace '{namespace}'"),
            ))
        }
    }

    /// Decode a frame, process it and encode the reply.
    ///
    /// Undecodable frames produce an ERROR response addressed to the
    /// recovered request id, if any. Fails only if the reply itself cannot
    /// be encoded.
    pub fn handle_frame(&self, frame: &[u8]) -> Result<Vec<u8>, CodecError> {
        let response = match decode(frame) {
            Ok(Message::Request(request)) => self.process(request),
            Ok(Message::Response(response)) => {
                metrics::record_decode_failure(ErrorKind::MalformedMessage);
                Response::error(
                    response.request_id,
                    ErrorBody::new(ErrorKind::MalformedMessage, "expected a request, got a response"),
                )
            }
            Err(e) => {
                metrics::record_decode_failure(e.kind());
                tracing::warn!(
                    request_id = ?e.request_id(),
                    kind = %e.kind(),
                    error = %e,
                    "Undecodable frame"
                );
                Response::error(e.request_id(), ErrorBody::new(e.kind(), e.to_string()))
            }
        };
        encode(&Message::from(response))
    }

    /// Apply startup or reloaded overrides, one update per namespace.
    pub fn apply_overrides(
        &self,
        overrides: &ValueOverrides,
    ) -> Result<Vec<(Namespace, ConfigVersion)>, OverrideRejected> {
        let mut applied = Vec::new();
        for (namespace, values) in overrides.namespaces() {
            let request = Request::set(namespace.clone(), values.clone(), None);
            let response = self.process(request);
            match response.outcome {
                Outcome::Ok { snapshot } => {
                    tracing::info!(
                        namespace = %namespace,
                        version = %snapshot.version,
                        keys = values.len(),
                        "Overrides applied"
                    );
                    applied.push((namespace.clone(), snapshot.version));
                }
                Outcome::Conflict { snapshot, .. } => {
                    return Err(OverrideRejected {
                        namespace: namespace.clone(),
                        reason: format!("unexpected conflict at {}", snapshot.version),
                    })
                }
                Outcome::Error(body) => {
                    return Err(OverrideRejected {
                        namespace: namespace.clone(),
                        reason: body.to_string(),
                    })
                }
            }
        }
        Ok(applied)
    }
}

fn store_error_body(err: StoreError) -> ErrorBody {
    match err {
        StoreError::UnknownNamespace(namespace) => ErrorBody::new(
            ErrorKind::UnknownNamespace,
            format!("unknown namespace '{namespace}'"),
        ),
        StoreError::UnknownKey(key) => {
            ErrorBody::new(ErrorKind::UnknownKey, format!("unknown key '{key}'")).with_key(key)
        }
        e @ StoreError::VersionConflict { .. } => {
            ErrorBody::new(ErrorKind::VersionConflict, e.to_string())
        }
        StoreError::Fault(message) => ErrorBody::new(ErrorKind::StoreFault, message),
    }
}
