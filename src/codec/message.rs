//! Protocol messages exchanged over the side channel.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

use crate::schema::{ConfigKey, ConfigValue, Namespace, SchemaError};
use crate::store::{ConfigSnapshot, ConfigVersion};

/// Correlates a response with the request that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RequestId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A GET or SET addressed to one namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub request_id: RequestId,
    pub namespace: Namespace,
    #[serde(flatten)]
    pub operation: Operation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    /// Read `keys`; an empty set reads the whole namespace.
    Get { keys: BTreeSet<ConfigKey> },
    Set {
        values: BTreeMap<ConfigKey, ConfigValue>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expected_version: Option<ConfigVersion>,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Get { .. } => "get",
            Operation::Set { .. } => "set",
        }
    }
}

impl Request {
    pub fn get(namespace: Namespace, keys: BTreeSet<ConfigKey>) -> Self {
        Self {
            request_id: RequestId::new(),
            namespace,
            operation: Operation::Get { keys },
        }
    }

    pub fn set(
        namespace: Namespace,
        values: BTreeMap<ConfigKey, ConfigValue>,
        expected_version: Option<ConfigVersion>,
    ) -> Self {
        Self {
            request_id: RequestId::new(),
            namespace,
            operation: Operation::Set { values, expected_version },
        }
    }
}

/// Reply to a [`Request`].
///
/// `request_id` is absent only when the request was too damaged to recover
/// its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub request_id: Option<RequestId>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl Response {
    pub fn new(request_id: Option<RequestId>, outcome: Outcome) -> Self {
        Self { request_id, outcome }
    }

    pub fn error(request_id: Option<RequestId>, body: ErrorBody) -> Self {
        Self::new(request_id, Outcome::Error(body))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// GET: the requested keys. SET: the written keys at the new version.
    Ok { snapshot: ConfigSnapshot },
    /// SET rejected because `expected_version` was stale.
    Conflict {
        expected_version: ConfigVersion,
        snapshot: ConfigSnapshot,
        conflicting_keys: Vec<ConfigKey>,
    },
    Error(ErrorBody),
}

impl Outcome {
    /// Label used in logs and metrics.
    pub fn status(&self) -> &'static str {
        match self {
            Outcome::Ok { .. } => "ok",
            Outcome::Conflict { .. } => "conflict",
            Outcome::Error(body) => body.kind.as_str(),
        }
    }
}

/// Machine-readable rejection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<ConfigKey>,
    pub message: String,
}

impl ErrorBody {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            key: None,
            message: message.into(),
        }
    }

    pub fn with_key(mut self, key: ConfigKey) -> Self {
        self.key = Some(key);
        self
    }
}

impl From<&SchemaError> for ErrorBody {
    fn from(err: &SchemaError) -> Self {
        let kind = match err {
            SchemaError::UnknownKey(_) => ErrorKind::UnknownKey,
            SchemaError::UnknownNamespace(_) => ErrorKind::UnknownNamespace,
            SchemaError::NamespaceMismatch { .. } => ErrorKind::NamespaceMismatch,
            SchemaError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            SchemaError::RangeViolation { .. } => ErrorKind::RangeViolation,
            SchemaError::InvalidKey(_) | SchemaError::InvalidNamespace(_) => {
                ErrorKind::MalformedMessage
            }
            SchemaError::DuplicateKey(_)
            | SchemaError::OverlappingKeys { .. }
            | SchemaError::InvalidDefault { .. }
            | SchemaError::Definition(_) => ErrorKind::StoreFault,
        };
        Self {
            kind,
            key: err.key().cloned(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownKey,
    UnknownNamespace,
    NamespaceMismatch,
    TypeMismatch,
    RangeViolation,
    VersionConflict,
    MalformedMessage,
    UnsupportedVersion,
    StoreFault,
}

impl ErrorKind {
    /// Whether resending (after refreshing the version) can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::VersionConflict)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnknownKey => "unknown_key",
            ErrorKind::UnknownNamespace => "unknown_namespace",
            ErrorKind::NamespaceMismatch => "namespace_mismatch",
            ErrorKind::TypeMismatch => "type_mismatch",
            ErrorKind::RangeViolation => "range_violation",
            ErrorKind::VersionConflict => "version_conflict",
            ErrorKind::MalformedMessage => "malformed_message",
            ErrorKind::UnsupportedVersion => "unsupported_version",
            ErrorKind::StoreFault => "store_fault",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything that travels in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Message {
    Request(Request),
    Response(Response),
}

impl Message {
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Message::Request(request) => Some(request.request_id),
            Message::Response(response) => response.request_id,
        }
    }
}

impl From<Request> for Message {
    fn from(request: Request) -> Self {
        Message::Request(request)
    }
}

impl From<Response> for Message {
    fn from(response: Response) -> Self {
        Message::Response(response)
    }
}
