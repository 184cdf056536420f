//! Client error definitions.

use std::time::Duration;
use thiserror::Error;

use crate::codec::{CodecError, ErrorBody, ErrorKind, RequestId};
use crate::schema::{ConfigKey, Namespace};
use crate::store::{ConfigSnapshot, ConfigVersion};

#[derive(Debug, Error)]
pub enum ClientError {
    /// No reply within the deadline. The request may or may not have been
    /// applied.
    #[error("request {request_id} timed out after {timeout:?}")]
    Timeout {
        request_id: RequestId,
        timeout: Duration,
    },

    #[error("version conflict on request {request_id}: based on {expected}, current is {}", current.version)]
    VersionConflict {
        request_id: RequestId,
        expected: ConfigVersion,
        current: Box<ConfigSnapshot>,
        conflicting_keys: Vec<ConfigKey>,
    },

    #[error("request {request_id} rejected: {error}")]
    Rejected {
        request_id: RequestId,
        error: ErrorBody,
    },

    #[error("keys span namespaces '{first}' and '{second}'")]
    MixedNamespaces { first: Namespace, second: Namespace },

    #[error("request names no keys")]
    EmptyRequest,

    #[error("no agent named '{0}'")]
    AgentNotFound(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The channel failed; the client is closed.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("failed to convert configuration: {0}")]
    Conversion(#[from] serde_json::Error),
}

impl ClientError {
    /// Wire-level kind of a server rejection.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ClientError::VersionConflict { .. } => Some(ErrorKind::VersionConflict),
            ClientError::Rejected { error, .. } => Some(error.kind),
            ClientError::Codec(e) => Some(e.kind()),
            _ => None,
        }
    }

    /// The outcome of the request is unknown.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, ClientError::Timeout { .. })
    }
}
