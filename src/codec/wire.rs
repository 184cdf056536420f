//! JSON frame encoding.
//!
//! Every frame is an envelope:
//!
//! ```json
//! {"protocol_version": 1, "message": {"request": {...}}}
//! ```
//!
//! Maps in the payload are ordered, so equal messages encode to equal bytes.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::codec::message::{ErrorKind, Message, RequestId};

/// Version of the envelope this build reads and writes.
pub const PROTOCOL_VERSION: u64 = 1;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
    #[error("malformed message: {reason}")]
    MalformedMessage {
        /// Id of the offending request, if it could be recovered.
        request_id: Option<RequestId>,
        reason: String,
    },

    #[error("unsupported protocol version {version} (supported: {PROTOCOL_VERSION})")]
    UnsupportedVersion {
        request_id: Option<RequestId>,
        version: u64,
    },
}

impl CodecError {
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            CodecError::MalformedMessage { request_id, .. }
            | CodecError::UnsupportedVersion { request_id, .. } => *request_id,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CodecError::MalformedMessage { .. } => ErrorKind::MalformedMessage,
            CodecError::UnsupportedVersion { .. } => ErrorKind::UnsupportedVersion,
        }
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    protocol_version: u64,
    message: &'a Message,
}

#[derive(Deserialize)]
struct Envelope {
    #[allow(dead_code)]
    protocol_version: u64,
    message: Message,
}

/// Encode a message into one frame.
pub fn encode(message: &Message) -> Result<Vec<u8>, CodecError> {
    let envelope = EnvelopeRef {
        protocol_version: PROTOCOL_VERSION,
        message,
    };
    serde_json::to_vec(&envelope).map_err(|e| CodecError::MalformedMessage {
        request_id: message.request_id(),
        reason: e.to_string(),
    })
}

/// Decode one frame.
pub fn decode(bytes: &[u8]) -> Result<Message, CodecError> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| CodecError::MalformedMessage {
            request_id: None,
            reason: e.to_string(),
        })?;

    let request_id = recover_request_id(&value);

    let version = value
        .get("protocol_version")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| CodecError::MalformedMessage {
            request_id,
            reason: "missing or invalid protocol_version".to_string(),
        })?;
    if version != PROTOCOL_VERSION {
        return Err(CodecError::UnsupportedVersion { request_id, version });
    }

    let envelope: Envelope =
        serde_json::from_value(value).map_err(|e| CodecError::MalformedMessage {
            request_id,
            reason: e.to_string(),
        })?;
    Ok(envelope.message)
}

fn recover_request_id(value: &serde_json::Value) -> Option<RequestId> {
    ["/message/request/request_id", "/message/response/request_id"]
        .iter()
        .find_map(|pointer| value.pointer(pointer))
        .and_then(serde_json::Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .map(RequestId::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::message::{ErrorBody, Outcome, Request, Response};
    use crate::schema::{ConfigKey, ConfigValue, Namespace};
    use crate::store::{ConfigSnapshot, ConfigVersion};
    use std::collections::{BTreeMap, BTreeSet};

    fn key(raw: &str) -> ConfigKey {
        ConfigKey::parse(raw).unwrap()
    }

    fn speed() -> Namespace {
        Namespace::parse("speed").unwrap()
    }

    #[test]
    fn set_request_survives_encoding() {
        let mut values = BTreeMap::new();
        values.insert(key("speed.max"), ConfigValue::Float(7.0));
        values.insert(key("speed.steps"), ConfigValue::Integer(7));
        values.insert(
            key("speed.profile"),
            ConfigValue::List(vec![ConfigValue::from("slow"), ConfigValue::Boolean(true)]),
        );
        let message = Message::from(Request::set(speed(), values, Some(ConfigVersion::new(5))));

        let bytes = encode(&message).unwrap();
        assert_eq!(decode(&bytes).unwrap(), message);
    }

    #[test]
    fn response_shapes_survive_encoding() {
        let request_id = RequestId::new();
        let mut values = BTreeMap::new();
        values.insert(key("speed.max"), ConfigValue::Float(6.0));
        let snapshot = ConfigSnapshot::new(speed(), ConfigVersion::new(6), values);

        let responses = [
            Response::new(Some(request_id), Outcome::Ok { snapshot: snapshot.clone() }),
            Response::new(
                Some(request_id),
                Outcome::Conflict {
                    expected_version: ConfigVersion::new(5),
                    snapshot,
                    conflicting_keys: vec![key("speed.max")],
                },
            ),
            Response::error(
                None,
                ErrorBody::new(ErrorKind::RangeViolation, "too fast").with_key(key("speed.max")),
            ),
        ];
        for response in responses {
            let message = Message::from(response);
            assert_eq!(decode(&encode(&message).unwrap()).unwrap(), message);
        }
    }

    #[test]
    fn encoding_is_deterministic() {
        let keys = BTreeSet::from([key("speed.min"), key("speed.max")]);
        let message = Message::from(Request::get(speed(), keys.clone()));
        let reversed = Message::from(Request {
            request_id: message.request_id().unwrap(),
            namespace: speed(),
            operation: crate::codec::message::Operation::Get {
                keys: keys.into_iter().rev().collect(),
            },
        });
        assert_eq!(encode(&message).unwrap(), encode(&reversed).unwrap());
    }

    #[test]
    fn wire_shape_is_flat() {
        let request = Request::get(speed(), BTreeSet::from([key("speed.max")]));
        let bytes = encode(&Message::from(request.clone())).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["protocol_version"], 1);
        assert_eq!(value["message"]["request"]["namespace"], "speed");
        assert_eq!(value["message"]["request"]["GET"]["keys"][0], "speed.max");
        assert_eq!(
            value["message"]["request"]["request_id"],
            request.request_id.to_string()
        );
    }

    #[test]
    fn truncated_frame_is_malformed() {
        let message = Message::from(Request::get(speed(), BTreeSet::new()));
        let bytes = encode(&message).unwrap();
        let err = decode(&bytes[..bytes.len() / 2]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedMessage);
        assert_eq!(err.request_id(), None);
    }

    #[test]
    fn unsupported_version_keeps_request_id() {
        let request_id = RequestId::new();
        let frame = serde_json::json!({
            "protocol_version": 2,
            "message": {"request": {
                "request_id": request_id.to_string(),
                "namespace": "speed",
                "GET": {"keys": []}
            }}
        });
        let err = decode(frame.to_string().as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);
        assert_eq!(err.request_id(), Some(request_id));
    }

    #[test]
    fn invalid_key_is_malformed_with_request_id() {
        let request_id = RequestId::new();
        let frame = serde_json::json!({
            "protocol_version": 1,
            "message": {"request": {
                "request_id": request_id.to_string(),
                "namespace": "speed",
                "GET": {"keys": ["Speed Max"]}
            }}
        });
        let err = decode(frame.to_string().as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedMessage);
        assert_eq!(err.request_id(), Some(request_id));
    }

    #[test]
    fn non_finite_float_cannot_be_encoded() {
        let mut values = BTreeMap::new();
        values.insert(key("speed.max"), ConfigValue::Float(f64::NAN));
        let message = Message::from(Request::set(speed(), values, None));
        let err = encode(&message).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedMessage);
    }
}
