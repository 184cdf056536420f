//! Wire codec subsystem.
//!
//! # Data Flow
//! ```text
//! Outgoing:
//!     Message → wire.rs (envelope + JSON) → frame bytes → transport
//!
//! Incoming:
//!     frame bytes → wire.rs (parse, version check) → Message
//!     On failure: CodecError carries the request id when recoverable
//! ```
//!
//! # Design Decisions
//! - The envelope carries a protocol version so peers can reject frames
//!   they do not understand without guessing
//! - Ordered maps everywhere; encoding is a pure function of the message

pub mod message;
pub mod wire;

pub use message::{ErrorBody, ErrorKind, Message, Operation, Outcome, Request, RequestId, Response};
pub use wire::{decode, encode, CodecError, PROTOCOL_VERSION};
