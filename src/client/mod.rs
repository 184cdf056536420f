//! Client facade subsystem.
//!
//! # Data Flow
//! ```text
//! caller
//!     → facade.rs (derive namespace, assign request id, register waiter)
//!     → encode → SideChannel::send
//!     ... background reader: receive → decode → route by request id ...
//!     → result or ClientError (Timeout, VersionConflict, Rejected, ...)
//! ```
//!
//! # Design Decisions
//! - Every wait has a deadline; a timeout leaves the outcome unknown
//! - GET timeouts are retried, SET timeouts never are
//! - Read-modify-write (`update`) retries conflicts on a fresh snapshot

pub mod agents;
pub mod error;
pub mod facade;

pub use error::ClientError;
pub use facade::ConfigClient;
