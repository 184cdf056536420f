//! Side-channel configuration exchange for simulation environments.
//!
//! A controller process reads and updates typed configuration held by a
//! running environment process over an already-established side channel.
//!
//! ```text
//!   controller process                         environment process
//!  ┌────────────────────┐                    ┌──────────────────────────┐
//!  │  client::ConfigClient                   │  engine::ConfigServer     │
//!  │    get / set / update │   side channel  │    → codec::decode        │
//!  │    → codec::encode ───┼────────────────▶│    → engine::SyncEngine   │
//!  │                       │                 │        → schema (validate)│
//!  │    ◀── codec::decode ─┼◀────────────────┼──      → store (apply)    │
//!  └────────────────────┘                    └──────────────────────────┘
//! ```

// Protocol core
pub mod codec;
pub mod engine;
pub mod schema;
pub mod store;
pub mod transport;

// Controller-facing API
pub mod client;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use client::{ClientError, ConfigClient};
pub use codec::{ErrorKind, Message, Request, Response};
pub use config::ServiceConfig;
pub use engine::{ConfigServer, SyncEngine};
pub use lifecycle::Shutdown;
pub use schema::{ConfigKey, ConfigValue, Namespace, Schema, SchemaError, ValueType};
pub use store::{ConfigSnapshot, ConfigStore, ConfigVersion, UpdateRequest, UpdateResult};
pub use transport::{SideChannel, TransportError};
