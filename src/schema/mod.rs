//! Configuration schema subsystem.
//!
//! # Data Flow
//! ```text
//! schema definition (code / TOML / built-in preset)
//!     → definition.rs (parse keys, check defaults)
//!     → Schema (validated, immutable)
//!     → shared via Arc with the store, engine and tooling
//!
//! On every update request:
//!     engine → Schema::normalize(key, value)
//!         → value.rs (type + bound checks, integer → float widening)
//! ```
//!
//! # Design Decisions
//! - Schema is immutable once built; there is no process-wide global
//! - Value kinds are a closed enum, so a new kind is a compile-time change
//! - Defaults are validated at build time; a schema with a bad default
//!   never reaches the store

pub mod definition;
pub mod error;
pub mod key;
pub mod presets;
pub mod value;

pub use definition::{KeyDefinition, Schema, SchemaBuilder, SchemaDefinition};
pub use error::SchemaError;
pub use key::{ConfigKey, Namespace};
pub use value::{ConfigValue, ValueType};
