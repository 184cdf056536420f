//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!
//! schema source (preset or TOML definition)
//!     → loader.rs → Schema, shared via Arc
//!
//! overrides file (TOML key = value)
//!     → overrides.rs (resolve keys, validate values)
//!     → applied through the engine before serving
//!     → watcher.rs re-applies on change when enabled
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal settings files
//! - Validation separates syntactic (serde) from semantic checks
//! - Overrides go through the engine like any other write, so they bump
//!   versions and are subject to the same validation

pub mod loader;
pub mod overrides;
pub mod settings;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_overrides, load_schema, parse_config, ConfigError};
pub use overrides::ValueOverrides;
pub use settings::{
    ClientConfig, LogFormat, ObservabilityConfig, OverridesConfig, SchemaPreset, SchemaSettings,
    ServiceConfig, TransportConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::OverridesWatcher;
