//! Service settings.
//!
//! Every section has defaults, so an empty file (or no file) is a valid
//! configuration.
//!
//! ```toml
//! [schema]
//! preset = "racing"
//!
//! [client]
//! timeout_ms = 10000
//!
//! [overrides]
//! path = "overrides.toml"
//! watch = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root settings of the configuration service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Where the schema comes from.
    pub schema: SchemaSettings,

    /// Client call deadlines and retry policy.
    pub client: ClientConfig,

    pub transport: TransportConfig,

    pub observability: ObservabilityConfig,

    /// Startup value overrides.
    pub overrides: OverridesConfig,
}

/// Schema source. A `path` takes precedence over the preset.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SchemaSettings {
    /// TOML schema definition file.
    pub path: Option<PathBuf>,

    pub preset: SchemaPreset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SchemaPreset {
    /// Area, track and agent roster of the racing simulator.
    #[default]
    Racing,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Deadline for a single request/response exchange.
    pub timeout_ms: u64,

    /// Retries after the first attempt, for GET timeouts and for
    /// read-modify-write conflicts.
    pub max_retry_attempts: u32,

    pub base_delay_ms: u64,

    pub max_delay_ms: u64,
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_retry_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Largest frame accepted or sent over a stream channel.
    pub max_frame_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Filter directive, e.g. `info` or `env_config_sync=debug`.
    pub log_level: String,

    pub log_format: LogFormat,

    pub metrics_enabled: bool,

    /// Prometheus scrape address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9464".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct OverridesConfig {
    /// TOML file of `key = value` pairs applied before serving.
    pub path: Option<PathBuf>,

    /// Re-apply the file whenever it changes.
    pub watch: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: ServiceConfig = toml::from_str("").unwrap();
        assert_eq!(config.client.timeout(), Duration::from_secs(10));
        assert_eq!(config.client.max_retry_attempts, 5);
        assert_eq!(config.transport.max_frame_bytes, 1 << 20);
        assert_eq!(config.schema.preset, SchemaPreset::Racing);
        assert!(config.overrides.path.is_none());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [client]
            timeout_ms = 250

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.client.timeout_ms, 250);
        assert_eq!(config.client.base_delay_ms, 100);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.observability.log_level, "info");
    }
}
