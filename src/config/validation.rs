//! Settings validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function of the settings; no file system access

use std::net::SocketAddr;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::settings::ServiceConfig;

/// One semantic problem in the settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.client.timeout_ms == 0 {
        errors.push(ValidationError::new("client.timeout_ms", "must be greater than zero"));
    }
    if config.client.base_delay_ms > config.client.max_delay_ms {
        errors.push(ValidationError::new(
            "client.base_delay_ms",
            format!(
                "{} exceeds client.max_delay_ms ({})",
                config.client.base_delay_ms, config.client.max_delay_ms
            ),
        ));
    }

    let frame_limit = config.transport.max_frame_bytes;
    if frame_limit == 0 || u32::try_from(frame_limit).is_err() {
        errors.push(ValidationError::new(
            "transport.max_frame_bytes",
            format!("must be between 1 and {}", u32::MAX),
        ));
    }

    if let Err(e) = EnvFilter::try_new(&config.observability.log_level) {
        errors.push(ValidationError::new("observability.log_level", e.to_string()));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if config.overrides.watch && config.overrides.path.is_none() {
        errors.push(ValidationError::new("overrides.watch", "requires overrides.path"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
