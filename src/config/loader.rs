//! Settings, schema and overrides loading from disk.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::overrides::ValueOverrides;
use crate::config::settings::{SchemaPreset, SchemaSettings, ServiceConfig};
use crate::config::validation::{validate_config, ValidationError};
use crate::schema::presets::racing_schema;
use crate::schema::{Schema, SchemaError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse and validate settings from a TOML string.
pub fn parse_config(source: &str) -> Result<ServiceConfig, ConfigError> {
    let config: ServiceConfig = toml::from_str(source)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate settings from a TOML file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    parse_config(&read(path)?)
}

/// Build the schema the settings point at.
pub fn load_schema(settings: &SchemaSettings) -> Result<Schema, ConfigError> {
    if let Some(path) = &settings.path {
        return Ok(Schema::from_toml_str(&read(path)?)?);
    }
    match settings.preset {
        SchemaPreset::Racing => Ok(racing_schema()?),
    }
}

/// Load an overrides file and validate it against `schema`.
pub fn load_overrides(path: &Path, schema: &Schema) -> Result<ValueOverrides, ConfigError> {
    ValueOverrides::from_toml_str(&read(path)?, schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_settings_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[client]\ntimeout_ms = 500").unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.client.timeout_ms, 500);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_config(Path::new("/nonexistent/settings.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn invalid_settings_report_all_problems() {
        let err = parse_config("[client]\ntimeout_ms = 0\nbase_delay_ms = 9000").unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn schema_file_takes_precedence_over_preset() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[[keys]]\nname = \"speed.max\"\ndefault = 5.0\nkind = {{ type = \"float\" }}"
        )
        .unwrap();
        let settings = SchemaSettings {
            path: Some(file.path().to_path_buf()),
            preset: SchemaPreset::Racing,
        };
        let schema = load_schema(&settings).unwrap();
        assert_eq!(schema.len(), 1);

        let preset = load_schema(&SchemaSettings::default()).unwrap();
        assert_eq!(preset.namespaces().len(), 3);
    }
}
