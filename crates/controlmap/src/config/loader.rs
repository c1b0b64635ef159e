use std::path::Path;

use crate::config::schema::Settings;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/settings-v1.json");

/// Environment variable naming the settings file.
pub const CONFIG_ENV: &str = "CONTROLMAP_CONFIG";

pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_settings_from_str(&content)
}

pub fn load_settings_from_str(content: &str) -> Result<Settings, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let settings: Settings = serde_json::from_value(json_value)?;

    validate_settings(&settings)?;

    Ok(settings)
}

/// Loads settings from `CONTROLMAP_CONFIG` when set, defaults otherwise.
pub fn load_settings_from_env() -> Result<Settings, ConfigError> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => load_settings(path),
        None => Ok(Settings::default()),
    }
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    if settings.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", settings.version),
        });
    }

    if settings.agent.timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "agent.timeout_secs must be greater than zero".to_string(),
        });
    }

    if settings.progress.tick_ms == 0 {
        return Err(ConfigError::Validation {
            message: "progress.tick_ms must be greater than zero".to_string(),
        });
    }

    if settings.agent.command.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "agent.command must not be empty".to_string(),
        });
    }

    Ok(())
}
