//! `cmdrelay-config`: runtime configuration for cmdrelay.
//!
//! Provides:
//! - Typed YAML schema with camelCase keys
//! - Read/write with atomic backup rotation
//! - Default value application
//! - Validation with errors and warnings
//! - Config-backed permission resolver and settings store

pub mod defaults;
pub mod io;
pub mod permissions;
pub mod schema;
pub mod settings;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use io::{config_dir, config_file_path, load_config, write_config, CONFIG_DIR_ENV};
pub use permissions::ConfigPermissions;
pub use schema::RelayConfig;
pub use settings::ConfigSettingsStore;
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::Result;
use cmdrelay_core::RelayError;
use std::path::Path;

/// Load a config file, apply defaults and validate it.
///
/// Warnings are logged; any validation error fails the load.
pub async fn load_and_prepare(path: &Path) -> Result<RelayConfig> {
    let config = apply_all_defaults(load_config(path).await?);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if !report.is_valid() {
        let summary = report
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(RelayError::ConfigError(summary).into());
    }

    Ok(config)
}
