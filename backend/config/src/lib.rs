//! `mdchat-config`: runtime configuration for mdchat.
//!
//! Provides:
//! - Typed config schema (server, provider, render, storage, logging)
//! - YAML read/write with atomic replace
//! - `${ENV_VAR}` substitution and `MDCHAT_*` environment overrides
//! - Config redaction for safe logging
//! - Default value application
//! - Schema validation

pub mod defaults;
pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{
    apply_env_overrides_with, collect_referenced_vars, resolve_env_vars_with, MissingEnvVarError,
};
pub use io::{config_dir, config_file_path, load_config, write_config};
pub use redact::{redact, redacted_config};
pub use schema::{
    LoggingConfig, MdChatConfig, ProviderConfig, RenderConfig, ServerConfig, StorageConfig,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Load, substitute env vars, apply env overrides and defaults, and
/// validate a config file.
///
/// This is the main entry point for loading a config at runtime.
pub async fn load_and_prepare(path: &Path) -> Result<MdChatConfig> {
    let raw = load_config(path).await?;
    prepare(raw, path, &std::env::vars().collect())
}

fn prepare(raw: MdChatConfig, path: &Path, env: &HashMap<String, String>) -> Result<MdChatConfig> {
    let value: Value =
        serde_json::to_value(&raw).context("Failed to serialize config for processing")?;
    let referenced = collect_referenced_vars(&value);
    if !referenced.is_empty() {
        tracing::debug!(vars = ?referenced, "Config references env vars");
    }
    let value = resolve_env_vars_with(&value, env).context("Failed to resolve env vars in config")?;
    let config: MdChatConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;

    let config = apply_env_overrides_with(config, env);
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let config = apply_all_defaults(config, base_dir);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if let Some(first) = report.errors.into_iter().next() {
        return Err(first).context("Invalid configuration");
    }

    tracing::debug!(config = %redacted_config(&config), "Effective config");
    Ok(config)
}
