//! Environment variable substitution and overrides for config values.
//!
//! Supports `${VAR_NAME}` syntax in string values, resolved at load time.
//! Only uppercase `[A-Z_][A-Z0-9_]*` variable names are matched.
//! `$${VAR}` escapes to a literal `${VAR}`.

use std::collections::HashMap;

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use tracing::debug;

use crate::schema::{LoggingConfig, MdChatConfig, ProviderConfig, ServerConfig};

/// A reference, optionally preceded by the `$` escape.
static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\$?)\$\{([A-Z_][A-Z0-9_]*)\}").unwrap());

/// Error returned for missing env vars.
#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Substitute `${VAR}` references in a config JSON value tree.
///
/// Returns an error if any referenced env var is not set or is empty.
pub fn resolve_env_vars_with(value: &Value, env: &HashMap<String, String>) -> Result<Value> {
    substitute_value(value, env, "")
}

fn substitute_value(value: &Value, env: &HashMap<String, String>, path: &str) -> Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(substitute_string(s, env, path)?)),
        Value::Array(arr) => {
            let result: Result<Vec<_>> = arr
                .iter()
                .enumerate()
                .map(|(i, v)| substitute_value(v, env, &format!("{path}[{i}]")))
                .collect();
            Ok(Value::Array(result?))
        }
        Value::Object(map) => {
            let mut result = serde_json::Map::new();
            for (k, v) in map {
                let child_path = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{path}.{k}")
                };
                result.insert(k.clone(), substitute_value(v, env, &child_path)?);
            }
            Ok(Value::Object(result))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_string(s: &str, env: &HashMap<String, String>, path: &str) -> Result<String> {
    if !s.contains('$') {
        return Ok(s.to_string());
    }

    let mut error: Option<MissingEnvVarError> = None;
    let substituted = ENV_VAR_PATTERN.replace_all(s, |caps: &Captures| {
        let var_name = &caps[2];
        if !caps[1].is_empty() {
            return format!("${{{var_name}}}");
        }
        match env.get(var_name) {
            Some(val) if !val.is_empty() => val.clone(),
            _ => {
                error.get_or_insert_with(|| MissingEnvVarError {
                    var_name: var_name.to_string(),
                    config_path: path.to_string(),
                });
                String::new()
            }
        }
    });

    if let Some(err) = error {
        bail!(err);
    }
    Ok(substituted.into_owned())
}

/// Collect all env var names referenced in a config value tree (for diagnostics).
pub fn collect_referenced_vars(value: &Value) -> Vec<String> {
    let mut vars = Vec::new();
    collect_vars_recursive(value, &mut vars);
    vars.sort();
    vars.dedup();
    vars
}

fn collect_vars_recursive(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            for caps in ENV_VAR_PATTERN.captures_iter(s) {
                if caps[1].is_empty() {
                    out.push(caps[2].to_string());
                }
            }
        }
        Value::Array(arr) => arr.iter().for_each(|v| collect_vars_recursive(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_vars_recursive(v, out)),
        _ => {}
    }
}

/// Apply `MDCHAT_*`, region and `RUST_LOG` overrides from `env`.
/// Environment overrides win over file values. Empty variables are ignored.
pub fn apply_env_overrides_with(
    mut config: MdChatConfig,
    env: &HashMap<String, String>,
) -> MdChatConfig {
    let get = |key: &str| env.get(key).filter(|v| !v.trim().is_empty()).cloned();

    let server = config.server.get_or_insert_with(ServerConfig::default);
    if let Some(bind) = get("MDCHAT_BIND") {
        server.bind = Some(bind);
    }
    if let Some(port) = get("MDCHAT_PORT") {
        match port.trim().parse() {
            Ok(port) => server.port = Some(port),
            Err(_) => debug!(value = %port, "Ignoring non-numeric MDCHAT_PORT"),
        }
    }

    let provider = config.provider.get_or_insert_with(ProviderConfig::default);
    if let Some(key) = get("MDCHAT_API_KEY") {
        provider.api_key = Some(key);
    }
    if let Some(url) = get("MDCHAT_BASE_URL") {
        provider.base_url = Some(url);
    }
    if let Some(model) = get("MDCHAT_MODEL") {
        provider.model = Some(model);
    }
    if let Some(region) = get("AWS_REGION").or_else(|| get("AWS_DEFAULT_REGION")) {
        provider.region = Some(region);
    }

    if let Some(level) = get("RUST_LOG") {
        config.logging.get_or_insert_with(LoggingConfig::default).level = Some(level);
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn substitutes_simple_var() {
        let v = json!({"apiKey": "${OPENAI_API_KEY}"});
        let env = env(&[("OPENAI_API_KEY", "sk-abc123")]);
        let result = resolve_env_vars_with(&v, &env).unwrap();
        assert_eq!(result["apiKey"], "sk-abc123");
    }

    #[test]
    fn error_on_missing_var() {
        let v = json!({"provider": {"apiKey": "${MISSING_VAR}"}});
        let err = resolve_env_vars_with(&v, &HashMap::new()).unwrap_err().to_string();
        assert!(err.contains("MISSING_VAR"));
        assert!(err.contains("provider.apiKey"));
    }

    #[test]
    fn escaped_reference_is_kept_literally() {
        let v = json!({"prompt": "use $${HOME} and ${NAME}"});
        let env = env(&[("NAME", "mdchat")]);
        let result = resolve_env_vars_with(&v, &env).unwrap();
        assert_eq!(result["prompt"], "use ${HOME} and mdchat");
    }

    #[test]
    fn passthrough_non_var_strings_and_numbers() {
        let v = json!({"key": "plain $5", "port": 8080, "list": ["${A}"]});
        let result = resolve_env_vars_with(&v, &env(&[("A", "x")])).unwrap();
        assert_eq!(result["key"], "plain $5");
        assert_eq!(result["port"], 8080);
        assert_eq!(result["list"][0], "x");
    }

    #[test]
    fn collects_referenced_vars_but_not_escaped_ones() {
        let v = json!({"a": "${FOO}", "b": {"c": "${BAR} $${BAZ}"}});
        assert_eq!(collect_referenced_vars(&v), vec!["BAR", "FOO"]);
    }

    #[test]
    fn env_overrides_win_over_file() {
        let mut cfg = MdChatConfig::default();
        cfg.server = Some(ServerConfig {
            port: Some(1),
            bind: Some("0.0.0.0".into()),
        });
        let cfg = apply_env_overrides_with(
            cfg,
            &env(&[
                ("MDCHAT_PORT", "9000"),
                ("MDCHAT_MODEL", "local-model"),
                ("AWS_DEFAULT_REGION", "eu-central-1"),
                ("RUST_LOG", "debug"),
                ("MDCHAT_API_KEY", ""),
            ]),
        );
        assert_eq!(cfg.server().port, Some(9000));
        assert_eq!(cfg.server().bind.as_deref(), Some("0.0.0.0"));
        assert_eq!(cfg.provider().model.as_deref(), Some("local-model"));
        assert_eq!(cfg.provider().region.as_deref(), Some("eu-central-1"));
        assert_eq!(cfg.provider().api_key, None);
        assert_eq!(cfg.logging().level.as_deref(), Some("debug"));
    }

    #[test]
    fn aws_region_beats_default_region() {
        let cfg = apply_env_overrides_with(
            MdChatConfig::default(),
            &env(&[("AWS_REGION", "ap-south-1"), ("AWS_DEFAULT_REGION", "eu-central-1")]),
        );
        assert_eq!(cfg.provider().region.as_deref(), Some("ap-south-1"));
    }

    #[test]
    fn bad_port_is_ignored() {
        let cfg = apply_env_overrides_with(MdChatConfig::default(), &env(&[("MDCHAT_PORT", "http")]));
        assert_eq!(cfg.server().port, None);
    }
}
