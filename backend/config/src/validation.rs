//! Config validation: schema checks with user-friendly error messages.

use crate::schema::MdChatConfig;
use thiserror::Error;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &MdChatConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_server(config, &mut report);
    validate_provider(config, &mut report);
    validate_render(config, &mut report);
    validate_storage(config, &mut report);
    validate_logging(config, &mut report);
    report
}

fn validate_server(config: &MdChatConfig, report: &mut ValidationReport) {
    let Some(server) = &config.server else { return };
    if let Some(port) = server.port {
        if port == 0 {
            report.error("server.port", "port must be > 0");
        } else if port < 1024 && port != 80 && port != 443 {
            report.warn(
                "server.port",
                format!("Port {port} requires elevated privileges; consider using a port >= 1024"),
            );
        }
    }
    if server.bind.as_deref().is_some_and(|b| b.trim().is_empty()) {
        report.error("server.bind", "bind address cannot be empty");
    }
}

fn validate_provider(config: &MdChatConfig, report: &mut ValidationReport) {
    let Some(provider) = &config.provider else { return };
    if let Some(kind) = &provider.kind {
        if !matches!(kind.as_str(), "openai" | "mock") {
            report.error(
                "provider.kind",
                format!("Unknown provider kind '{kind}'. Use 'openai' or 'mock'"),
            );
        }
    }
    if let Some(url) = &provider.base_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            report.error("provider.baseUrl", "baseUrl must start with http:// or https://");
        }
    }
    if provider.max_tokens == Some(0) {
        report.error("provider.maxTokens", "maxTokens must be >= 1");
    }
    if let Some(t) = provider.temperature {
        if !(0.0..=2.0).contains(&t) {
            report.error("provider.temperature", "temperature must be between 0 and 2");
        }
    }
    if provider.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
        report.error("provider.model", "model cannot be empty");
    }
    if provider.kind.as_deref() == Some("openai")
        && provider.base_url.is_some()
        && provider.api_key.is_none()
    {
        report.warn(
            "provider.apiKey",
            "No API key set for a custom baseUrl; requests will be sent unauthenticated",
        );
    }
}

fn validate_render(config: &MdChatConfig, report: &mut ValidationReport) {
    let Some(render) = &config.render else { return };
    if let Some(parser) = &render.parser {
        if !matches!(parser.as_str(), "full" | "fallback") {
            report.error(
                "render.parser",
                format!("Unknown parser '{parser}'. Use 'full' or 'fallback'"),
            );
        }
    }
}

fn validate_storage(config: &MdChatConfig, report: &mut ValidationReport) {
    let Some(storage) = &config.storage else { return };
    if let Some(backend) = &storage.backend {
        if !matches!(backend.as_str(), "memory" | "json") {
            report.error(
                "storage.backend",
                format!("Unknown storage backend '{backend}'. Use 'memory' or 'json'"),
            );
        }
        if backend == "memory" {
            report.warn("storage.backend", "Chats will be lost when the server stops");
        }
    }
}

fn validate_logging(config: &MdChatConfig, report: &mut ValidationReport) {
    let Some(logging) = &config.logging else { return };
    if let Some(level) = &logging.level {
        let plain = level.to_ascii_lowercase();
        let is_level = matches!(plain.as_str(), "trace" | "debug" | "info" | "warn" | "error");
        if !is_level && !level.contains('=') {
            report.warn(
                "logging.level",
                format!("'{level}' is not a known level or filter directive"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ProviderConfig, RenderConfig, ServerConfig};

    #[test]
    fn empty_config_is_valid() {
        let report = validate(&MdChatConfig::default());
        assert!(report.is_valid(), "errors: {:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = crate::defaults::apply_all_defaults(
            MdChatConfig::default(),
            std::path::Path::new("/tmp"),
        );
        let report = validate(&cfg);
        assert!(report.is_valid(), "errors: {:?}", report.errors);
    }

    #[test]
    fn unknown_parser_is_error() {
        let mut cfg = MdChatConfig::default();
        cfg.render = Some(RenderConfig {
            parser: Some("commonmark".into()),
            ..Default::default()
        });
        let report = validate(&cfg);
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].path, "render.parser");
    }

    #[test]
    fn provider_limits_are_checked() {
        let mut cfg = MdChatConfig::default();
        cfg.provider = Some(ProviderConfig {
            max_tokens: Some(0),
            temperature: Some(3.5),
            base_url: Some("localhost:8080".into()),
            ..Default::default()
        });
        let report = validate(&cfg);
        let paths: Vec<_> = report.errors.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"provider.maxTokens"));
        assert!(paths.contains(&"provider.temperature"));
        assert!(paths.contains(&"provider.baseUrl"));
    }

    #[test]
    fn privileged_port_warns() {
        let mut cfg = MdChatConfig::default();
        cfg.server = Some(ServerConfig {
            port: Some(81),
            ..Default::default()
        });
        let report = validate(&cfg);
        assert!(report.is_valid());
        assert_eq!(report.warnings[0].path, "server.port");
    }
}
