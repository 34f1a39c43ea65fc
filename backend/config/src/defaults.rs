//! Config defaults: applies sensible default values to parsed config.

use std::path::Path;

use crate::schema::{
    LoggingConfig, MdChatConfig, ProviderConfig, RenderConfig, ServerConfig, StorageConfig,
};

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;

pub const DEFAULT_PROVIDER_KIND: &str = "openai";
pub const DEFAULT_REGION: &str = "us-west-2";
pub const DEFAULT_MODEL: &str = "openai.gpt-oss-20b-1:0";
pub const DEFAULT_MAX_TOKENS: u32 = 300;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

pub const DEFAULT_PARSER: &str = "full";
pub const DEFAULT_STORAGE_BACKEND: &str = "json";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Apply all defaults to a freshly loaded config. Relative storage paths
/// are anchored at `config_dir`.
pub fn apply_all_defaults(config: MdChatConfig, config_dir: &Path) -> MdChatConfig {
    let config = apply_server_defaults(config);
    let config = apply_provider_defaults(config);
    let config = apply_render_defaults(config);
    let config = apply_storage_defaults(config, config_dir);
    apply_logging_defaults(config)
}

fn apply_server_defaults(mut config: MdChatConfig) -> MdChatConfig {
    let server = config.server.get_or_insert_with(ServerConfig::default);
    server.bind.get_or_insert_with(|| DEFAULT_BIND.to_string());
    server.port.get_or_insert(DEFAULT_PORT);
    config
}

fn apply_provider_defaults(mut config: MdChatConfig) -> MdChatConfig {
    let provider = config.provider.get_or_insert_with(ProviderConfig::default);
    provider.kind.get_or_insert_with(|| DEFAULT_PROVIDER_KIND.to_string());
    provider.region.get_or_insert_with(|| DEFAULT_REGION.to_string());
    provider.model.get_or_insert_with(|| DEFAULT_MODEL.to_string());
    provider.max_tokens.get_or_insert(DEFAULT_MAX_TOKENS);
    provider.temperature.get_or_insert(DEFAULT_TEMPERATURE);
    config
}

fn apply_render_defaults(mut config: MdChatConfig) -> MdChatConfig {
    let render = config.render.get_or_insert_with(RenderConfig::default);
    render.parser.get_or_insert_with(|| DEFAULT_PARSER.to_string());
    render.enhance.get_or_insert(true);
    config
}

fn apply_storage_defaults(mut config: MdChatConfig, config_dir: &Path) -> MdChatConfig {
    let storage = config.storage.get_or_insert_with(StorageConfig::default);
    storage
        .backend
        .get_or_insert_with(|| DEFAULT_STORAGE_BACKEND.to_string());

    let anchor = |value: Option<&String>, fallback: &str| {
        let path = Path::new(value.map(String::as_str).unwrap_or(fallback));
        if path.is_absolute() {
            path.display().to_string()
        } else {
            config_dir.join(path).display().to_string()
        }
    };
    storage.chats_dir = Some(anchor(storage.chats_dir.as_ref(), "chats"));
    storage.session_file = Some(anchor(storage.session_file.as_ref(), "session.json"));
    config
}

fn apply_logging_defaults(mut config: MdChatConfig) -> MdChatConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    logging.level.get_or_insert_with(|| DEFAULT_LOG_LEVEL.to_string());
    logging.json.get_or_insert(false);
    config
}
